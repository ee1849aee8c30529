use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum RiskProfile {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl RiskProfile {
    /// Unrecognized profile strings fall back to `Moderate`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "conservative" => RiskProfile::Conservative,
            "aggressive" => RiskProfile::Aggressive,
            _ => RiskProfile::Moderate,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskProfile::Conservative => "conservative",
            RiskProfile::Moderate => "moderate",
            RiskProfile::Aggressive => "aggressive",
        }
    }
}

impl Serialize for RiskProfile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskProfile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(RiskProfile::parse(&raw))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum GoalPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl GoalPriority {
    /// Unrecognized priority strings fall back to `Medium`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => GoalPriority::High,
            "low" => GoalPriority::Low,
            _ => GoalPriority::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GoalPriority::High => "high",
            GoalPriority::Medium => "medium",
            GoalPriority::Low => "low",
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            GoalPriority::High => 3.0,
            GoalPriority::Medium => 2.0,
            GoalPriority::Low => 1.0,
        }
    }
}

impl Serialize for GoalPriority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GoalPriority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(GoalPriority::parse(&raw))
    }
}

/// Immutable input to every calculation; owned by the caller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserProfile {
    pub age: u32,
    pub current_income: f64,
    pub current_savings: f64,
    #[serde(default)]
    pub monthly_savings: Option<f64>,
    pub risk_profile: RiskProfile,
}

impl UserProfile {
    pub fn assumed_monthly_contribution(&self) -> f64 {
        self.monthly_savings.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Goal {
    pub goal_name: String,
    pub target_amount: f64,
    /// ISO "YYYY-MM-DD"; kept as entered so an unparseable value can still
    /// participate in blending via the fallback horizon.
    pub target_date: String,
    #[serde(default)]
    pub priority: GoalPriority,
}

/// Percentages per asset class. Blended allocations sum to exactly 100;
/// user-edited allocations are only required to sum to ~100 at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Allocation {
    pub stocks: f64,
    pub bonds: f64,
    pub cash: f64,
}

impl Allocation {
    pub fn total(self) -> f64 {
        self.stocks + self.bonds + self.cash
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalAllocationBreakdown {
    pub goal_name: String,
    pub time_horizon_years: i64,
    pub allocation: Allocation,
    /// This goal's share of the total blend weight, percent, 1 decimal.
    pub weight_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalFeasibility {
    pub goal_name: String,
    pub target_amount: f64,
    pub target_date: String,
    pub years_to_goal: f64,
    pub projected_value: f64,
    /// target − projected; negative means surplus.
    pub shortfall: f64,
    pub on_track: bool,
    pub required_monthly_savings: f64,
    pub assumed_monthly_contribution: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProjectionPoint {
    pub year: i32,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationReport {
    pub allocation: Allocation,
    pub time_horizon_years: i64,
    pub expected_return: f64,
    pub risk_score: f64,
    pub reasoning: String,
    pub goal_feasibility: Vec<GoalFeasibility>,
    pub projection: Vec<ProjectionPoint>,
    pub goal_allocation_breakdown: Vec<GoalAllocationBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeasibilityReport {
    pub expected_return: f64,
    pub goal_feasibility: Vec<GoalFeasibility>,
    pub projection: Vec<ProjectionPoint>,
}

pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
