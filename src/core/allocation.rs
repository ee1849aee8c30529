use chrono::{Datelike, NaiveDate};

use super::types::{Allocation, Goal, GoalAllocationBreakdown, RiskProfile, round_to};

/// Calendar year/month difference only; day-of-month is ignored.
pub(crate) fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (i64::from(to.year()) - i64::from(from.year())) * 12
        + (i64::from(to.month()) - i64::from(from.month()))
}

pub(crate) fn parse_target_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Whole years until the goal's target date, never less than one.
pub(crate) fn years_to_goal(today: NaiveDate, target: NaiveDate) -> i64 {
    let months = months_between(today, target);
    ((months as f64 / 12.0).round() as i64).max(1)
}

fn base_allocation(profile: RiskProfile) -> Allocation {
    match profile {
        RiskProfile::Conservative => Allocation {
            stocks: 40.0,
            bonds: 50.0,
            cash: 10.0,
        },
        RiskProfile::Moderate => Allocation {
            stocks: 60.0,
            bonds: 30.0,
            cash: 10.0,
        },
        RiskProfile::Aggressive => Allocation {
            stocks: 80.0,
            bonds: 15.0,
            cash: 5.0,
        },
    }
}

/// Ideal allocation for a single time horizon. Horizons beyond 10 years shift
/// bonds into stocks, horizons under 5 years shift stocks into bonds; cash is
/// never adjusted.
pub fn allocation_for_horizon(profile: RiskProfile, years: i64) -> Allocation {
    let mut allocation = base_allocation(profile);
    if years > 10 {
        let shift = (years - 10).min(10) as f64;
        allocation.stocks = (allocation.stocks + shift).min(90.0);
        allocation.bonds = (allocation.bonds - shift).max(5.0);
    } else if years < 5 {
        let shift = (5 - years).min(10) as f64;
        allocation.stocks = (allocation.stocks - shift).max(20.0);
        allocation.bonds = (allocation.bonds + shift).min(60.0);
    }
    allocation
}

#[derive(Debug, Clone)]
pub struct BlendOutcome {
    pub allocation: Allocation,
    /// Weighted average of the goals' horizons, or the default horizon when
    /// no goals contributed to the blend.
    pub time_horizon_years: i64,
    pub breakdown: Vec<GoalAllocationBreakdown>,
}

/// Blend the per-goal ideal allocations into one target allocation, weighted
/// by goal amount times priority weight. Goals with unparseable dates blend
/// at `default_horizon`.
pub fn blend_allocations(
    profile: RiskProfile,
    goals: &[Goal],
    default_horizon: i64,
    today: NaiveDate,
) -> BlendOutcome {
    let weighted: Vec<(&Goal, i64, f64, Allocation)> = goals
        .iter()
        .map(|goal| {
            let horizon = parse_target_date(&goal.target_date)
                .map(|date| years_to_goal(today, date))
                .unwrap_or(default_horizon);
            let weight = goal.target_amount * goal.priority.weight();
            (goal, horizon, weight, allocation_for_horizon(profile, horizon))
        })
        .collect();

    let total_weight: f64 = weighted.iter().map(|(_, _, weight, _)| weight).sum();
    if weighted.is_empty() || total_weight <= 0.0 {
        return BlendOutcome {
            allocation: allocation_for_horizon(profile, default_horizon),
            time_horizon_years: default_horizon,
            breakdown: Vec::new(),
        };
    }

    let mut stocks = 0.0;
    let mut bonds = 0.0;
    let mut cash = 0.0;
    let mut horizon = 0.0;
    let mut breakdown = Vec::with_capacity(weighted.len());
    for (goal, years, weight, allocation) in &weighted {
        let share = weight / total_weight;
        stocks += share * allocation.stocks;
        bonds += share * allocation.bonds;
        cash += share * allocation.cash;
        horizon += share * *years as f64;
        breakdown.push(GoalAllocationBreakdown {
            goal_name: goal.goal_name.clone(),
            time_horizon_years: *years,
            allocation: *allocation,
            weight_pct: round_to(share * 100.0, 1),
        });
    }

    let mut allocation = Allocation {
        stocks: stocks.round(),
        bonds: bonds.round(),
        cash: cash.round(),
    };
    // Independent rounding can leave the total a point off 100; push the
    // remainder into the largest bucket (ties go stocks, then bonds).
    let correction = 100.0 - allocation.total();
    if correction != 0.0 {
        if allocation.stocks >= allocation.bonds && allocation.stocks >= allocation.cash {
            allocation.stocks += correction;
        } else if allocation.bonds >= allocation.cash {
            allocation.bonds += correction;
        } else {
            allocation.cash += correction;
        }
    }

    BlendOutcome {
        allocation,
        time_horizon_years: horizon.round() as i64,
        breakdown,
    }
}

/// Deterministic weighted sum of fixed asset-class return assumptions:
/// 8% stocks, 4% bonds, 2% cash.
pub fn expected_return(allocation: Allocation) -> f64 {
    (allocation.stocks * 0.08 + allocation.bonds * 0.04 + allocation.cash * 0.02) / 100.0
}

pub fn risk_score(allocation: Allocation) -> f64 {
    allocation.stocks / 100.0
}
