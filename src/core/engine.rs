use chrono::NaiveDate;

use super::allocation::{blend_allocations, expected_return, risk_score};
use super::projection::{compute_goal_feasibilities, compute_projection};
use super::types::{
    Allocation, AllocationReport, FeasibilityReport, Goal, UserProfile, round_to,
};

pub const DEFAULT_TIME_HORIZON_YEARS: i64 = 10;

/// Blend a target allocation from the user's risk profile and goals, then
/// evaluate goal feasibility and the year-by-year projection under the
/// blend's expected return. `today` is injected so identical inputs always
/// produce identical output.
pub fn compute_allocation(
    user: &UserProfile,
    goals: &[Goal],
    default_time_horizon: i64,
    today: NaiveDate,
) -> AllocationReport {
    let blend = blend_allocations(user.risk_profile, goals, default_time_horizon, today);
    let annual_return = expected_return(blend.allocation);
    let assumed_monthly = user.assumed_monthly_contribution();

    let reasoning = if blend.breakdown.is_empty() {
        format!(
            "No dated goals to blend; using the flat {} profile at the default {}-year horizon: \
             {}% stocks, {}% bonds, {}% cash.",
            user.risk_profile.as_str(),
            blend.time_horizon_years,
            blend.allocation.stocks,
            blend.allocation.bonds,
            blend.allocation.cash,
        )
    } else {
        format!(
            "Blended across {} goal(s) for a {} investor with an effective {}-year horizon, \
             weighted by goal amount and priority: {}% stocks, {}% bonds, {}% cash.",
            blend.breakdown.len(),
            user.risk_profile.as_str(),
            blend.time_horizon_years,
            blend.allocation.stocks,
            blend.allocation.bonds,
            blend.allocation.cash,
        )
    };

    AllocationReport {
        allocation: blend.allocation,
        time_horizon_years: blend.time_horizon_years,
        expected_return: round_to(annual_return, 4),
        risk_score: round_to(risk_score(blend.allocation), 2),
        reasoning,
        goal_feasibility: compute_goal_feasibilities(
            goals,
            user.current_savings,
            assumed_monthly,
            annual_return,
            today,
        ),
        projection: compute_projection(
            goals,
            user.current_savings,
            assumed_monthly,
            annual_return,
            today,
        ),
        goal_allocation_breakdown: blend.breakdown,
    }
}

/// Recompute return, feasibility, and projection for an arbitrary
/// (e.g. user-edited) allocation without re-deriving the blend.
pub fn compute_feasibility(
    user: &UserProfile,
    allocation: Allocation,
    goals: &[Goal],
    today: NaiveDate,
) -> FeasibilityReport {
    let annual_return = expected_return(allocation);
    let assumed_monthly = user.assumed_monthly_contribution();

    FeasibilityReport {
        expected_return: round_to(annual_return, 4),
        goal_feasibility: compute_goal_feasibilities(
            goals,
            user.current_savings,
            assumed_monthly,
            annual_return,
            today,
        ),
        projection: compute_projection(
            goals,
            user.current_savings,
            assumed_monthly,
            annual_return,
            today,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{GoalPriority, RiskProfile};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    fn sample_user() -> UserProfile {
        UserProfile {
            age: 35,
            current_income: 85_000.0,
            current_savings: 10_000.0,
            monthly_savings: Some(500.0),
            risk_profile: RiskProfile::Moderate,
        }
    }

    fn goal(name: &str, amount: f64, target_date: &str, priority: GoalPriority) -> Goal {
        Goal {
            goal_name: name.to_string(),
            target_amount: amount,
            target_date: target_date.to_string(),
            priority,
        }
    }

    #[test]
    fn five_year_goal_keeps_base_moderate_allocation() {
        let today = date(2026, 8, 30);
        let goals = vec![goal("house", 80_000.0, "2031-08-30", GoalPriority::High)];
        let report = compute_allocation(&sample_user(), &goals, 10, today);

        assert_eq!(report.allocation.stocks, 60.0);
        assert_eq!(report.allocation.bonds, 30.0);
        assert_eq!(report.allocation.cash, 10.0);
        assert_eq!(report.expected_return, 0.054);
        assert_eq!(report.risk_score, 0.6);
        assert_eq!(report.time_horizon_years, 5);
        assert_eq!(report.goal_feasibility.len(), 1);
        assert_eq!(report.goal_allocation_breakdown.len(), 1);
    }

    #[test]
    fn zero_goals_reasoning_mentions_flat_profile_not_blending() {
        let today = date(2026, 8, 30);
        let report = compute_allocation(&sample_user(), &[], 10, today);
        assert!(report.reasoning.contains("moderate"));
        assert!(report.reasoning.contains("10-year"));
        assert!(!report.reasoning.contains("Blended across"));
        assert!(report.goal_feasibility.is_empty());
        assert_eq!(report.projection.len(), 11);
    }

    #[test]
    fn identical_inputs_yield_identical_reports() {
        let today = date(2026, 8, 30);
        let goals = vec![
            goal("house", 80_000.0, "2031-08-30", GoalPriority::High),
            goal("car", 25_000.0, "2029-02-01", GoalPriority::Low),
        ];
        let user = sample_user();
        let a = compute_allocation(&user, &goals, 10, today);
        let b = compute_allocation(&user, &goals, 10, today);
        assert_eq!(
            serde_json::to_string(&a).expect("serializes"),
            serde_json::to_string(&b).expect("serializes")
        );
    }

    #[test]
    fn unparseable_goal_shows_in_breakdown_but_not_feasibility() {
        let today = date(2026, 8, 30);
        let goals = vec![
            goal("house", 80_000.0, "2031-08-30", GoalPriority::High),
            goal("someday", 40_000.0, "not-a-date", GoalPriority::Medium),
        ];
        let report = compute_allocation(&sample_user(), &goals, 10, today);
        assert_eq!(report.goal_allocation_breakdown.len(), 2);
        assert_eq!(report.goal_feasibility.len(), 1);
        assert_eq!(report.goal_feasibility[0].goal_name, "house");
        assert_eq!(report.projection.last().expect("non-empty").year, 2036);
    }

    #[test]
    fn feasibility_path_matches_blend_path_for_the_same_allocation() {
        let today = date(2026, 8, 30);
        let goals = vec![goal("house", 80_000.0, "2031-08-30", GoalPriority::High)];
        let user = sample_user();
        let report = compute_allocation(&user, &goals, 10, today);
        let standalone = compute_feasibility(&user, report.allocation, &goals, today);

        assert_eq!(standalone.expected_return, report.expected_return);
        assert_eq!(
            standalone.goal_feasibility[0].projected_value,
            report.goal_feasibility[0].projected_value
        );
        assert_eq!(
            serde_json::to_string(&standalone.projection).expect("serializes"),
            serde_json::to_string(&report.projection).expect("serializes")
        );
    }

    #[test]
    fn feasibility_accepts_a_hand_edited_allocation() {
        let today = date(2026, 8, 30);
        let goals = vec![goal("house", 80_000.0, "2031-08-30", GoalPriority::High)];
        let edited = Allocation {
            stocks: 75.0,
            bonds: 20.0,
            cash: 5.0,
        };
        let report = compute_feasibility(&sample_user(), edited, &goals, today);
        assert_eq!(report.expected_return, 0.069);
        assert_eq!(report.goal_feasibility.len(), 1);
    }
}
