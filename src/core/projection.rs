use chrono::{Datelike, NaiveDate};

use super::allocation::{months_between, parse_target_date};
use super::types::{Goal, GoalFeasibility, ProjectionPoint, round_to};

/// Future value of a lump sum plus a level monthly contribution after
/// `months` months of monthly compounding. A zero or negative rate
/// degenerates to a plain sum of contributions.
fn future_value(current_savings: f64, monthly: f64, monthly_rate: f64, months: i64) -> f64 {
    let fv_savings = current_savings * (1.0 + monthly_rate).powi(months as i32);
    fv_savings + monthly * annuity_factor(monthly_rate, months)
}

fn annuity_factor(monthly_rate: f64, months: i64) -> f64 {
    if monthly_rate > 0.0 {
        ((1.0 + monthly_rate).powi(months as i32) - 1.0) / monthly_rate
    } else {
        months as f64
    }
}

/// Feasibility verdict for one goal. Returns `None` when the target date
/// does not parse; such goals are silently excluded from feasibility output
/// even though they still participate in allocation blending.
pub fn compute_goal_feasibility(
    goal: &Goal,
    current_savings: f64,
    assumed_monthly: f64,
    annual_return: f64,
    today: NaiveDate,
) -> Option<GoalFeasibility> {
    let target_date = parse_target_date(&goal.target_date)?;
    let months = months_between(today, target_date).max(1);
    let monthly_rate = annual_return / 12.0;

    let fv_savings = current_savings * (1.0 + monthly_rate).powi(months as i32);
    let factor = annuity_factor(monthly_rate, months);
    let projected_value = fv_savings + assumed_monthly * factor;

    // The required contribution zeroes the shortfall on its own; it is a
    // recommendation, not a validation of the assumed contribution.
    let required_monthly = if factor > 0.0 {
        ((goal.target_amount - fv_savings) / factor).max(0.0)
    } else {
        0.0
    };

    Some(GoalFeasibility {
        goal_name: goal.goal_name.clone(),
        target_amount: goal.target_amount,
        target_date: goal.target_date.clone(),
        years_to_goal: round_to(months as f64 / 12.0, 1),
        projected_value: round_to(projected_value, 2),
        shortfall: round_to(goal.target_amount - projected_value, 2),
        on_track: projected_value >= goal.target_amount,
        required_monthly_savings: round_to(required_monthly, 2),
        assumed_monthly_contribution: assumed_monthly,
    })
}

pub fn compute_goal_feasibilities(
    goals: &[Goal],
    current_savings: f64,
    assumed_monthly: f64,
    annual_return: f64,
    today: NaiveDate,
) -> Vec<GoalFeasibility> {
    goals
        .iter()
        .filter_map(|goal| {
            compute_goal_feasibility(goal, current_savings, assumed_monthly, annual_return, today)
        })
        .collect()
}

/// Year-by-year portfolio projection from today's year through
/// `max(today + 10 years, latest parseable goal year)`, inclusive.
pub fn compute_projection(
    goals: &[Goal],
    current_savings: f64,
    assumed_monthly: f64,
    annual_return: f64,
    today: NaiveDate,
) -> Vec<ProjectionPoint> {
    let mut end_year = today.year() + 10;
    for goal in goals {
        if let Some(date) = parse_target_date(&goal.target_date) {
            end_year = end_year.max(date.year());
        }
    }

    let monthly_rate = annual_return / 12.0;
    (today.year()..=end_year)
        .map(|year| {
            let months = i64::from(year - today.year()) * 12;
            // months == 0 is the "today" snapshot: current savings, no growth.
            let value = if months == 0 {
                current_savings
            } else {
                future_value(current_savings, assumed_monthly, monthly_rate, months)
            };
            ProjectionPoint {
                year,
                value: round_to(value, 2),
            }
        })
        .collect()
}
