mod allocation;
mod engine;
mod projection;
mod types;

pub use allocation::{
    BlendOutcome, allocation_for_horizon, blend_allocations, expected_return, risk_score,
};
pub use engine::{DEFAULT_TIME_HORIZON_YEARS, compute_allocation, compute_feasibility};
pub use projection::{compute_goal_feasibilities, compute_goal_feasibility, compute_projection};
pub use types::{
    Allocation, AllocationReport, FeasibilityReport, Goal, GoalAllocationBreakdown,
    GoalFeasibility, GoalPriority, ProjectionPoint, RiskProfile, UserProfile,
};
