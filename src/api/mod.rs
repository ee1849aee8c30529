use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    Allocation, DEFAULT_TIME_HORIZON_YEARS, Goal, compute_allocation, compute_feasibility,
};
use crate::plan::PlanNarrator;
use crate::storage::{FileStore, NewUser, StorageError};

#[derive(Clone)]
pub struct AppState {
    store: Arc<FileStore>,
    narrator: Arc<PlanNarrator>,
}

impl AppState {
    pub fn new(store: FileStore, narrator: PlanNarrator) -> Self {
        Self {
            store: Arc::new(store),
            narrator: Arc::new(narrator),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct AnalyzePayload {
    user_id: i64,
    goals: Vec<Goal>,
    #[serde(default)]
    default_time_horizon: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FeasibilityPayload {
    user_id: i64,
    allocation: Allocation,
    goals: Vec<Goal>,
}

#[derive(Debug, Deserialize)]
struct PortfolioUpdatePayload {
    allocation: Allocation,
}

#[derive(Debug, Deserialize)]
struct CreateGoalPayload {
    user_id: i64,
    #[serde(flatten)]
    goal: Goal,
}

#[derive(Debug, Deserialize)]
struct PlanPayload {
    user_id: i64,
    goals: Vec<Goal>,
}

#[derive(Debug, Serialize)]
struct PlanResponse {
    summary: String,
}

pub async fn run_http_server(port: u16, data_dir: PathBuf) -> anyhow::Result<()> {
    let store = FileStore::open(data_dir)?;
    let state = AppState::new(store, PlanNarrator::from_env());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("finplan API listening on http://{addr}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route("/api/users", post(create_user_handler))
        .route("/api/users/:id", get(get_user_handler).put(update_user_handler))
        .route("/api/users/email/:email", get(get_user_by_email_handler))
        .route("/api/goals", post(create_goal_handler))
        .route("/api/goals/:user_id", get(list_goals_handler))
        .route("/api/portfolio/analyze", post(analyze_handler))
        .route("/api/portfolio/feasibility", post(feasibility_handler))
        .route(
            "/api/portfolio/:user_id",
            get(get_portfolio_handler).put(put_portfolio_handler),
        )
        .route("/api/plan/generate", post(generate_plan_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

async fn root_handler() -> Response {
    json_response(
        StatusCode::OK,
        serde_json::json!({
            "message": "Financial Planning API",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "healthy" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn create_user_handler(State(state): State<AppState>, Json(payload): Json<NewUser>) -> Response {
    if let Err(msg) = validate_new_user(&payload) {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, &msg);
    }
    match state.store.create_user(payload) {
        Ok(user) => {
            info!(user_id = user.id, "created user");
            json_response(StatusCode::CREATED, user)
        }
        Err(StorageError::EmailTaken(email)) => error_response(
            StatusCode::CONFLICT,
            &format!("email {email} already registered"),
        ),
        Err(err) => storage_error_response(err),
    }
}

async fn get_user_handler(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.get_user(id) {
        Some(user) => json_response(StatusCode::OK, user),
        None => error_response(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn get_user_by_email_handler(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Response {
    match state.store.get_user_by_email(&email) {
        Some(user) => json_response(StatusCode::OK, user),
        None => error_response(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn update_user_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<NewUser>,
) -> Response {
    if let Err(msg) = validate_new_user(&payload) {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, &msg);
    }
    match state.store.update_user(id, payload) {
        Ok(user) => {
            info!(user_id = user.id, "updated user");
            json_response(StatusCode::OK, user)
        }
        Err(StorageError::UserNotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "User not found")
        }
        Err(err) => storage_error_response(err),
    }
}

async fn create_goal_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateGoalPayload>,
) -> Response {
    if let Err(msg) = validate_goal(&payload.goal) {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, &msg);
    }
    if state.store.get_user(payload.user_id).is_none() {
        return error_response(StatusCode::NOT_FOUND, "User not found");
    }
    match state.store.create_goal(payload.user_id, payload.goal) {
        Ok(record) => {
            info!(user_id = record.user_id, goal_id = record.id, "created goal");
            json_response(StatusCode::CREATED, record)
        }
        Err(err) => storage_error_response(err),
    }
}

async fn list_goals_handler(State(state): State<AppState>, Path(user_id): Path<i64>) -> Response {
    json_response(StatusCode::OK, state.store.goals_for_user(user_id))
}

async fn analyze_handler(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzePayload>,
) -> Response {
    for goal in &payload.goals {
        if let Err(msg) = validate_goal(goal) {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, &msg);
        }
    }
    let Some(user) = state.store.get_user(payload.user_id) else {
        return error_response(StatusCode::NOT_FOUND, "User not found");
    };

    let horizon = payload
        .default_time_horizon
        .unwrap_or(DEFAULT_TIME_HORIZON_YEARS);
    let report = compute_allocation(&user.profile(), &payload.goals, horizon, today());
    json_response(StatusCode::OK, report)
}

async fn feasibility_handler(
    State(state): State<AppState>,
    Json(payload): Json<FeasibilityPayload>,
) -> Response {
    if let Err(msg) = validate_allocation(payload.allocation) {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, &msg);
    }
    let Some(user) = state.store.get_user(payload.user_id) else {
        return error_response(StatusCode::NOT_FOUND, "User not found");
    };

    let report = compute_feasibility(&user.profile(), payload.allocation, &payload.goals, today());
    json_response(StatusCode::OK, report)
}

async fn get_portfolio_handler(State(state): State<AppState>, Path(user_id): Path<i64>) -> Response {
    match state.store.get_portfolio(user_id) {
        Some(portfolio) => json_response(StatusCode::OK, portfolio),
        None => error_response(StatusCode::NOT_FOUND, "Portfolio not found"),
    }
}

async fn put_portfolio_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(payload): Json<PortfolioUpdatePayload>,
) -> Response {
    if let Err(msg) = validate_allocation(payload.allocation) {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, &msg);
    }
    match state.store.upsert_portfolio(user_id, payload.allocation) {
        Ok(portfolio) => {
            info!(user_id, "stored portfolio allocation");
            json_response(StatusCode::OK, portfolio)
        }
        Err(err) => storage_error_response(err),
    }
}

async fn generate_plan_handler(
    State(state): State<AppState>,
    Json(payload): Json<PlanPayload>,
) -> Response {
    let Some(user) = state.store.get_user(payload.user_id) else {
        return error_response(StatusCode::NOT_FOUND, "User not found");
    };
    let Some(portfolio) = state.store.get_portfolio(payload.user_id) else {
        return error_response(StatusCode::NOT_FOUND, "Portfolio not found");
    };

    let summary = state
        .narrator
        .generate_plan(&user, portfolio.allocation, &payload.goals)
        .await;
    json_response(StatusCode::OK, PlanResponse { summary })
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn validate_new_user(user: &NewUser) -> Result<(), String> {
    if user.age == 0 {
        return Err("age must be > 0".to_string());
    }
    if user.current_income < 0.0 {
        return Err("current_income must be >= 0".to_string());
    }
    if user.current_savings < 0.0 {
        return Err("current_savings must be >= 0".to_string());
    }
    if user.monthly_savings.is_some_and(|m| m < 0.0) {
        return Err("monthly_savings must be >= 0".to_string());
    }
    if user.email.trim().is_empty() || !user.email.contains('@') {
        return Err("email must be a valid address".to_string());
    }
    Ok(())
}

fn validate_goal(goal: &Goal) -> Result<(), String> {
    if goal.goal_name.trim().is_empty() {
        return Err("goal_name must not be empty".to_string());
    }
    if goal.target_amount <= 0.0 {
        return Err("target_amount must be > 0".to_string());
    }
    Ok(())
}

fn validate_allocation(allocation: Allocation) -> Result<(), String> {
    let buckets = [allocation.stocks, allocation.bonds, allocation.cash];
    if buckets.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err("allocation percentages must be finite and >= 0".to_string());
    }
    if (allocation.total() - 100.0).abs() > 0.5 {
        return Err("allocation percentages must sum to 100".to_string());
    }
    Ok(())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn storage_error_response(err: StorageError) -> Response {
    tracing::error!(%err, "storage operation failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GoalPriority, RiskProfile};
    use tempfile::TempDir;

    fn test_state() -> (TempDir, AppState) {
        let dir = TempDir::new().expect("temp dir");
        let store = FileStore::open(dir.path()).expect("open store");
        (dir, AppState::new(store, PlanNarrator::disabled()))
    }

    fn seed_user(state: &AppState) -> i64 {
        state
            .store
            .create_user(NewUser {
                name: "Test User".to_string(),
                email: "test@example.com".to_string(),
                age: 35,
                current_income: 85_000.0,
                current_savings: 10_000.0,
                monthly_savings: Some(500.0),
                risk_profile: RiskProfile::Moderate,
            })
            .expect("create user")
            .id
    }

    fn sample_goal() -> Goal {
        Goal {
            goal_name: "house".to_string(),
            target_amount: 80_000.0,
            target_date: "2031-08-30".to_string(),
            priority: GoalPriority::High,
        }
    }

    #[test]
    fn allocation_validation_requires_a_full_hundred_percent() {
        let ok = Allocation {
            stocks: 60.0,
            bonds: 30.0,
            cash: 10.0,
        };
        assert!(validate_allocation(ok).is_ok());

        let short = Allocation {
            stocks: 60.0,
            bonds: 30.0,
            cash: 5.0,
        };
        assert!(validate_allocation(short).is_err());

        let negative = Allocation {
            stocks: 110.0,
            bonds: -10.0,
            cash: 0.0,
        };
        assert!(validate_allocation(negative).is_err());
    }

    #[test]
    fn goal_validation_rejects_non_positive_amounts() {
        let mut goal = sample_goal();
        assert!(validate_goal(&goal).is_ok());
        goal.target_amount = 0.0;
        assert!(validate_goal(&goal).is_err());
        goal.target_amount = -5.0;
        assert!(validate_goal(&goal).is_err());
    }

    #[test]
    fn user_validation_rejects_structural_nonsense() {
        let valid = NewUser {
            name: "A".to_string(),
            email: "a@example.com".to_string(),
            age: 30,
            current_income: 0.0,
            current_savings: 0.0,
            monthly_savings: None,
            risk_profile: RiskProfile::Moderate,
        };
        assert!(validate_new_user(&valid).is_ok());

        let mut bad = valid.clone();
        bad.age = 0;
        assert!(validate_new_user(&bad).is_err());

        let mut bad = valid.clone();
        bad.current_savings = -1.0;
        assert!(validate_new_user(&bad).is_err());

        let mut bad = valid;
        bad.email = "nope".to_string();
        assert!(validate_new_user(&bad).is_err());
    }

    #[tokio::test]
    async fn analyze_returns_404_for_unknown_user() {
        let (_dir, state) = test_state();
        let response = analyze_handler(
            State(state),
            Json(AnalyzePayload {
                user_id: 42,
                goals: vec![sample_goal()],
                default_time_horizon: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn analyze_returns_a_report_for_a_stored_user() {
        let (_dir, state) = test_state();
        let user_id = seed_user(&state);
        let response = analyze_handler(
            State(state),
            Json(AnalyzePayload {
                user_id,
                goals: vec![sample_goal()],
                default_time_horizon: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn analyze_rejects_goals_with_non_positive_amounts() {
        let (_dir, state) = test_state();
        let user_id = seed_user(&state);
        let mut goal = sample_goal();
        goal.target_amount = -1.0;
        let response = analyze_handler(
            State(state),
            Json(AnalyzePayload {
                user_id,
                goals: vec![goal],
                default_time_horizon: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn feasibility_rejects_allocations_that_do_not_sum_to_100() {
        let (_dir, state) = test_state();
        let user_id = seed_user(&state);
        let response = feasibility_handler(
            State(state),
            Json(FeasibilityPayload {
                user_id,
                allocation: Allocation {
                    stocks: 80.0,
                    bonds: 30.0,
                    cash: 10.0,
                },
                goals: vec![sample_goal()],
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn plan_generation_needs_a_stored_portfolio() {
        let (_dir, state) = test_state();
        let user_id = seed_user(&state);
        let response = generate_plan_handler(
            State(state.clone()),
            Json(PlanPayload {
                user_id,
                goals: vec![sample_goal()],
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        state
            .store
            .upsert_portfolio(
                user_id,
                Allocation {
                    stocks: 60.0,
                    bonds: 30.0,
                    cash: 10.0,
                },
            )
            .expect("store portfolio");
        let response = generate_plan_handler(
            State(state),
            Json(PlanPayload {
                user_id,
                goals: vec![sample_goal()],
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_user_email_conflicts() {
        let (_dir, state) = test_state();
        seed_user(&state);
        let response = create_user_handler(
            State(state),
            Json(NewUser {
                name: "Other".to_string(),
                email: "test@example.com".to_string(),
                age: 40,
                current_income: 50_000.0,
                current_savings: 5_000.0,
                monthly_savings: None,
                risk_profile: RiskProfile::Conservative,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
