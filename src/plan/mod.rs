//! Financial-plan narrative generation.
//!
//! The prose summary comes from an external chat-completion service when an
//! API key is configured. The service is strictly best-effort: any failure,
//! including a missing key, falls back to a deterministic templated summary
//! so plan generation never surfaces a collaborator error to the caller.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::core::{Allocation, Goal};
use crate::storage::UserRecord;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const API_KEY_ENV: &str = "FINPLAN_OPENAI_API_KEY";
const ENDPOINT_ENV: &str = "FINPLAN_PLAN_URL";

#[derive(Debug, Error)]
enum PlanError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("completion response contained no choices")]
    EmptyCompletion,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

pub struct PlanNarrator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl PlanNarrator {
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
        }
    }

    /// A narrator that always produces the fallback summary. Useful when the
    /// service should stay offline, e.g. in tests.
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
        }
    }

    /// Generate the plan summary. Infallible by contract: collaborator
    /// failures degrade to the templated fallback.
    pub async fn generate_plan(
        &self,
        user: &UserRecord,
        allocation: Allocation,
        goals: &[Goal],
    ) -> String {
        let goals_text = goals_text(goals);
        let allocation_text = allocation_text(allocation);

        let Some(api_key) = &self.api_key else {
            return fallback_plan(user, &goals_text, &allocation_text);
        };

        let prompt = build_prompt(user, &goals_text, &allocation_text);
        match self.request_completion(api_key, &prompt).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(%err, "plan narrative service failed, using fallback summary");
                fallback_plan(user, &goals_text, &allocation_text)
            }
        }
    }

    async fn request_completion(&self, api_key: &str, prompt: &str) -> Result<String, PlanError> {
        let body = serde_json::json!({
            "model": "gpt-4",
            "messages": [
                {
                    "role": "system",
                    "content": "You are an expert financial advisor providing personalized financial planning advice.",
                },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": 800,
            "temperature": 0.7,
        });

        let completion: ChatCompletion = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or(PlanError::EmptyCompletion)
    }
}

fn goals_text(goals: &[Goal]) -> String {
    goals
        .iter()
        .map(|goal| {
            format!(
                "- {}: ${:.0} by {} (Priority: {})",
                goal.goal_name,
                goal.target_amount,
                goal.target_date,
                goal.priority.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn allocation_text(allocation: Allocation) -> String {
    format!(
        "stocks: {}%, bonds: {}%, cash: {}%",
        allocation.stocks, allocation.bonds, allocation.cash
    )
}

fn build_prompt(user: &UserRecord, goals_text: &str, allocation_text: &str) -> String {
    format!(
        "You are a financial planning advisor. Create a comprehensive financial plan summary \
         for the following client:\n\n\
         Client Profile:\n\
         - Name: {name}\n\
         - Age: {age}\n\
         - Current Income: ${income:.0} per year\n\
         - Current Savings: ${savings:.0}\n\
         - Risk Profile: {risk}\n\n\
         Financial Goals:\n{goals_text}\n\n\
         Recommended Portfolio Allocation:\n{allocation_text}\n\n\
         Please provide a clear, actionable financial plan that summarizes the client's \
         situation, addresses each goal, explains the allocation rationale, and lists \
         next steps. Keep the response professional and under 500 words.",
        name = user.name,
        age = user.age,
        income = user.current_income,
        savings = user.current_savings,
        risk = user.risk_profile.as_str(),
    )
}

/// Deterministic summary used whenever the narrative service is unavailable.
/// Part of the observable contract, so its content only depends on the inputs.
fn fallback_plan(user: &UserRecord, goals_text: &str, allocation_text: &str) -> String {
    format!(
        "Financial Plan Summary for {name}\n\n\
         Based on your profile:\n\
         - Age: {age}\n\
         - Income: ${income:.0}/year\n\
         - Savings: ${savings:.0}\n\
         - Risk Tolerance: {risk}\n\n\
         Your Financial Goals:\n{goals_text}\n\n\
         Recommended Portfolio Allocation:\n{allocation_text}\n\n\
         Next Steps:\n\
         1. Review and adjust your portfolio allocation based on your comfort level\n\
         2. Set up automatic contributions to align with your goals\n\
         3. Regularly review and rebalance your portfolio\n\
         4. Consider tax-advantaged accounts for long-term goals\n\n\
         Note: This is a preliminary plan. Consult with a certified financial planner \
         for personalized advice.",
        name = user.name,
        age = user.age,
        income = user.current_income,
        savings = user.current_savings,
        risk = user.risk_profile.as_str(),
    )
}
