//! JSON-file persistence for users, portfolios, and goals.
//!
//! Each collection lives in one JSON array file under the data directory.
//! Records carry opaque numeric ids assigned `max(id) + 1`. Missing or
//! unreadable files read as empty collections so a fresh data directory
//! needs no initialization step.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::{Allocation, Goal, RiskProfile, UserProfile};

const USERS_FILE: &str = "users.json";
const PORTFOLIOS_FILE: &str = "portfolios.json";
const GOALS_FILE: &str = "goals.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("email {0} already registered")]
    EmailTaken(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: u32,
    pub current_income: f64,
    pub current_savings: f64,
    #[serde(default)]
    pub monthly_savings: Option<f64>,
    pub risk_profile: RiskProfile,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl UserRecord {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            age: self.age,
            current_income: self.current_income,
            current_savings: self.current_savings,
            monthly_savings: self.monthly_savings,
            risk_profile: self.risk_profile,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: u32,
    pub current_income: f64,
    pub current_savings: f64,
    #[serde(default)]
    pub monthly_savings: Option<f64>,
    pub risk_profile: RiskProfile,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortfolioRecord {
    pub id: i64,
    pub user_id: i64,
    pub allocation: Allocation,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoalRecord {
    pub id: i64,
    pub user_id: i64,
    #[serde(flatten)]
    pub goal: Goal,
    pub created_at: String,
}

/// File-backed store shared across request handlers. A single mutex guards
/// every read-modify-write cycle; collections are small and re-read per
/// operation, matching the one-array-per-file layout.
pub struct FileStore {
    data_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            lock: Mutex::new(()),
        })
    }

    pub fn create_user(&self, new_user: NewUser) -> Result<UserRecord, StorageError> {
        let _guard = self.lock.lock().expect("storage lock poisoned");
        let mut users: Vec<UserRecord> = self.read_collection(USERS_FILE);
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(StorageError::EmailTaken(new_user.email));
        }
        let record = UserRecord {
            id: next_id(users.iter().map(|u| u.id)),
            name: new_user.name,
            email: new_user.email,
            age: new_user.age,
            current_income: new_user.current_income,
            current_savings: new_user.current_savings,
            monthly_savings: new_user.monthly_savings,
            risk_profile: new_user.risk_profile,
            created_at: Utc::now().to_rfc3339(),
            updated_at: None,
        };
        users.push(record.clone());
        self.write_collection(USERS_FILE, &users)?;
        Ok(record)
    }

    pub fn get_user(&self, user_id: i64) -> Option<UserRecord> {
        let _guard = self.lock.lock().expect("storage lock poisoned");
        let users: Vec<UserRecord> = self.read_collection(USERS_FILE);
        users.into_iter().find(|u| u.id == user_id)
    }

    pub fn get_user_by_email(&self, email: &str) -> Option<UserRecord> {
        let _guard = self.lock.lock().expect("storage lock poisoned");
        let users: Vec<UserRecord> = self.read_collection(USERS_FILE);
        users.into_iter().find(|u| u.email == email)
    }

    pub fn update_user(&self, user_id: i64, update: NewUser) -> Result<UserRecord, StorageError> {
        let _guard = self.lock.lock().expect("storage lock poisoned");
        let mut users: Vec<UserRecord> = self.read_collection(USERS_FILE);
        let Some(existing) = users.iter_mut().find(|u| u.id == user_id) else {
            return Err(StorageError::UserNotFound(user_id));
        };
        existing.name = update.name;
        existing.email = update.email;
        existing.age = update.age;
        existing.current_income = update.current_income;
        existing.current_savings = update.current_savings;
        existing.monthly_savings = update.monthly_savings;
        existing.risk_profile = update.risk_profile;
        existing.updated_at = Some(Utc::now().to_rfc3339());
        let record = existing.clone();
        self.write_collection(USERS_FILE, &users)?;
        Ok(record)
    }

    pub fn get_portfolio(&self, user_id: i64) -> Option<PortfolioRecord> {
        let _guard = self.lock.lock().expect("storage lock poisoned");
        let portfolios: Vec<PortfolioRecord> = self.read_collection(PORTFOLIOS_FILE);
        portfolios.into_iter().find(|p| p.user_id == user_id)
    }

    /// Create or replace the user's stored allocation.
    pub fn upsert_portfolio(
        &self,
        user_id: i64,
        allocation: Allocation,
    ) -> Result<PortfolioRecord, StorageError> {
        let _guard = self.lock.lock().expect("storage lock poisoned");
        let mut portfolios: Vec<PortfolioRecord> = self.read_collection(PORTFOLIOS_FILE);
        let record = match portfolios.iter_mut().find(|p| p.user_id == user_id) {
            Some(existing) => {
                existing.allocation = allocation;
                existing.updated_at = Some(Utc::now().to_rfc3339());
                existing.clone()
            }
            None => {
                let record = PortfolioRecord {
                    id: next_id(portfolios.iter().map(|p| p.id)),
                    user_id,
                    allocation,
                    created_at: Utc::now().to_rfc3339(),
                    updated_at: None,
                };
                portfolios.push(record.clone());
                record
            }
        };
        self.write_collection(PORTFOLIOS_FILE, &portfolios)?;
        Ok(record)
    }

    pub fn create_goal(&self, user_id: i64, goal: Goal) -> Result<GoalRecord, StorageError> {
        let _guard = self.lock.lock().expect("storage lock poisoned");
        let mut goals: Vec<GoalRecord> = self.read_collection(GOALS_FILE);
        let record = GoalRecord {
            id: next_id(goals.iter().map(|g| g.id)),
            user_id,
            goal,
            created_at: Utc::now().to_rfc3339(),
        };
        goals.push(record.clone());
        self.write_collection(GOALS_FILE, &goals)?;
        Ok(record)
    }

    pub fn goals_for_user(&self, user_id: i64) -> Vec<GoalRecord> {
        let _guard = self.lock.lock().expect("storage lock poisoned");
        let goals: Vec<GoalRecord> = self.read_collection(GOALS_FILE);
        goals.into_iter().filter(|g| g.user_id == user_id).collect()
    }

    fn read_collection<T: DeserializeOwned>(&self, file: &str) -> Vec<T> {
        let path = self.path_for(file);
        match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(file, %err, "unreadable collection file, treating as empty");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    fn write_collection<T: Serialize>(&self, file: &str, items: &[T]) -> Result<(), StorageError> {
        let path = self.path_for(file);
        let raw = serde_json::to_string_pretty(items)?;
        fs::write(&path, raw)?;
        Ok(())
    }

    fn path_for(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }
}

fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0) + 1
}
