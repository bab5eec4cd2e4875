//! Repository seam over the remote tables `meals`, `user_roles` and
//! `weekly_plans`.
//!
//! Every call carries the caller's [`Session`]: backends that sit behind
//! row-level policies forward its access token, the others may ignore it.

pub mod memory;
pub mod postgres;
pub mod rest;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{
    auth::Session,
    meal::{Meal, MealCategory, NewMeal},
    plan::{NewWeeklyPlan, WeeklyPlan},
    user::UserRole,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use rest::RestStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,
    /// The backend refused the request (row-level policy, constraint, bad filter).
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("Store unreachable: {0}")]
    Transport(String),
    #[error("Unexpected store payload: {0}")]
    Decode(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Meals ordered by category then name, optionally restricted to one category.
    async fn list_meals(
        &self,
        session: &Session,
        category: Option<MealCategory>,
    ) -> Result<Vec<Meal>, StoreError>;

    async fn get_meal(&self, session: &Session, id: Uuid) -> Result<Meal, StoreError>;

    async fn insert_meal(&self, session: &Session, meal: &NewMeal) -> Result<Meal, StoreError>;

    async fn update_meal(
        &self,
        session: &Session,
        id: Uuid,
        meal: &NewMeal,
    ) -> Result<Meal, StoreError>;

    async fn delete_meal(&self, session: &Session, id: Uuid) -> Result<(), StoreError>;

    /// Stored role of `user_id`, `None` when the user has no row.
    async fn find_role(
        &self,
        session: &Session,
        user_id: Uuid,
    ) -> Result<Option<UserRole>, StoreError>;

    async fn find_plan(
        &self,
        session: &Session,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyPlan>, StoreError>;

    /// Insert the plan, or replace every slot of the plan already keyed by its
    /// `week_start`, in one request.
    async fn upsert_plan(
        &self,
        session: &Session,
        plan: &NewWeeklyPlan,
    ) -> Result<WeeklyPlan, StoreError>;

    /// Returns whether a plan was deleted.
    async fn delete_plan(&self, session: &Session, week_start: NaiveDate)
        -> Result<bool, StoreError>;

    /// Cheap reachability probe for GET /health.
    async fn ping(&self) -> Result<(), StoreError>;
}
