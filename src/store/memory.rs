use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{
    auth::Session,
    meal::{Meal, MealCategory, NewMeal},
    plan::{NewWeeklyPlan, WeeklyPlan},
    user::UserRole,
};

#[derive(Default)]
struct Tables {
    meals: Vec<Meal>,
    roles: HashMap<Uuid, UserRole>,
    plans: BTreeMap<NaiveDate, WeeklyPlan>,
    writes: u64,
}

/// In-process tables used for local runs and tests.
///
/// Mirrors the managed backend's row-level policy: only users whose
/// `user_roles` row says admin may write.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_role(&self, user_id: Uuid, role: UserRole) {
        self.tables.write().await.roles.insert(user_id, role);
    }

    /// Number of successful writes (inserts, updates, upserts, deletes) so far.
    pub async fn write_count(&self) -> u64 {
        self.tables.read().await.writes
    }

    pub async fn plan_count(&self) -> usize {
        self.tables.read().await.plans.len()
    }

    fn check_write(tables: &Tables, session: &Session) -> Result<(), StoreError> {
        match tables.roles.get(&session.user_id) {
            Some(UserRole::Admin) => Ok(()),
            _ => Err(StoreError::Rejected {
                status: 403,
                message: "new row violates row-level security policy".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_meals(
        &self,
        _session: &Session,
        category: Option<MealCategory>,
    ) -> Result<Vec<Meal>, StoreError> {
        let tables = self.tables.read().await;
        let mut meals: Vec<Meal> = tables
            .meals
            .iter()
            .filter(|m| category.map_or(true, |c| m.category == c))
            .cloned()
            .collect();
        meals.sort_by(|a, b| {
            a.category
                .as_str()
                .cmp(b.category.as_str())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(meals)
    }

    async fn get_meal(&self, _session: &Session, id: Uuid) -> Result<Meal, StoreError> {
        let tables = self.tables.read().await;
        tables
            .meals
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert_meal(&self, session: &Session, meal: &NewMeal) -> Result<Meal, StoreError> {
        let mut tables = self.tables.write().await;
        Self::check_write(&tables, session)?;
        let meal = meal.clone().into_meal(Uuid::new_v4(), Some(Utc::now()));
        tables.meals.push(meal.clone());
        tables.writes += 1;
        Ok(meal)
    }

    async fn update_meal(
        &self,
        session: &Session,
        id: Uuid,
        meal: &NewMeal,
    ) -> Result<Meal, StoreError> {
        let mut tables = self.tables.write().await;
        Self::check_write(&tables, session)?;
        let existing = tables
            .meals
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound)?;
        *existing = meal.clone().into_meal(id, existing.created_at);
        let updated = existing.clone();
        tables.writes += 1;
        Ok(updated)
    }

    async fn delete_meal(&self, session: &Session, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        Self::check_write(&tables, session)?;
        let before = tables.meals.len();
        tables.meals.retain(|m| m.id != id);
        if tables.meals.len() == before {
            return Err(StoreError::NotFound);
        }
        tables.writes += 1;
        Ok(())
    }

    async fn find_role(
        &self,
        _session: &Session,
        user_id: Uuid,
    ) -> Result<Option<UserRole>, StoreError> {
        Ok(self.tables.read().await.roles.get(&user_id).copied())
    }

    async fn find_plan(
        &self,
        _session: &Session,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyPlan>, StoreError> {
        Ok(self.tables.read().await.plans.get(&week_start).cloned())
    }

    async fn upsert_plan(
        &self,
        session: &Session,
        plan: &NewWeeklyPlan,
    ) -> Result<WeeklyPlan, StoreError> {
        let mut tables = self.tables.write().await;
        Self::check_write(&tables, session)?;
        let (id, created_at) = match tables.plans.get(&plan.week_start) {
            Some(existing) => (existing.id, existing.created_at),
            None => (Uuid::new_v4(), Some(Utc::now())),
        };
        let stored = WeeklyPlan {
            id,
            week_start: plan.week_start,
            slots: plan.slots,
            created_at,
        };
        tables.plans.insert(plan.week_start, stored.clone());
        tables.writes += 1;
        Ok(stored)
    }

    async fn delete_plan(
        &self,
        session: &Session,
        week_start: NaiveDate,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Self::check_write(&tables, session)?;
        let removed = tables.plans.remove(&week_start).is_some();
        if removed {
            tables.writes += 1;
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
