use uuid::Uuid;

use crate::{
    models::{
        auth::Session,
        meal::{Meal, MealCategory, MealDraft, ValidationError},
    },
    services::metrics::MEAL_MUTATIONS_COUNTER,
    store::{Store, StoreError},
};

#[derive(Debug, thiserror::Error)]
pub enum MealError {
    #[error("Only admins can change the meal library")]
    Forbidden,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Catalog gateway: reads for everyone, validated writes for admins.
///
/// The store is expected to enforce the admin-only write policy again.
pub struct MealService;

impl MealService {
    pub async fn list(
        store: &dyn Store,
        session: &Session,
        category: Option<MealCategory>,
    ) -> Result<Vec<Meal>, MealError> {
        Ok(store.list_meals(session, category).await?)
    }

    pub async fn get(store: &dyn Store, session: &Session, id: Uuid) -> Result<Meal, MealError> {
        Ok(store.get_meal(session, id).await?)
    }

    pub async fn create(
        store: &dyn Store,
        session: &Session,
        draft: &MealDraft,
    ) -> Result<Meal, MealError> {
        if !session.is_admin() {
            return Err(MealError::Forbidden);
        }
        let meal = draft.validate()?;
        let created = store.insert_meal(session, &meal).await?;
        MEAL_MUTATIONS_COUNTER.with_label_values(&["create"]).inc();
        tracing::info!("meal {} ({}) added by {}", created.id, created.name, session.user_id);
        Ok(created)
    }

    pub async fn update(
        store: &dyn Store,
        session: &Session,
        id: Uuid,
        draft: &MealDraft,
    ) -> Result<Meal, MealError> {
        if !session.is_admin() {
            return Err(MealError::Forbidden);
        }
        let meal = draft.validate()?;
        let updated = store.update_meal(session, id, &meal).await?;
        MEAL_MUTATIONS_COUNTER.with_label_values(&["update"]).inc();
        tracing::info!("meal {id} updated by {}", session.user_id);
        Ok(updated)
    }

    pub async fn delete(store: &dyn Store, session: &Session, id: Uuid) -> Result<(), MealError> {
        if !session.is_admin() {
            return Err(MealError::Forbidden);
        }
        store.delete_meal(session, id).await?;
        MEAL_MUTATIONS_COUNTER.with_label_values(&["delete"]).inc();
        tracing::info!("meal {id} deleted by {}", session.user_id);
        Ok(())
    }
}
