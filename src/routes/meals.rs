use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{
        auth::Session,
        meal::{Meal, MealDraft, MealListQuery},
    },
    services::meals::MealService,
    AppState,
};

/// GET / and GET /meals?category=breakfast|lunch|dinner|all
pub async fn list_meals(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<MealListQuery>,
) -> Result<Json<Vec<Meal>>, ApiError> {
    let category = params
        .category()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let meals = MealService::list(state.store.as_ref(), &session, category).await?;
    Ok(Json(meals))
}

pub async fn get_meal(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Meal>, ApiError> {
    let meal = MealService::get(state.store.as_ref(), &session, id).await?;
    Ok(Json(meal))
}

/// POST /meals (admins only)
pub async fn create_meal(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<MealDraft>,
) -> Result<(StatusCode, Json<Meal>), ApiError> {
    let meal = MealService::create(state.store.as_ref(), &session, &body).await?;
    Ok((StatusCode::CREATED, Json(meal)))
}

/// PUT /meals/{id} (admins only), replaces every editable field
pub async fn update_meal(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(body): Json<MealDraft>,
) -> Result<Json<Meal>, ApiError> {
    let meal = MealService::update(state.store.as_ref(), &session, id, &body).await?;
    Ok(Json(meal))
}

/// DELETE /meals/{id} (admins only)
pub async fn delete_meal(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    MealService::delete(state.store.as_ref(), &session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
