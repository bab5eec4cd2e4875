use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rand::{rngs::StdRng, SeedableRng};
use serde_json::{json, Value};

use crate::{
    error::ApiError,
    models::{
        auth::Session,
        plan::{GeneratePlanRequest, WeekQuery, WeekView},
    },
    services::{
        planner::{GeneratedPlan, PlanService},
        week,
    },
    AppState,
};

fn resolve_week(date: Option<NaiveDate>) -> Result<NaiveDate, ApiError> {
    week::resolve(date).ok_or_else(|| ApiError::BadRequest("Date out of range".into()))
}

/// GET /weekly?date=YYYY-MM-DD (today when absent)
pub async fn get_week(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<WeekQuery>,
) -> Result<Json<WeekView>, ApiError> {
    let week_start = resolve_week(params.date)?;
    let view = PlanService::week(state.store.as_ref(), &session, week_start).await?;
    Ok(Json(view))
}

/// POST /weekly/generate (admins only)
///
/// 201 for a new plan, 200 when a confirmed overwrite replaced one.
pub async fn generate(
    State(state): State<AppState>,
    session: Session,
    body: Option<Json<GeneratePlanRequest>>,
) -> Result<(StatusCode, Json<GeneratedPlan>), ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let week_start = resolve_week(body.date)?;
    let mut rng = StdRng::from_entropy();

    let generated = PlanService::generate(
        state.store.as_ref(),
        &state.generation_locks,
        &session,
        week_start,
        body.overwrite,
        &mut rng,
    )
    .await?;

    let status = if generated.replaced {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(generated)))
}

/// DELETE /weekly?date=YYYY-MM-DD (admins only)
pub async fn clear_week(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<WeekQuery>,
) -> Result<Json<Value>, ApiError> {
    let week_start = resolve_week(params.date)?;
    let deleted = PlanService::clear(state.store.as_ref(), &session, week_start).await?;
    Ok(Json(json!({ "week_start": week_start, "deleted": deleted })))
}
