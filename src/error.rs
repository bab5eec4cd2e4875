use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    services::{identity::IdentityError, meals::MealError, planner::PlanError},
    store::StoreError,
};

/// Every failure a handler can answer with, rendered as `{"error": message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Meal(#[from] MealError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Meal(MealError::Forbidden) => StatusCode::FORBIDDEN,
            ApiError::Meal(MealError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Meal(MealError::Store(e)) => store_status(e),
            ApiError::Plan(e) => match e {
                PlanError::Forbidden => StatusCode::FORBIDDEN,
                PlanError::MissingCategory(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PlanError::AlreadyExists { .. } | PlanError::InProgress { .. } => StatusCode::CONFLICT,
                PlanError::Store(e) => store_status(e),
            },
            ApiError::Store(e) => store_status(e),
            ApiError::Identity(e) => match e {
                IdentityError::InvalidCredentials | IdentityError::InvalidRefreshToken => {
                    StatusCode::UNAUTHORIZED
                }
                IdentityError::Rejected { .. }
                | IdentityError::Transport(_)
                | IdentityError::Decode(_) => StatusCode::BAD_GATEWAY,
                IdentityError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::Rejected { status, .. } => match status {
            401 | 403 => StatusCode::FORBIDDEN,
            404 => StatusCode::NOT_FOUND,
            409 => StatusCode::CONFLICT,
            _ => StatusCode::BAD_GATEWAY,
        },
        StoreError::Transport(_) | StoreError::Decode(_) => StatusCode::BAD_GATEWAY,
        StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        let body = match &self {
            ApiError::Plan(PlanError::AlreadyExists { week_start }) => json!({
                "error": self.to_string(),
                "week_start": week_start,
                "confirm_overwrite": true,
            }),
            // Database internals stay in the logs.
            ApiError::Store(StoreError::Database(_))
            | ApiError::Meal(MealError::Store(StoreError::Database(_)))
            | ApiError::Plan(PlanError::Store(StoreError::Database(_))) => {
                json!({ "error": "Database error" })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
