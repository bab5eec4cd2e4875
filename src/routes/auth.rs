use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::ApiError,
    models::{
        auth::Session,
        user::{LoginRequest, LoginResponse, RefreshTokenRequest, UserProfile},
    },
    services::auth::AuthService,
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".into()));
    }
    AuthService::login(&state, body.email.trim(), &body.password)
        .await
        .map(Json)
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    AuthService::refresh(&state, &body.refresh_token).await.map(Json)
}

pub async fn logout(State(state): State<AppState>, session: Session) -> StatusCode {
    AuthService::logout(&state, &session).await;
    StatusCode::NO_CONTENT
}

pub async fn me(session: Session) -> Json<UserProfile> {
    Json(session.profile())
}
