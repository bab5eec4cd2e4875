//! Sign-in, token refresh and sign-out against the identity provider.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    config::StaticUser,
    middleware::auth::decode_access_token,
    models::auth::{Claims, TOKEN_AUDIENCE},
};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Session expired, please sign in again")]
    InvalidRefreshToken,
    #[error("Identity provider refused the request: {message}")]
    Rejected { status: u16, message: String },
    #[error("Identity provider unreachable: {0}")]
    Transport(String),
    #[error("Unexpected identity provider payload: {0}")]
    Decode(String),
    #[error("Could not issue token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IdentityError::Decode(err.to_string())
        } else {
            IdentityError::Transport(err.to_string())
        }
    }
}

/// Token pair handed out at sign-in and on refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityTokens, IdentityError>;

    async fn refresh(&self, refresh_token: &str) -> Result<IdentityTokens, IdentityError>;

    /// Revoke the provider-side session the access token belongs to.
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}

// ── GoTrue ──────────────────────────────────────────────────────────────────

/// GoTrue-compatible auth API of the managed backend.
pub struct GoTrueIdentity {
    client: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct GoTrueErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl GoTrueIdentity {
    pub fn new(project_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        })
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Response, IdentityError> {
        let response = self
            .client
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("identity {grant_type} grant failed: {e}");
                IdentityError::from(e)
            })?;
        Ok(response)
    }
}

async fn provider_error(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let message = match response.json::<GoTrueErrorBody>().await {
        Ok(body) => body
            .error_description
            .or(body.msg)
            .or(body.message)
            .or(body.error)
            .unwrap_or_else(|| format!("HTTP {status}")),
        Err(_) => format!("HTTP {status}"),
    };
    (status, message)
}

#[async_trait]
impl IdentityProvider for GoTrueIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityTokens, IdentityError> {
        let response = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        if response.status().is_success() {
            return Ok(response.json::<IdentityTokens>().await?);
        }
        let (status, message) = provider_error(response).await;
        match status {
            400 | 401 | 422 => {
                tracing::info!("sign-in refused for {email}: {message}");
                Err(IdentityError::InvalidCredentials)
            }
            _ => Err(IdentityError::Rejected { status, message }),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<IdentityTokens, IdentityError> {
        let response = self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        if response.status().is_success() {
            return Ok(response.json::<IdentityTokens>().await?);
        }
        let (status, message) = provider_error(response).await;
        match status {
            400 | 401 | 403 => {
                tracing::info!("refresh refused: {message}");
                Err(IdentityError::InvalidRefreshToken)
            }
            _ => Err(IdentityError::Rejected { status, message }),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        let (status, message) = provider_error(response).await;
        Err(IdentityError::Rejected { status, message })
    }
}

// ── Static users ────────────────────────────────────────────────────────────

/// Fixed user list that issues its own HS256 tokens, for local runs and tests.
///
/// Tokens are signed with the same secret the API verifies requests with.
pub struct StaticIdentity {
    users: Vec<StaticUser>,
    secret: String,
    token_ttl_seconds: i64,
    /// refresh token -> (user id, session id)
    refresh_tokens: Mutex<HashMap<String, (Uuid, String)>>,
}

impl StaticIdentity {
    pub fn new(users: Vec<StaticUser>, secret: &str, token_ttl_seconds: i64) -> Self {
        Self {
            users,
            secret: secret.to_string(),
            token_ttl_seconds,
            refresh_tokens: Mutex::new(HashMap::new()),
        }
    }

    async fn issue(&self, user: &StaticUser, session_id: String) -> Result<IdentityTokens, IdentityError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            email: Some(user.email.clone()),
            aud: TOKEN_AUDIENCE.to_string(),
            exp: now + self.token_ttl_seconds,
            iat: now,
            session_id: Some(session_id.clone()),
        };
        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        let refresh_token = Uuid::new_v4().simple().to_string();
        self.refresh_tokens
            .lock()
            .await
            .insert(refresh_token.clone(), (user.id, session_id));
        Ok(IdentityTokens { access_token, refresh_token })
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityTokens, IdentityError> {
        let user = self
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()) && u.password == password)
            .ok_or(IdentityError::InvalidCredentials)?;
        self.issue(user, Uuid::new_v4().to_string()).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<IdentityTokens, IdentityError> {
        // Refresh tokens are single use.
        let (user_id, session_id) = self
            .refresh_tokens
            .lock()
            .await
            .remove(refresh_token)
            .ok_or(IdentityError::InvalidRefreshToken)?;
        let user = self
            .users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or(IdentityError::InvalidRefreshToken)?;
        self.issue(user, session_id).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let session_id = decode_access_token(access_token, &self.secret)
            .ok()
            .and_then(|claims| claims.session_id);
        if let Some(session_id) = session_id {
            self.refresh_tokens
                .lock()
                .await
                .retain(|_, (_, sid)| *sid != session_id);
        }
        Ok(())
    }
}
