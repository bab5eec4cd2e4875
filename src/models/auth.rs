use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::{UserProfile, UserRole};

/// Audience every access token from the identity provider carries.
pub const TOKEN_AUDIENCE: &str = "authenticated";

/// Claims embedded in the identity provider's access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user UUID
    #[serde(default)]
    pub email: Option<String>,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    /// Provider-side session id; one per sign-in, shared by refreshed tokens.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Claims {
    /// Registry key for the session this token belongs to.
    pub fn session_key(&self, token: &str) -> String {
        match &self.session_id {
            Some(id) => id.clone(),
            None => token.to_string(),
        }
    }
}

/// Explicit per-user context handed to services and stores.
///
/// Created at sign-in (or on the first request bearing a token the registry
/// has not seen), invalidated at sign-out.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: UserRole,
    /// Forwarded to the remote store so its row-level policies apply.
    pub access_token: String,
    pub key: String,
    pub expires_at: i64,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user_id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    SignedIn,
    TokenRefreshed,
    SignedOut,
}

/// Auth-change notification pushed to subscribers of GET /auth/events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    pub event: AuthEventKind,
    pub user_id: Uuid,
    #[serde(skip)]
    pub session_key: String,
    pub at: DateTime<Utc>,
}
