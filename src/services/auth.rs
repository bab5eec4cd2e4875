use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth::decode_access_token,
    models::{
        auth::{AuthEventKind, Claims, Session},
        user::{LoginResponse, UserRole},
    },
    services::{
        identity::{IdentityError, IdentityTokens},
        metrics::LOGINS_COUNTER,
        sessions::SessionLookup,
    },
    store::Store,
    AppState,
};

pub struct AuthService;

impl AuthService {
    /// Sign in with email and password and open a session.
    pub async fn login(state: &AppState, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let tokens = match state.identity.sign_in(email, password).await {
            Ok(tokens) => tokens,
            Err(e) => {
                LOGINS_COUNTER.with_label_values(&["failure"]).inc();
                if !matches!(e, IdentityError::InvalidCredentials) {
                    tracing::error!("sign-in for {email} failed: {e}");
                }
                return Err(e.into());
            }
        };
        let response = Self::open_session(state, tokens, AuthEventKind::SignedIn).await?;
        LOGINS_COUNTER.with_label_values(&["success"]).inc();
        tracing::info!("user {} signed in", response.user.id);
        Ok(response)
    }

    /// Exchange a refresh token for a new token pair within the same session.
    pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<LoginResponse, ApiError> {
        let tokens = state.identity.refresh(refresh_token).await?;
        Self::open_session(state, tokens, AuthEventKind::TokenRefreshed).await
    }

    /// End the session. A provider failure is logged; the local session ends regardless.
    pub async fn logout(state: &AppState, session: &Session) {
        if let Err(e) = state.identity.sign_out(&session.access_token).await {
            tracing::warn!("identity sign-out for {} failed: {e}", session.user_id);
        }
        state.sessions.sign_out(session).await;
        tracing::info!("user {} signed out", session.user_id);
    }

    /// Resolve the session a bearer token belongs to.
    pub async fn session_from_token(state: &AppState, token: &str) -> Result<Session, ApiError> {
        let claims = decode_access_token(token, &state.config.jwt_secret)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;
        let key = claims.session_key(token);

        match state.sessions.lookup(&key).await {
            SessionLookup::Active(mut session) => {
                session.access_token = token.to_string();
                session.expires_at = claims.exp;
                Ok(session)
            }
            SessionLookup::SignedOut => Err(ApiError::Unauthorized("Session has ended".into())),
            SessionLookup::Unknown => {
                let session = Self::build_session(state.store.as_ref(), &claims, token, key).await?;
                state.sessions.establish(session.clone(), None).await;
                Ok(session)
            }
        }
    }

    async fn open_session(
        state: &AppState,
        tokens: IdentityTokens,
        event: AuthEventKind,
    ) -> Result<LoginResponse, ApiError> {
        let claims = decode_access_token(&tokens.access_token, &state.config.jwt_secret)
            .map_err(|e| {
                tracing::error!("identity provider issued a token that does not verify: {e}");
                ApiError::Unauthorized("Invalid or expired token".into())
            })?;
        let key = claims.session_key(&tokens.access_token);
        let session = Self::build_session(state.store.as_ref(), &claims, &tokens.access_token, key).await?;
        let user = session.profile();
        let expires_at = session.expires_at;
        state.sessions.establish(session, Some(event)).await;

        Ok(LoginResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at,
            user,
        })
    }

    async fn build_session(
        store: &dyn Store,
        claims: &Claims,
        token: &str,
        key: String,
    ) -> Result<Session, ApiError> {
        let user_id: Uuid = claims
            .sub
            .parse()
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;
        let mut session = Session {
            user_id,
            email: claims.email.clone(),
            role: UserRole::Viewer,
            access_token: token.to_string(),
            key,
            expires_at: claims.exp,
        };
        session.role = Self::resolve_role(store, &session).await;
        Ok(session)
    }

    /// Role of the session's user; read-only when absent or unreadable.
    pub async fn resolve_role(store: &dyn Store, session: &Session) -> UserRole {
        match store.find_role(session, session.user_id).await {
            Ok(Some(role)) => role,
            Ok(None) => UserRole::Viewer,
            Err(e) => {
                tracing::warn!("role lookup for {} failed, treating as viewer: {e}", session.user_id);
                UserRole::Viewer
            }
        }
    }
}
