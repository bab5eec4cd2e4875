use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::{
    error::ApiError,
    models::auth::{Claims, Session, TOKEN_AUDIENCE},
    services::auth::AuthService,
    AppState,
};

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".into()))?;

        AuthService::session_from_token(state, token.trim()).await
    }
}

/// Verify an access token issued by the identity provider.
pub fn decode_access_token(token: &str, secret: &str) -> Result<Claims, anyhow::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_audience(&[TOKEN_AUDIENCE]);

    let data = decode::<Claims>(token, &key, &validation)?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(aud: &str, exp_offset: i64, secret: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            email: None,
            aud: aud.into(),
            exp: now + exp_offset,
            iat: now,
            session_id: Some("s1".into()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn accepts_tokens_for_the_expected_audience() {
        let claims = decode_access_token(&token(TOKEN_AUDIENCE, 600, "s3cret"), "s3cret").unwrap();
        assert_eq!(claims.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn rejects_wrong_secret_audience_and_expired_tokens() {
        assert!(decode_access_token(&token(TOKEN_AUDIENCE, 600, "other"), "s3cret").is_err());
        assert!(decode_access_token(&token("anon", 600, "s3cret"), "s3cret").is_err());
        assert!(decode_access_token(&token(TOKEN_AUDIENCE, -600, "s3cret"), "s3cret").is_err());
    }
}
