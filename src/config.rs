use std::env;

use uuid::Uuid;

use crate::models::user::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgREST tables of the managed backend.
    Rest,
    /// Direct connection to the same schema.
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityBackend {
    Supabase,
    Static,
}

/// Account served by the static identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticUser {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    pub store_backend: StoreBackend,
    pub identity_backend: IdentityBackend,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub jwt_secret: String,
    pub database_url: Option<String>,
    pub request_timeout_seconds: u64,
    pub static_users: Vec<StaticUser>,
    pub static_token_ttl_seconds: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let store_backend = match var("STORE_BACKEND").as_deref().unwrap_or("rest") {
            "rest" => StoreBackend::Rest,
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("Unknown STORE_BACKEND: {other}"),
        };
        let identity_backend = match var("IDENTITY_BACKEND").as_deref().unwrap_or("supabase") {
            "supabase" => IdentityBackend::Supabase,
            "static" => IdentityBackend::Static,
            other => anyhow::bail!("Unknown IDENTITY_BACKEND: {other}"),
        };

        let supabase_url = var("SUPABASE_URL");
        let supabase_anon_key = var("SUPABASE_ANON_KEY");
        let database_url = var("DATABASE_URL");
        let static_users = match var("STATIC_USERS") {
            Some(raw) => parse_static_users(&raw)?,
            None => Vec::new(),
        };

        if store_backend == StoreBackend::Rest || identity_backend == IdentityBackend::Supabase {
            if supabase_url.is_none() {
                anyhow::bail!("Missing required env var: SUPABASE_URL");
            }
            if supabase_anon_key.is_none() {
                anyhow::bail!("Missing required env var: SUPABASE_ANON_KEY");
            }
        }
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("Missing required env var: DATABASE_URL");
        }
        if identity_backend == IdentityBackend::Static && static_users.is_empty() {
            anyhow::bail!("STATIC_USERS must list at least one user for the static identity backend");
        }

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: var("PORT").unwrap_or_else(|| "8080".into()).parse()?,
            app_base_url: var("APP_BASE_URL").unwrap_or_else(|| "http://localhost".into()),
            store_backend,
            identity_backend,
            supabase_url,
            supabase_anon_key,
            jwt_secret: var("SUPABASE_JWT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("Missing required env var: SUPABASE_JWT_SECRET"))?,
            database_url,
            request_timeout_seconds: var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|| "10".into())
                .parse()?,
            static_users,
            static_token_ttl_seconds: var("STATIC_TOKEN_TTL_SECONDS")
                .unwrap_or_else(|| "3600".into())
                .parse()?,
        })
    }
}

/// Parse `uuid:email:password:role` entries separated by commas.
///
/// The password may itself contain `:`; the role is taken from the last field.
fn parse_static_users(raw: &str) -> anyhow::Result<Vec<StaticUser>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = || anyhow::anyhow!("Invalid STATIC_USERS entry: {entry}");
            let (id, rest) = entry.split_once(':').ok_or_else(invalid)?;
            let (rest, role) = rest.rsplit_once(':').ok_or_else(invalid)?;
            let (email, password) = rest.split_once(':').ok_or_else(invalid)?;
            if email.is_empty() || password.is_empty() {
                return Err(invalid());
            }
            Ok(StaticUser {
                id: id.parse()?,
                email: email.to_string(),
                password: password.to_string(),
                role: role.parse()?,
            })
        })
        .collect()
}
