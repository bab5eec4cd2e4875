use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use mealboard_api::{
    config::{Config, StaticUser},
    models::user::UserRole,
    router,
    services::identity::StaticIdentity,
    store::MemoryStore,
    AppState,
};

pub const SECRET: &str = "integration-test-secret";
pub const ADMIN_EMAIL: &str = "parent@example.com";
pub const VIEWER_EMAIL: &str = "kid@example.com";
pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub admin_id: Uuid,
    pub viewer_id: Uuid,
}

pub async fn create_test_app() -> TestApp {
    let admin_id = Uuid::new_v4();
    let viewer_id = Uuid::new_v4();
    let users = vec![
        StaticUser {
            id: admin_id,
            email: ADMIN_EMAIL.into(),
            password: PASSWORD.into(),
            role: UserRole::Admin,
        },
        StaticUser {
            id: viewer_id,
            email: VIEWER_EMAIL.into(),
            password: PASSWORD.into(),
            role: UserRole::Viewer,
        },
    ];
    let static_users = users
        .iter()
        .map(|u| format!("{}:{}:{}:{}", u.id, u.email, u.password, u.role))
        .collect::<Vec<_>>()
        .join(",");
    let config = Config::from_lookup(|key| match key {
        "STORE_BACKEND" => Some("memory".into()),
        "IDENTITY_BACKEND" => Some("static".into()),
        "SUPABASE_JWT_SECRET" => Some(SECRET.into()),
        "STATIC_USERS" => Some(static_users.clone()),
        _ => None,
    })
    .unwrap();

    let store = Arc::new(MemoryStore::new());
    store.set_role(admin_id, UserRole::Admin).await;
    store.set_role(viewer_id, UserRole::Viewer).await;
    let identity = Arc::new(StaticIdentity::new(users, SECRET, 3600));

    let state = AppState::new(config, store.clone(), identity);
    TestApp {
        router: router(state),
        store,
        admin_id,
        viewer_id,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, value)
    }

    pub async fn login(&self, email: &str) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    pub async fn token(&self, email: &str) -> String {
        self.login(email).await["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    pub async fn add_meal(&self, token: &str, name: &str, category: &str) -> Value {
        let (status, body) = self
            .request(Method::POST, "/meals", Some(token), Some(meal_body(name, category, json!(300))))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

pub fn meal_body(name: &str, category: &str, calories: Value) -> Value {
    json!({
        "name": name,
        "category": category,
        "calories": calories,
        "portion": "1 plate",
        "prep_time": "20 min",
        "ingredients": [
            { "name": "Salt", "quantity": "1 pinch" },
            { "name": "", "quantity": "" }
        ]
    })
}
