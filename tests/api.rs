use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

mod common;
use common::{create_test_app, meal_body, ADMIN_EMAIL, VIEWER_EMAIL};

const WEEK: &str = "2024-01-03";
const WEEK_START: &str = "2024-01-01";

fn slot_ids(week: &Value, meal_time: &str) -> Vec<String> {
    week["plan"]["days"]
        .as_array()
        .unwrap()
        .iter()
        .map(|day| day[meal_time]["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn login_returns_tokens_and_profile() {
    let app = create_test_app().await;
    let body = app.login(ADMIN_EMAIL).await;

    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["id"], app.admin_id.to_string());

    let token = body["access_token"].as_str().unwrap();
    let (status, me) = app.request(Method::GET, "/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], ADMIN_EMAIL);
}

#[tokio::test]
async fn bad_credentials_and_missing_tokens_are_unauthorized() {
    let app = create_test_app().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password");

    let (status, _) = app.request(Method::GET, "/meals", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.request(Method::GET, "/meals", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn viewers_cannot_change_the_library() {
    let app = create_test_app().await;
    let viewer = app.token(VIEWER_EMAIL).await;

    let (status, body) = app
        .request(Method::POST, "/meals", Some(&viewer), Some(meal_body("Toast", "breakfast", json!(200))))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
    assert_eq!(app.store.write_count().await, 0);

    let (status, meals) = app.request(Method::GET, "/", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meals, json!([]));
}

#[tokio::test]
async fn invalid_calories_are_rejected_before_any_write() {
    let app = create_test_app().await;
    let admin = app.token(ADMIN_EMAIL).await;

    let (status, body) = app
        .request(Method::POST, "/meals", Some(&admin), Some(meal_body("Toast", "breakfast", json!("abc"))))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Calories must be a whole number");
    assert_eq!(app.store.write_count().await, 0);

    let mut no_ingredients = meal_body("Toast", "breakfast", json!(200));
    no_ingredients["ingredients"] = json!([{ "name": "Bread", "quantity": "" }]);
    let (status, body) = app
        .request(Method::POST, "/meals", Some(&admin), Some(no_ingredients))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Please add at least one ingredient");
    assert_eq!(app.store.write_count().await, 0);
}

#[tokio::test]
async fn admin_manages_meals() {
    let app = create_test_app().await;
    let admin = app.token(ADMIN_EMAIL).await;

    let created = app.add_meal(&admin, "Waffles", "breakfast").await;
    app.add_meal(&admin, "Curry", "dinner").await;
    app.add_meal(&admin, "Bagel", "breakfast").await;
    assert_eq!(created["calories"], 300);
    assert_eq!(created["ingredients"].as_array().unwrap().len(), 1);
    assert!(created["image_url"].as_str().unwrap().starts_with("https://"));

    let (_, all) = app.request(Method::GET, "/meals?category=all", Some(&admin), None).await;
    let names: Vec<&str> = all.as_array().unwrap().iter().map(|m| m["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Bagel", "Waffles", "Curry"]);

    let (_, breakfasts) = app
        .request(Method::GET, "/meals?category=breakfast", Some(&admin), None)
        .await;
    assert_eq!(breakfasts.as_array().unwrap().len(), 2);

    let (status, _) = app.request(Method::GET, "/meals?category=brunch", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = created["id"].as_str().unwrap();
    let uri = format!("/meals/{id}");
    let (status, updated) = app
        .request(Method::PUT, &uri, Some(&admin), Some(meal_body("Belgian waffles", "breakfast", json!("450"))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Belgian waffles");
    assert_eq!(updated["calories"], 450);

    let (status, _) = app.request(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.request(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.request(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generation_requires_every_meal_time() {
    let app = create_test_app().await;
    let admin = app.token(ADMIN_EMAIL).await;
    app.add_meal(&admin, "Oats", "breakfast").await;
    app.add_meal(&admin, "Soup", "lunch").await;

    let (status, body) = app
        .request(Method::POST, "/weekly/generate", Some(&admin), Some(json!({ "date": WEEK })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Please add at least one breakfast, lunch, and dinner meal first.");
    assert_eq!(app.store.plan_count().await, 0);
}

#[tokio::test]
async fn generated_plan_wraps_short_categories() {
    let app = create_test_app().await;
    let admin = app.token(ADMIN_EMAIL).await;
    let b1 = app.add_meal(&admin, "B1", "breakfast").await;
    app.add_meal(&admin, "L1", "lunch").await;
    app.add_meal(&admin, "L2", "lunch").await;
    let d1 = app.add_meal(&admin, "D1", "dinner").await;

    let (status, generated) = app
        .request(Method::POST, "/weekly/generate", Some(&admin), Some(json!({ "date": WEEK })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{generated}");
    assert_eq!(generated["week_start"], WEEK_START);
    assert_eq!(generated["replaced"], false);

    let breakfasts = slot_ids(&generated, "breakfast");
    assert!(breakfasts.iter().all(|id| id == b1["id"].as_str().unwrap()));
    let dinners = slot_ids(&generated, "dinner");
    assert!(dinners.iter().all(|id| id == d1["id"].as_str().unwrap()));

    let lunches = slot_ids(&generated, "lunch");
    for (i, id) in lunches.iter().enumerate() {
        assert_eq!(id, &lunches[i % 2]);
    }
    assert_ne!(lunches[0], lunches[1]);
}

#[tokio::test]
async fn existing_plan_is_only_replaced_on_confirmation() {
    let app = create_test_app().await;
    let admin = app.token(ADMIN_EMAIL).await;
    for (name, category) in [("B1", "breakfast"), ("L1", "lunch"), ("D1", "dinner")] {
        app.add_meal(&admin, name, category).await;
    }

    let (status, _) = app
        .request(Method::POST, "/weekly/generate", Some(&admin), Some(json!({ "date": WEEK })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, before) = app.request(Method::GET, "/weekly?date=2024-01-07", Some(&admin), None).await;
    assert_eq!(before["week_start"], WEEK_START);
    let writes = app.store.write_count().await;

    let (status, body) = app
        .request(Method::POST, "/weekly/generate", Some(&admin), Some(json!({ "date": WEEK })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["confirm_overwrite"], true);
    assert_eq!(app.store.write_count().await, writes);

    let (_, unchanged) = app.request(Method::GET, "/weekly?date=2024-01-01", Some(&admin), None).await;
    assert_eq!(unchanged, before);

    let (status, body) = app
        .request(
            Method::POST,
            "/weekly/generate",
            Some(&admin),
            Some(json!({ "date": WEEK, "overwrite": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replaced"], true);
    assert_eq!(app.store.plan_count().await, 1);
}

#[tokio::test]
async fn viewers_read_but_do_not_change_the_plan() {
    let app = create_test_app().await;
    let admin = app.token(ADMIN_EMAIL).await;
    let viewer = app.token(VIEWER_EMAIL).await;

    let (status, empty) = app.request(Method::GET, "/weekly?date=2024-01-03", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["plan"], Value::Null);

    for (name, category) in [("B1", "breakfast"), ("L1", "lunch"), ("D1", "dinner")] {
        app.add_meal(&admin, name, category).await;
    }
    let (status, _) = app
        .request(Method::POST, "/weekly/generate", Some(&viewer), Some(json!({ "date": WEEK })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.store.plan_count().await, 0);

    let (status, _) = app
        .request(Method::POST, "/weekly/generate", Some(&admin), Some(json!({ "date": WEEK })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, week) = app.request(Method::GET, "/weekly?date=2024-01-03", Some(&viewer), None).await;
    assert_eq!(week["plan"]["days"].as_array().unwrap().len(), 7);
    assert_eq!(week["plan"]["days"][0]["day"], "monday");

    let (status, _) = app.request(Method::DELETE, "/weekly?date=2024-01-03", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.request(Method::DELETE, "/weekly?date=2024-01-03", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert_eq!(app.store.plan_count().await, 0);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let app = create_test_app().await;
    let login = app.login(ADMIN_EMAIL).await;
    let token = login["access_token"].as_str().unwrap();

    let (status, _) = app.request(Method::POST, "/auth/logout", Some(token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.request(Method::GET, "/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": login["refresh_token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_issues_a_working_token() {
    let app = create_test_app().await;
    let login = app.login(VIEWER_EMAIL).await;

    let (status, refreshed) = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": login["refresh_token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["user"]["id"], app.viewer_id.to_string());

    let token = refreshed["access_token"].as_str().unwrap();
    let (status, _) = app.request(Method::GET, "/meals", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_and_metrics_are_public() {
    let app = create_test_app().await;
    app.login(ADMIN_EMAIL).await;

    let (status, health) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");

    let (status, metrics) = app.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(metrics.as_str().unwrap().contains("api_logins_total"));
}

#[tokio::test]
async fn dates_without_a_representable_week_are_bad_requests() {
    let app = create_test_app().await;
    let token = app.token(ADMIN_EMAIL).await;
    let floor = "-262143-01-01";

    let (status, body) = app
        .request(Method::GET, &format!("/weekly?date={floor}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Date out of range");

    let (status, body) = app
        .request(Method::DELETE, &format!("/weekly?date={floor}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Date out of range");

    let (status, body) = app
        .request(
            Method::POST,
            "/weekly/generate",
            Some(&token),
            Some(json!({ "date": floor, "overwrite": true })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Date out of range");
    assert_eq!(app.store.plan_count().await, 0);
}

#[tokio::test]
async fn event_stream_refuses_bad_and_signed_out_tokens() {
    let app = create_test_app().await;

    let (status, _) = app
        .request(Method::GET, "/auth/events?token=not-a-jwt", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.token(VIEWER_EMAIL).await;
    let (status, _) = app
        .request(Method::POST, "/auth/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .request(Method::GET, &format!("/auth/events?token={token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Session has ended");
}

#[tokio::test]
async fn event_stream_accepts_a_live_token_before_the_upgrade() {
    let app = create_test_app().await;
    let token = app.token(VIEWER_EMAIL).await;

    // No upgrade headers: the token passes and the upgrade itself is what fails.
    let (status, _) = app
        .request(Method::GET, &format!("/auth/events?token={token}"), None, None)
        .await;
    assert_ne!(status, StatusCode::UNAUTHORIZED);
    assert!(status.is_client_error());
}
