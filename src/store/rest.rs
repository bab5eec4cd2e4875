//! PostgREST adapter for the managed backend's table API.
//!
//! Requests are sent with the project's anon key plus the caller's access
//! token, so the backend evaluates its row-level policies as that user.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{
    auth::Session,
    meal::{Meal, MealCategory, NewMeal},
    plan::{NewWeeklyPlan, WeeklyPlan},
    user::UserRole,
};

const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT_REPRESENTATION: &str = "resolution=merge-duplicates,return=representation";

pub struct RestStore {
    client: Client,
    base_url: String,
    anon_key: String,
}

/// Error body of a PostgREST response.
#[derive(Debug, Deserialize)]
struct RestErrorBody {
    message: Option<String>,
    code: Option<String>,
    hint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: Option<String>,
}

impl RestStore {
    pub fn new(project_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        })
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{table}", self.base_url)
    }

    fn authorize(&self, req: RequestBuilder, session: &Session) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .header("Accept", "application/json")
    }

    async fn rows<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        req: RequestBuilder,
    ) -> Result<Vec<T>, StoreError> {
        let response = req.send().await.map_err(|e| {
            tracing::error!("{operation}: store request failed: {e}");
            StoreError::from(e)
        })?;
        let response = check_status(operation, response).await?;
        Ok(response.json::<Vec<T>>().await?)
    }
}

/// Map a non-success response onto a [`StoreError`], keeping the backend's message.
async fn check_status(operation: &str, response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("{operation}: could not read store error body: {e}");
            String::new()
        }
    };
    let message = match serde_json::from_str::<RestErrorBody>(&text) {
        Ok(body) => {
            let mut message = body.message.unwrap_or_else(|| status.to_string());
            if let Some(hint) = body.hint.filter(|h| !h.is_empty()) {
                message = format!("{message} ({hint})");
            }
            if let Some(code) = body.code {
                tracing::debug!("{operation}: store error code {code}");
            }
            message
        }
        Err(_) if !text.is_empty() => text,
        Err(_) => status.to_string(),
    };
    tracing::warn!("{operation}: store answered {status}: {message}");

    Err(StoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

fn single<T>(mut rows: Vec<T>) -> Result<T, StoreError> {
    if rows.is_empty() {
        return Err(StoreError::NotFound);
    }
    Ok(rows.swap_remove(0))
}

fn decode_plan(row: Map<String, Value>) -> Result<WeeklyPlan, StoreError> {
    WeeklyPlan::from_row(&row).map_err(StoreError::from)
}

#[async_trait]
impl Store for RestStore {
    async fn list_meals(
        &self,
        session: &Session,
        category: Option<MealCategory>,
    ) -> Result<Vec<Meal>, StoreError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "category.asc,name.asc".to_string()),
        ];
        if let Some(category) = category {
            query.push(("category", format!("eq.{category}")));
        }
        let req = self.authorize(self.client.get(self.table("meals")), session).query(&query);
        self.rows("list_meals", req).await
    }

    async fn get_meal(&self, session: &Session, id: Uuid) -> Result<Meal, StoreError> {
        let req = self
            .authorize(self.client.get(self.table("meals")), session)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]);
        single(self.rows("get_meal", req).await?)
    }

    async fn insert_meal(&self, session: &Session, meal: &NewMeal) -> Result<Meal, StoreError> {
        let req = self
            .authorize(self.client.post(self.table("meals")), session)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&[meal]);
        single(self.rows("insert_meal", req).await?)
    }

    async fn update_meal(
        &self,
        session: &Session,
        id: Uuid,
        meal: &NewMeal,
    ) -> Result<Meal, StoreError> {
        let req = self
            .authorize(self.client.patch(self.table("meals")), session)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(meal);
        single(self.rows("update_meal", req).await?)
    }

    async fn delete_meal(&self, session: &Session, id: Uuid) -> Result<(), StoreError> {
        let req = self
            .authorize(self.client.delete(self.table("meals")), session)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION);
        let deleted: Vec<Value> = self.rows("delete_meal", req).await?;
        single(deleted).map(|_| ())
    }

    async fn find_role(
        &self,
        session: &Session,
        user_id: Uuid,
    ) -> Result<Option<UserRole>, StoreError> {
        let req = self
            .authorize(self.client.get(self.table("user_roles")), session)
            .query(&[
                ("select", "role".to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<RoleRow> = self.rows("find_role", req).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| UserRole::from_stored(row.role.as_deref())))
    }

    async fn find_plan(
        &self,
        session: &Session,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyPlan>, StoreError> {
        let req = self
            .authorize(self.client.get(self.table("weekly_plans")), session)
            .query(&[
                ("select", "*".to_string()),
                ("week_start", format!("eq.{week_start}")),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<Map<String, Value>> = self.rows("find_plan", req).await?;
        rows.into_iter().next().map(decode_plan).transpose()
    }

    async fn upsert_plan(
        &self,
        session: &Session,
        plan: &NewWeeklyPlan,
    ) -> Result<WeeklyPlan, StoreError> {
        let req = self
            .authorize(self.client.post(self.table("weekly_plans")), session)
            .query(&[("on_conflict", "week_start")])
            .header("Prefer", UPSERT_REPRESENTATION)
            .json(&[plan.to_row()]);
        let rows: Vec<Map<String, Value>> = self.rows("upsert_plan", req).await?;
        decode_plan(single(rows)?)
    }

    async fn delete_plan(
        &self,
        session: &Session,
        week_start: NaiveDate,
    ) -> Result<bool, StoreError> {
        let req = self
            .authorize(self.client.delete(self.table("weekly_plans")), session)
            .query(&[("week_start", format!("eq.{week_start}"))])
            .header("Prefer", RETURN_REPRESENTATION);
        let deleted: Vec<Value> = self.rows("delete_plan", req).await?;
        Ok(!deleted.is_empty())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(self.table("meals"))
            .header("apikey", &self.anon_key)
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        check_status("ping", response).await.map(|_| ())
    }
}
