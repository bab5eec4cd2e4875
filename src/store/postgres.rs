use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgRow, types::Json, FromRow, PgPool, Row};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{
    auth::Session,
    meal::{Ingredient, Meal, MealCategory, NewMeal},
    plan::{slot_columns, NewWeeklyPlan, WeekSlots, WeeklyPlan, Weekday, SLOT_COLUMNS},
    user::UserRole,
};

const MEAL_COLUMNS: &str =
    "id, name, category, calories, portion, prep_time, image_url, ingredients, created_at";

/// Direct connection to the backend's Postgres schema (see `migrations/`).
///
/// Row-level policies do not apply to this connection; the session is only
/// used for logging.
pub struct PgStore {
    pool: PgPool,
}

/// DB row struct; category is fetched as TEXT and parsed afterwards.
#[derive(Debug, FromRow)]
struct MealRow {
    id: Uuid,
    name: String,
    category: String,
    calories: i32,
    portion: String,
    prep_time: Option<String>,
    image_url: Option<String>,
    ingredients: Json<Vec<Ingredient>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MealRow> for Meal {
    type Error = StoreError;

    fn try_from(row: MealRow) -> Result<Self, Self::Error> {
        Ok(Meal {
            id: row.id,
            name: row.name,
            category: row.category.parse()?,
            calories: row.calories,
            portion: row.portion,
            prep_time: row.prep_time,
            image_url: row.image_url,
            ingredients: row.ingredients.0,
            created_at: Some(row.created_at),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for WeeklyPlan {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let mut slots = WeekSlots::default();
        for day in Weekday::ALL {
            for category in MealCategory::ALL {
                let column = SLOT_COLUMNS[day as usize][category.index()];
                slots.set(day, category, row.try_get::<Option<Uuid>, _>(column)?);
            }
        }
        Ok(WeeklyPlan {
            id: row.try_get("id")?,
            week_start: row.try_get("week_start")?,
            slots,
            created_at: row.try_get::<Option<DateTime<Utc>>, _>("created_at")?,
        })
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn upsert_plan_sql() -> String {
    let columns: Vec<&str> = slot_columns().collect();
    let placeholders: Vec<String> = (0..columns.len()).map(|i| format!("${}", i + 2)).collect();
    let updates: Vec<String> = columns
        .iter()
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();
    format!(
        "INSERT INTO weekly_plans (week_start, {})
         VALUES ($1, {})
         ON CONFLICT (week_start) DO UPDATE SET {}
         RETURNING *",
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", "),
    )
}

#[async_trait]
impl Store for PgStore {
    async fn list_meals(
        &self,
        _session: &Session,
        category: Option<MealCategory>,
    ) -> Result<Vec<Meal>, StoreError> {
        let rows = sqlx::query_as::<_, MealRow>(&format!(
            "SELECT {MEAL_COLUMNS} FROM meals
             WHERE ($1::TEXT IS NULL OR category = $1)
             ORDER BY category, name"
        ))
        .bind(category.map(MealCategory::as_str))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Meal::try_from).collect()
    }

    async fn get_meal(&self, _session: &Session, id: Uuid) -> Result<Meal, StoreError> {
        sqlx::query_as::<_, MealRow>(&format!("SELECT {MEAL_COLUMNS} FROM meals WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn insert_meal(&self, session: &Session, meal: &NewMeal) -> Result<Meal, StoreError> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            "INSERT INTO meals (name, category, calories, portion, prep_time, image_url, ingredients)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {MEAL_COLUMNS}"
        ))
        .bind(&meal.name)
        .bind(meal.category.as_str())
        .bind(meal.calories)
        .bind(&meal.portion)
        .bind(&meal.prep_time)
        .bind(&meal.image_url)
        .bind(Json(&meal.ingredients))
        .fetch_one(&self.pool)
        .await?;
        tracing::debug!("meal {} inserted by {}", row.id, session.user_id);
        row.try_into()
    }

    async fn update_meal(
        &self,
        session: &Session,
        id: Uuid,
        meal: &NewMeal,
    ) -> Result<Meal, StoreError> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            "UPDATE meals
             SET name = $1, category = $2, calories = $3, portion = $4,
                 prep_time = $5, image_url = $6, ingredients = $7
             WHERE id = $8
             RETURNING {MEAL_COLUMNS}"
        ))
        .bind(&meal.name)
        .bind(meal.category.as_str())
        .bind(meal.calories)
        .bind(&meal.portion)
        .bind(&meal.prep_time)
        .bind(&meal.image_url)
        .bind(Json(&meal.ingredients))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        tracing::debug!("meal {id} updated by {}", session.user_id);
        row.try_into()
    }

    async fn delete_meal(&self, session: &Session, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM meals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        tracing::debug!("meal {id} deleted by {}", session.user_id);
        Ok(())
    }

    async fn find_role(
        &self,
        _session: &Session,
        user_id: Uuid,
    ) -> Result<Option<UserRole>, StoreError> {
        let role: Option<Option<String>> =
            sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(role.map(|r| UserRole::from_stored(r.as_deref())))
    }

    async fn find_plan(
        &self,
        _session: &Session,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyPlan>, StoreError> {
        let plan = sqlx::query_as::<_, WeeklyPlan>("SELECT * FROM weekly_plans WHERE week_start = $1")
            .bind(week_start)
            .fetch_optional(&self.pool)
            .await?;
        Ok(plan)
    }

    async fn upsert_plan(
        &self,
        session: &Session,
        plan: &NewWeeklyPlan,
    ) -> Result<WeeklyPlan, StoreError> {
        let sql = upsert_plan_sql();
        let mut query = sqlx::query_as::<_, WeeklyPlan>(&sql).bind(plan.week_start);
        for day in Weekday::ALL {
            for category in MealCategory::ALL {
                query = query.bind(plan.slots.get(day, category));
            }
        }
        let stored = query.fetch_one(&self.pool).await?;
        tracing::debug!("plan {} for {} written by {}", stored.id, stored.week_start, session.user_id);
        Ok(stored)
    }

    async fn delete_plan(
        &self,
        _session: &Session,
        week_start: NaiveDate,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM weekly_plans WHERE week_start = $1")
            .bind(week_start)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
