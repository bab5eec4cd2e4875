use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::meal::{Meal, MealCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        }
    }
}

/// Column names of the 21 slots in `weekly_plans`, indexed `[day][category]`.
pub const SLOT_COLUMNS: [[&str; 3]; 7] = [
    ["monday_breakfast", "monday_lunch", "monday_dinner"],
    ["tuesday_breakfast", "tuesday_lunch", "tuesday_dinner"],
    ["wednesday_breakfast", "wednesday_lunch", "wednesday_dinner"],
    ["thursday_breakfast", "thursday_lunch", "thursday_dinner"],
    ["friday_breakfast", "friday_lunch", "friday_dinner"],
    ["saturday_breakfast", "saturday_lunch", "saturday_dinner"],
    ["sunday_breakfast", "sunday_lunch", "sunday_dinner"],
];

/// Iterate every slot column in storage order (day-major).
pub fn slot_columns() -> impl Iterator<Item = &'static str> {
    SLOT_COLUMNS.iter().flat_map(|day| day.iter().copied())
}

/// The 7 x 3 grid of meal references of one plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekSlots([[Option<Uuid>; 3]; 7]);

impl WeekSlots {
    pub fn get(&self, day: Weekday, category: MealCategory) -> Option<Uuid> {
        self.0[day as usize][category.index()]
    }

    pub fn set(&mut self, day: Weekday, category: MealCategory, meal: Option<Uuid>) {
        self.0[day as usize][category.index()] = meal;
    }

    /// The 7 assignments of one meal-time, Monday first.
    pub fn column(&self, category: MealCategory) -> [Option<Uuid>; 7] {
        Weekday::ALL.map(|day| self.get(day, category))
    }

    pub fn is_complete(&self) -> bool {
        self.0.iter().flatten().all(Option::is_some)
    }

    /// Flat `{ "<day>_<category>": id | null }` object, as stored.
    pub fn to_columns(&self) -> Map<String, Value> {
        let mut columns = Map::new();
        for day in Weekday::ALL {
            for category in MealCategory::ALL {
                let value = match self.get(day, category) {
                    Some(id) => Value::String(id.to_string()),
                    None => Value::Null,
                };
                columns.insert(
                    SLOT_COLUMNS[day as usize][category.index()].to_string(),
                    value,
                );
            }
        }
        columns
    }

    /// Read the slot columns out of a stored row; absent columns are empty slots.
    pub fn from_columns(row: &Map<String, Value>) -> Result<Self, anyhow::Error> {
        let mut slots = WeekSlots::default();
        for day in Weekday::ALL {
            for category in MealCategory::ALL {
                let column = SLOT_COLUMNS[day as usize][category.index()];
                let meal = match row.get(column) {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(
                        s.parse::<Uuid>()
                            .map_err(|e| anyhow::anyhow!("Invalid meal id in {column}: {e}"))?,
                    ),
                    Some(other) => anyhow::bail!("Invalid meal id in {column}: {other}"),
                };
                slots.set(day, category, meal);
            }
        }
        Ok(slots)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyPlan {
    pub id: Uuid,
    pub week_start: NaiveDate,
    pub slots: WeekSlots,
    pub created_at: Option<DateTime<Utc>>,
}

impl WeeklyPlan {
    /// Decode a `weekly_plans` row returned as a JSON object.
    pub fn from_row(row: &Map<String, Value>) -> Result<Self, anyhow::Error> {
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("weekly plan row without id"))?
            .parse()?;
        let week_start = row
            .get("week_start")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("weekly plan row without week_start"))?
            .parse()?;
        let created_at = match row.get("created_at").and_then(Value::as_str) {
            Some(ts) => Some(DateTime::parse_from_rfc3339(ts)?.with_timezone(&Utc)),
            None => None,
        };

        Ok(Self {
            id,
            week_start,
            slots: WeekSlots::from_columns(row)?,
            created_at,
        })
    }
}

/// A generated plan that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWeeklyPlan {
    pub week_start: NaiveDate,
    pub slots: WeekSlots,
}

impl NewWeeklyPlan {
    /// Insert payload: `week_start` plus the 21 slot columns.
    pub fn to_row(&self) -> Map<String, Value> {
        let mut row = self.slots.to_columns();
        row.insert(
            "week_start".to_string(),
            Value::String(self.week_start.to_string()),
        );
        row
    }
}

/// Body for POST /weekly/generate.
#[derive(Debug, Default, Deserialize)]
pub struct GeneratePlanRequest {
    /// Any date inside the target week; today when absent.
    pub date: Option<NaiveDate>,
    /// Explicit confirmation to replace the plan already stored for that week.
    #[serde(default)]
    pub overwrite: bool,
}

/// Query params for GET /weekly and DELETE /weekly.
#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanDayView {
    pub day: Weekday,
    pub breakfast: Option<Meal>,
    pub lunch: Option<Meal>,
    pub dinner: Option<Meal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanView {
    pub id: Uuid,
    pub days: Vec<PlanDayView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekView {
    pub week_start: NaiveDate,
    pub plan: Option<PlanView>,
}

impl PlanView {
    /// Resolve every slot against the catalog; dangling references render as empty.
    pub fn resolve(plan: &WeeklyPlan, meals: &[Meal]) -> Self {
        let lookup = |id: Option<Uuid>| id.and_then(|id| meals.iter().find(|m| m.id == id).cloned());
        let days = Weekday::ALL
            .into_iter()
            .map(|day| PlanDayView {
                day,
                breakfast: lookup(plan.slots.get(day, MealCategory::Breakfast)),
                lunch: lookup(plan.slots.get(day, MealCategory::Lunch)),
                dinner: lookup(plan.slots.get(day, MealCategory::Dinner)),
            })
            .collect();
        Self { id: plan.id, days }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_columns_follow_day_major_order() {
        let columns: Vec<_> = slot_columns().collect();
        assert_eq!(columns.len(), 21);
        assert_eq!(columns[0], "monday_breakfast");
        assert_eq!(columns[4], "tuesday_lunch");
        assert_eq!(columns[20], "sunday_dinner");
    }

    #[test]
    fn stored_row_decodes_into_plan() {
        let meal = Uuid::new_v4();
        let mut slots = WeekSlots::default();
        slots.set(Weekday::Wednesday, MealCategory::Lunch, Some(meal));
        let mut row = NewWeeklyPlan {
            week_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            slots,
        }
        .to_row();
        let id = Uuid::new_v4();
        row.insert("id".into(), Value::String(id.to_string()));
        row.insert("created_at".into(), Value::String("2024-01-01T08:00:00+00:00".into()));

        let plan = WeeklyPlan::from_row(&row).unwrap();
        assert_eq!(plan.id, id);
        assert_eq!(plan.slots.get(Weekday::Wednesday, MealCategory::Lunch), Some(meal));
        assert_eq!(plan.slots.get(Weekday::Monday, MealCategory::Lunch), None);
        assert!(plan.created_at.is_some());
    }

    #[test]
    fn malformed_slot_is_an_error() {
        let mut row = Map::new();
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        row.insert("week_start".into(), Value::String("2024-01-01".into()));
        row.insert("friday_dinner".into(), Value::from(42));
        assert!(WeeklyPlan::from_row(&row).is_err());
    }

    #[test]
    fn dangling_meal_reference_renders_as_empty() {
        let mut slots = WeekSlots::default();
        slots.set(Weekday::Monday, MealCategory::Dinner, Some(Uuid::new_v4()));
        let plan = WeeklyPlan {
            id: Uuid::new_v4(),
            week_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            slots,
            created_at: None,
        };
        let view = PlanView::resolve(&plan, &[]);
        assert_eq!(view.days.len(), 7);
        assert!(view.days[0].dinner.is_none());
    }
}
