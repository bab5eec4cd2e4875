use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Stock picture used when a meal is saved without an image.
pub const DEFAULT_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1604329760661-e71dc83f8f26?w=400";

/// Meal-time a meal belongs to. Also names the three slots of a plan day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealCategory {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealCategory {
    pub const ALL: [MealCategory; 3] = [
        MealCategory::Breakfast,
        MealCategory::Lunch,
        MealCategory::Dinner,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MealCategory::Breakfast => "breakfast",
            MealCategory::Lunch => "lunch",
            MealCategory::Dinner => "dinner",
        }
    }

    /// Position in [`MealCategory::ALL`].
    pub fn index(self) -> usize {
        match self {
            MealCategory::Breakfast => 0,
            MealCategory::Lunch => 1,
            MealCategory::Dinner => 2,
        }
    }
}

impl std::fmt::Display for MealCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MealCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(MealCategory::Breakfast),
            "lunch" => Ok(MealCategory::Lunch),
            "dinner" => Ok(MealCategory::Dinner),
            _ => Err(anyhow::anyhow!("Unknown meal category: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: Uuid,
    pub name: String,
    pub category: MealCategory,
    pub calories: i32,
    pub portion: String,
    #[serde(default)]
    pub prep_time: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A validated meal, ready to be written to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMeal {
    pub name: String,
    pub category: MealCategory,
    pub calories: i32,
    pub portion: String,
    pub prep_time: Option<String>,
    pub image_url: String,
    pub ingredients: Vec<Ingredient>,
}

impl NewMeal {
    /// Materialise the row the store would return for this meal.
    pub fn into_meal(self, id: Uuid, created_at: Option<DateTime<Utc>>) -> Meal {
        Meal {
            id,
            name: self.name,
            category: self.category,
            calories: self.calories,
            portion: self.portion,
            prep_time: self.prep_time,
            image_url: Some(self.image_url),
            ingredients: self.ingredients,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngredientDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: String,
}

/// Body for POST /meals and PUT /meals/{id}: the add/edit form as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct MealDraft {
    #[serde(default)]
    pub name: String,
    pub category: MealCategory,
    /// Kept as text so that non-numeric input reaches validation.
    #[serde(default, deserialize_with = "string_or_number")]
    pub calories: String,
    #[serde(default)]
    pub portion: String,
    #[serde(default)]
    pub prep_time: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<IngredientDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please fill in all required fields")]
    MissingRequiredFields,
    #[error("Calories must be a whole number")]
    InvalidCalories,
    #[error("Please add at least one ingredient")]
    NoIngredients,
}

impl MealDraft {
    pub fn validate(&self) -> Result<NewMeal, ValidationError> {
        let name = self.name.trim();
        let calories = self.calories.trim();
        let portion = self.portion.trim();
        if name.is_empty() || calories.is_empty() || portion.is_empty() {
            return Err(ValidationError::MissingRequiredFields);
        }

        let calories: i32 = calories
            .parse()
            .map_err(|_| ValidationError::InvalidCalories)?;
        if calories < 0 {
            return Err(ValidationError::InvalidCalories);
        }

        let ingredients: Vec<Ingredient> = self
            .ingredients
            .iter()
            .filter(|i| !i.name.trim().is_empty() && !i.quantity.trim().is_empty())
            .map(|i| Ingredient {
                name: i.name.trim().to_string(),
                quantity: i.quantity.trim().to_string(),
            })
            .collect();
        if ingredients.is_empty() {
            return Err(ValidationError::NoIngredients);
        }

        Ok(NewMeal {
            name: name.to_string(),
            category: self.category,
            calories,
            portion: portion.to_string(),
            prep_time: non_blank(self.prep_time.as_deref()),
            image_url: non_blank(self.image_url.as_deref())
                .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            ingredients,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
        Raw::Null(()) => String::new(),
    })
}

/// Query params for GET /meals.
#[derive(Debug, Default, Deserialize)]
pub struct MealListQuery {
    /// `breakfast`, `lunch`, `dinner`, or `all` (the default).
    pub category: Option<String>,
}

impl MealListQuery {
    pub fn category(&self) -> Result<Option<MealCategory>, anyhow::Error> {
        match self.category.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(other) => other.parse().map(Some),
        }
    }
}
