//! Demo data seed script
//!
//! Loads a sample meal library into Postgres, assigns roles, and can draft
//! the current week's plan.
//!
//! Usage:
//!   DATABASE_URL=... ./seed-demo --admin <UUID> [--viewer <UUID>]... [--reset] [--plan]

use anyhow::{Context, Result};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use sqlx::types::Json;
use uuid::Uuid;

use mealboard_api::{
    db,
    models::{
        auth::Session,
        meal::{Ingredient, MealCategory, DEFAULT_IMAGE_URL},
        user::UserRole,
    },
    services::{
        planner::{GenerationLocks, PlanService},
        week,
    },
    store::PgStore,
};

#[derive(Parser)]
#[command(name = "seed-demo", about = "Seed the mealboard database with demo data")]
struct Args {
    /// User id to grant the admin role (repeatable)
    #[arg(long)]
    admin: Vec<Uuid>,
    /// User id to grant the viewer role (repeatable)
    #[arg(long)]
    viewer: Vec<Uuid>,
    /// Delete existing meals and plans first
    #[arg(long)]
    reset: bool,
    /// Also generate (or replace) the plan of the current week
    #[arg(long)]
    plan: bool,
}

struct SampleMeal {
    name: &'static str,
    category: MealCategory,
    calories: i32,
    portion: &'static str,
    prep_time: &'static str,
    ingredients: &'static [(&'static str, &'static str)],
}

const SAMPLE_MEALS: &[SampleMeal] = &[
    SampleMeal {
        name: "Overnight oats",
        category: MealCategory::Breakfast,
        calories: 350,
        portion: "1 jar",
        prep_time: "5 min",
        ingredients: &[("Rolled oats", "50g"), ("Milk", "150ml"), ("Berries", "1 handful")],
    },
    SampleMeal {
        name: "Scrambled eggs on toast",
        category: MealCategory::Breakfast,
        calories: 420,
        portion: "2 slices",
        prep_time: "10 min",
        ingredients: &[("Eggs", "3"), ("Bread", "2 slices"), ("Butter", "10g")],
    },
    SampleMeal {
        name: "Banana pancakes",
        category: MealCategory::Breakfast,
        calories: 380,
        portion: "4 pancakes",
        prep_time: "15 min",
        ingredients: &[("Banana", "1"), ("Eggs", "2"), ("Flour", "60g")],
    },
    SampleMeal {
        name: "Chicken wrap",
        category: MealCategory::Lunch,
        calories: 510,
        portion: "1 wrap",
        prep_time: "10 min",
        ingredients: &[("Tortilla", "1"), ("Chicken breast", "120g"), ("Lettuce", "2 leaves")],
    },
    SampleMeal {
        name: "Lentil soup",
        category: MealCategory::Lunch,
        calories: 330,
        portion: "1 bowl",
        prep_time: "35 min",
        ingredients: &[("Red lentils", "80g"), ("Carrot", "1"), ("Vegetable stock", "400ml")],
    },
    SampleMeal {
        name: "Spaghetti bolognese",
        category: MealCategory::Dinner,
        calories: 650,
        portion: "1 plate",
        prep_time: "40 min",
        ingredients: &[("Spaghetti", "100g"), ("Minced beef", "125g"), ("Tomato passata", "200g")],
    },
    SampleMeal {
        name: "Salmon with rice",
        category: MealCategory::Dinner,
        calories: 590,
        portion: "1 fillet",
        prep_time: "25 min",
        ingredients: &[("Salmon fillet", "1"), ("Rice", "75g"), ("Broccoli", "100g")],
    },
    SampleMeal {
        name: "Vegetable curry",
        category: MealCategory::Dinner,
        calories: 540,
        portion: "1 bowl",
        prep_time: "30 min",
        ingredients: &[("Chickpeas", "1 can"), ("Coconut milk", "200ml"), ("Spinach", "1 handful")],
    },
];

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL required")?;

    println!("=== Seed mealboard demo data ===");

    let pool = db::create_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    if args.reset {
        println!("Removing existing plans and meals...");
        sqlx::query("DELETE FROM weekly_plans")
            .execute(&pool)
            .await
            .context("Failed to delete weekly plans")?;
        sqlx::query("DELETE FROM meals")
            .execute(&pool)
            .await
            .context("Failed to delete meals")?;
    }

    println!("Inserting {} sample meals...", SAMPLE_MEALS.len());
    for meal in SAMPLE_MEALS {
        let ingredients: Vec<Ingredient> = meal
            .ingredients
            .iter()
            .map(|(name, quantity)| Ingredient {
                name: name.to_string(),
                quantity: quantity.to_string(),
            })
            .collect();
        sqlx::query(
            "INSERT INTO meals (name, category, calories, portion, prep_time, image_url, ingredients)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(meal.name)
        .bind(meal.category.as_str())
        .bind(meal.calories)
        .bind(meal.portion)
        .bind(meal.prep_time)
        .bind(DEFAULT_IMAGE_URL)
        .bind(Json(&ingredients))
        .execute(&pool)
        .await
        .with_context(|| format!("Failed to insert meal {}", meal.name))?;
    }

    let roles = args
        .admin
        .iter()
        .map(|id| (*id, UserRole::Admin))
        .chain(args.viewer.iter().map(|id| (*id, UserRole::Viewer)));
    for (user_id, role) in roles {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(user_id)
        .bind(role.to_string())
        .execute(&pool)
        .await
        .with_context(|| format!("Failed to assign role to {user_id}"))?;
        println!("  {user_id} -> {role}");
    }

    if args.plan {
        let admin = args
            .admin
            .first()
            .copied()
            .context("--plan needs at least one --admin")?;
        let session = Session {
            user_id: admin,
            email: None,
            role: UserRole::Admin,
            access_token: String::new(),
            key: "seed-demo".into(),
            expires_at: i64::MAX,
        };
        let store = PgStore::new(pool.clone());
        let week_start = week::resolve(None).context("Date out of range")?;
        let generated = PlanService::generate(
            &store,
            &GenerationLocks::default(),
            &session,
            week_start,
            true,
            &mut StdRng::from_entropy(),
        )
        .await
        .context("Failed to generate the weekly plan")?;
        println!(
            "Weekly plan for {week_start} {}",
            if generated.replaced { "replaced" } else { "created" }
        );
    }

    println!("=== Done ===");
    Ok(())
}
