use std::collections::HashSet;
use std::sync::Mutex;

use chrono::NaiveDate;
use rand::{seq::SliceRandom, Rng};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    models::{
        auth::Session,
        meal::{Meal, MealCategory},
        plan::{NewWeeklyPlan, PlanView, WeekSlots, WeekView, Weekday},
    },
    services::metrics::PLAN_GENERATIONS_COUNTER,
    store::{Store, StoreError},
};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Only admins can change the weekly plan")]
    Forbidden,
    #[error("Please add at least one breakfast, lunch, and dinner meal first.")]
    MissingCategory(MealCategory),
    #[error("A plan already exists for the week of {week_start}. Confirm to replace it.")]
    AlreadyExists { week_start: NaiveDate },
    #[error("A plan for the week of {week_start} is already being generated")]
    InProgress { week_start: NaiveDate },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The catalog split by meal-time, each group in catalog order.
#[derive(Debug)]
pub struct CategoryPartition<'a> {
    groups: [Vec<&'a Meal>; 3],
}

impl<'a> CategoryPartition<'a> {
    pub fn get(&self, category: MealCategory) -> &[&'a Meal] {
        &self.groups[category.index()]
    }

    /// Concatenation of the groups in breakfast, lunch, dinner order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Meal> + '_ {
        self.groups.iter().flat_map(|g| g.iter().copied())
    }

    /// Generator input; refuses when a meal-time has nothing to offer.
    pub fn into_pools(self) -> Result<MealPools, PlanError> {
        for category in MealCategory::ALL {
            if self.get(category).is_empty() {
                return Err(PlanError::MissingCategory(category));
            }
        }
        Ok(MealPools(
            self.groups.map(|g| g.into_iter().map(|m| m.id).collect::<Vec<Uuid>>()),
        ))
    }
}

pub fn partition(meals: &[Meal]) -> CategoryPartition<'_> {
    let mut groups: [Vec<&Meal>; 3] = Default::default();
    for meal in meals {
        groups[meal.category.index()].push(meal);
    }
    CategoryPartition { groups }
}

/// Non-empty candidate meal ids for each meal-time.
#[derive(Debug, Clone)]
pub struct MealPools([Vec<Uuid>; 3]);

impl MealPools {
    pub fn get(&self, category: MealCategory) -> &[Uuid] {
        &self.0[category.index()]
    }
}

/// Fill all 21 slots of the week starting at `week_start`.
///
/// Each meal-time is shuffled independently; day `i` (Monday = 0) gets
/// `shuffled[i % len]`, so short lists repeat at a fixed spacing.
pub fn assign<R: Rng + ?Sized>(pools: &MealPools, week_start: NaiveDate, rng: &mut R) -> NewWeeklyPlan {
    let mut slots = WeekSlots::default();
    for category in MealCategory::ALL {
        let mut shuffled = pools.get(category).to_vec();
        shuffled.shuffle(rng);
        if shuffled.is_empty() {
            continue;
        }
        for (i, day) in Weekday::ALL.into_iter().enumerate() {
            slots.set(day, category, Some(shuffled[i % shuffled.len()]));
        }
    }
    NewWeeklyPlan { week_start, slots }
}

/// Weeks with a generation currently running in this process.
#[derive(Default)]
pub struct GenerationLocks {
    weeks: Mutex<HashSet<NaiveDate>>,
}

/// Held for the duration of one generation; releases the week on drop.
pub struct GenerationLock<'a> {
    locks: &'a GenerationLocks,
    week_start: NaiveDate,
}

impl GenerationLocks {
    pub fn try_acquire(&self, week_start: NaiveDate) -> Option<GenerationLock<'_>> {
        let mut weeks = self.weeks.lock().unwrap_or_else(|e| e.into_inner());
        if !weeks.insert(week_start) {
            return None;
        }
        Some(GenerationLock { locks: self, week_start })
    }
}

impl Drop for GenerationLock<'_> {
    fn drop(&mut self) {
        let mut weeks = self.locks.weeks.lock().unwrap_or_else(|e| e.into_inner());
        weeks.remove(&self.week_start);
    }
}

#[derive(Debug, Serialize)]
pub struct GeneratedPlan {
    #[serde(flatten)]
    pub week: WeekView,
    /// Whether an existing plan for the week was overwritten.
    pub replaced: bool,
}

pub struct PlanService;

impl PlanService {
    /// The plan stored for the week starting `week_start`, resolved against the catalog.
    pub async fn week(
        store: &dyn Store,
        session: &Session,
        week_start: NaiveDate,
    ) -> Result<WeekView, PlanError> {
        let plan = store.find_plan(session, week_start).await?;
        let plan = match plan {
            Some(plan) => {
                let meals = store.list_meals(session, None).await?;
                Some(PlanView::resolve(&plan, &meals))
            }
            None => None,
        };
        Ok(WeekView { week_start, plan })
    }

    /// Generate and store a new plan for the week starting `week_start`.
    ///
    /// Nothing is written when the catalog lacks a meal-time, or when a plan
    /// already exists and `overwrite` was not confirmed.
    pub async fn generate<R: Rng + ?Sized + Send>(
        store: &dyn Store,
        locks: &GenerationLocks,
        session: &Session,
        week_start: NaiveDate,
        overwrite: bool,
        rng: &mut R,
    ) -> Result<GeneratedPlan, PlanError> {
        if !session.is_admin() {
            return Err(PlanError::Forbidden);
        }
        let _lock = locks
            .try_acquire(week_start)
            .ok_or(PlanError::InProgress { week_start })?;

        let meals = store.list_meals(session, None).await?;
        let pools = match partition(&meals).into_pools() {
            Ok(pools) => pools,
            Err(e) => {
                PLAN_GENERATIONS_COUNTER.with_label_values(&["refused"]).inc();
                return Err(e);
            }
        };

        let replaced = store.find_plan(session, week_start).await?.is_some();
        if replaced && !overwrite {
            PLAN_GENERATIONS_COUNTER.with_label_values(&["conflict"]).inc();
            return Err(PlanError::AlreadyExists { week_start });
        }

        let plan = assign(&pools, week_start, rng);
        let stored = store.upsert_plan(session, &plan).await.map_err(|e| {
            tracing::error!("weekly plan write for {week_start} failed: {e}");
            e
        })?;

        let outcome = if replaced { "replaced" } else { "created" };
        PLAN_GENERATIONS_COUNTER.with_label_values(&[outcome]).inc();
        tracing::info!("weekly plan {} {outcome} for {week_start} by {}", stored.id, session.user_id);

        Ok(GeneratedPlan {
            week: WeekView {
                week_start,
                plan: Some(PlanView::resolve(&stored, &meals)),
            },
            replaced,
        })
    }

    /// Remove the plan of the week starting `week_start`; returns whether one existed.
    pub async fn clear(
        store: &dyn Store,
        session: &Session,
        week_start: NaiveDate,
    ) -> Result<bool, PlanError> {
        if !session.is_admin() {
            return Err(PlanError::Forbidden);
        }
        let removed = store.delete_plan(session, week_start).await?;
        if removed {
            tracing::info!("weekly plan for {week_start} deleted by {}", session.user_id);
        }
        Ok(removed)
    }
}
