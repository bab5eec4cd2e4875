use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "api_logins_total",
        "Login attempts by status",
        &["status"]
    ).expect("api_logins_total registers once");

    pub static ref PLAN_GENERATIONS_COUNTER: CounterVec = register_counter_vec!(
        "api_plan_generations_total",
        "Weekly plan generation requests by outcome",
        &["outcome"]
    ).expect("api_plan_generations_total registers once");

    pub static ref MEAL_MUTATIONS_COUNTER: CounterVec = register_counter_vec!(
        "api_meal_mutations_total",
        "Catalog writes by action",
        &["action"]
    ).expect("api_meal_mutations_total registers once");
}
