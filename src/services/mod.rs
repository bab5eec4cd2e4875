pub mod auth;
pub mod identity;
pub mod meals;
pub mod metrics;
pub mod planner;
pub mod sessions;
pub mod week;
