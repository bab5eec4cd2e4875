pub mod auth;
pub mod events;
pub mod health;
pub mod meals;
pub mod metrics;
pub mod weekly;
