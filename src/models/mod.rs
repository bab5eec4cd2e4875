pub mod auth;
pub mod meal;
pub mod plan;
pub mod user;
