//! HTTP handlers for the farmstead server

pub mod farm;
pub mod health;

pub use farm::{create_farm, delete_farm, get_farm, list_farms, update_farm};
pub use health::health_check;
