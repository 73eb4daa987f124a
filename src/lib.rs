pub mod activity;
pub mod admin;
pub mod analytics;
pub mod api_router;
pub mod appointments;
pub mod auth;
pub mod contacts;
pub mod core;
pub mod deals;
pub mod security;
pub mod tasks;
pub mod teams;

pub use crate::core::config::AppConfig;
pub use crate::core::shared::error::{CrmError, CrmResult};
pub use crate::core::shared::state::AppState;
pub use api_router::build_app;
