//! Gearloan - peer-to-peer equipment lending
//!
//! Members list equipment, others request time-bounded loans, owners approve,
//! reject or extend them. The scheduling engine guarantees that approved
//! loans of one piece of equipment never overlap, even under concurrent
//! approvals.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod scheduling;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
