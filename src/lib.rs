//! Librarium Library Circulation Server
//!
//! A Rust REST JSON API for tracking a library's circulating inventory:
//! the book catalog, the member roster and the loans binding them. The
//! loan lifecycle engine keeps loan records and availability counts
//! consistent under concurrent access.

use std::sync::Arc;

pub mod api;
pub mod circulation;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
