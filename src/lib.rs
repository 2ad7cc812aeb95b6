//! Laboratory equipment reservation server
//!
//! REST JSON API for booking shared lab equipment. Booking admission and the
//! cached availability counter are handled by [`reconciler`]; everything
//! else is a thin layer of handlers, services and repositories around it.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod reconciler;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
