//! Matcha Discovery - profile discovery and compatibility service for the Matcha dating app
//!
//! This library provides proximity search, mutual-orientation suggestions,
//! and view/like tracking on top of a pluggable profile store.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use self::core::{DiscoveryEngine, ProfileDirectory, SignalTracker};
pub use error::{AppError, AppResult};
pub use routes::{configure_routes, AppState};
pub use services::{DatingStore, MemoryStore, PostgresStore};
