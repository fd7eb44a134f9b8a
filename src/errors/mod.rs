//! Centralized error handling for the channel filter
//!
//! This module provides the error hierarchy shared by the filter engine, the
//! configuration layer and the job orchestrator.
//!
//! # Error Categories
//!
//! - **Filter Errors**: read/parse/write failures inside a playlist or guide pass
//! - **Config Errors**: missing or malformed configuration and rule definitions
//! - **Application Errors**: everything the job layer can surface
//!
//! A cancelled run is an outcome, not an error.
//!
//! # Usage
//!
//! ```rust
//! use channel_filter::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for filter pass Results
pub type FilterResult<T> = Result<T, FilterError>;

/// Convenience type alias for configuration Results
pub type ConfigResult<T> = Result<T, ConfigError>;
