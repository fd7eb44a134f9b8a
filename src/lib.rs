//! Streaming M3U playlist and XMLTV guide filter engine.
//!
//! A [`job::FilterJob`] runs the guide counting pass, the playlist filter and the
//! guide filter as one pausable, cancellable background job, reporting progress
//! over a broadcast channel.

pub mod config;
pub mod errors;
pub mod filters;
pub mod job;
pub mod rules;
pub mod run;
pub mod utils;

pub use errors::{AppError, AppResult};
