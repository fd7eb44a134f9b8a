//! Error type definitions for the channel filter
//!
//! This module defines all error types used throughout the crate, providing a
//! hierarchical error system that keeps filter failures, configuration
//! failures and job-level failures apart.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Filter pass errors
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors outside a filter pass (creating outputs, exporting)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised while streaming a playlist or guide document
#[derive(Error, Debug)]
pub enum FilterError {
    /// Reading the input or writing an output failed
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The guide document could not be tokenized
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// Input bytes were not valid UTF-8
    #[error("Invalid encoding at line {line}: {message}")]
    Encoding { line: usize, message: String },
}

/// Configuration specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration could not be parsed or extracted
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// A rule selection names an item the category catalog does not know
    #[error("Unknown rule item '{item}' in category '{category}'")]
    UnknownRuleItem { category: String, item: String },

    /// A keyword matcher failed to compile
    #[error("Invalid keyword pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl AppError {
    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl FilterError {
    /// Create an XML error from a quick-xml failure and the reader position
    pub fn xml<E: std::fmt::Display>(position: u64, error: E) -> Self {
        Self::Xml {
            position,
            message: error.to_string(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Parse(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_error_converts_into_app_error() {
        let error: AppError = FilterError::xml(42, "unexpected end").into();
        assert!(matches!(error, AppError::Filter(FilterError::Xml { position: 42, .. })));
        assert_eq!(
            error.to_string(),
            "Filter error: XML parse error at byte 42: unexpected end"
        );
    }

    #[test]
    fn test_unknown_rule_item_message() {
        let error = ConfigError::UnknownRuleItem {
            category: "news".to_string(),
            item: "fox".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unknown rule item 'fox' in category 'news'"
        );
    }
}
