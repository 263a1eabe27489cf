// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the telemetry pipeline.
//!
//! This module provides strongly-typed errors for the pipeline and its configuration,
//! using `thiserror` for ergonomic error definitions and `anyhow` for error propagation
//! at the binary boundary.

use thiserror::Error;

/// Errors raised by ingestion, aggregation, retention, and the store.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TelemetryError {
    /// Create an invalid value error for a named field.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }

    /// Check if this error rejects a malformed request.
    ///
    /// Malformed requests are refused before anything is written.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::InvalidValue { .. }
                | Self::InvalidInput(_)
                | Self::UnknownOperation(_)
        )
    }
}

impl From<rusqlite::Error> for TelemetryError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        // A payload that does not deserialize is a malformed request,
        // everything else is a response encoding problem.
        match err.classify() {
            serde_json::error::Category::Data | serde_json::error::Category::Syntax => {
                Self::InvalidInput(err.to_string())
            }
            _ => Self::Serialization(err.to_string()),
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result alias for pipeline operations.
pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
