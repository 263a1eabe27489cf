// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of workspace and resolved configuration,
//! supporting JSON and YAML formats.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retention::RetentionPolicy;
use crate::store::StoreOptions;
use crate::telemetry::TelemetryConfig;

/// Default database location, relative to the workspace root.
pub const DEFAULT_DATABASE_PATH: &str = ".opsight/telemetry.db";

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
}

/// Workspace configuration.
/// Can be defined in .opsight.json or .opsight/config.json in the project root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// SQLite database file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,

    /// How long a writer waits on a locked database
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busy_timeout_ms: Option<u64>,

    /// Retention tier overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<RetentionConfigPartial>,

    /// Default log level when RUST_LOG is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,
}

/// Retention overrides, in days. Absent fields keep the lower layer's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfigPartial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_span_days: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_span_days: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_severity_event_days: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_severity_event_days: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollup_days: Option<u32>,
}

/// Fully resolved retention tiers, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    pub success_span_days: u32,
    pub failed_span_days: u32,
    pub low_severity_event_days: u32,
    pub high_severity_event_days: u32,
    pub rollup_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            success_span_days: 7,
            failed_span_days: 30,
            low_severity_event_days: 7,
            high_severity_event_days: 30,
            rollup_days: 180,
        }
    }
}

/// Resolved configuration after merging all sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub database_path: PathBuf,
    pub busy_timeout_ms: u64,
    pub retention: RetentionConfig,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            busy_timeout_ms: 5_000,
            retention: RetentionConfig::default(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

impl ResolvedConfig {
    /// Database path, with a relative path resolved against `workspace_root`.
    pub fn database_path_in(&self, workspace_root: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            workspace_root.join(&self.database_path)
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    /// Retention tiers, rejecting a zero-day threshold.
    pub fn retention_policy(&self) -> Result<RetentionPolicy, ConfigError> {
        let r = &self.retention;
        RetentionPolicy::from_days(
            r.success_span_days,
            r.failed_span_days,
            r.low_severity_event_days,
            r.high_severity_event_days,
            r.rollup_days,
        )
        .map_err(|e| ConfigError::InvalidValue {
            field: "retention".to_string(),
            message: e.to_string(),
        })
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig::from_level_name(&self.log_level)
            .with_compact(self.log_format == LogFormat::Compact)
    }
}
