// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::path::PathBuf;

use super::types::{RetentionConfig, RetentionConfigPartial, ResolvedConfig, WorkspaceConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub database_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.opsight.local.json)
/// 3. Workspace config (.opsight.json)
/// 4. Global config (~/.opsight/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    local: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = default_config();

    for config in [global, workspace, local].into_iter().flatten() {
        apply_workspace_config(&mut result, &config);
    }

    // Apply CLI options (highest precedence)
    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    if let Some(ref path) = config.database_path {
        result.database_path = PathBuf::from(path);
    }

    if let Some(timeout) = config.busy_timeout_ms {
        result.busy_timeout_ms = timeout;
    }

    if let Some(ref retention) = config.retention {
        apply_retention(&mut result.retention, retention);
    }

    if let Some(ref level) = config.log_level {
        result.log_level = level.clone();
    }

    if let Some(format) = config.log_format {
        result.log_format = format;
    }
}

fn apply_retention(result: &mut RetentionConfig, partial: &RetentionConfigPartial) {
    if let Some(days) = partial.success_span_days {
        result.success_span_days = days;
    }
    if let Some(days) = partial.failed_span_days {
        result.failed_span_days = days;
    }
    if let Some(days) = partial.low_severity_event_days {
        result.low_severity_event_days = days;
    }
    if let Some(days) = partial.high_severity_event_days {
        result.high_severity_event_days = days;
    }
    if let Some(days) = partial.rollup_days {
        result.rollup_days = days;
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if let Some(ref path) = cli.database_path {
        result.database_path = path.clone();
    }

    if let Some(ref level) = cli.log_level {
        result.log_level = level.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_defaults() {
        let config = merge_config(None, None, None, CliOptions::default());
        assert_eq!(config, ResolvedConfig::default());
    }

    #[test]
    fn test_merge_precedence() {
        let global = WorkspaceConfig {
            database_path: Some("/global.db".to_string()),
            log_level: Some("info".to_string()),
            busy_timeout_ms: Some(100),
            ..Default::default()
        };
        let workspace = WorkspaceConfig {
            database_path: Some("workspace.db".to_string()),
            ..Default::default()
        };
        let local = WorkspaceConfig {
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        let config = merge_config(Some(global), Some(workspace), Some(local), CliOptions::default());

        assert_eq!(config.database_path, PathBuf::from("workspace.db"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.busy_timeout_ms, 100);
    }

    #[test]
    fn test_cli_wins() {
        let workspace = WorkspaceConfig {
            database_path: Some("workspace.db".to_string()),
            log_level: Some("info".to_string()),
            ..Default::default()
        };
        let cli = CliOptions {
            database_path: Some(PathBuf::from("/cli.db")),
            log_level: Some("trace".to_string()),
        };

        let config = merge_config(None, Some(workspace), None, cli);

        assert_eq!(config.database_path, PathBuf::from("/cli.db"));
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_retention_merges_per_field() {
        let global = WorkspaceConfig {
            retention: Some(RetentionConfigPartial {
                success_span_days: Some(3),
                rollup_days: Some(90),
                ..Default::default()
            }),
            ..Default::default()
        };
        let local = WorkspaceConfig {
            retention: Some(RetentionConfigPartial {
                rollup_days: Some(365),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = merge_config(Some(global), None, Some(local), CliOptions::default());

        assert_eq!(config.retention.success_span_days, 3);
        assert_eq!(config.retention.failed_span_days, 30);
        assert_eq!(config.retention.rollup_days, 365);
    }
}
