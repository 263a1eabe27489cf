// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Log subscriber setup.

use std::io;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Configuration for the log subscriber.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Level used when neither RUST_LOG nor a filter directive is set.
    pub default_level: Level,

    /// Log span close events with their timing.
    pub include_span_events: bool,

    /// Include file/line information.
    pub include_file_line: bool,

    /// Include the target module path.
    pub include_target: bool,

    /// Use ANSI colors.
    pub ansi_colors: bool,

    /// Single-line compact format instead of the full format.
    pub compact: bool,

    /// Custom filter directive (overrides default_level but not RUST_LOG).
    pub filter_directive: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_level: Level::WARN,
            include_span_events: false,
            include_file_line: false,
            include_target: true,
            ansi_colors: true,
            compact: true,
            filter_directive: None,
        }
    }
}

impl TelemetryConfig {
    /// Verbose output for `--debug`: every pipeline call with its timing.
    pub fn debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            include_file_line: true,
            include_target: true,
            ansi_colors: true,
            compact: false,
            filter_directive: Some("opsight=debug".to_string()),
        }
    }

    /// Build from a textual level such as `"info"`, falling back to `warn`.
    pub fn from_level_name(level: &str) -> Self {
        Self::default().with_level(Level::from_str(level).unwrap_or(Level::WARN))
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_level.to_string());
        // RUST_LOG takes precedence over everything configured here.
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => fallback(),
        }
    }
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine readable.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> io::Result<()> {
    let span_events = if config.include_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(config.env_filter());
    let result = if config.compact {
        registry.with(fmt_layer.compact()).try_init()
    } else {
        registry.with(fmt_layer).try_init()
    };

    result.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}
