// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Opsight command line: drive the pipeline and inspect what it stored.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};

use opsight::config::{self, CliOptions, ResolvedConfig};
use opsight::model::{
    format_timestamp, now_ms, parse_timestamp, TimeWindow, GRANULARITY_QUARTER_HOUR,
};
use opsight::service::{AggregateRequest, CleanupRequest, TelemetryService, OPERATIONS};
use opsight::store::TelemetryStore;
use opsight::telemetry::{init_telemetry, TelemetryConfig};
use opsight::{RollupRecord, Severity, SpanStatus, Timestamp, VERSION};

/// Opsight - operational telemetry pipeline.
#[derive(Parser)]
#[command(name = "opsight")]
#[command(author, version, about = "Operational telemetry pipeline", long_about = None)]
struct Cli {
    /// Telemetry database file
    #[arg(long, global = true, env = "OPSIGHT_DATABASE")]
    database: Option<PathBuf>,

    /// Default log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "OPSIGHT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Show debug output and a pipeline metrics report
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for opsight.
#[derive(Subcommand)]
enum Commands {
    /// Invoke a pipeline operation with a JSON payload
    Call {
        /// Operation name (recordSpan, recordEvent, recordRollup,
        /// aggregateSpansIntoRollups, cleanupExpiredTelemetry)
        name: String,

        /// JSON payload; omit or pass `-` to read stdin
        payload: Option<String>,
    },

    /// Aggregate one window into rollups; defaults to the last completed window
    Aggregate {
        /// Window start (epoch milliseconds or RFC 3339)
        #[arg(long, value_parser = parse_ts, requires = "end")]
        start: Option<Timestamp>,

        /// Window end, exclusive
        #[arg(long, value_parser = parse_ts, requires = "start")]
        end: Option<Timestamp>,

        /// Granularity in minutes
        #[arg(long, default_value_t = GRANULARITY_QUARTER_HOUR)]
        granularity: u32,
    },

    /// Delete expired spans, events, and rollups
    Cleanup {
        /// Reference time; defaults to now
        #[arg(long, value_parser = parse_ts)]
        now: Option<Timestamp>,
    },

    /// List rollups whose window starts in [from, to)
    Rollups {
        #[arg(long, value_parser = parse_ts)]
        from: Timestamp,

        #[arg(long, value_parser = parse_ts)]
        to: Timestamp,

        /// Only this granularity
        #[arg(long)]
        granularity: Option<u32>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the spans and events of one trace
    Trace {
        trace_id: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show row counts
    Stats,

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Initialize a new configuration file
    Init,

    /// Show version information
    Version,
}

/// Config subcommand actions.
#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

fn parse_ts(value: &str) -> Result<Timestamp, String> {
    parse_timestamp(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir()?;
    let workspace_root = config::find_workspace_root(&cwd).unwrap_or(cwd);
    let cli_options = CliOptions {
        database_path: cli.database.clone(),
        log_level: cli.log_level.clone(),
    };
    let config = config::load_config(&workspace_root, cli_options)?;

    let telemetry = if cli.debug {
        TelemetryConfig::debug()
    } else {
        config.telemetry_config()
    };
    init_telemetry(&telemetry)?;

    let reports_metrics = cli.debug && runs_pipeline(&cli.command);
    handle_command(cli.command, &config, &workspace_root).await?;
    if reports_metrics {
        print_metrics_report();
    }
    Ok(())
}

/// Commands that drive pipeline operations and so move the in-process counters.
fn runs_pipeline(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Call { .. } | Commands::Aggregate { .. } | Commands::Cleanup { .. }
    )
}

#[cfg(feature = "telemetry")]
fn print_metrics_report() {
    eprintln!(
        "\n{}",
        opsight::telemetry::GLOBAL_METRICS.snapshot().format_report().dimmed()
    );
}

#[cfg(not(feature = "telemetry"))]
fn print_metrics_report() {}

async fn handle_command(
    command: Commands,
    config: &ResolvedConfig,
    workspace_root: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                println!("{}", serde_json::to_string_pretty(config)?);
            }
        },
        Commands::Init => {
            let path = config::init_config(workspace_root, None)?;
            println!("Created config file: {}", path.display());
        }
        Commands::Version => {
            println!("opsight {}", VERSION);
        }
        Commands::Call { name, payload } => {
            let service = open_service(config, workspace_root)?;
            let payload = read_payload(payload)?;
            let response = service.dispatch(&name, payload).await.with_context(|| {
                format!("{} failed (known operations: {})", name, OPERATIONS.join(", "))
            })?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Aggregate {
            start,
            end,
            granularity,
        } => {
            let window = aggregation_window(start, end, granularity, now_ms())?;
            let service = open_service(config, workspace_root)?;
            let outcome = service
                .aggregate_spans_into_rollups(AggregateRequest {
                    window_start: window.start,
                    window_end: window.end,
                    granularity_min: granularity,
                })
                .await?;
            println!(
                "{} {} rollup(s) for [{}, {})",
                "✓".green(),
                outcome.rollups_created.to_string().bright_white(),
                format_timestamp(window.start),
                format_timestamp(window.end)
            );
        }
        Commands::Cleanup { now } => {
            let service = open_service(config, workspace_root)?;
            let current_time = now.unwrap_or_else(now_ms);
            let outcome = service
                .cleanup_expired_telemetry(CleanupRequest { current_time })
                .await?;
            println!(
                "{} swept at {}: {} span(s), {} event(s), {} rollup(s) deleted",
                "✓".green(),
                format_timestamp(current_time),
                outcome.deleted_spans,
                outcome.deleted_events,
                outcome.deleted_rollups
            );
        }
        Commands::Rollups {
            from,
            to,
            granularity,
            json,
        } => {
            let service = open_service(config, workspace_root)?;
            let rollups = service.rollups_between(from, to, granularity).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rollups)?);
            } else if rollups.is_empty() {
                println!("{}", "No rollups in range".dimmed());
            } else {
                for rollup in &rollups {
                    print_rollup(rollup);
                }
            }
        }
        Commands::Trace { trace_id, json } => {
            let service = open_service(config, workspace_root)?;
            let trace = service.trace(&trace_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&trace)?);
            } else if trace.is_empty() {
                println!("{}", format!("No spans or events for trace {}", trace_id).dimmed());
            } else {
                println!("{}", format!("Trace {}", trace_id).bright_blue().bold());
                for span in &trace.spans {
                    let duration = span
                        .duration_ms
                        .map(|d| format!("{}ms", d))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {} {} {}/{} {}",
                        format_timestamp(span.recorded_at).dimmed(),
                        paint_status(span.status),
                        span.source,
                        span.operation.bright_white(),
                        duration
                    );
                }
                for event in &trace.events {
                    println!(
                        "  {} {} {}/{} {}",
                        format_timestamp(event.recorded_at).dimmed(),
                        paint_severity(event.severity),
                        event.source,
                        event.event_type.bright_white(),
                        event.message
                    );
                }
            }
        }
        Commands::Stats => {
            let service = open_service(config, workspace_root)?;
            let counts = service.counts().await?;
            println!("{}", "Telemetry store".bright_blue().bold());
            println!("Spans:   {}", counts.spans);
            println!("Events:  {}", counts.events);
            println!("Rollups: {}", counts.rollups);
        }
    }

    Ok(())
}

/// The explicit window when both bounds are given, else the last completed
/// aligned window of `granularity` before `now`.
fn aggregation_window(
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    granularity: u32,
    now: Timestamp,
) -> anyhow::Result<TimeWindow> {
    let window = match (start, end) {
        (Some(start), Some(end)) => TimeWindow::new(start, end)?,
        _ => TimeWindow::last_completed(now, granularity)?,
    };
    Ok(window)
}

fn open_service(config: &ResolvedConfig, workspace_root: &Path) -> anyhow::Result<TelemetryService> {
    let path = config.database_path_in(workspace_root);
    let store = TelemetryStore::open_with(&path, &config.store_options())
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(TelemetryService::with_policy(store, config.retention_policy()?))
}

fn read_payload(arg: Option<String>) -> anyhow::Result<serde_json::Value> {
    let text = match arg.as_deref() {
        Some("-") | None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(inline) => inline.to_string(),
    };
    serde_json::from_str(&text).context("payload is not valid JSON")
}

fn print_rollup(rollup: &RollupRecord) {
    let latency = match (rollup.p95_duration_ms, rollup.max_duration_ms) {
        (Some(p95), Some(max)) => format!("p95 {}ms, max {}ms", p95, max),
        _ => "no durations".to_string(),
    };
    let rate = format!("{:.1}%", rollup.success_rate() * 100.0);
    let rate = if rollup.error_count > 0 {
        rate.yellow()
    } else {
        rate.green()
    };
    println!(
        "{} [{}m] {}/{}: {} span(s), {} error(s), {} event(s), {} ok, {}",
        format_timestamp(rollup.window_start).dimmed(),
        rollup.granularity_min,
        rollup.source,
        rollup.operation.bright_white(),
        rollup.span_count,
        rollup.error_count,
        rollup.event_count,
        rate,
        latency
    );
}

fn paint_status(status: SpanStatus) -> ColoredString {
    match status {
        SpanStatus::Ok => status.as_str().green(),
        SpanStatus::Open => status.as_str().cyan(),
        SpanStatus::Error => status.as_str().red(),
        SpanStatus::Timeout | SpanStatus::Cancelled => status.as_str().yellow(),
    }
}

fn paint_severity(severity: Severity) -> ColoredString {
    match severity {
        Severity::Debug => severity.as_str().dimmed(),
        Severity::Info => severity.as_str().normal(),
        Severity::Warn => severity.as_str().yellow(),
        Severity::Error => severity.as_str().red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_aggregate_with_rfc3339() {
        let cli = Cli::try_parse_from([
            "opsight",
            "aggregate",
            "--start",
            "2026-01-01T00:00:00Z",
            "--end",
            "1767226500000",
        ])
        .unwrap();

        match cli.command {
            Commands::Aggregate {
                start,
                end,
                granularity,
            } => {
                assert_eq!(start, Some(1_767_225_600_000));
                assert_eq!(end, Some(1_767_226_500_000));
                assert_eq!(granularity, GRANULARITY_QUARTER_HOUR);
            }
            _ => panic!("expected aggregate"),
        }
    }

    #[test]
    fn test_aggregate_needs_both_bounds() {
        assert!(Cli::try_parse_from(["opsight", "aggregate", "--start", "0"]).is_err());
    }

    #[test]
    fn test_aggregate_defaults_to_last_completed_window() {
        let cli = Cli::try_parse_from(["opsight", "aggregate", "--granularity", "60"]).unwrap();
        let Commands::Aggregate {
            start,
            end,
            granularity,
        } = cli.command
        else {
            panic!("expected aggregate");
        };

        // 2026-01-01T10:20:00Z
        let now = 1_767_225_600_000 + 10 * 3_600_000 + 20 * 60_000;
        let window = aggregation_window(start, end, granularity, now).unwrap();
        assert_eq!(window.start, 1_767_225_600_000 + 9 * 3_600_000);
        assert_eq!(window.end, 1_767_225_600_000 + 10 * 3_600_000);

        let explicit = aggregation_window(Some(5), Some(10), granularity, now).unwrap();
        assert_eq!((explicit.start, explicit.end), (5, 10));
    }

    #[test]
    fn test_metrics_report_only_for_pipeline_commands() {
        let cli = Cli::try_parse_from(["opsight", "cleanup"]).unwrap();
        assert!(runs_pipeline(&cli.command));
        let cli = Cli::try_parse_from(["opsight", "stats"]).unwrap();
        assert!(!runs_pipeline(&cli.command));
    }

    #[test]
    fn test_rejects_bad_timestamp() {
        assert!(Cli::try_parse_from(["opsight", "cleanup", "--now", "yesterday"]).is_err());
    }
}
