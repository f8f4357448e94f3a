//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the intake client."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "EMS_INTAKE_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Writer threads stay alive for the life of the process.
struct WriterGuards {
    _console: WorkerGuard,
    _file: WorkerGuard,
}

static GUARDS: OnceCell<WriterGuards> = OnceCell::new();

/// Terminal rendering for the console layer. The log file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Install the global subscriber: console diagnostics on stderr and a daily
/// JSON file under `config.directory`. Stdout is left to command output.
/// Later calls keep the first subscriber.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;

    let file_name = log_file_name(service_name, config);
    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, &file_name));
    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = GUARDS.set(WriterGuards {
        _console: console_guard,
        _file: file_guard,
    });

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console_layer(config.format, console_writer))
        .with(file_layer(file_writer))
        .try_init()
        .ok();

    info!(
        service = %service_name,
        log_file = %config.directory.join(&file_name).display(),
        format = ?config.format,
        "tracing initialised"
    );
    Ok(())
}

fn log_file_name(service_name: &str, config: &LoggingConfig) -> String {
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    format!("{prefix}.log")
}

fn env_filter() -> EnvFilter {
    let custom = std::env::var(LOG_ENV).ok();
    let standard = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(custom.as_deref(), standard.as_deref())
}

/// `EMS_INTAKE_LOG` wins, then `RUST_LOG`, then `info`. A malformed
/// directive is reported on stderr and skipped.
fn filter_from(custom: Option<&str>, standard: Option<&str>) -> EnvFilter {
    for (source, directive) in [(LOG_ENV, custom), (EnvFilter::DEFAULT_ENV, standard)] {
        let Some(directive) = directive else {
            continue;
        };
        match EnvFilter::try_new(directive) {
            Ok(filter) => return filter,
            Err(err) => eprintln!("ignoring invalid {source} directive ({err})"),
        }
    }
    EnvFilter::new(DEFAULT_DIRECTIVE)
}

fn console_layer<S>(format: LogFormat, writer: NonBlocking) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().boxed(),
        LogFormat::Pretty => layer.compact().boxed(),
    }
}

fn file_layer<S>(writer: NonBlocking) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(writer)
        .boxed()
}
