//! Process-wide log output.
//!
//! Every line has the shape `<timestamp> - <component> - <LEVEL> - <message>`
//! and goes both to standard output and to an append-only log file. A
//! `LogContext` is built once in `main` and handed to the producer or consumer
//! entry point; installing it a second time is an error.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,lapin=warn";
const LINE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Event formatter for the `<timestamp> - <component> - <LEVEL> - <message>` layout.
#[derive(Debug, Clone)]
pub struct LineFormat {
    component: String,
}

impl LineFormat {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - {} - ",
            Local::now().format(LINE_TIME_FORMAT),
            self.component,
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[derive(Debug, Clone)]
pub struct LogContext {
    component: String,
    log_file: PathBuf,
}

impl LogContext {
    pub fn new(component: impl Into<String>, log_file: impl Into<PathBuf>) -> Self {
        Self {
            component: component.into(),
            log_file: log_file.into(),
        }
    }

    /// Build the context and install it as the global subscriber.
    pub fn init(component: impl Into<String>, log_file: impl Into<PathBuf>) -> Result<Self> {
        let context = Self::new(component, log_file);
        context.install()?;
        Ok(context)
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Subscriber writing through `make_writer` with this context's line format.
    pub fn subscriber<W>(
        &self,
        filter: EnvFilter,
        make_writer: W,
    ) -> impl Subscriber + Send + Sync + 'static
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = tracing_subscriber::fmt::layer()
            .event_format(LineFormat::new(self.component.clone()))
            .with_ansi(false)
            .with_writer(make_writer);
        tracing_subscriber::registry().with(filter).with(layer)
    }

    pub fn install(&self) -> Result<()> {
        let file = open_log_file(&self.log_file)?;
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let subscriber = self.subscriber(filter, io::stdout.and(Mutex::new(file)));

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| anyhow!("Logging is already initialized for this process: {}", e))
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create log directory {}", parent.display()))?;
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context(format!("Failed to open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn capture(context: &LogContext, emit: impl FnOnce()) -> String {
        let file = open_log_file(context.log_file()).unwrap();
        let filter = EnvFilter::new("info");
        let subscriber = context.subscriber(filter, Mutex::new(file));
        tracing::subscriber::with_default(subscriber, emit);
        std::fs::read_to_string(context.log_file()).unwrap()
    }

    #[test]
    fn lines_have_timestamp_component_level_message() {
        let dir = tempdir().unwrap();
        let context = LogContext::new("consumer", dir.path().join("transactions.log"));

        let output = capture(&context, || {
            tracing::info!("Transaction processed - Order ID: 4242");
            tracing::error!("Failed to decode message: EOF");
        });

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let parts: Vec<&str> = lines[0].splitn(4, " - ").collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].len(), "2024-01-01 00:00:00,000".len());
        assert_eq!(parts[1], "consumer");
        assert_eq!(parts[2], "INFO");
        assert_eq!(parts[3], "Transaction processed - Order ID: 4242");

        let failure = " - consumer - ERROR - Failed to decode message: EOF";
        assert!(lines[1].contains(failure));
    }

    #[test]
    fn filter_drops_debug_and_fields_are_kept() {
        let dir = tempdir().unwrap();
        let context = LogContext::new("producer", dir.path().join("nested").join("tx.log"));

        let output = capture(&context, || {
            tracing::debug!("not shown");
            tracing::warn!(attempt = 2, "Waiting for RabbitMQ...");
        });

        let warning = " - producer - WARN - Waiting for RabbitMQ... attempt=2";
        assert!(!output.contains("not shown"));
        assert!(output.contains(warning));
    }

    #[test]
    fn log_file_is_appended() {
        let dir = tempdir().unwrap();
        let context = LogContext::new("producer", dir.path().join("tx.log"));

        capture(&context, || tracing::info!("first"));
        let output = capture(&context, || tracing::info!("second"));

        assert_eq!(output.lines().count(), 2);
    }
}
