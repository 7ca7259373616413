//! Tracing layer that writes events to a per-context JSONL file.

use std::fmt::Write as FmtWrite;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

use super::entry::JsonLogEntry;
use super::writer::ContextLogWriter;

/// A tracing layer bound to one browsing context label.
pub struct JsonlLayer {
    writer: Arc<ContextLogWriter>,
}

impl JsonlLayer {
    pub fn new(logs_dir: impl AsRef<Path>, context: impl Into<String>) -> std::io::Result<Self> {
        let writer = ContextLogWriter::new(logs_dir, context)?;
        Ok(Self {
            writer: Arc::new(writer),
        })
    }

    pub fn log_path(&self) -> &Path {
        self.writer.path()
    }

    pub fn context(&self) -> &str {
        self.writer.context()
    }
}

impl<S> Layer<S> for JsonlLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = metadata.level().as_str().to_lowercase();

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let mut entry = JsonLogEntry::new(
            level,
            self.writer.context(),
            metadata.target(),
            visitor.message.unwrap_or_default(),
        );
        if !visitor.fields.is_empty() {
            entry = entry.with_fields(serde_json::Value::Object(visitor.fields));
        }
        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                entry = entry.with_span(spans.join(" > "));
            }
        }

        // Logging must never take the app down.
        let _ = self.writer.write(&entry);
    }
}

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl JsonVisitor {
    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);
        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.insert(field, serde_json::Value::String(buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.insert(field, serde_json::Value::Number(n));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, serde_json::Value::String(value.to_string()));
    }
}

/// Builds the global subscriber: env filter, optional console output, and
/// an optional JSONL file for the given context.
pub struct LoggingBuilder {
    context: String,
    logs_dir: Option<PathBuf>,
    console_output: bool,
    env_filter: String,
}

impl LoggingBuilder {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            logs_dir: None,
            console_output: true,
            env_filter: "fastedh=info,fastedh_core=info".to_string(),
        }
    }

    /// Also write JSONL under `logs_dir`.
    pub fn with_logs_dir(mut self, logs_dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = Some(logs_dir.into());
        self
    }

    pub fn no_console(mut self) -> Self {
        self.console_output = false;
        self
    }

    /// Filter used when `RUST_LOG` is unset (e.g. "fastedh_core=debug").
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = filter.into();
        self
    }

    pub fn build_layer(&self) -> std::io::Result<Option<JsonlLayer>> {
        self.logs_dir
            .as_ref()
            .map(|dir| JsonlLayer::new(dir, &self.context))
            .transpose()
    }

    /// Install as the global default subscriber.
    ///
    /// Returns the JSONL file path when file logging is enabled.
    pub fn init(self) -> std::io::Result<Option<PathBuf>> {
        let jsonl = self.build_layer()?;
        let log_path = jsonl.as_ref().map(|layer| layer.log_path().to_path_buf());

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.env_filter));
        let console = self
            .console_output
            .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .with(jsonl)
            .try_init()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AlreadyExists, e))?;

        Ok(log_path)
    }
}
