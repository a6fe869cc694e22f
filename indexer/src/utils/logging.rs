use std::collections::HashMap;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Span fields rendered in their own console columns.
const MODE_FIELD: &str = "mode";
const RANGE_FIELDS: (&str, &str) = ("from", "to");

/// Fields recorded on a span, kept in its extensions for the formatters.
#[derive(Debug, Clone, Default)]
pub struct SpanFields {
    pub fields: HashMap<String, String>,
}

impl Visit for SpanFields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields.insert(field.name().to_string(), format!("{:?}", value).trim_matches('"').to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }
}

pub struct FieldCollectorLayer;

impl<S> Layer<S> for FieldCollectorLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &tracing::span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = SpanFields::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &tracing::span::Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        let mut fields = extensions.remove::<SpanFields>().unwrap_or_default();
        values.record(&mut fields);
        extensions.insert(fields);
    }
}

/// Walk from the current span to the root, nearest value wins.
fn span_fields<S, N>(ctx: &FmtContext<'_, S, N>) -> HashMap<String, String>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let mut merged = HashMap::new();
    if let Some(scope) = ctx.event_scope() {
        for span in scope {
            if let Some(fields) = span.extensions().get::<SpanFields>() {
                for (key, value) in &fields.fields {
                    merged.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
    }
    merged
}

// Pretty formatter is formatted for console readability
pub struct PrettyFormatter;

impl<S, N> FormatEvent<S, N> for PrettyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let now = Utc::now().format("%y-%m-%d %H:%M:%S").to_string();

        let ts_color = "\x1b[96m";
        let level_color = match *meta.level() {
            Level::TRACE => "\x1b[90m",
            Level::DEBUG => "\x1b[34m",
            Level::INFO => "\x1b[32m",
            Level::WARN => "\x1b[33m",
            Level::ERROR => "\x1b[31m",
        };
        let msg_color = "\x1b[97m";
        let column_color = "\x1b[92m";
        let field_color = "\x1b[90m";
        let reset = "\x1b[0m";

        let spans = span_fields(ctx);
        let mode = spans.get(MODE_FIELD).map(String::as_str).unwrap_or("-");
        let range = match (spans.get(RANGE_FIELDS.0), spans.get(RANGE_FIELDS.1)) {
            (Some(from), Some(to)) => format!("#{from}..#{to}"),
            _ => "-".to_string(),
        };

        let mut visitor = FieldExtractor::default();
        event.record(&mut visitor);

        // Timestamp | Level | Mode | Chunk | Service | Message (fields)
        write!(writer, "{ts_color}{now}{reset} {field_color}|{reset} ")?;
        write!(writer, "{level_color}{:<5}{reset} {field_color}|{reset} ", *meta.level())?;
        write!(writer, "{column_color}{mode:<8}{reset} {field_color}|{reset} ")?;
        write!(writer, "{column_color}{range:<22}{reset} {field_color}|{reset} ")?;
        write!(writer, "{column_color}{:<10}{reset} {field_color}|{reset} ", extract_service_name(meta.target()))?;
        write!(writer, "{msg_color}{}{reset}", visitor.message)?;

        if !visitor.fields.is_empty() {
            let rendered: Vec<String> =
                visitor.fields.iter().map(|(name, value)| format!("{field_color}{name}={value}{reset}")).collect();
            write!(writer, " ({})", rendered.join(", "))?;
        }

        writeln!(writer)
    }
}

#[derive(Default)]
struct FieldExtractor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldExtractor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{:?}", value).trim_matches('"').to_string();
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

// JSON formatter for structured logs suitable for Loki/Grafana
pub struct JsonEventFormatter;

#[derive(Default)]
struct JsonFieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl Visit for JsonFieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let v = format!("{:?}", value).trim_matches('"').to_string();
        if field.name() == "message" {
            self.message = Some(v);
        } else {
            self.fields.insert(field.name().to_string(), Value::String(v));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonEventFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();

        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut root = Map::new();
        root.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)));
        root.insert("level".into(), Value::String(meta.level().to_string()));
        root.insert("target".into(), Value::String(meta.target().to_string()));
        root.insert("service".into(), Value::String(extract_service_name(meta.target()).to_string()));
        if let Some(file) = meta.file() {
            root.insert("filename".into(), Value::String(file.to_string()));
        }
        if let Some(line) = meta.line() {
            root.insert("line_number".into(), Value::from(line));
        }
        if let Some(message) = visitor.message.take() {
            root.insert("message".into(), Value::String(message));
        }

        let mut fields = visitor.fields;
        if let Some(span) = ctx.lookup_current() {
            fields.insert("span_name".into(), Value::String(span.metadata().name().to_string()));
        }
        for (key, value) in span_fields(ctx) {
            fields.entry(key).or_insert(Value::String(value));
        }
        if !fields.is_empty() {
            root.insert("fields".into(), Value::Object(fields));
        }

        let line = serde_json::to_string(&Value::Object(root)).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

/// Initialize the tracing subscriber with
/// - PrettyFormatter for console readability (when LOG_FORMAT != "json")
/// - JsonEventFormatter for json logging (when LOG_FORMAT = "json")
///
/// This will also install color_eyre to handle the panic in the application
pub fn init_logging() {
    color_eyre::install().expect("Unable to install color_eyre");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(Level::INFO.into())
            .parse("indexer=info,indexer_resilience=info,indexer_tx_decoder=info")
            .expect("Invalid filter directive and Logger control")
    });

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let fmt_layer = fmt::layer().with_target(true).with_thread_ids(false).with_file(true).with_line_number(true);
    let fmt_layer = if log_format == "json" {
        fmt_layer.event_format(JsonEventFormatter).boxed()
    } else {
        fmt_layer.event_format(PrettyFormatter).boxed()
    };

    let subscriber =
        Registry::default().with(env_filter).with(FieldCollectorLayer).with(fmt_layer).with(ErrorLayer::default());
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global default subscriber");
}

/// Maps crate names to short display names for the service column
fn extract_service_name(target: &str) -> &'static str {
    if target.starts_with("indexer_resilience") {
        "RESILIENCE"
    } else if target.starts_with("indexer_tx_decoder") {
        "DECODER"
    } else if target.starts_with("indexer::core::client::rpc") {
        "RPC"
    } else if target.starts_with("indexer::core::client::database") {
        "DATABASE"
    } else if target.starts_with("indexer::cache") {
        "CACHE"
    } else if target.starts_with("indexer") {
        "-"
    } else {
        "EXTERNAL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("indexer_resilience::retry", "RESILIENCE")]
    #[case("indexer_tx_decoder", "DECODER")]
    #[case("indexer::core::client::rpc::http", "RPC")]
    #[case("indexer::cache", "CACHE")]
    #[case("indexer::orchestrator", "-")]
    #[case("sqlx::query", "EXTERNAL")]
    fn test_service_name(#[case] target: &str, #[case] expected: &str) {
        assert_eq!(extract_service_name(target), expected);
    }
}
