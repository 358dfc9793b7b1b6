use crate::traits::{Labels, Telemetry, TelemetrySpan};
use metrics::{counter, histogram, Label};
use std::time::Instant;
use tracing::{debug, Span};

pub const SPAN_EXTRACT: &str = "document.extract";
pub const COUNTER_EXTRACTIONS: &str = "document_extraction_total";
pub const COUNTER_ERRORS: &str = "document_extraction_errors_total";
pub const HISTOGRAM_DURATION_MS: &str = "document_extraction_duration_ms";
pub const HISTOGRAM_CONTENT_LENGTH: &str = "document_extraction_content_length";

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

struct NoopSpan;

impl TelemetrySpan for NoopSpan {
    fn set_attribute(&mut self, _key: &str, _value: String) {}

    fn end(self: Box<Self>) {}
}

impl Telemetry for NoopTelemetry {
    fn start_span(&self, _name: &str, _attributes: Labels<'_>) -> Box<dyn TelemetrySpan> {
        Box::new(NoopSpan)
    }

    fn increment_counter(&self, _name: &str, _labels: Labels<'_>) {}

    fn record_histogram(&self, _name: &str, _value: f64, _labels: Labels<'_>) {}
}

/// Forwards counters and histograms to the `metrics` facade and spans to `tracing`,
/// so whichever recorder and subscriber the process installed receive them.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsTelemetry;

fn to_labels(labels: Labels<'_>) -> Vec<Label> {
    labels
        .iter()
        .map(|(key, value)| Label::new(key.to_string(), value.clone()))
        .collect()
}

struct TracingSpan {
    name: String,
    span: Span,
    started: Instant,
}

impl TelemetrySpan for TracingSpan {
    fn set_attribute(&mut self, key: &str, value: String) {
        debug!(parent: &self.span, key, value = %value, "span attribute");
    }

    fn end(self: Box<Self>) {
        debug!(
            parent: &self.span,
            span = %self.name,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "span ended"
        );
    }
}

impl Telemetry for MetricsTelemetry {
    fn start_span(&self, name: &str, attributes: Labels<'_>) -> Box<dyn TelemetrySpan> {
        let span = tracing::info_span!("telemetry", otel.name = %name);
        let mut opened = TracingSpan {
            name: name.to_string(),
            span,
            started: Instant::now(),
        };
        for (key, value) in attributes {
            opened.set_attribute(key, value.clone());
        }
        Box::new(opened)
    }

    fn increment_counter(&self, name: &str, labels: Labels<'_>) {
        counter!(name.to_string(), to_labels(labels)).increment(1);
    }

    fn record_histogram(&self, name: &str, value: f64, labels: Labels<'_>) {
        histogram!(name.to_string(), to_labels(labels)).record(value);
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Event {
        SpanStarted(String),
        SpanAttribute(String, String),
        SpanEnded(String),
        Counter(String, Vec<(String, String)>),
        Histogram(String, f64),
    }

    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingTelemetry {
        pub(crate) events: Arc<Mutex<Vec<Event>>>,
    }

    impl RecordingTelemetry {
        pub(crate) fn events(&self) -> Vec<Event> {
            self.events.lock().map(|events| events.clone()).unwrap_or_default()
        }

        fn push(&self, event: Event) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }
    }

    struct RecordingSpan {
        name: String,
        sink: RecordingTelemetry,
    }

    impl TelemetrySpan for RecordingSpan {
        fn set_attribute(&mut self, key: &str, value: String) {
            self.sink.push(Event::SpanAttribute(key.to_string(), value));
        }

        fn end(self: Box<Self>) {
            self.sink.push(Event::SpanEnded(self.name.clone()));
        }
    }

    impl Telemetry for RecordingTelemetry {
        fn start_span(&self, name: &str, attributes: Labels<'_>) -> Box<dyn TelemetrySpan> {
            self.push(Event::SpanStarted(name.to_string()));
            for (key, value) in attributes {
                self.push(Event::SpanAttribute(key.to_string(), value.clone()));
            }
            Box::new(RecordingSpan {
                name: name.to_string(),
                sink: self.clone(),
            })
        }

        fn increment_counter(&self, name: &str, labels: Labels<'_>) {
            let labels = labels
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect();
            self.push(Event::Counter(name.to_string(), labels));
        }

        fn record_histogram(&self, name: &str, value: f64, _labels: Labels<'_>) {
            self.push(Event::Histogram(name.to_string(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_and_metrics_sinks_accept_calls_without_a_recorder() {
        let labels = [("extension", ".pdf".to_string())];
        for sink in [&NoopTelemetry as &dyn Telemetry, &MetricsTelemetry] {
            let mut span = sink.start_span(SPAN_EXTRACT, &labels);
            span.set_attribute("extraction.method", "pdf".to_string());
            span.end();
            sink.increment_counter(COUNTER_EXTRACTIONS, &labels);
            sink.record_histogram(HISTOGRAM_DURATION_MS, 12.5, &labels);
        }
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = recording::RecordingTelemetry::default();
        let span = sink.start_span("demo", &[("k", "v".to_string())]);
        span.end();

        assert_eq!(
            sink.events(),
            vec![
                recording::Event::SpanStarted("demo".to_string()),
                recording::Event::SpanAttribute("k".to_string(), "v".to_string()),
                recording::Event::SpanEnded("demo".to_string()),
            ]
        );
    }
}
