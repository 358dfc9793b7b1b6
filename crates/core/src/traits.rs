pub type Labels<'a> = &'a [(&'a str, String)];

/// An open span. `end` consumes it; a span that is dropped without `end` is simply discarded.
pub trait TelemetrySpan: Send {
    fn set_attribute(&mut self, key: &str, value: String);

    fn end(self: Box<Self>);
}

pub trait Telemetry: Send + Sync {
    fn start_span(&self, name: &str, attributes: Labels<'_>) -> Box<dyn TelemetrySpan>;

    fn increment_counter(&self, name: &str, labels: Labels<'_>);

    fn record_histogram(&self, name: &str, value: f64, labels: Labels<'_>);
}
