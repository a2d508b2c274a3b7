use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("goblln.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("goblln.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("goblln.client.request_duration_seconds");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("goblln.stream.fragments");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("goblln.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("goblln.stream.bytes");

pub(crate) static INTERPRETER_EMITTED: Counter = Counter::new("goblln.interpreter.emitted");
pub(crate) static INTERPRETER_STOP_PHRASES: Counter =
    Counter::new("goblln.interpreter.stop_phrases");
pub(crate) static INTERPRETER_FENCES: Counter = Counter::new("goblln.interpreter.fences");
pub(crate) static INTERPRETER_TIMEOUTS: Counter = Counter::new("goblln.interpreter.timeouts");
pub(crate) static INTERPRETER_ABORTS: Counter = Counter::new("goblln.interpreter.aborts");
pub(crate) static INTERPRETER_DURATION: Moments =
    Moments::new("goblln.interpreter.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&INTERPRETER_EMITTED);
    collector.register_counter(&INTERPRETER_STOP_PHRASES);
    collector.register_counter(&INTERPRETER_FENCES);
    collector.register_counter(&INTERPRETER_TIMEOUTS);
    collector.register_counter(&INTERPRETER_ABORTS);
    collector.register_moments(&INTERPRETER_DURATION);
}
