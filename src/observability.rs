use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("jarvis.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("jarvis.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("jarvis.client.request_duration_seconds");

pub(crate) static CONNECTION_OPENS: Counter = Counter::new("jarvis.connection.opens");
pub(crate) static CONNECTION_CLOSES: Counter = Counter::new("jarvis.connection.closes");
pub(crate) static CONNECTION_FAILURES: Counter = Counter::new("jarvis.connection.failures");
pub(crate) static CONNECTION_FRAGMENTS: Counter = Counter::new("jarvis.connection.fragments");
pub(crate) static CONNECTION_FRAGMENT_BYTES: Counter =
    Counter::new("jarvis.connection.fragment_bytes");
pub(crate) static CONNECTION_SENDS: Counter = Counter::new("jarvis.connection.sends");
pub(crate) static CONNECTION_DROPPED_SENDS: Counter =
    Counter::new("jarvis.connection.dropped_sends");
pub(crate) static CONNECTION_OPEN_LATENCY: Moments =
    Moments::new("jarvis.connection.open_latency_seconds");

pub(crate) static MUTATION_ATTEMPTS: Counter = Counter::new("jarvis.mutation.attempts");
pub(crate) static MUTATION_ROLLBACKS: Counter = Counter::new("jarvis.mutation.rollbacks");
pub(crate) static MUTATION_RESYNC_FAILURES: Counter =
    Counter::new("jarvis.mutation.resync_failures");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&CONNECTION_OPENS);
    collector.register_counter(&CONNECTION_CLOSES);
    collector.register_counter(&CONNECTION_FAILURES);
    collector.register_counter(&CONNECTION_FRAGMENTS);
    collector.register_counter(&CONNECTION_FRAGMENT_BYTES);
    collector.register_counter(&CONNECTION_SENDS);
    collector.register_counter(&CONNECTION_DROPPED_SENDS);
    collector.register_moments(&CONNECTION_OPEN_LATENCY);

    collector.register_counter(&MUTATION_ATTEMPTS);
    collector.register_counter(&MUTATION_ROLLBACKS);
    collector.register_counter(&MUTATION_RESYNC_FAILURES);
}
