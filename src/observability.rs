use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("nexus.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("nexus.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("nexus.client.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("nexus.stream.events");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("nexus.stream.fragments");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("nexus.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("nexus.stream.bytes");

pub(crate) static IMAGES_GENERATED: Counter = Counter::new("nexus.image.generated");
pub(crate) static IMAGES_EMPTY: Counter = Counter::new("nexus.image.empty");

pub(crate) static CREDENTIAL_ACQUISITIONS: Counter =
    Counter::new("nexus.credential.acquisitions");
pub(crate) static CREDENTIAL_DECLINED: Counter = Counter::new("nexus.credential.declined");

pub(crate) static SESSION_SENDS: Counter = Counter::new("nexus.session.sends");
pub(crate) static SESSION_REJECTED_SENDS: Counter = Counter::new("nexus.session.rejected_sends");
pub(crate) static SESSION_FAILURES: Counter = Counter::new("nexus.session.failures");
pub(crate) static SESSION_REPLY_DURATION: Moments =
    Moments::new("nexus.session.reply_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&IMAGES_GENERATED);
    collector.register_counter(&IMAGES_EMPTY);

    collector.register_counter(&CREDENTIAL_ACQUISITIONS);
    collector.register_counter(&CREDENTIAL_DECLINED);

    collector.register_counter(&SESSION_SENDS);
    collector.register_counter(&SESSION_REJECTED_SENDS);
    collector.register_counter(&SESSION_FAILURES);
    collector.register_moments(&SESSION_REPLY_DURATION);
}
