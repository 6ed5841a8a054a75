//! Metric helpers for `rmcast`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking fragments handed to the network.
pub const FRAGMENTS_SENT: &str = "rmcast_fragments_sent_total";
/// Name of the counter tracking datagrams accepted by the Reassembler.
pub const FRAGMENTS_RECEIVED: &str = "rmcast_fragments_received_total";
/// Name of the counter tracking retransmission requests issued.
pub const RETRANSMIT_REQUESTS: &str = "rmcast_retransmit_requests_total";
/// Name of the counter tracking fragments resent from the cache.
pub const RETRANSMISSIONS: &str = "rmcast_retransmissions_total";
/// Name of the counter tracking objects delivered to the application.
pub const OBJECTS_DELIVERED: &str = "rmcast_objects_delivered_total";
/// Name of the counter tracking objects abandoned after the retry budget.
pub const OBJECTS_ABANDONED: &str = "rmcast_objects_abandoned_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "rmcast_errors_total";

/// Where in the pipeline a retransmission request originated.
#[derive(Clone, Copy, Debug)]
pub enum RequestSource {
    /// Eager predecessor check in the Reassembler.
    GapDetection,
    /// Full scan by the IntegrityChecker.
    Sweep,
}

impl RequestSource {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            RequestSource::GapDetection => "gap",
            RequestSource::Sweep => "sweep",
        }
    }
}

macro_rules! count {
    ($name:expr $(, $label:expr => $value:expr)*) => {{
        #[cfg(feature = "metrics")]
        counter!($name $(, $label => $value)*).increment(1);
    }};
}

/// Record a fragment transmitted by the send loop.
pub fn inc_fragments_sent() { count!(FRAGMENTS_SENT); }

/// Record a datagram taken from the Listener.
pub fn inc_fragments_received() { count!(FRAGMENTS_RECEIVED); }

/// Record an issued retransmission request.
pub fn inc_retransmit_requests(
    #[cfg_attr(not(feature = "metrics"), expect(unused_variables))] source: RequestSource,
) {
    count!(RETRANSMIT_REQUESTS, "source" => source.as_str());
}

/// Record a fragment resent from the retransmission cache.
pub fn inc_retransmissions() { count!(RETRANSMISSIONS); }

/// Record an object delivered to the application.
pub fn inc_objects_delivered() { count!(OBJECTS_DELIVERED); }

/// Record an abandoned object.
pub fn inc_objects_abandoned() { count!(OBJECTS_ABANDONED); }

/// Record an error occurrence.
pub fn inc_errors() { count!(ERRORS_TOTAL); }
