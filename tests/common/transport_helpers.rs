//! Shared setup for transport integration tests.

#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::time::Duration;

use rmcast::{
    EncodedObject,
    FragmentHeader,
    FragmentIndex,
    ObjectId,
    ProtocolConfig,
    Transport,
    TransportConfig,
    config::{DEFAULT_GROUP, DEFAULT_PORT},
    records::{CRAWL_RECORD_TAG, SearchPayload},
};
use rmcast_testing::MemoryNetwork;

pub const CAP: usize = 1024;
pub const INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for a transport playing role `origin`.
pub fn config(origin: &str) -> TransportConfig {
    TransportConfig::new(DEFAULT_GROUP, DEFAULT_PORT, origin)
}

/// A transport on `network` that is already receiving.
pub fn receiving(network: &MemoryNetwork, config: TransportConfig) -> Transport<SearchPayload> {
    let transport = network.transport(config).expect("transport");
    transport.start_receiving().expect("start receiving");
    transport
}

/// Object id and final fragment index `payload` will carry as send number
/// `sequence` of `sender`.
pub fn layout(
    sender: &Transport<SearchPayload>,
    sequence: u64,
    payload: &SearchPayload,
) -> (ObjectId, FragmentIndex) {
    let object = EncodedObject::encode_for_send(payload, sender.channel_id(), sequence)
        .expect("encode");
    let total = object.compressed().len().div_ceil(CAP).max(1);
    let last = u32::try_from(total - 1).expect("fragment count fits in u32");
    (object.object_id().clone(), FragmentIndex::new(last))
}

/// Whether `header` belongs to an application crawl record.
pub fn is_crawl(header: &FragmentHeader) -> bool {
    header.object_type().as_str() == CRAWL_RECORD_TAG
}

/// Protocol bounds with a small retransmission cache.
pub fn small_cache(capacity: usize) -> ProtocolConfig {
    ProtocolConfig::default().with_retransmit_cache_capacity(
        std::num::NonZeroUsize::new(capacity).unwrap_or(std::num::NonZeroUsize::MIN),
    )
}
