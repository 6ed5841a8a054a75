//! Outbound half of the transport.
//!
//! [`SenderHandle`] is the cloneable producer used by the application, the
//! Reassembler and the IntegrityChecker. [`SendLoop`] owns the datagram sink:
//! it fragments encoded objects, records their fragments in the
//! [`RetransmitCache`] and writes each fragment as one datagram. Delivery is
//! best effort at send time; recovery is driven by receivers asking for what
//! they miss.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    codec::EncodedObject,
    config::ProtocolConfig,
    fragment::{ChannelId, Fragment, Fragmenter},
    message::Payload,
    metrics,
    net::DatagramSink,
    retransmit::RetransmitRequest,
};

mod cache;
mod error;
mod queues;

pub use cache::RetransmitCache;
pub use error::SendError;
pub use queues::{Outbound, Priority};
pub(crate) use queues::{OutboundHandle, OutboundQueues};

/// Create a connected sender handle and send loop.
///
/// The loop must be spawned by the caller; it exits once `token` is
/// cancelled and the queued work has been flushed, or once every handle has
/// been dropped.
pub fn sender<S: DatagramSink>(
    sink: S,
    fragmenter: Fragmenter,
    config: &ProtocolConfig,
    token: CancellationToken,
) -> (SenderHandle, SendLoop<S>) {
    let (queues, outbound) = OutboundQueues::bounded(config.send_queue_capacity);
    let cache = Arc::new(RetransmitCache::new(config.retransmit_cache_capacity));
    let handle = SenderHandle {
        outbound,
        cache: Arc::clone(&cache),
        channel_id: fragmenter.channel_id(),
        sequence: Arc::new(AtomicU64::new(0)),
        token: token.clone(),
    };
    let send_loop = SendLoop {
        queues,
        sink,
        fragmenter,
        cache,
        token,
    };
    (handle, send_loop)
}

/// Cloneable producer side of the send loop.
#[derive(Clone, Debug)]
pub struct SenderHandle {
    outbound: OutboundHandle,
    cache: Arc<RetransmitCache>,
    channel_id: ChannelId,
    sequence: Arc<AtomicU64>,
    token: CancellationToken,
}

impl SenderHandle {
    /// Encode `payload` and queue it behind earlier objects.
    ///
    /// Returns once the object is queued, waiting only while the queue is
    /// full. Every call is a distinct object to receivers, even when the
    /// payload repeats an earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] after [`stop`](Self::stop) and
    /// [`SendError::Codec`] if the object cannot be encoded.
    pub async fn send<P: Payload>(&self, payload: &P) -> Result<(), SendError> {
        if self.token.is_cancelled() {
            return Err(SendError::Closed);
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let object = EncodedObject::encode_for_send(payload, self.channel_id, sequence)?;
        self.outbound.push(Outbound::Object(object), Priority::Low).await
    }

    /// Ask the group to resend one fragment.
    ///
    /// The request travels as an ordinary object ahead of queued application
    /// objects. Returns `false` if it could not be queued.
    pub fn request_retransmit(&self, request: &RetransmitRequest) -> bool {
        match EncodedObject::encode_tagged(RetransmitRequest::type_tag(), request) {
            Ok(object) => self.enqueue_control(Outbound::Object(object), "retransmit request"),
            Err(e) => {
                warn!(
                    "failed to encode retransmit request: object_id={}, error={e}",
                    request.object_id()
                );
                metrics::inc_errors();
                false
            }
        }
    }

    /// Resend the requested fragment if this sender still caches it.
    ///
    /// A miss is normal: another peer may hold the object, or it has been
    /// evicted. Returns `true` when a resend was queued.
    pub fn satisfy_retransmit(&self, request: &RetransmitRequest) -> bool {
        let Some(fragment) = self
            .cache
            .fragment(request.object_id(), request.missing_index())
        else {
            tracing::debug!(
                object_id = %request.object_id(),
                index = %request.missing_index(),
                "retransmit request not cached here"
            );
            return false;
        };
        tracing::debug!(
            object_id = %request.object_id(),
            index = %request.missing_index(),
            "retransmit request satisfied"
        );
        self.enqueue_control(Outbound::Resend(fragment), "retransmission")
    }

    fn enqueue_control(&self, item: Outbound, what: &str) -> bool {
        match self.outbound.try_push(item, Priority::High) {
            Ok(()) => true,
            Err(SendError::QueueFull) => {
                warn!("high priority send queue full: dropped={what}");
                metrics::inc_errors();
                false
            }
            Err(e) => {
                debug!("control item not queued: item={what}, error={e}");
                false
            }
        }
    }

    /// Stop accepting work and let the loop flush what is queued.
    ///
    /// Calling this more than once has no further effect.
    pub fn stop(&self) { self.token.cancel(); }

    /// Report whether [`stop`](Self::stop) has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool { self.token.is_cancelled() }

    /// Access the retransmission cache.
    #[must_use]
    pub fn cache(&self) -> &RetransmitCache { &self.cache }
}

/// Background loop draining the outbound queues into the network.
pub struct SendLoop<S> {
    queues: OutboundQueues,
    sink: S,
    fragmenter: Fragmenter,
    cache: Arc<RetransmitCache>,
    token: CancellationToken,
}

impl<S: DatagramSink> SendLoop<S> {
    /// Run until cancelled, then flush queued work and release the sink.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                () = self.token.cancelled() => break,
                item = self.queues.recv() => match item {
                    Some((_, item)) => self.dispatch(item).await,
                    None => break,
                },
            }
        }
        self.queues.close();
        while let Some((_, item)) = self.queues.recv().await {
            self.dispatch(item).await;
        }
        debug!("send loop stopped");
    }

    async fn dispatch(&self, item: Outbound) {
        match item {
            Outbound::Object(object) => self.transmit_object(&object).await,
            Outbound::Resend(fragment) => {
                if self.transmit(&fragment).await {
                    metrics::inc_retransmissions();
                }
            }
        }
    }

    async fn transmit_object(&self, object: &EncodedObject) {
        let batch = match self.fragmenter.fragment(
            object.object_type(),
            object.object_id(),
            object.compressed(),
        ) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(
                    "failed to fragment object: object_id={}, error={e}",
                    object.object_id()
                );
                metrics::inc_errors();
                return;
            }
        };
        let fragments: Arc<[Fragment]> = batch.into_fragments().into();
        if let Some(evicted) = self
            .cache
            .insert(object.object_id().clone(), Arc::clone(&fragments))
        {
            tracing::debug!(object_id = %evicted, "evicted from retransmit cache");
        }
        for fragment in fragments.iter() {
            self.transmit(fragment).await;
        }
    }

    async fn transmit(&self, fragment: &Fragment) -> bool {
        let header = fragment.header();
        let datagram = match fragment.encode() {
            Ok(datagram) => datagram,
            Err(e) => {
                warn!(
                    "failed to encode fragment: object_id={}, index={}, error={e}",
                    header.object_id(),
                    header.index()
                );
                metrics::inc_errors();
                return false;
            }
        };
        match self.sink.send_datagram(&datagram).await {
            Ok(()) => {
                metrics::inc_fragments_sent();
                tracing::trace!(
                    object_id = %header.object_id(),
                    index = %header.index(),
                    total = header.total(),
                    "fragment sent"
                );
                true
            }
            Err(e) => {
                warn!(
                    "datagram send failed: object_id={}, index={}, error={e}",
                    header.object_id(),
                    header.index()
                );
                metrics::inc_errors();
                false
            }
        }
    }
}
