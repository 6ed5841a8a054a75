//! Inbound worker that turns datagrams back into application objects.
//!
//! For every datagram the [`Reassembler`] decodes a fragment, drops echoes of
//! its own transport and traffic from ignored roles, slots the fragment into
//! the shared [`ReassemblyTable`] and asks for a missing predecessor straight
//! away. Completed retransmission requests are answered by the local sender;
//! completed application objects are decoded and delivered.

use std::sync::Arc;

use log::{debug, error, warn};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    codec,
    error::WorkerError,
    fragment::{ChannelId, Fragment, OriginTag},
    listener::DatagramQueue,
    message::Payload,
    metrics::{self, RequestSource},
    retransmit::{RetransmitRequest, is_retransmit_tag},
    sender::SenderHandle,
};

mod entry;
mod table;

pub use table::{
    CompletedObject,
    Insertion,
    PendingObject,
    ReassemblyTable,
    Rejection,
    SlotState,
};

/// Filtering and sizing applied by a [`Reassembler`].
#[derive(Clone, Debug)]
pub struct ReassemblerSettings {
    /// Channel of the local transport; matching fragments are echoes.
    pub channel_id: ChannelId,
    /// Roles whose fragments are discarded.
    pub ignored_origins: Vec<OriginTag>,
    /// Largest decompressed object accepted.
    pub max_object_size: usize,
}

/// Per-fragment protocol loop feeding the application delivery queue.
pub struct Reassembler<M> {
    queue: DatagramQueue,
    table: Arc<ReassemblyTable>,
    sender: SenderHandle,
    delivery: mpsc::Sender<M>,
    settings: ReassemblerSettings,
    token: CancellationToken,
}

impl<M: Payload> Reassembler<M> {
    /// Create a worker reading from `queue` and delivering into `delivery`.
    #[must_use]
    pub fn new(
        queue: DatagramQueue,
        table: Arc<ReassemblyTable>,
        sender: SenderHandle,
        delivery: mpsc::Sender<M>,
        settings: ReassemblerSettings,
        token: CancellationToken,
    ) -> Self {
        Self {
            queue,
            table,
            sender,
            delivery,
            settings,
            token,
        }
    }

    /// Process datagrams until cancelled or the listener exits.
    ///
    /// A datagram that fails to decode, or an object that fails to
    /// deserialize, ends the loop and cancels the session token.
    ///
    /// # Errors
    ///
    /// Returns the [`WorkerError`] that stopped the loop.
    pub async fn run(mut self) -> Result<(), WorkerError> {
        while let Some(datagram) = self.queue.take().await {
            if let Err(e) = self.process(&datagram).await {
                error!("reassembler stopped: error={e}");
                metrics::inc_errors();
                self.token.cancel();
                return Err(e);
            }
        }
        debug!("reassembler stopped");
        Ok(())
    }

    async fn process(&self, datagram: &[u8]) -> Result<(), WorkerError> {
        let fragment = Fragment::decode(datagram)?;
        metrics::inc_fragments_received();

        let header = fragment.header();
        if header.channel_id() == self.settings.channel_id {
            tracing::trace!(object_id = %header.object_id(), "own fragment skipped");
            return Ok(());
        }
        if self.settings.ignored_origins.contains(header.origin()) {
            tracing::trace!(origin = %header.origin(), "ignored origin skipped");
            return Ok(());
        }

        let object_id = header.object_id().clone();
        match self.table.insert_at(fragment, Instant::now()) {
            Insertion::Pending {
                missing_predecessor: Some(index),
                ..
            } => {
                tracing::debug!(object_id = %object_id, index = %index, "predecessor missing");
                if self
                    .sender
                    .request_retransmit(&RetransmitRequest::new(index, object_id))
                {
                    metrics::inc_retransmit_requests(RequestSource::GapDetection);
                }
            }
            Insertion::Pending { .. } => {}
            Insertion::Complete(object) => self.complete(object).await?,
            Insertion::AlreadyDelivered => {
                tracing::trace!(object_id = %object_id, "fragment of delivered object skipped");
            }
            Insertion::Rejected(reason) => {
                warn!("fragment dropped: object_id={object_id}, reason={reason}");
            }
        }
        Ok(())
    }

    async fn complete(&self, object: CompletedObject) -> Result<(), WorkerError> {
        if is_retransmit_tag(&object.object_type) {
            let request: RetransmitRequest =
                codec::decode_object(&object.payload, self.settings.max_object_size)?;
            self.sender.satisfy_retransmit(&request);
            return Ok(());
        }

        let message: M = codec::decode_object(&object.payload, self.settings.max_object_size)?;
        metrics::inc_objects_delivered();
        tracing::debug!(
            object_id = %object.object_id,
            object_type = %object.object_type,
            "object delivered"
        );
        tokio::select! {
            biased;
            () = self.token.cancelled() => {}
            sent = self.delivery.send(message) => if sent.is_err() {
                debug!("delivery queue closed: object_id={}", object.object_id);
            },
        }
        Ok(())
    }
}
