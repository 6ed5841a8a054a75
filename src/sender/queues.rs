//! Prioritised outbound queues feeding the send loop.
//!
//! New application objects wait in the low-priority queue while
//! retransmission work jumps ahead through the high-priority queue. Each
//! queue is FIFO on its own.

use std::num::NonZeroUsize;

use tokio::sync::mpsc;
use tracing::debug;

use super::SendError;
use crate::{codec::EncodedObject, fragment::Fragment};

/// Work item for the send loop.
#[derive(Debug)]
pub enum Outbound {
    /// A whole object to fragment, cache and transmit.
    Object(EncodedObject),
    /// A single cached fragment to transmit again.
    Resend(Fragment),
}

/// Priority level for outbound work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    High,
    Low,
}

/// Receiver ends of the outbound queues owned by the send loop.
pub(crate) struct OutboundQueues {
    high_priority_rx: mpsc::Receiver<Outbound>,
    low_priority_rx: mpsc::Receiver<Outbound>,
}

/// Cloneable producer side of [`OutboundQueues`].
#[derive(Clone, Debug)]
pub(crate) struct OutboundHandle {
    high_priority_tx: mpsc::Sender<Outbound>,
    low_priority_tx: mpsc::Sender<Outbound>,
}

impl OutboundQueues {
    /// Create both queues with `capacity` slots each.
    pub(crate) fn bounded(capacity: NonZeroUsize) -> (Self, OutboundHandle) {
        let (high_tx, high_rx) = mpsc::channel(capacity.get());
        let (low_tx, low_rx) = mpsc::channel(capacity.get());
        (
            Self {
                high_priority_rx: high_rx,
                low_priority_rx: low_rx,
            },
            OutboundHandle {
                high_priority_tx: high_tx,
                low_priority_tx: low_tx,
            },
        )
    }

    /// Receive the next item, preferring high priority work.
    ///
    /// Returns `None` once both queues are closed and empty.
    pub(crate) async fn recv(&mut self) -> Option<(Priority, Outbound)> {
        let mut high_closed = false;
        let mut low_closed = false;
        loop {
            tokio::select! {
                biased;
                res = self.high_priority_rx.recv(), if !high_closed => match res {
                    Some(item) => return Some((Priority::High, item)),
                    None => high_closed = true,
                },
                res = self.low_priority_rx.recv(), if !low_closed => match res {
                    Some(item) => return Some((Priority::Low, item)),
                    None => low_closed = true,
                },
                else => return None,
            }
        }
    }

    /// Stop accepting new work. Items already queued remain receivable.
    pub(crate) fn close(&mut self) {
        self.high_priority_rx.close();
        self.low_priority_rx.close();
    }
}

impl OutboundHandle {
    fn tx(&self, priority: Priority) -> &mpsc::Sender<Outbound> {
        match priority {
            Priority::High => &self.high_priority_tx,
            Priority::Low => &self.low_priority_tx,
        }
    }

    /// Enqueue `item`, waiting for capacity.
    pub(crate) async fn push(&self, item: Outbound, priority: Priority) -> Result<(), SendError> {
        let permit = self.tx(priority).reserve().await.map_err(|_| SendError::Closed)?;
        permit.send(item);
        debug!(?priority, "outbound item queued");
        Ok(())
    }

    /// Enqueue `item` without waiting.
    pub(crate) fn try_push(&self, item: Outbound, priority: Priority) -> Result<(), SendError> {
        match self.tx(priority).try_send(item) {
            Ok(()) => {
                debug!(?priority, "outbound item queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(SendError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }
}
