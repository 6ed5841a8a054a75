//! Socket read loop decoupling reception from reassembly.
//!
//! The [`Listener`] does no decoding or filtering: each datagram goes
//! straight onto a bounded queue so a slow Reassembler applies backpressure
//! here instead of letting the OS buffer overflow unnoticed.

use std::{io, num::NonZeroUsize};

use bytes::Bytes;
use log::{debug, error};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{metrics, net::DatagramSource};

/// Create a listener over `source` and the queue it feeds.
pub fn listener<S: DatagramSource>(
    source: S,
    capacity: NonZeroUsize,
    token: CancellationToken,
) -> (Listener<S>, DatagramQueue) {
    let (tx, rx) = mpsc::channel(capacity.get());
    (
        Listener {
            source,
            queue: tx,
            token: token.clone(),
        },
        DatagramQueue { rx, token },
    )
}

/// Reads datagrams until stopped or the socket fails.
pub struct Listener<S> {
    source: S,
    queue: mpsc::Sender<Bytes>,
    token: CancellationToken,
}

impl<S: DatagramSource> Listener<S> {
    /// Return a handle that can stop this listener from another task.
    #[must_use]
    pub fn handle(&self) -> ListenerHandle {
        ListenerHandle {
            token: self.token.clone(),
        }
    }

    /// Forward datagrams until cancelled.
    ///
    /// A socket error ends the loop and cancels the listener's token, which
    /// also stops every task sharing it. The source is released when this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns the socket error that ended the loop.
    pub async fn run(mut self) -> io::Result<()> {
        let result = loop {
            let received = tokio::select! {
                biased;
                () = self.token.cancelled() => break Ok(()),
                received = self.source.recv_datagram() => received,
            };
            match received {
                Ok(datagram) => {
                    tracing::trace!(len = datagram.len(), "datagram received");
                    tokio::select! {
                        biased;
                        () = self.token.cancelled() => break Ok(()),
                        sent = self.queue.send(datagram) => if sent.is_err() {
                            break Ok(());
                        },
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        if let Err(e) = &result {
            error!("multicast receive failed: error={e}");
            metrics::inc_errors();
            self.token.cancel();
        }
        debug!("listener stopped");
        result
    }
}

/// Stops a running [`Listener`].
#[derive(Clone, Debug)]
pub struct ListenerHandle {
    token: CancellationToken,
}

impl ListenerHandle {
    /// Stop the listener and release any pending [`DatagramQueue::take`].
    ///
    /// Calling this more than once has no further effect.
    pub fn stop(&self) { self.token.cancel(); }
}

/// Consumer end of the listener queue.
pub struct DatagramQueue {
    rx: mpsc::Receiver<Bytes>,
    token: CancellationToken,
}

impl DatagramQueue {
    /// Wait for the next datagram.
    ///
    /// Returns `None` once the listener has been stopped or has exited.
    pub async fn take(&mut self) -> Option<Bytes> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            datagram = self.rx.recv() => datagram,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use bytes::Bytes;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::test_helpers::channel_source;

    fn capacity() -> NonZeroUsize { NonZeroUsize::new(8).expect("non-zero") }

    #[tokio::test]
    async fn datagrams_are_forwarded_in_order() {
        let (tx, source) = channel_source();
        let (listener, mut queue) = listener(source, capacity(), CancellationToken::new());
        let handle = listener.handle();
        let task = tokio::spawn(listener.run());

        for byte in [1u8, 2, 3] {
            tx.send(Ok(Bytes::from(vec![byte; 4]))).expect("feed source");
        }
        for byte in [1u8, 2, 3] {
            assert_eq!(queue.take().await, Some(Bytes::from(vec![byte; 4])));
        }

        handle.stop();
        task.await.expect("join listener").expect("clean stop");
    }

    #[tokio::test]
    async fn stop_releases_pending_take() {
        let (_tx, source) = channel_source();
        let (listener, mut queue) = listener(source, capacity(), CancellationToken::new());
        let handle = listener.handle();
        let task = tokio::spawn(listener.run());

        let waiter = tokio::spawn(async move { queue.take().await });
        tokio::task::yield_now().await;
        handle.stop();
        handle.stop();

        assert_eq!(waiter.await.expect("join waiter"), None);
        task.await.expect("join listener").expect("clean stop");
    }

    #[tokio::test]
    async fn socket_error_cancels_the_session() {
        let (tx, source) = channel_source();
        let token = CancellationToken::new();
        let (listener, _queue) = listener(source, capacity(), token.clone());
        tx.send(Err(io::Error::other("socket gone")))
            .expect("feed source");

        let err = listener.run().await.expect_err("socket error is fatal");
        assert_eq!(err.to_string(), "socket gone");
        assert!(token.is_cancelled());
    }
}
