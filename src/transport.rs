//! Application facade tying the four protocol loops together.
//!
//! A [`Transport`] owns one send loop from construction onwards and, after
//! [`start_receiving`](Transport::start_receiving), a receive session made of
//! the Listener, Reassembler and IntegrityChecker. Every task runs on the
//! transport's [`TaskTracker`] under a child of its root
//! [`CancellationToken`].

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, info};
use tokio::sync::{self, mpsc};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::TransportConfig,
    error::TransportError,
    fragment::{ChannelId, Fragmenter},
    integrity::IntegrityChecker,
    listener,
    message::Payload,
    net::{self, DatagramSink, DatagramSource},
    reassembler::{Reassembler, ReassemblerSettings, ReassemblyTable},
    sender::{self, RetransmitCache, SenderHandle},
};

enum ReceiveState<M> {
    Idle {
        source: Box<dyn DatagramSource>,
        delivery: mpsc::Sender<M>,
    },
    Running(CancellationToken),
    Closed,
}

/// Reliable multicast endpoint exchanging objects of type `M`.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use rmcast::{
///     config::TransportConfig,
///     records::{CrawlRecord, SearchPayload},
///     transport::Transport,
/// };
///
/// # async fn demo() -> Result<(), rmcast::error::TransportError> {
/// let transport: Transport<SearchPayload> =
///     Transport::bind(TransportConfig::default().with_ignored_origin("downloader"))?;
/// transport.start_receiving()?;
/// transport
///     .send(&SearchPayload::Crawl(CrawlRecord::new("https://example.org")))
///     .await?;
/// if let Some(payload) = transport.receive(Duration::from_secs(1)).await {
///     println!("{payload:?}");
/// }
/// transport.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Transport<M> {
    config: TransportConfig,
    channel_id: ChannelId,
    sender: SenderHandle,
    table: Arc<ReassemblyTable>,
    root: CancellationToken,
    tracker: TaskTracker,
    state: Mutex<ReceiveState<M>>,
    delivery: sync::Mutex<mpsc::Receiver<M>>,
}

impl<M: Payload> Transport<M> {
    /// Bind multicast sockets for `config` and start the send loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] for an invalid configuration and
    /// [`TransportError::Io`] if a socket cannot be created or joined.
    pub fn bind(config: TransportConfig) -> Result<Self, TransportError> {
        config.validate()?;
        let sink = net::bind_sink(&config)?;
        let source = net::bind_source(&config)?;
        Self::with_io(config, sink, source)
    }

    /// Build a transport over caller-supplied datagram I/O.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] for an invalid configuration.
    pub fn with_io<S, R>(config: TransportConfig, sink: S, source: R) -> Result<Self, TransportError>
    where
        S: DatagramSink,
        R: DatagramSource,
    {
        config.validate()?;
        let channel_id = ChannelId::random();
        let root = CancellationToken::new();
        let tracker = TaskTracker::new();

        let protocol = &config.protocol;
        let fragmenter = Fragmenter::new(
            protocol.fragment_payload_cap,
            channel_id,
            config.origin.clone(),
        );
        let (sender, send_loop) = sender::sender(sink, fragmenter, protocol, root.child_token());
        tracker.spawn(send_loop.run());

        let (delivery_tx, delivery_rx) = mpsc::channel(protocol.delivery_queue_capacity.get());
        let table = Arc::new(ReassemblyTable::new(
            protocol.max_fragments_per_object,
            protocol.completed_linger(),
        ));

        info!(
            "transport created: channel_id={channel_id}, group={}, origin={}",
            config.group_addr(),
            config.origin
        );
        Ok(Self {
            config,
            channel_id,
            sender,
            table,
            root,
            tracker,
            state: Mutex::new(ReceiveState::Idle {
                source: Box::new(source),
                delivery: delivery_tx,
            }),
            delivery: sync::Mutex::new(delivery_rx),
        })
    }

    /// Start the Listener, Reassembler and IntegrityChecker.
    ///
    /// Calling this while already receiving has no effect.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ReceiverClosed`] once receiving has been
    /// stopped, the session has failed, or the transport is shutting down.
    pub fn start_receiving(&self) -> Result<(), TransportError> {
        let mut state = self.lock_state();
        if self.root.is_cancelled() {
            *state = ReceiveState::Closed;
        }
        match std::mem::replace(&mut *state, ReceiveState::Closed) {
            ReceiveState::Idle { source, delivery } => {
                let session = self.root.child_token();
                self.spawn_session(source, delivery, session.clone());
                *state = ReceiveState::Running(session);
                Ok(())
            }
            ReceiveState::Running(session) if !session.is_cancelled() => {
                *state = ReceiveState::Running(session);
                Ok(())
            }
            ReceiveState::Running(_) | ReceiveState::Closed => Err(TransportError::ReceiverClosed),
        }
    }

    fn spawn_session(
        &self,
        source: Box<dyn DatagramSource>,
        delivery: mpsc::Sender<M>,
        session: CancellationToken,
    ) {
        let protocol = &self.config.protocol;
        let (listener, queue) =
            listener::listener(source, protocol.listener_queue_capacity, session.clone());
        let reassembler = Reassembler::new(
            queue,
            Arc::clone(&self.table),
            self.sender.clone(),
            delivery,
            ReassemblerSettings {
                channel_id: self.channel_id,
                ignored_origins: self.config.ignored_origins.clone(),
                max_object_size: protocol.max_object_size.get(),
            },
            session.clone(),
        );
        let checker = IntegrityChecker::new(Arc::clone(&self.table), self.sender.clone(), protocol);

        let channel_id = self.channel_id;
        self.tracker.spawn(async move {
            if let Err(e) = listener.run().await {
                tracing::debug!(%channel_id, error = %e, "listener exited");
            }
        });
        self.tracker.spawn(async move {
            if let Err(e) = reassembler.run().await {
                tracing::debug!(%channel_id, error = %e, "reassembler exited");
            }
        });
        self.tracker.spawn(checker.run(session));
        debug!("receive session started: channel_id={}", self.channel_id);
    }

    /// Stop receiving and release the receive socket.
    ///
    /// Receiving cannot be restarted afterwards. Calling this more than once
    /// has no further effect.
    pub fn stop_receiving(&self) {
        let mut state = self.lock_state();
        if let ReceiveState::Running(session) = &*state {
            session.cancel();
        }
        *state = ReceiveState::Closed;
    }

    /// Stop accepting new objects. Objects already queued are still sent.
    ///
    /// Calling this more than once has no further effect.
    pub fn stop_sending(&self) { self.sender.stop(); }

    /// Queue `object` for transmission to the group.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SenderClosed`] after
    /// [`stop_sending`](Self::stop_sending) and [`TransportError::Codec`] if
    /// `object` cannot be encoded.
    pub async fn send(&self, object: &M) -> Result<(), TransportError> {
        self.sender.send(object).await?;
        Ok(())
    }

    /// Wait up to `timeout` for the next delivered object.
    ///
    /// Returns `None` when nothing arrives in time or the receive session
    /// has ended and its queue is drained.
    pub async fn receive(&self, timeout: Duration) -> Option<M> {
        tokio::time::timeout(timeout, async { self.delivery.lock().await.recv().await })
            .await
            .ok()
            .flatten()
    }

    /// Report whether a receive session is running.
    #[must_use]
    pub fn is_receiving(&self) -> bool {
        matches!(&*self.lock_state(), ReceiveState::Running(session) if !session.is_cancelled())
    }

    /// Number of objects currently awaiting missing fragments.
    #[must_use]
    pub fn pending_objects(&self) -> usize { self.table.len() }

    /// Fragments kept for answering retransmission requests.
    #[must_use]
    pub fn retransmit_cache(&self) -> &RetransmitCache { self.sender.cache() }

    /// Identifier stamped on every fragment this transport sends.
    #[must_use]
    pub fn channel_id(&self) -> ChannelId { self.channel_id }

    /// The configuration this transport was built with.
    #[must_use]
    pub fn config(&self) -> &TransportConfig { &self.config }

    /// Stop both directions and wait for every task to finish.
    pub async fn shutdown(self) {
        self.root.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        debug!("transport shut down: channel_id={}", self.channel_id);
    }

    fn lock_state(&self) -> MutexGuard<'_, ReceiveState<M>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M> Drop for Transport<M> {
    fn drop(&mut self) { self.root.cancel(); }
}

impl<M> fmt::Debug for Transport<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("channel_id", &self.channel_id)
            .field("group", &self.config.group_addr())
            .field("origin", &self.config.origin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{io, time::Duration};

    use bytes::Bytes;
    use rstest::rstest;
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        config::ProtocolConfig,
        test_helpers::{CaptureSink, Note, channel_source, peer_fragments},
    };

    fn transport() -> (
        Transport<Note>,
        CaptureSink,
        mpsc::UnboundedSender<io::Result<Bytes>>,
    ) {
        let sink = CaptureSink::default();
        let (inject, source) = channel_source();
        let transport =
            Transport::with_io(TransportConfig::default(), sink.clone(), source).expect("transport");
        (transport, sink, inject)
    }

    #[tokio::test]
    async fn receive_times_out_before_receiving_starts() {
        let (transport, _sink, _inject) = transport();
        assert!(!transport.is_receiving());
        assert_eq!(transport.receive(Duration::from_millis(10)).await, None);
    }

    #[tokio::test]
    async fn delivers_peer_objects() {
        let (transport, _sink, inject) = transport();
        transport.start_receiving().expect("start");
        transport.start_receiving().expect("second start is a no-op");

        let note = Note::new("from a peer");
        for fragment in peer_fragments(&note, ChannelId::new(9), "peer", 1024) {
            inject
                .send(Ok(Bytes::from(fragment.encode().expect("encode"))))
                .expect("inject");
        }
        assert_eq!(transport.receive(Duration::from_secs(5)).await, Some(note));
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn receiving_cannot_restart_after_stop() {
        let (transport, _sink, _inject) = transport();
        transport.start_receiving().expect("start");
        transport.stop_receiving();
        transport.stop_receiving();
        assert!(!transport.is_receiving());
        assert!(matches!(
            transport.start_receiving(),
            Err(TransportError::ReceiverClosed)
        ));
    }

    #[traced_test]
    #[tokio::test]
    async fn fatal_session_error_closes_the_receiver() {
        let (transport, _sink, inject) = transport();
        transport.start_receiving().expect("start");
        inject
            .send(Ok(Bytes::from_static(b"not a fragment")))
            .expect("inject");

        assert_eq!(transport.receive(Duration::from_secs(5)).await, None);
        assert!(!transport.is_receiving());
        assert!(matches!(
            transport.start_receiving(),
            Err(TransportError::ReceiverClosed)
        ));
        transport.shutdown().await;
        assert!(logs_contain("reassembler exited"));
    }

    #[tokio::test]
    async fn sends_are_rejected_after_stop_sending() {
        let (transport, sink, _inject) = transport();
        transport.send(&Note::new("queued")).await.expect("send");
        transport.stop_sending();
        assert!(matches!(
            transport.send(&Note::new("late")).await,
            Err(TransportError::SenderClosed)
        ));
        transport.shutdown().await;
        assert_eq!(sink.fragments().len(), 1);
    }

    #[rstest]
    #[case::unicast_group(
        TransportConfig::new("10.0.0.1".parse().expect("ip"), 6002, "node"),
    )]
    #[case::zero_retries(
        TransportConfig::default().with_protocol(ProtocolConfig::default().with_max_retries(0)),
    )]
    #[tokio::test]
    async fn invalid_configuration_is_rejected(#[case] config: TransportConfig) {
        let (_inject, source) = channel_source();
        let result = Transport::<Note>::with_io(config, CaptureSink::default(), source);
        assert!(matches!(result, Err(TransportError::Config(_))));
    }
}
