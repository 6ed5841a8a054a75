//! In-process multicast hub with programmable loss.
//!
//! Every [`MemorySink`] write is fanned out to every live [`MemorySource`]
//! of the same [`MemoryNetwork`], the writer's own endpoint included, the
//! way a multicast socket with loopback enabled behaves. A loss plan decides
//! per fragment and per transmission attempt whether a datagram is dropped.

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use bytes::Bytes;
use rmcast::{
    ChannelId,
    Fragment,
    FragmentHeader,
    FragmentIndex,
    ObjectId,
    Payload,
    Transport,
    TransportConfig,
    TransportError,
    net::{DatagramSink, DatagramSource},
};
use tokio::sync::mpsc;

type LossPlan = Box<dyn Fn(&FragmentHeader, u32) -> bool + Send + Sync>;
type AttemptKey = (ChannelId, ObjectId, FragmentIndex);

#[derive(Default)]
struct Hub {
    subscribers: Vec<mpsc::UnboundedSender<Bytes>>,
    loss: Option<LossPlan>,
    attempts: HashMap<AttemptKey, u32>,
    transmissions: usize,
    dropped: usize,
}

impl Hub {
    fn should_drop(&mut self, datagram: &[u8]) -> bool {
        let Some(plan) = &self.loss else {
            return false;
        };
        // Anything that is not a fragment passes untouched.
        let Ok(fragment) = Fragment::decode(datagram) else {
            return false;
        };
        let header = fragment.header();
        let attempt = self
            .attempts
            .entry((header.channel_id(), header.object_id().clone(), header.index()))
            .or_insert(0);
        *attempt += 1;
        plan(header, *attempt)
    }

    fn fan_out(&mut self, datagram: &Bytes) {
        self.subscribers
            .retain(|subscriber| subscriber.send(datagram.clone()).is_ok());
    }
}

/// Shared medium connecting any number of endpoints.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryNetwork {
    /// Create an empty network with no loss.
    pub fn new() -> Self { Self::default() }

    /// Attach a new endpoint.
    ///
    /// The source only sees datagrams written after this call.
    pub fn endpoint(&self) -> (MemorySink, MemorySource) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        (
            MemorySink {
                hub: Arc::clone(&self.hub),
            },
            MemorySource { rx },
        )
    }

    /// Build a transport attached to this network.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] for an invalid configuration.
    pub fn transport<M: Payload>(&self, config: TransportConfig) -> Result<Transport<M>, TransportError> {
        let (sink, source) = self.endpoint();
        Transport::with_io(config, sink, source)
    }

    /// Drop every fragment for which `plan(header, attempt)` returns `true`.
    ///
    /// `attempt` counts transmissions of the same fragment (same channel,
    /// object and index) from 1, so a plan can lose the original and let a
    /// retransmission through.
    pub fn set_loss_plan<F>(&self, plan: F)
    where
        F: Fn(&FragmentHeader, u32) -> bool + Send + Sync + 'static,
    {
        self.lock().loss = Some(Box::new(plan));
    }

    /// Deliver everything from now on.
    pub fn clear_loss_plan(&self) { self.lock().loss = None; }

    /// Deliver `datagram` to every endpoint, bypassing the loss plan.
    pub fn inject(&self, datagram: impl Into<Bytes>) { self.lock().fan_out(&datagram.into()); }

    /// Datagrams written by sinks so far, dropped ones included.
    pub fn transmissions(&self) -> usize { self.lock().transmissions }

    /// Datagrams discarded by the loss plan so far.
    pub fn dropped(&self) -> usize { self.lock().dropped }

    /// How many times the fragment at `index` of `object_id` was written.
    pub fn attempts(&self, object_id: &ObjectId, index: FragmentIndex) -> u32 {
        self.lock()
            .attempts
            .iter()
            .filter(|((_, id, at), _)| id == object_id && *at == index)
            .map(|(_, attempts)| *attempts)
            .sum()
    }

    fn lock(&self) -> MutexGuard<'_, Hub> { self.hub.lock().unwrap_or_else(PoisonError::into_inner) }
}

/// Writing half of a [`MemoryNetwork`] endpoint.
#[derive(Clone)]
pub struct MemorySink {
    hub: Arc<Mutex<Hub>>,
}

#[async_trait]
impl DatagramSink for MemorySink {
    async fn send_datagram(&self, datagram: &[u8]) -> io::Result<()> {
        let mut hub = self.hub.lock().unwrap_or_else(PoisonError::into_inner);
        hub.transmissions += 1;
        if hub.should_drop(datagram) {
            hub.dropped += 1;
            return Ok(());
        }
        hub.fan_out(&Bytes::copy_from_slice(datagram));
        Ok(())
    }
}

/// Reading half of a [`MemoryNetwork`] endpoint.
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

#[async_trait]
impl DatagramSource for MemorySource {
    async fn recv_datagram(&mut self) -> io::Result<Bytes> {
        match self.rx.recv().await {
            Some(datagram) => Ok(datagram),
            None => std::future::pending().await,
        }
    }
}
