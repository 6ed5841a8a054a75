//! Test doubles shared across unit tests.

use std::{
    io,
    num::NonZeroUsize,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bincode::{Decode, Encode};
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{
    codec::EncodedObject,
    fragment::{ChannelId, Fragment, Fragmenter, OriginTag, TypeTag},
    message::Payload,
    net::{DatagramSink, DatagramSource},
};

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Note {
    pub text: String,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Self { Self { text: text.into() } }
}

impl Payload for Note {
    fn type_tag(&self) -> TypeTag { TypeTag::from("note") }
}

/// Deterministic, poorly compressible text of `len` characters.
pub fn noise(len: usize, seed: u64) -> String {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            char::from(b'!' + u8::try_from(state % 90).expect("fits in u8"))
        })
        .collect()
}

/// Fragments `payload` as a peer on `channel` with role `origin` would.
pub fn peer_fragments(payload: &Note, channel: ChannelId, origin: &str, cap: usize) -> Vec<Fragment> {
    let object = EncodedObject::encode(payload).expect("encode note");
    Fragmenter::new(
        NonZeroUsize::new(cap).expect("non-zero cap"),
        channel,
        OriginTag::from(origin),
    )
    .fragment(object.object_type(), object.object_id(), object.compressed())
    .expect("fragment note")
    .into_fragments()
}

/// Records every datagram and optionally fails the first few sends.
#[derive(Clone, Debug, Default)]
pub struct CaptureSink {
    datagrams: Arc<Mutex<Vec<Vec<u8>>>>,
    failures_left: Arc<AtomicUsize>,
}

impl CaptureSink {
    pub fn failing(failures: usize) -> Self {
        let sink = Self::default();
        sink.failures_left.store(failures, Ordering::SeqCst);
        sink
    }

    pub fn fragments(&self) -> Vec<Fragment> {
        self.datagrams
            .lock()
            .expect("capture lock")
            .iter()
            .map(|bytes| Fragment::decode(bytes).expect("captured fragment decodes"))
            .collect()
    }
}

#[async_trait]
impl DatagramSink for CaptureSink {
    async fn send_datagram(&self, datagram: &[u8]) -> io::Result<()> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(io::Error::other("injected send failure"));
        }
        self.datagrams
            .lock()
            .expect("capture lock")
            .push(datagram.to_vec());
        Ok(())
    }
}

/// A datagram source fed through a channel.
///
/// Once every sender is dropped the source idles forever, like a quiet
/// socket.
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<io::Result<Bytes>>,
}

pub fn channel_source() -> (mpsc::UnboundedSender<io::Result<Bytes>>, ChannelSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, ChannelSource { rx })
}

#[async_trait]
impl DatagramSource for ChannelSource {
    async fn recv_datagram(&mut self) -> io::Result<Bytes> {
        match self.rx.recv().await {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}
