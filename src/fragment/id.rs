//! Identifiers carried by every fragment.

use std::fmt;

use bincode::{Decode, Encode};
use derive_more::{Display, From, Into};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Correlation key shared by all fragments of one logical object.
///
/// The key is a lowercase hex SHA-256 digest. [`ObjectId::digest`] covers
/// the serialized bytes alone; [`ObjectId::for_send`] also mixes in the
/// sending channel and its send sequence, so two sends of identical content
/// never share an identifier.
///
/// # Examples
///
/// ```
/// use rmcast::fragment::ObjectId;
/// let id = ObjectId::digest(b"hello");
/// assert_eq!(id.as_str().len(), 64);
/// assert_eq!(id, ObjectId::digest(b"hello"));
/// ```
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode, Display, From, Into,
)]
#[display("{_0}")]
pub struct ObjectId(String);

impl ObjectId {
    /// Derive the identifier for a serialized object.
    #[must_use]
    pub fn digest(serialized: &[u8]) -> Self { Self(hex::encode(Sha256::digest(serialized))) }

    /// Derive the identifier of one send of a serialized object.
    #[must_use]
    pub fn for_send(serialized: &[u8], channel_id: ChannelId, sequence: u64) -> Self {
        let digest = Sha256::new()
            .chain_update(serialized)
            .chain_update(channel_id.get().to_be_bytes())
            .chain_update(sequence.to_be_bytes())
            .finalize();
        Self(hex::encode(digest))
    }

    /// Borrow the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

/// Per-transport identifier used to recognise a transport's own datagrams.
///
/// A fresh random (UUIDv4) value is drawn for every transport instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, From, Into)]
pub struct ChannelId(u128);

impl ChannelId {
    /// Draw a new random identifier.
    #[must_use]
    pub fn random() -> Self { Self(Uuid::new_v4().as_u128()) }

    /// Wrap a raw 128-bit value.
    #[must_use]
    pub const fn new(value: u128) -> Self { Self(value) }

    /// Return the raw 128-bit value.
    #[must_use]
    pub const fn get(self) -> u128 { self.0 }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Uuid::from_u128(self.0).hyphenated().fmt(f)
    }
}
