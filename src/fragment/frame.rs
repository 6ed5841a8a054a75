//! The datagram unit exchanged on the multicast group.

use bincode::{Decode, Encode, config};

use super::{FragmentError, FragmentHeader};

/// Largest UDP payload an IPv4 datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Upper bound on the encoded header size assumed when sizing datagrams.
///
/// Tags and identifiers are short strings, so the encoded header stays well
/// below this allowance in practice.
pub const HEADER_OVERHEAD_ALLOWANCE: usize = 512;

fn wire_config() -> impl config::Config {
    config::standard().with_limit::<MAX_DATAGRAM_SIZE>()
}

/// An immutable slice of a compressed, serialized object plus its addressing
/// metadata. One fragment travels as exactly one datagram.
///
/// # Examples
///
/// ```
/// use rmcast::fragment::{ChannelId, Fragment, FragmentHeader, FragmentIndex, ObjectId};
/// let header = FragmentHeader::new(
///     "note".into(),
///     "tester".into(),
///     ObjectId::digest(b"abc"),
///     ChannelId::new(1),
///     FragmentIndex::zero(),
///     1,
/// )
/// .expect("valid header");
/// let fragment = Fragment::new(header, vec![1, 2, 3]);
/// let bytes = fragment.encode().expect("encode");
/// assert_eq!(Fragment::decode(&bytes).expect("decode"), fragment);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Fragment {
    payload: Vec<u8>,
    header: FragmentHeader,
}

impl Fragment {
    /// Construct a fragment from a validated header and its payload slice.
    #[must_use]
    pub fn new(header: FragmentHeader, payload: Vec<u8>) -> Self { Self { payload, header } }

    /// Return the fragment header.
    #[must_use]
    pub fn header(&self) -> &FragmentHeader { &self.header }

    /// Return the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] { self.payload.as_slice() }

    /// Consume the fragment, returning its components.
    #[must_use]
    pub fn into_parts(self) -> (FragmentHeader, Vec<u8>) { (self.header, self.payload) }

    /// Serialize the fragment into a datagram.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::Encode`] if serialization fails and
    /// [`FragmentError::Oversized`] if the encoded fragment would exceed
    /// [`MAX_DATAGRAM_SIZE`].
    pub fn encode(&self) -> Result<Vec<u8>, FragmentError> {
        let bytes = bincode::encode_to_vec(self, config::standard())?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(FragmentError::Oversized { len: bytes.len() });
        }
        Ok(bytes)
    }

    /// Decode and validate a datagram.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::Decode`] for malformed bytes,
    /// [`FragmentError::TrailingBytes`] when the datagram holds more than one
    /// fragment, and [`FragmentError::IndexOutOfRange`] when the position
    /// does not fit the advertised total.
    pub fn decode(bytes: &[u8]) -> Result<Self, FragmentError> {
        let (fragment, consumed): (Self, usize) =
            bincode::decode_from_slice(bytes, wire_config())?;
        if consumed != bytes.len() {
            return Err(FragmentError::TrailingBytes {
                trailing: bytes.len() - consumed,
            });
        }
        fragment.header.validate()?;
        Ok(fragment)
    }
}
