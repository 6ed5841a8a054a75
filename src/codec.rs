//! Object encoding shared by the send and receive paths.
//!
//! Outbound objects are serialized with bincode, digested into an
//! [`ObjectId`] unique to the send and compressed with Snappy's raw block format before being
//! sliced. Inbound objects reverse those steps once every fragment is
//! present. Decompression is bounded by the size the compressed block
//! advertises so that a hostile datagram cannot force an unbounded
//! allocation.

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

use crate::{
    fragment::{ChannelId, ObjectId, TypeTag},
    message::{Message, Payload},
};

/// Errors raised while encoding or decoding transported objects.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialisation of the object failed.
    #[error("failed to serialize object: {0}")]
    Encode(#[from] EncodeError),
    /// The reassembled bytes did not decode into the expected type.
    #[error("failed to deserialize object: {0}")]
    Decode(#[from] DecodeError),
    /// Snappy rejected the input.
    #[error("compression failure: {0}")]
    Compression(#[from] snap::Error),
    /// The decompressed object would exceed the configured bound.
    #[error("object of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },
    /// Bytes remained after the object was decoded.
    #[error("object followed by {trailing} trailing bytes")]
    TrailingBytes { trailing: usize },
}

/// A serialized and compressed object ready for fragmentation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedObject {
    object_type: TypeTag,
    object_id: ObjectId,
    compressed: Vec<u8>,
}

impl EncodedObject {
    /// Serialize, digest and compress `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails or
    /// [`CodecError::Compression`] if compression fails.
    pub fn encode<P: Payload>(payload: &P) -> Result<Self, CodecError> {
        let serialized = payload.to_bytes()?;
        Ok(Self {
            object_type: payload.type_tag(),
            object_id: ObjectId::digest(&serialized),
            compressed: compress(&serialized)?,
        })
    }

    /// Serialize and compress `payload` as send number `sequence` of
    /// `channel_id`.
    ///
    /// The identifier covers the sender and sequence as well as the content,
    /// so receivers treat a repeated send as a new object.
    ///
    /// # Errors
    ///
    /// Fails as [`encode`](Self::encode) does.
    pub fn encode_for_send<P: Payload>(
        payload: &P,
        channel_id: ChannelId,
        sequence: u64,
    ) -> Result<Self, CodecError> {
        let serialized = payload.to_bytes()?;
        Ok(Self {
            object_type: payload.type_tag(),
            object_id: ObjectId::for_send(&serialized, channel_id, sequence),
            compressed: compress(&serialized)?,
        })
    }

    /// Serialize a control object under an explicit type tag.
    pub(crate) fn encode_tagged<M: Message>(
        object_type: TypeTag,
        message: &M,
    ) -> Result<Self, CodecError> {
        let serialized = message.to_bytes()?;
        Ok(Self {
            object_type,
            object_id: ObjectId::digest(&serialized),
            compressed: compress(&serialized)?,
        })
    }

    /// Logical type of the object.
    #[must_use]
    pub fn object_type(&self) -> &TypeTag { &self.object_type }

    /// Identifier shared by every fragment of this object.
    #[must_use]
    pub fn object_id(&self) -> &ObjectId { &self.object_id }

    /// Compressed bytes to be sliced into fragments.
    #[must_use]
    pub fn compressed(&self) -> &[u8] { &self.compressed }
}

/// Compress `bytes` into a Snappy raw block.
///
/// # Errors
///
/// Returns [`CodecError::Compression`] if the input is too large for Snappy.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(snap::raw::Encoder::new().compress_vec(bytes)?)
}

/// Decompress a Snappy raw block, refusing outputs larger than `max` bytes.
///
/// # Errors
///
/// Returns [`CodecError::TooLarge`] when the advertised length exceeds `max`
/// and [`CodecError::Compression`] when the block is corrupt.
pub fn decompress(bytes: &[u8], max: usize) -> Result<Vec<u8>, CodecError> {
    let len = snap::raw::decompress_len(bytes)?;
    if len > max {
        return Err(CodecError::TooLarge { len, max });
    }
    Ok(snap::raw::Decoder::new().decompress_vec(bytes)?)
}

/// Decompress and deserialize a reassembled object.
///
/// # Errors
///
/// Returns any [`CodecError`] raised by decompression or decoding, including
/// [`CodecError::TrailingBytes`] when the object does not span the whole
/// buffer.
pub fn decode_object<M: Message>(compressed: &[u8], max: usize) -> Result<M, CodecError> {
    let serialized = decompress(compressed, max)?;
    let (message, consumed) = M::from_bytes(&serialized)?;
    if consumed != serialized.len() {
        return Err(CodecError::TrailingBytes {
            trailing: serialized.len() - consumed,
        });
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use bincode::{Decode, Encode};
    use rstest::rstest;

    use super::*;

    #[derive(Debug, PartialEq, Encode, Decode)]
    struct Note {
        text: String,
    }

    impl Payload for Note {
        fn type_tag(&self) -> TypeTag { TypeTag::from("note") }
    }

    #[test]
    fn encoded_object_carries_tag_and_digest() {
        let note = Note {
            text: "hello".repeat(100),
        };
        let encoded = EncodedObject::encode(&note).expect("encode");
        let serialized = note.to_bytes().expect("serialize");

        assert_eq!(encoded.object_type().as_str(), "note");
        assert_eq!(encoded.object_id(), &ObjectId::digest(&serialized));
        assert!(encoded.compressed().len() < serialized.len());

        let decoded: Note = decode_object(encoded.compressed(), 1 << 20).expect("decode");
        assert_eq!(decoded, note);
    }

    #[test]
    fn repeated_sends_get_distinct_ids() {
        let note = Note {
            text: "same".to_owned(),
        };
        let channel = ChannelId::new(4);
        let first = EncodedObject::encode_for_send(&note, channel, 0).expect("encode");
        let again = EncodedObject::encode_for_send(&note, channel, 0).expect("encode");
        let second = EncodedObject::encode_for_send(&note, channel, 1).expect("encode");
        let elsewhere = EncodedObject::encode_for_send(&note, ChannelId::new(5), 0).expect("encode");

        assert_eq!(first, again);
        assert_ne!(first.object_id(), second.object_id());
        assert_ne!(first.object_id(), elsewhere.object_id());
        assert_eq!(first.compressed(), second.compressed());
    }

    #[rstest]
    #[case(16)]
    #[case(1024)]
    fn decompress_refuses_outputs_past_limit(#[case] len: usize) {
        let compressed = compress(&vec![0u8; len + 1]).expect("compress");
        let err = decompress(&compressed, len).expect_err("limit must be enforced");
        assert!(matches!(err, CodecError::TooLarge { max, .. } if max == len));
    }

    #[test]
    fn decompress_rejects_corrupt_blocks() {
        let err = decompress(&[0xff, 0xff, 0xff, 0xff, 0xff, 0x0f, 1, 2], 1 << 20)
            .expect_err("corrupt block must fail");
        assert!(matches!(
            err,
            CodecError::Compression(_) | CodecError::TooLarge { .. }
        ));
    }
}
