//! Outbound helper that splits compressed objects into fragments.
//!
//! [`Fragmenter`] is bound to one transport: it stamps every fragment with
//! the transport's [`ChannelId`] and [`OriginTag`] so callers only supply the
//! per-object type tag and correlation key.

use std::num::NonZeroUsize;

use super::{
    ChannelId,
    Fragment,
    FragmentHeader,
    FragmentIndex,
    FragmentationError,
    ObjectId,
    OriginTag,
    TypeTag,
};

/// Splits compressed objects into fragment-sized datagrams.
#[derive(Clone, Debug)]
pub struct Fragmenter {
    payload_cap: NonZeroUsize,
    channel_id: ChannelId,
    origin: OriginTag,
}

impl Fragmenter {
    /// Create a fragmenter capping fragment payloads at `payload_cap` bytes.
    #[must_use]
    pub fn new(payload_cap: NonZeroUsize, channel_id: ChannelId, origin: OriginTag) -> Self {
        Self {
            payload_cap,
            channel_id,
            origin,
        }
    }

    /// Return the maximum fragment payload size in bytes.
    #[must_use]
    pub const fn payload_cap(&self) -> NonZeroUsize { self.payload_cap }

    /// Return the channel stamped on every fragment.
    #[must_use]
    pub const fn channel_id(&self) -> ChannelId { self.channel_id }

    /// Split `payload` into fragments tagged with `object_type` and `object_id`.
    ///
    /// An empty payload still yields a single, empty fragment so that the
    /// object can be delivered.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError::TooManyFragments`] if the fragment count
    /// cannot be represented as a `u32`.
    pub fn fragment(
        &self,
        object_type: &TypeTag,
        object_id: &ObjectId,
        payload: &[u8],
    ) -> Result<FragmentBatch, FragmentationError> {
        let count = payload.len().div_ceil(self.payload_cap.get()).max(1);
        let total =
            u32::try_from(count).map_err(|_| FragmentationError::TooManyFragments { count })?;

        let fragments = if payload.is_empty() {
            vec![self.frame(object_type, object_id, FragmentIndex::zero(), total, Vec::new())]
        } else {
            (0..total)
                .zip(payload.chunks(self.payload_cap.get()))
                .map(|(position, chunk)| {
                    self.frame(
                        object_type,
                        object_id,
                        FragmentIndex::new(position),
                        total,
                        chunk.to_vec(),
                    )
                })
                .collect()
        };

        Ok(FragmentBatch {
            object_id: object_id.clone(),
            fragments,
        })
    }

    fn frame(
        &self,
        object_type: &TypeTag,
        object_id: &ObjectId,
        index: FragmentIndex,
        total: u32,
        payload: Vec<u8>,
    ) -> Fragment {
        let header = FragmentHeader {
            object_type: object_type.clone(),
            origin: self.origin.clone(),
            object_id: object_id.clone(),
            channel_id: self.channel_id,
            index,
            total,
        };
        Fragment::new(header, payload)
    }
}

/// Collection of fragments produced for a single logical object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentBatch {
    object_id: ObjectId,
    fragments: Vec<Fragment>,
}

impl FragmentBatch {
    /// Return the [`ObjectId`] shared by all fragments.
    #[must_use]
    pub fn object_id(&self) -> &ObjectId { &self.object_id }

    /// Return the fragments as a slice.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] { self.fragments.as_slice() }

    /// Number of fragments in the batch.
    #[expect(
        clippy::len_without_is_empty,
        reason = "batches are guaranteed non-empty"
    )]
    #[must_use]
    pub fn len(&self) -> usize { self.fragments.len() }

    /// Whether the object required more than one fragment.
    #[must_use]
    pub fn is_fragmented(&self) -> bool { self.len() > 1 }

    /// Consume the batch, returning all fragments.
    #[must_use]
    pub fn into_fragments(self) -> Vec<Fragment> { self.fragments }
}

impl IntoIterator for FragmentBatch {
    type Item = Fragment;
    type IntoIter = std::vec::IntoIter<Fragment>;

    fn into_iter(self) -> Self::IntoIter { self.fragments.into_iter() }
}
