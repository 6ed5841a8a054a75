use bincode::{Decode, Encode};

use super::{ChannelId, FragmentError, FragmentIndex, ObjectId, OriginTag, TypeTag};

/// Addressing metadata carried by every fragment.
///
/// The header captures everything a receiver needs to filter a datagram and
/// slot it into the right reassembly entry: the logical type and producing
/// role, the object correlation key, the sending transport's channel and the
/// fragment's position within the object.
///
/// # Examples
///
/// ```
/// use rmcast::fragment::{ChannelId, FragmentHeader, FragmentIndex, ObjectId};
/// let header = FragmentHeader::new(
///     "crawl-record".into(),
///     "downloader".into(),
///     ObjectId::digest(b"doc"),
///     ChannelId::new(7),
///     FragmentIndex::new(1),
///     3,
/// )
/// .expect("index below total");
/// assert_eq!(header.total(), 3);
/// assert!(!header.is_last());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub struct FragmentHeader {
    pub(super) object_type: TypeTag,
    pub(super) origin: OriginTag,
    pub(super) object_id: ObjectId,
    pub(super) channel_id: ChannelId,
    pub(super) index: FragmentIndex,
    pub(super) total: u32,
}

impl FragmentHeader {
    /// Create a new fragment header.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::IndexOutOfRange`] unless `index < total`.
    pub fn new(
        object_type: TypeTag,
        origin: OriginTag,
        object_id: ObjectId,
        channel_id: ChannelId,
        index: FragmentIndex,
        total: u32,
    ) -> Result<Self, FragmentError> {
        let header = Self {
            object_type,
            origin,
            object_id,
            channel_id,
            index,
            total,
        };
        header.validate()?;
        Ok(header)
    }

    pub(crate) fn validate(&self) -> Result<(), FragmentError> {
        if self.index.get() < self.total {
            Ok(())
        } else {
            Err(FragmentError::IndexOutOfRange {
                index: self.index,
                total: self.total,
            })
        }
    }

    /// Logical type of the object this fragment belongs to.
    #[must_use]
    pub fn object_type(&self) -> &TypeTag { &self.object_type }

    /// Role of the process that produced the fragment.
    #[must_use]
    pub fn origin(&self) -> &OriginTag { &self.origin }

    /// Correlation key shared with the sibling fragments.
    #[must_use]
    pub fn object_id(&self) -> &ObjectId { &self.object_id }

    /// Channel of the transport that produced the fragment.
    #[must_use]
    pub const fn channel_id(&self) -> ChannelId { self.channel_id }

    /// Zero-based position within the object.
    #[must_use]
    pub const fn index(&self) -> FragmentIndex { self.index }

    /// Number of fragments making up the object.
    #[must_use]
    pub const fn total(&self) -> u32 { self.total }

    /// Report whether this is the final fragment.
    #[must_use]
    pub fn is_last(&self) -> bool { self.index.is_last_of(self.total) }
}
