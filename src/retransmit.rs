//! Control object asking peers to resend one missing fragment.
//!
//! Requests travel through the ordinary send path under a reserved type tag,
//! so they are fragmented, cached and recovered like any other object.

use bincode::{Decode, Encode};

use crate::fragment::{FragmentIndex, ObjectId, TypeTag};

/// Type tag reserved for [`RetransmitRequest`] objects.
pub const RETRANSMIT_TYPE_TAG: &str = "rmcast.retransmit-request";

/// Report whether `tag` names the retransmission control object.
#[must_use]
pub fn is_retransmit_tag(tag: &TypeTag) -> bool { tag.as_str() == RETRANSMIT_TYPE_TAG }

/// Request for the fragment at `missing_index` of `object_id`.
///
/// # Examples
///
/// ```
/// use rmcast::{
///     fragment::{FragmentIndex, ObjectId},
///     retransmit::RetransmitRequest,
/// };
/// let request = RetransmitRequest::new(FragmentIndex::new(2), ObjectId::digest(b"doc"));
/// assert_eq!(request.missing_index().get(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub struct RetransmitRequest {
    missing_index: FragmentIndex,
    object_id: ObjectId,
}

impl RetransmitRequest {
    /// Build a request for one fragment of one object.
    #[must_use]
    pub fn new(missing_index: FragmentIndex, object_id: ObjectId) -> Self {
        Self {
            missing_index,
            object_id,
        }
    }

    /// Position of the missing fragment.
    #[must_use]
    pub fn missing_index(&self) -> FragmentIndex { self.missing_index }

    /// Object the missing fragment belongs to.
    #[must_use]
    pub fn object_id(&self) -> &ObjectId { &self.object_id }

    /// Reserved wire tag for requests.
    #[must_use]
    pub fn type_tag() -> TypeTag { TypeTag::from(RETRANSMIT_TYPE_TAG) }
}
