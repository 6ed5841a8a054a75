//! Explicit, serializable tags naming payload types and producing roles.
//!
//! Tags travel on the wire so that every participant can filter traffic
//! without sharing any runtime type information.

use bincode::{Decode, Encode};
use derive_more::{Display, From, Into};

/// Identifies the logical type of the object a fragment belongs to.
///
/// # Examples
///
/// ```
/// use rmcast::fragment::TypeTag;
/// let tag = TypeTag::from("crawl-record");
/// assert_eq!(tag.as_str(), "crawl-record");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Encode, Decode, Display, From, Into)]
#[display("{_0}")]
pub struct TypeTag(String);

impl TypeTag {
    /// Create a tag from any string-like value.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self { Self(tag.into()) }

    /// Borrow the tag text.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for TypeTag {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

/// Identifies the role of the process that produced a fragment.
///
/// Receivers may ignore whole roles sharing their multicast group, such as
/// crawl workers ignoring each other.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Encode, Decode, Display, From, Into)]
#[display("{_0}")]
pub struct OriginTag(String);

impl OriginTag {
    /// Create a tag from any string-like value.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self { Self(tag.into()) }

    /// Borrow the tag text.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for OriginTag {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}
