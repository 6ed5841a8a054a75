//! Zero-based fragment positioning within logical objects.
//!
//! Provides [`FragmentIndex`], a type-safe wrapper around `u32` used both as
//! a slot address during reassembly and as the retransmission target.

use std::num::TryFromIntError;

use bincode::{Decode, Encode};
use derive_more::{Display, From};

/// Zero-based ordinal describing a fragment's position within its object.
///
/// # Examples
///
/// ```
/// use rmcast::fragment::FragmentIndex;
/// let index = FragmentIndex::new(3);
/// assert_eq!(index.get(), 3);
/// assert_eq!(index.predecessor(), Some(FragmentIndex::new(2)));
/// assert_eq!(FragmentIndex::zero().predecessor(), None);
/// assert!(index.is_last_of(4));
/// ```
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode, Display, From,
)]
#[display("{_0}")]
pub struct FragmentIndex(u32);

impl FragmentIndex {
    /// Construct an index from a `u32` value.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value) }

    /// Return the first valid fragment index.
    #[must_use]
    pub const fn zero() -> Self { Self(0) }

    /// Return the underlying numeric value.
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// Return the index as a slot offset.
    #[must_use]
    pub const fn as_usize(self) -> usize { self.0 as usize }

    /// Return the index immediately before this one, if any.
    #[must_use]
    pub fn predecessor(self) -> Option<Self> { self.0.checked_sub(1).map(Self) }

    /// Report whether this is the final slot of an object with `total`
    /// fragments.
    #[must_use]
    pub fn is_last_of(self, total: u32) -> bool { self.0.checked_add(1) == Some(total) }
}

impl TryFrom<usize> for FragmentIndex {
    type Error = TryFromIntError;

    fn try_from(value: usize) -> Result<Self, Self::Error> { u32::try_from(value).map(Self) }
}

impl From<FragmentIndex> for u32 {
    fn from(value: FragmentIndex) -> Self { value.0 }
}
