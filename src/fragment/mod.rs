//! Fragment primitives for moving large objects over bounded datagrams.
//!
//! This module collects the domain types used on the wire: the identifiers
//! that correlate fragments, the tags used for filtering, the [`Fragment`]
//! datagram itself and the [`Fragmenter`] that slices compressed objects.
//! Each sub-module focuses on a single concept so the wire surface stays
//! small and easy to audit.

pub mod error;
pub mod fragmenter;
pub mod frame;
pub mod header;
pub mod id;
pub mod index;
pub mod tag;

pub use error::{FragmentError, FragmentationError};
pub use fragmenter::{FragmentBatch, Fragmenter};
pub use frame::{Fragment, HEADER_OVERHEAD_ALLOWANCE, MAX_DATAGRAM_SIZE};
pub use header::FragmentHeader;
pub use id::{ChannelId, ObjectId};
pub use index::FragmentIndex;
pub use tag::{OriginTag, TypeTag};
