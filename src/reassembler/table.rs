//! Concurrent map of incomplete objects shared by the Reassembler and the
//! IntegrityChecker.

use std::{fmt, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;

use super::entry::{ReassemblyEntry, SlotWrite};
use crate::{
    fragment::{Fragment, FragmentIndex, ObjectId, TypeTag},
    retransmit::is_retransmit_tag,
};

/// A fully reassembled, still compressed object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedObject {
    pub object_id: ObjectId,
    pub object_type: TypeTag,
    pub payload: Vec<u8>,
}

/// Why a decodable fragment was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// The fragment advertises a different total than earlier siblings.
    TotalMismatch { expected: usize, found: u32 },
    /// The fragment advertises more fragments than allowed per object.
    TooManyFragments { total: u32, limit: u32 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TotalMismatch { expected, found } => {
                write!(f, "total mismatch: expected={expected}, found={found}")
            }
            Self::TooManyFragments { total, limit } => {
                write!(f, "too many fragments: total={total}, limit={limit}")
            }
        }
    }
}

/// Result of inserting one fragment.
#[derive(Debug, PartialEq, Eq)]
pub enum Insertion {
    /// The object is still incomplete. `missing_predecessor` names the slot
    /// just before the inserted one when that slot is still empty.
    Pending {
        missing_predecessor: Option<FragmentIndex>,
        write: SlotState,
    },
    /// The fragment completed the object, which has left the table.
    Complete(CompletedObject),
    /// The object was delivered recently; the fragment is a late duplicate.
    AlreadyDelivered,
    /// The fragment conflicts with protocol limits or earlier siblings.
    Rejected(Rejection),
}

/// Whether an insertion filled a new slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    New,
    Duplicate,
}

/// Point-in-time view of one pending object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingObject {
    pub object_id: ObjectId,
    pub last_touched: Instant,
}

/// Pending reassembly entries keyed by [`ObjectId`].
///
/// Recently completed application objects are remembered for `linger` so
/// late retransmissions cannot open a second entry and trigger a second
/// delivery. Senders derive a fresh id for every send, so this only
/// suppresses stray fragments of a send already delivered. Retransmission requests are never remembered, so repeated
/// identical requests are always processed.
#[derive(Debug)]
pub struct ReassemblyTable {
    entries: DashMap<ObjectId, ReassemblyEntry>,
    delivered: DashMap<ObjectId, Instant>,
    max_fragments: u32,
    linger: Duration,
}

impl ReassemblyTable {
    /// Create an empty table.
    #[must_use]
    pub fn new(max_fragments: u32, linger: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            delivered: DashMap::new(),
            max_fragments,
            linger,
        }
    }

    /// Slot `fragment` into its object's entry, creating it on first sight.
    pub fn insert_at(&self, fragment: Fragment, now: Instant) -> Insertion {
        let (header, payload) = fragment.into_parts();
        if header.total() > self.max_fragments {
            return Insertion::Rejected(Rejection::TooManyFragments {
                total: header.total(),
                limit: self.max_fragments,
            });
        }
        let is_control = is_retransmit_tag(header.object_type());
        if !is_control && self.delivered.contains_key(header.object_id()) {
            return Insertion::AlreadyDelivered;
        }

        let object_id = header.object_id().clone();
        let mut entry = self.entries.entry(object_id.clone()).or_insert_with(|| {
            ReassemblyEntry::new(header.object_type().clone(), header.total(), now)
        });
        if entry.total() != header.total() as usize {
            return Insertion::Rejected(Rejection::TotalMismatch {
                expected: entry.total(),
                found: header.total(),
            });
        }

        let write = match entry.insert(header.index(), payload, now) {
            SlotWrite::Filled => SlotState::New,
            SlotWrite::Duplicate => SlotState::Duplicate,
        };
        if !entry.is_complete() {
            let missing_predecessor = header
                .index()
                .predecessor()
                .filter(|index| !entry.is_filled(*index));
            return Insertion::Pending {
                missing_predecessor,
                write,
            };
        }
        drop(entry);

        let Some((object_id, entry)) = self.entries.remove(&object_id) else {
            return Insertion::AlreadyDelivered;
        };
        if !is_control {
            self.delivered.insert(object_id.clone(), now);
        }
        Insertion::Complete(CompletedObject {
            object_id,
            object_type: entry.object_type().clone(),
            payload: entry.into_payload(),
        })
    }

    /// Snapshot every pending object.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingObject> {
        self.entries
            .iter()
            .map(|entry| PendingObject {
                object_id: entry.key().clone(),
                last_touched: entry.value().last_touched(),
            })
            .collect()
    }

    /// Still-empty slot indices of `object_id`, if it is pending.
    #[must_use]
    pub fn missing(&self, object_id: &ObjectId) -> Option<Vec<FragmentIndex>> {
        self.entries.get(object_id).map(|entry| entry.missing())
    }

    /// Drop the pending entry for `object_id`. Returns whether it existed.
    pub fn abandon(&self, object_id: &ObjectId) -> bool { self.entries.remove(object_id).is_some() }

    /// Forget delivered ids older than the linger window.
    pub fn prune_delivered_at(&self, now: Instant) {
        self.delivered
            .retain(|_, delivered_at| now.saturating_duration_since(*delivered_at) < self.linger);
    }

    /// Report whether `object_id` is pending.
    #[must_use]
    pub fn contains(&self, object_id: &ObjectId) -> bool { self.entries.contains_key(object_id) }

    /// Number of pending objects.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether no object is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
