use tokio::time::Instant;

use crate::fragment::{FragmentIndex, TypeTag};

/// Outcome of writing a payload into a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotWrite {
    /// The slot was empty and now holds the payload.
    Filled,
    /// The slot already held a payload; it was overwritten.
    Duplicate,
}

/// In-progress state for one incomplete object.
#[derive(Debug)]
pub(crate) struct ReassemblyEntry {
    object_type: TypeTag,
    slots: Vec<Option<Vec<u8>>>,
    filled: usize,
    last_touched: Instant,
}

impl ReassemblyEntry {
    pub(crate) fn new(object_type: TypeTag, total: u32, now: Instant) -> Self {
        Self {
            object_type,
            slots: vec![None; total as usize],
            filled: 0,
            last_touched: now,
        }
    }

    pub(crate) fn object_type(&self) -> &TypeTag { &self.object_type }

    pub(crate) fn total(&self) -> usize { self.slots.len() }

    pub(crate) fn last_touched(&self) -> Instant { self.last_touched }

    /// Write `payload` into slot `index`. Only a newly filled slot refreshes
    /// the entry's last-touched time.
    pub(crate) fn insert(&mut self, index: FragmentIndex, payload: Vec<u8>, now: Instant) -> SlotWrite {
        let slot = &mut self.slots[index.as_usize()];
        let write = if slot.is_some() {
            SlotWrite::Duplicate
        } else {
            self.filled += 1;
            self.last_touched = now;
            SlotWrite::Filled
        };
        *slot = Some(payload);
        write
    }

    pub(crate) fn is_filled(&self, index: FragmentIndex) -> bool {
        self.slots
            .get(index.as_usize())
            .is_some_and(Option::is_some)
    }

    pub(crate) fn is_complete(&self) -> bool { self.filled == self.slots.len() }

    /// Indices of every still-empty slot in ascending order.
    pub(crate) fn missing(&self) -> Vec<FragmentIndex> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .filter_map(|(position, _)| FragmentIndex::try_from(position).ok())
            .collect()
    }

    /// Concatenate the slot payloads in index order.
    pub(crate) fn into_payload(self) -> Vec<u8> { self.slots.into_iter().flatten().flatten().collect() }
}
