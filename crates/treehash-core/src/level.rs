//! Write-once hash levels.
//!
//! A level is the ordered output array one round of hashing writes into.
//! Slots are `OnceLock`s handed out as single-use [`SlotWriter`]
//! capabilities, so every concurrent job owns exactly one disjoint slot
//! and the level needs no locking.

use std::sync::{Arc, OnceLock};

use crate::digest::Digest;
use crate::error::Error;

/// Ordered sequence of write-once digest slots
#[derive(Debug)]
pub struct HashLevel {
    slots: Arc<[OnceLock<Digest>]>,
}

impl HashLevel {
    /// Allocate a level and one writer per slot
    ///
    /// The writers are the only way to fill the level, and each writer is
    /// consumed on use, so no two jobs can ever target the same slot.
    #[must_use]
    pub fn with_writers(len: usize) -> (Self, Vec<SlotWriter>) {
        let slots: Arc<[OnceLock<Digest>]> = (0..len).map(|_| OnceLock::new()).collect();
        let writers = (0..len)
            .map(|index| SlotWriter {
                slots: Arc::clone(&slots),
                index,
            })
            .collect();
        (Self { slots }, writers)
    }

    /// Number of slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the level has no slots
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Consume the level into its digests, in slot order
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteLevel`] if any slot was never filled.
    /// After a successful barrier every slot is filled; an unfilled slot
    /// here means a job reported success without writing its output.
    pub fn into_digests(self) -> Result<Vec<Digest>, Error> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.get()
                    .copied()
                    .ok_or(Error::IncompleteLevel { index })
            })
            .collect()
    }
}

/// Single-use capability to fill exactly one slot of one level
#[derive(Debug)]
pub struct SlotWriter {
    slots: Arc<[OnceLock<Digest>]>,
    index: usize,
}

impl SlotWriter {
    /// Write the digest into the owned slot
    pub fn fill(self, digest: Digest) {
        let clash = self.slots[self.index].set(digest).is_err();
        debug_assert!(!clash, "slot {} filled twice", self.index);
    }

    /// Index of the owned slot
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}
