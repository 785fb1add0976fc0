//! Change tracking - per-participant "what changed" bookkeeping
//!
//! Every processor owns a [`ChangeLedger`]. Whoever modifies a value marks the
//! ledger with the category of the change; every other participant (editor,
//! table, multi-slider, protocol bridge, host) later polls its own entry and
//! reacts only to the categories it cares about.

pub mod in_transit;
pub mod reentrancy;
mod types;

pub use in_transit::InTransitGuard;
pub use reentrancy::{ReentrancyFlag, ReentrancyGuard};
pub use types::{ChangeParticipant, ChangeType};

/// Accumulated change flags, one entry per [`ChangeParticipant`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLedger {
    entries: [ChangeType; ChangeParticipant::COUNT],
}

impl ChangeLedger {
    /// Create a ledger with every entry empty
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` caused a change of the categories in `mask`
    ///
    /// Every participant other than the source receives the flags. The table
    /// and multi-slider views also poll their own writes, so they are flagged
    /// even when they are the source.
    pub fn mark_changed(&mut self, source: ChangeParticipant, mask: ChangeType) {
        if mask.is_empty() {
            return;
        }

        for participant in ChangeParticipant::ALL {
            if participant != source || participant.receives_own_changes() {
                self.entries[participant.index()] |= mask;
            }
        }
    }

    /// Check whether any category of `mask` is pending for `participant`
    pub fn has_changed(&self, participant: ChangeParticipant, mask: ChangeType) -> bool {
        self.entries[participant.index()].intersects(mask)
    }

    /// Check and clear the categories of `mask` pending for `participant`
    ///
    /// Returns the same value [`has_changed`](Self::has_changed) would have
    /// returned. Only the bits in `mask` are cleared; other pending categories
    /// stay set for later polls.
    pub fn consume_changed(&mut self, participant: ChangeParticipant, mask: ChangeType) -> bool {
        let entry = &mut self.entries[participant.index()];
        let changed = entry.intersects(mask);
        *entry &= !mask;
        changed
    }

    /// All categories currently pending for `participant`
    pub fn pending(&self, participant: ChangeParticipant) -> ChangeType {
        self.entries[participant.index()]
    }
}
