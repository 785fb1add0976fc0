//! In-transit guard
//!
//! Suppresses echo feedback from the remote device: once a "set" command for a
//! category has been sent, inbound values for that category are ignored until
//! the next tick clears the guard.

use super::ChangeType;

/// Categories whose outbound set command is currently on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InTransitGuard {
    in_transit: ChangeType,
}

impl InTransitGuard {
    /// Create a guard with nothing in transit
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark categories as in transit after dispatching their update
    pub fn mark(&mut self, mask: ChangeType) {
        self.in_transit |= mask;
    }

    /// Check if any category of `mask` is in transit
    pub fn is_in_transit(&self, mask: ChangeType) -> bool {
        self.in_transit.intersects(mask)
    }

    /// Tick boundary: nothing is in transit anymore
    pub fn reset(&mut self) {
        self.in_transit = ChangeType::NONE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initially_clear() {
        let guard = InTransitGuard::new();
        assert!(!guard.is_in_transit(ChangeType::ALL));
    }

    #[test]
    fn test_mark_then_reset() {
        let mut guard = InTransitGuard::new();

        guard.mark(ChangeType::SOUNDOBJECT_POSITION);
        assert!(guard.is_in_transit(ChangeType::SOUNDOBJECT_POSITION));
        assert!(!guard.is_in_transit(ChangeType::SOURCE_SPREAD));

        guard.reset();
        assert!(!guard.is_in_transit(ChangeType::SOUNDOBJECT_POSITION));
    }

    #[test]
    fn test_marks_accumulate_within_tick() {
        let mut guard = InTransitGuard::new();
        guard.mark(ChangeType::DELAY_MODE);
        guard.mark(ChangeType::REVERB_SEND_GAIN);

        assert!(guard.is_in_transit(ChangeType::DELAY_MODE));
        assert!(guard.is_in_transit(ChangeType::REVERB_SEND_GAIN));
    }
}
