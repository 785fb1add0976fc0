//! Processor parameter and identity types

use crate::change::ChangeType;
use serde::{Deserialize, Serialize};

pub const MIN_SOUNDOBJECT_ID: u16 = 1;
pub const MAX_SOUNDOBJECT_ID: u16 = 128;
pub const MIN_MAPPING_ID: u8 = 1;
pub const MAX_MAPPING_ID: u8 = 4;

pub const REVERB_SEND_GAIN_MIN: f32 = -120.0;
pub const REVERB_SEND_GAIN_MAX: f32 = 24.0;

/// Labels of the delay mode choices, indexed by [`DelayMode`]
pub const DELAY_MODE_CHOICES: &[&str] = &["Off", "Tight", "Full"];

/// Opaque white, the default object colour
pub const DEFAULT_COLOUR: u32 = 0xFFFF_FFFF;
pub const DEFAULT_SIZE: f32 = 0.5;

/// Host-visible parameter slots, in automation index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterIndex {
    X = 0,
    Y = 1,
    ReverbSendGain = 2,
    Spread = 3,
    DelayMode = 4,
}

impl ParameterIndex {
    pub const COUNT: usize = 5;

    pub const ALL: [ParameterIndex; Self::COUNT] = [
        ParameterIndex::X,
        ParameterIndex::Y,
        ParameterIndex::ReverbSendGain,
        ParameterIndex::Spread,
        ParameterIndex::DelayMode,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Change category raised when this parameter is written
    pub fn change_type(self) -> ChangeType {
        match self {
            ParameterIndex::X | ParameterIndex::Y => ChangeType::SOUNDOBJECT_POSITION,
            ParameterIndex::ReverbSendGain => ChangeType::REVERB_SEND_GAIN,
            ParameterIndex::Spread => ChangeType::SOURCE_SPREAD,
            ParameterIndex::DelayMode => ChangeType::DELAY_MODE,
        }
    }
}

/// How the remote device renders the delay of a sound object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayMode {
    Off = 0,
    #[default]
    Tight = 1,
    Full = 2,
}

impl DelayMode {
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(DelayMode::Off),
            1 => Some(DelayMode::Tight),
            2 => Some(DelayMode::Full),
            _ => None,
        }
    }
}

/// Which direction values flow between a processor and the remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComsMode {
    /// No communication
    Off,
    /// Receive only: poll the device and apply its values
    Rx,
    /// Transmit only: send local changes
    Tx,
    /// Send local changes and apply remote ones
    #[default]
    TxRx,
}

impl ComsMode {
    pub fn transmits(self) -> bool {
        matches!(self, ComsMode::Tx | ComsMode::TxRx)
    }

    pub fn receives(self) -> bool {
        matches!(self, ComsMode::Rx | ComsMode::TxRx)
    }

    /// Bitmask form used in the state document (rx = 1, tx = 2)
    pub fn bits(self) -> i64 {
        match self {
            ComsMode::Off => 0,
            ComsMode::Rx => 1,
            ComsMode::Tx => 2,
            ComsMode::TxRx => 3,
        }
    }

    pub fn from_bits(bits: i64) -> Option<Self> {
        match bits {
            0 => Some(ComsMode::Off),
            1 => Some(ComsMode::Rx),
            2 => Some(ComsMode::Tx),
            3 => Some(ComsMode::TxRx),
            _ => None,
        }
    }
}

/// Identifies a processor within the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(pub u32);

impl std::fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub fn clamp_soundobject_id(id: i64) -> u16 {
    id.clamp(MIN_SOUNDOBJECT_ID as i64, MAX_SOUNDOBJECT_ID as i64) as u16
}

pub fn clamp_mapping_id(id: i64) -> u8 {
    id.clamp(MIN_MAPPING_ID as i64, MAX_MAPPING_ID as i64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_clamping() {
        assert_eq!(clamp_soundobject_id(0), 1);
        assert_eq!(clamp_soundobject_id(-7), 1);
        assert_eq!(clamp_soundobject_id(64), 64);
        assert_eq!(clamp_soundobject_id(1000), 128);
        assert_eq!(clamp_mapping_id(0), 1);
        assert_eq!(clamp_mapping_id(9), 4);
    }

    #[test]
    fn test_coms_mode_bits() {
        for mode in [ComsMode::Off, ComsMode::Rx, ComsMode::Tx, ComsMode::TxRx] {
            assert_eq!(ComsMode::from_bits(mode.bits()), Some(mode));
        }
        assert_eq!(ComsMode::from_bits(4), None);
        assert!(ComsMode::TxRx.transmits() && ComsMode::TxRx.receives());
        assert!(!ComsMode::Rx.transmits());
    }

    #[test]
    fn test_parameter_change_types() {
        assert_eq!(ParameterIndex::Y.change_type(), ChangeType::SOUNDOBJECT_POSITION);
        assert_eq!(ParameterIndex::from_index(4), Some(ParameterIndex::DelayMode));
        assert_eq!(ParameterIndex::from_index(5), None);
    }
}
