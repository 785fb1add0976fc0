//! Change participant and change category definitions

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Application module that can originate or consume a change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeParticipant {
    /// Plugin host / DAW automation
    Host,
    /// Per-processor editor
    SoundobjectProcessor,
    /// Overview table of all sound objects
    SoundobjectTable,
    /// 2D multi-slider showing all sound objects of a mapping area
    MultiSlider,
    /// Protocol bridge to the remote device
    Protocol,
    /// Initialization and state restore
    Init,
}

impl ChangeParticipant {
    /// Number of participants
    pub const COUNT: usize = 6;

    /// All participants, in ledger order
    pub const ALL: [ChangeParticipant; Self::COUNT] = [
        ChangeParticipant::Host,
        ChangeParticipant::SoundobjectProcessor,
        ChangeParticipant::SoundobjectTable,
        ChangeParticipant::MultiSlider,
        ChangeParticipant::Protocol,
        ChangeParticipant::Init,
    ];

    /// Position of this participant in the ledger
    pub fn index(self) -> usize {
        self as usize
    }

    /// Table and multi-slider are both writers and pollers of the same
    /// values, so they get flagged for their own writes too.
    pub fn receives_own_changes(self) -> bool {
        matches!(
            self,
            ChangeParticipant::SoundobjectTable | ChangeParticipant::MultiSlider
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeParticipant::Host => "host",
            ChangeParticipant::SoundobjectProcessor => "processor",
            ChangeParticipant::SoundobjectTable => "table",
            ChangeParticipant::MultiSlider => "multislider",
            ChangeParticipant::Protocol => "protocol",
            ChangeParticipant::Init => "init",
        }
    }
}

impl fmt::Display for ChangeParticipant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bitmask of semantic change categories
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChangeType(u32);

impl ChangeType {
    pub const NONE: ChangeType = ChangeType(0);
    pub const NUM_PROCESSORS: ChangeType = ChangeType(1 << 0);
    pub const IP_ADDRESS: ChangeType = ChangeType(1 << 1);
    pub const MESSAGE_RATE: ChangeType = ChangeType(1 << 2);
    pub const ONLINE_STATE: ChangeType = ChangeType(1 << 3);
    pub const SOUNDOBJECT_ID: ChangeType = ChangeType(1 << 4);
    pub const MAPPING_ID: ChangeType = ChangeType(1 << 5);
    pub const COMS_MODE: ChangeType = ChangeType(1 << 6);
    pub const COLOUR_AND_SIZE: ChangeType = ChangeType(1 << 7);
    pub const SOUNDOBJECT_POSITION: ChangeType = ChangeType(1 << 8);
    pub const REVERB_SEND_GAIN: ChangeType = ChangeType(1 << 9);
    pub const SOURCE_SPREAD: ChangeType = ChangeType(1 << 10);
    pub const DELAY_MODE: ChangeType = ChangeType(1 << 11);
    pub const PROCESSOR_SELECTION: ChangeType = ChangeType(1 << 12);
    pub const BRIDGING_CONFIG: ChangeType = ChangeType(1 << 13);

    /// Every value the remote device renders for a sound object
    pub const SOUNDOBJECT_PARAMETERS: ChangeType = ChangeType(
        Self::SOUNDOBJECT_POSITION.0
            | Self::REVERB_SEND_GAIN.0
            | Self::SOURCE_SPREAD.0
            | Self::DELAY_MODE.0,
    );

    /// Every defined category
    pub const ALL: ChangeType = ChangeType((1 << 14) - 1);

    const NAMES: [(ChangeType, &'static str); 14] = [
        (Self::NUM_PROCESSORS, "num_processors"),
        (Self::IP_ADDRESS, "ip_address"),
        (Self::MESSAGE_RATE, "message_rate"),
        (Self::ONLINE_STATE, "online_state"),
        (Self::SOUNDOBJECT_ID, "soundobject_id"),
        (Self::MAPPING_ID, "mapping_id"),
        (Self::COMS_MODE, "coms_mode"),
        (Self::COLOUR_AND_SIZE, "colour_and_size"),
        (Self::SOUNDOBJECT_POSITION, "position"),
        (Self::REVERB_SEND_GAIN, "reverb_send_gain"),
        (Self::SOURCE_SPREAD, "spread"),
        (Self::DELAY_MODE, "delay_mode"),
        (Self::PROCESSOR_SELECTION, "processor_selection"),
        (Self::BRIDGING_CONFIG, "bridging_config"),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        ChangeType(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set
    pub const fn contains(self, other: ChangeType) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set
    pub const fn intersects(self, other: ChangeType) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for ChangeType {
    type Output = ChangeType;

    fn bitor(self, rhs: ChangeType) -> ChangeType {
        ChangeType(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeType {
    fn bitor_assign(&mut self, rhs: ChangeType) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ChangeType {
    type Output = ChangeType;

    fn bitand(self, rhs: ChangeType) -> ChangeType {
        ChangeType(self.0 & rhs.0)
    }
}

impl BitAndAssign for ChangeType {
    fn bitand_assign(&mut self, rhs: ChangeType) {
        self.0 &= rhs.0;
    }
}

impl Not for ChangeType {
    type Output = ChangeType;

    fn not(self) -> ChangeType {
        ChangeType(!self.0)
    }
}

impl fmt::Debug for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "ChangeType(none)");
        }

        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "ChangeType({})", names.join(" | "))
    }
}
