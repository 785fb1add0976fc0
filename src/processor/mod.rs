//! Sound object processor - parameter store for one sound object
//!
//! Holds the automatable parameters (position, reverb send gain, spread,
//! delay mode) and identity values (sound object id, mapping area,
//! communication mode, colour/size) of one sound object. Every write is
//! recorded in the processor's [`ChangeLedger`] so the editor, table,
//! multi-slider, host and protocol bridge can each pick up what changed.

mod types;

pub use types::{
    clamp_mapping_id, clamp_soundobject_id, ComsMode, DelayMode, ParameterIndex, ProcessorId,
    DEFAULT_COLOUR, DEFAULT_SIZE, DELAY_MODE_CHOICES, MAX_MAPPING_ID, MAX_SOUNDOBJECT_ID,
    MIN_MAPPING_ID, MIN_SOUNDOBJECT_ID, REVERB_SEND_GAIN_MAX, REVERB_SEND_GAIN_MIN,
};

use crate::change::{ChangeLedger, ChangeParticipant, ChangeType, InTransitGuard, ReentrancyFlag};
use crate::params::{AutomationParameter, HostEvent};
use crate::state_xml::{tags, XmlElement};
use tracing::{debug, trace, warn};

/// Parameter store, change ledger and in-transit guard of one sound object
#[derive(Debug)]
pub struct SoundobjectProcessor {
    id: ProcessorId,
    parameters: Vec<AutomationParameter>,
    soundobject_id: u16,
    mapping_id: u8,
    coms_mode: ComsMode,
    colour: u32,
    size: f32,
    ledger: ChangeLedger,
    in_transit: InTransitGuard,
    host_events: Vec<HostEvent>,
    state_lock: ReentrancyFlag,
    config_dirty: bool,
}

impl SoundobjectProcessor {
    /// Create a processor with default parameters and identity
    pub fn new(id: ProcessorId) -> Self {
        let parameters = ParameterIndex::ALL
            .iter()
            .map(|index| Self::make_parameter(*index))
            .collect();

        let mut processor = Self {
            id,
            parameters,
            soundobject_id: MIN_SOUNDOBJECT_ID,
            mapping_id: MIN_MAPPING_ID,
            coms_mode: ComsMode::default(),
            colour: DEFAULT_COLOUR,
            size: DEFAULT_SIZE,
            ledger: ChangeLedger::new(),
            in_transit: InTransitGuard::new(),
            host_events: Vec::new(),
            state_lock: ReentrancyFlag::new(),
            config_dirty: false,
        };

        // Everyone starts out needing a full refresh
        processor.ledger.mark_changed(ChangeParticipant::Init, ChangeType::ALL);
        processor
    }

    /// Create a processor with the given identity (values are clamped)
    pub fn with_identity(
        id: ProcessorId,
        soundobject_id: i64,
        mapping_id: i64,
        coms_mode: ComsMode,
    ) -> Self {
        let mut processor = Self::new(id);
        processor.soundobject_id = clamp_soundobject_id(soundobject_id);
        processor.mapping_id = clamp_mapping_id(mapping_id);
        processor.coms_mode = coms_mode;
        processor
    }

    fn make_parameter(index: ParameterIndex) -> AutomationParameter {
        match index {
            ParameterIndex::X => AutomationParameter::float("x", "Position X", 0.0, 1.0, 0.5, ""),
            ParameterIndex::Y => AutomationParameter::float("y", "Position Y", 0.0, 1.0, 0.5, ""),
            ParameterIndex::ReverbSendGain => AutomationParameter::float(
                "reverbSendGain",
                "Reverb send gain",
                REVERB_SEND_GAIN_MIN,
                REVERB_SEND_GAIN_MAX,
                0.0,
                "dB",
            ),
            ParameterIndex::Spread => {
                AutomationParameter::float("spread", "Spread", 0.0, 1.0, 0.5, "")
            }
            ParameterIndex::DelayMode => AutomationParameter::choice(
                "delayMode",
                "Delay mode",
                DELAY_MODE_CHOICES,
                DelayMode::default() as usize,
            ),
        }
    }

    pub fn id(&self) -> ProcessorId {
        self.id
    }

    // ------------------------------------------------------------------
    // Parameter values
    // ------------------------------------------------------------------

    /// Current plain value of a parameter
    pub fn parameter_value(&self, index: ParameterIndex) -> f32 {
        self.parameters[index.index()].value()
    }

    /// Write a parameter on behalf of `source`
    ///
    /// The value is clamped into range. If it changed, the ledger is marked
    /// with the parameter's category and, unless the host itself is the
    /// source, the host is told about the new value. Returns whether the
    /// value changed.
    pub fn set_parameter_value(
        &mut self,
        source: ChangeParticipant,
        index: ParameterIndex,
        plain: f32,
    ) -> bool {
        if !self.parameters[index.index()].set_plain(plain) {
            return false;
        }

        trace!(
            "Processor {} {} = {} (from {})",
            self.id,
            self.parameters[index.index()].id(),
            self.parameter_value(index),
            source
        );

        self.ledger.mark_changed(source, index.change_type());
        if source != ChangeParticipant::Host && source != ChangeParticipant::Init {
            self.notify_host(index);
        }
        true
    }

    fn notify_host(&mut self, index: ParameterIndex) {
        let i = index.index();
        let event = HostEvent::ValueChanged {
            index: i,
            normalized: self.parameters[i].normalized(),
        };

        // Outside an open gesture, wrap the change in its own gesture so
        // touch-automation hosts record it
        if self.parameters[i].is_gesture_open() {
            self.host_events.push(event);
        } else {
            self.host_events.push(HostEvent::BeginGesture(i));
            self.host_events.push(event);
            self.host_events.push(HostEvent::EndGesture(i));
        }
    }

    pub fn position(&self) -> (f32, f32) {
        (
            self.parameter_value(ParameterIndex::X),
            self.parameter_value(ParameterIndex::Y),
        )
    }

    /// Write both coordinates, returning whether either changed
    pub fn set_position(&mut self, source: ChangeParticipant, x: f32, y: f32) -> bool {
        let x_changed = self.set_parameter_value(source, ParameterIndex::X, x);
        let y_changed = self.set_parameter_value(source, ParameterIndex::Y, y);
        x_changed || y_changed
    }

    pub fn delay_mode(&self) -> DelayMode {
        DelayMode::from_value(self.parameter_value(ParameterIndex::DelayMode) as i32)
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Host automation interface
    // ------------------------------------------------------------------

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameter(&self, index: usize) -> Option<&AutomationParameter> {
        self.parameters.get(index)
    }

    pub fn normalized_value(&self, index: usize) -> Option<f32> {
        self.parameters.get(index).map(|p| p.normalized())
    }

    /// Apply a normalized value coming from host automation
    pub fn set_normalized_from_host(&mut self, index: usize, normalized: f32) -> bool {
        let Some(param_index) = ParameterIndex::from_index(index) else {
            warn!("Host wrote unknown parameter index {}", index);
            return false;
        };
        let plain = self.parameters[index].normalized_to_plain(normalized);
        self.set_parameter_value(ChangeParticipant::Host, param_index, plain)
    }

    /// Start a user gesture (e.g. slider drag) on a parameter
    pub fn begin_gesture(&mut self, index: usize) {
        if let Some(param) = self.parameters.get_mut(index) {
            if param.open_gesture() {
                self.host_events.push(HostEvent::BeginGesture(index));
            }
        }
    }

    /// End a user gesture started with [`begin_gesture`](Self::begin_gesture)
    pub fn end_gesture(&mut self, index: usize) {
        if let Some(param) = self.parameters.get_mut(index) {
            if param.close_gesture() {
                self.host_events.push(HostEvent::EndGesture(index));
            }
        }
    }

    /// Take the notifications queued for the host
    pub fn drain_host_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.host_events)
    }

    // ------------------------------------------------------------------
    // Change ledger and in-transit guard
    // ------------------------------------------------------------------

    pub fn mark_changed(&mut self, source: ChangeParticipant, mask: ChangeType) {
        self.ledger.mark_changed(source, mask);
    }

    pub fn has_changed(&self, participant: ChangeParticipant, mask: ChangeType) -> bool {
        self.ledger.has_changed(participant, mask)
    }

    pub fn consume_changed(&mut self, participant: ChangeParticipant, mask: ChangeType) -> bool {
        self.ledger.consume_changed(participant, mask)
    }

    pub fn mark_in_transit(&mut self, mask: ChangeType) {
        self.in_transit.mark(mask);
    }

    pub fn is_in_transit(&self, mask: ChangeType) -> bool {
        self.in_transit.is_in_transit(mask)
    }

    pub fn reset_in_transit(&mut self) {
        self.in_transit.reset();
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub fn soundobject_id(&self) -> u16 {
        self.soundobject_id
    }

    /// Set the remote sound object id, clamped to the valid range
    pub fn set_soundobject_id(&mut self, source: ChangeParticipant, id: i64) {
        let clamped = clamp_soundobject_id(id);
        if clamped as i64 != id {
            debug!("Sound object id {} clamped to {}", id, clamped);
        }
        if clamped != self.soundobject_id {
            self.soundobject_id = clamped;
            self.identity_changed(source, ChangeType::SOUNDOBJECT_ID);
        }
    }

    pub fn mapping_id(&self) -> u8 {
        self.mapping_id
    }

    /// Set the coordinate mapping area, clamped to the valid range
    pub fn set_mapping_id(&mut self, source: ChangeParticipant, id: i64) {
        let clamped = clamp_mapping_id(id);
        if clamped != self.mapping_id {
            self.mapping_id = clamped;
            self.identity_changed(source, ChangeType::MAPPING_ID);
        }
    }

    pub fn coms_mode(&self) -> ComsMode {
        self.coms_mode
    }

    pub fn set_coms_mode(&mut self, source: ChangeParticipant, mode: ComsMode) {
        if mode != self.coms_mode {
            self.coms_mode = mode;
            self.identity_changed(source, ChangeType::COMS_MODE);
        }
    }

    /// Display colour as ARGB
    pub fn colour(&self) -> u32 {
        self.colour
    }

    /// Display size, 0.0-1.0
    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn set_colour_and_size(&mut self, source: ChangeParticipant, colour: u32, size: f32) {
        let size = if size.is_nan() {
            DEFAULT_SIZE
        } else {
            size.clamp(0.0, 1.0)
        };
        if colour != self.colour || size != self.size {
            self.colour = colour;
            self.size = size;
            self.identity_changed(source, ChangeType::COLOUR_AND_SIZE);
        }
    }

    fn identity_changed(&mut self, source: ChangeParticipant, change: ChangeType) {
        self.ledger.mark_changed(source, change);
        // Writes made while a document is being applied are not new config
        if !self.state_lock.is_active() {
            self.config_dirty = true;
        }
    }

    /// Whether identity changed since the last call
    pub fn take_config_dirty(&mut self) -> bool {
        std::mem::take(&mut self.config_dirty)
    }

    // ------------------------------------------------------------------
    // State document
    // ------------------------------------------------------------------

    pub fn create_state_xml(&self) -> XmlElement {
        let identity = XmlElement::new(tags::IDENTITY)
            .with_attribute(tags::SOUNDOBJECT_ID, self.soundobject_id)
            .with_attribute(tags::MAPPING_ID, self.mapping_id)
            .with_attribute(tags::COMS_MODE, self.coms_mode.bits())
            .with_attribute(tags::COLOUR, format!("#{:08X}", self.colour))
            .with_attribute(tags::SIZE, self.size);

        let mut parameters = XmlElement::new(tags::PARAMETERS);
        for param in &self.parameters {
            parameters.set_attribute(param.id(), param.value());
        }

        XmlElement::new(tags::PROCESSOR)
            .with_attribute(tags::PROCESSOR_ID, self.id.0)
            .with_child(identity)
            .with_child(parameters)
    }

    /// Restore from an element created by [`create_state_xml`](Self::create_state_xml)
    ///
    /// Returns `false` without touching anything if the tag does not match or
    /// a restore is already running. Missing or invalid values keep their
    /// current setting (invalid communication modes fall back to the default)
    /// and make the call return `false`.
    pub fn set_state_xml(&mut self, element: &XmlElement) -> bool {
        if !element.has_tag(tags::PROCESSOR) {
            debug!("Processor {} ignoring element <{}>", self.id, element.tag());
            return false;
        }

        let Some(_guard) = self.state_lock.try_enter() else {
            warn!("Processor {} state restore already in progress", self.id);
            return false;
        };

        let source = ChangeParticipant::Init;
        let mut ok = true;

        match element.child(tags::IDENTITY) {
            Some(identity) => {
                match identity.int_attribute(tags::SOUNDOBJECT_ID) {
                    Some(id) => self.set_soundobject_id(source, id),
                    None => ok = false,
                }
                match identity.int_attribute(tags::MAPPING_ID) {
                    Some(id) => self.set_mapping_id(source, id),
                    None => ok = false,
                }
                match identity.int_attribute(tags::COMS_MODE).map(ComsMode::from_bits) {
                    Some(Some(mode)) => self.set_coms_mode(source, mode),
                    Some(None) => {
                        warn!("Processor {} has invalid coms mode, using default", self.id);
                        self.set_coms_mode(source, ComsMode::default());
                        ok = false;
                    }
                    None => ok = false,
                }
                let colour = identity
                    .attribute(tags::COLOUR)
                    .and_then(|c| u32::from_str_radix(c.trim().trim_start_matches('#'), 16).ok());
                let size = identity.double_attribute(tags::SIZE);
                if colour.is_none() || size.is_none() {
                    ok = false;
                }
                self.set_colour_and_size(
                    source,
                    colour.unwrap_or(self.colour),
                    size.map(|s| s as f32).unwrap_or(self.size),
                );
            }
            None => ok = false,
        }

        match element.child(tags::PARAMETERS) {
            Some(parameters) => {
                for index in ParameterIndex::ALL {
                    let key = self.parameters[index.index()].id();
                    match parameters.double_attribute(key) {
                        Some(value) => {
                            self.set_parameter_value(source, index, value as f32);
                        }
                        None => ok = false,
                    }
                }
            }
            None => ok = false,
        }

        ok
    }
}
