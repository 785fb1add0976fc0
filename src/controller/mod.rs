//! Controller - owns the processors and drives the protocol tick
//!
//! The controller is the single place where processors, UI state and bridge
//! settings meet:
//! - Processor registry (add/remove, identity lookup for inbound values)
//! - Periodic tick producing outbound set/poll messages
//! - Inbound value routing with echo suppression via the in-transit guard
//! - Online/offline tracking of the remote device
//! - The combined XML state document and its dirty flag


use crate::bridge::{RemoteMessage, RemoteObjectKind, RemoteValue};
use crate::change::{ChangeParticipant, ChangeType, ReentrancyFlag};
use crate::config::{AppConfig, BridgeConfig};
use crate::params::HostEvent;
use crate::processor::{ComsMode, ParameterIndex, ProcessorId, SoundobjectProcessor};
use crate::state_xml::{tags, UiState, XmlElement, STATE_VERSION};
use std::collections::BTreeMap;
use tracing::{debug, info, trace, warn};

/// Processor registry, UI state and protocol bookkeeping
#[derive(Debug)]
pub struct Controller {
    processors: BTreeMap<ProcessorId, SoundobjectProcessor>,
    next_id: u32,
    bridge: BridgeConfig,
    ui: UiState,
    online: bool,
    ticks_since_inbound: u32,
    state_lock: ReentrancyFlag,
    state_dirty: bool,
}

impl Controller {
    /// Create a controller with the processors listed in `config`
    pub fn new(config: &AppConfig) -> Self {
        let mut controller = Self {
            processors: BTreeMap::new(),
            next_id: 1,
            bridge: config.bridge.clone(),
            ui: UiState::new(),
            online: false,
            ticks_since_inbound: 0,
            state_lock: ReentrancyFlag::new(),
            state_dirty: false,
        };

        for processor in &config.processors {
            controller.add_processor(
                processor.soundobject_id,
                processor.mapping_id,
                processor.coms_mode,
            );
        }
        // Config processors are not user edits
        controller.state_dirty = false;
        controller
    }

    // ------------------------------------------------------------------
    // Processor registry
    // ------------------------------------------------------------------

    /// Create a processor and register it, returning its id
    ///
    /// Returns `None` once the id space is used up.
    pub fn add_processor(&mut self, soundobject_id: u16, mapping_id: u8, coms_mode: ComsMode) -> Option<ProcessorId> {
        let Some(id) = self.allocate_id() else {
            warn!("No processor ids left, not adding sound object {}", soundobject_id);
            return None;
        };

        let mut processor = SoundobjectProcessor::with_identity(
            id,
            soundobject_id as i64,
            mapping_id as i64,
            coms_mode,
        );
        prefer_remote_values(&mut processor);
        info!(
            "Processor {} added (sound object {}, mapping {}, {:?})",
            id,
            processor.soundobject_id(),
            processor.mapping_id(),
            processor.coms_mode()
        );
        self.processors.insert(id, processor);
        self.processor_set_changed();
        Some(id)
    }

    /// Hand out `next_id`, keeping it above every id in use
    fn allocate_id(&mut self) -> Option<ProcessorId> {
        let id = self.next_id;
        self.next_id = id.checked_add(1)?;
        Some(ProcessorId(id))
    }

    /// Unregister a processor, handing it back to the caller
    pub fn remove_processor(&mut self, id: ProcessorId) -> Option<SoundobjectProcessor> {
        let removed = self.processors.remove(&id)?;
        info!("Processor {} removed", id);
        self.processor_set_changed();
        Some(removed)
    }

    fn processor_set_changed(&mut self) {
        for processor in self.processors.values_mut() {
            processor.mark_changed(ChangeParticipant::Init, ChangeType::NUM_PROCESSORS);
        }
        if !self.state_lock.is_active() {
            self.state_dirty = true;
        }
    }

    pub fn processor(&self, id: ProcessorId) -> Option<&SoundobjectProcessor> {
        self.processors.get(&id)
    }

    pub fn processor_mut(&mut self, id: ProcessorId) -> Option<&mut SoundobjectProcessor> {
        self.processors.get_mut(&id)
    }

    pub fn processors(&self) -> impl Iterator<Item = &SoundobjectProcessor> {
        self.processors.values()
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Take queued host notifications of all processors
    pub fn drain_host_events(&mut self) -> Vec<(ProcessorId, HostEvent)> {
        let mut events = Vec::new();
        for (id, processor) in self.processors.iter_mut() {
            events.extend(processor.drain_host_events().into_iter().map(|e| (*id, e)));
        }
        events
    }

    // ------------------------------------------------------------------
    // Bridge settings and online state
    // ------------------------------------------------------------------

    pub fn bridge_config(&self) -> &BridgeConfig {
        &self.bridge
    }

    /// Which bridge settings differ from `bridge`, without applying them
    pub fn bridge_changes(&self, bridge: &BridgeConfig) -> ChangeType {
        let mut changed = ChangeType::NONE;
        if !bridge.same_endpoint(&self.bridge) {
            changed |= ChangeType::IP_ADDRESS;
        }
        if bridge.refresh_interval_ms != self.bridge.refresh_interval_ms {
            changed |= ChangeType::MESSAGE_RATE;
        }
        changed
    }

    /// Apply a (re)loaded config, returning which bridge settings changed
    ///
    /// Address and rate changes are marked on every processor so the editor
    /// and table pick them up. The processor list in the config only seeds a
    /// fresh controller and is ignored here. Callers apply a new address only
    /// once the bridge actually uses it.
    pub fn apply_config(&mut self, config: &AppConfig) -> ChangeType {
        let changed = self.bridge_changes(&config.bridge);

        self.bridge = config.bridge.clone();
        if !changed.is_empty() {
            debug!("Bridge settings changed: {:?}", changed);
            for processor in self.processors.values_mut() {
                processor.mark_changed(ChangeParticipant::Init, changed);
            }
        }
        changed
    }

    /// Whether the remote device answered within the last few ticks
    pub fn is_online(&self) -> bool {
        self.online
    }

    fn set_online(&mut self, online: bool) {
        if self.online == online {
            return;
        }
        self.online = online;
        if online {
            info!("Remote device is online");
        } else {
            warn!(
                "Remote device is offline (no traffic for {} ticks)",
                self.ticks_since_inbound
            );
        }
        for processor in self.processors.values_mut() {
            processor.mark_changed(ChangeParticipant::Protocol, ChangeType::ONLINE_STATE);
        }
    }

    // ------------------------------------------------------------------
    // Protocol tick and inbound values
    // ------------------------------------------------------------------

    /// Run one protocol tick and return the messages to send
    ///
    /// Clears every in-transit flag, then per processor:
    /// - Tx: one set message per changed category, marked in transit
    /// - Rx: a poll for each category that was not just sent
    ///
    /// Also counts the tick towards the offline timeout.
    pub fn tick(&mut self) -> Vec<RemoteMessage> {
        let mut outbound = Vec::new();

        for processor in self.processors.values_mut() {
            processor.reset_in_transit();

            let mode = processor.coms_mode();
            let mut sent = ChangeType::NONE;

            for kind in RemoteObjectKind::ALL {
                let change = kind.change_type();
                // Non-transmitting processors drop pending local changes
                if !processor.consume_changed(ChangeParticipant::Protocol, change) || !mode.transmits() {
                    continue;
                }
                outbound.push(RemoteMessage::set(
                    kind,
                    processor.soundobject_id(),
                    processor.mapping_id(),
                    remote_value(processor, kind),
                ));
                processor.mark_in_transit(change);
                sent |= change;
            }

            if mode.receives() {
                for kind in RemoteObjectKind::ALL {
                    if !sent.contains(kind.change_type()) {
                        outbound.push(RemoteMessage::poll(
                            kind,
                            processor.soundobject_id(),
                            processor.mapping_id(),
                        ));
                    }
                }
            }
        }

        self.ticks_since_inbound = self.ticks_since_inbound.saturating_add(1);
        if self.online && self.ticks_since_inbound >= self.bridge.offline_after_ticks {
            self.set_online(false);
        }

        trace!("Tick produced {} outbound messages", outbound.len());
        outbound
    }

    /// Apply a message received from the remote device
    ///
    /// Returns the number of processors whose values changed. Any inbound
    /// traffic, polls included, counts as a sign of life.
    pub fn handle_remote(&mut self, message: &RemoteMessage) -> usize {
        self.ticks_since_inbound = 0;
        self.set_online(true);

        let Some(value) = message.value else {
            return 0;
        };

        let change = message.kind.change_type();
        let mut updated = 0;

        for processor in self.processors.values_mut() {
            if !processor.coms_mode().receives()
                || processor.soundobject_id() != message.soundobject_id
                || (message.kind.is_mapped() && processor.mapping_id() != message.mapping_id)
            {
                continue;
            }

            // Our own set is still on the wire, this is its echo or older
            if processor.is_in_transit(change) {
                trace!("Processor {} ignoring {:?} while in transit", processor.id(), message.kind);
                continue;
            }

            if apply_remote_value(processor, message.kind, value) {
                updated += 1;
            }
        }

        updated
    }

    // ------------------------------------------------------------------
    // UI state
    // ------------------------------------------------------------------

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    /// Mutable UI state; any access counts as a change to persist
    pub fn ui_mut(&mut self) -> &mut UiState {
        if !self.state_lock.is_active() {
            self.state_dirty = true;
        }
        &mut self.ui
    }

    // ------------------------------------------------------------------
    // State document
    // ------------------------------------------------------------------

    pub fn create_state_xml(&self) -> XmlElement {
        let mut processors = XmlElement::new(tags::PROCESSORS);
        for processor in self.processors.values() {
            processors.add_child(processor.create_state_xml());
        }

        XmlElement::new(tags::ROOT)
            .with_attribute(tags::VERSION, STATE_VERSION)
            .with_child(processors)
            .with_child(self.ui.create_state_xml())
    }

    /// Restore processors and UI state from a document
    ///
    /// A document with a `Processors` element replaces the processor set.
    /// Returns `false` if the root tag is wrong (nothing is touched), a
    /// restore is already running, or any part failed to apply.
    pub fn set_state_xml(&mut self, root: &XmlElement) -> bool {
        if !root.has_tag(tags::ROOT) {
            warn!("Ignoring state document with root <{}>", root.tag());
            return false;
        }

        let Some(_guard) = self.state_lock.try_enter() else {
            warn!("State document restore already in progress");
            return false;
        };

        match root.int_attribute(tags::VERSION) {
            Some(version) if version > STATE_VERSION => {
                warn!("State document version {} is newer than {}", version, STATE_VERSION)
            }
            Some(_) => {}
            None => debug!("State document has no version"),
        }

        let mut ok = true;

        match root.child(tags::PROCESSORS) {
            Some(element) => ok &= self.restore_processors(element),
            None => ok = false,
        }

        match root.child(tags::UI_CONFIG) {
            Some(element) => ok &= self.ui.set_state_xml(element),
            None => ok = false,
        }

        ok
    }

    fn restore_processors(&mut self, element: &XmlElement) -> bool {
        let mut ok = true;
        let mut restored = BTreeMap::new();
        let mut unnumbered = Vec::new();

        for child in element.children_named(tags::PROCESSOR) {
            let id = child
                .int_attribute(tags::PROCESSOR_ID)
                .and_then(|id| u32::try_from(id).ok())
                // The highest id leaves no room for the next one
                .filter(|id| *id < u32::MAX)
                .map(ProcessorId)
                .filter(|id| !restored.contains_key(id));

            match id {
                Some(id) => {
                    let mut processor = SoundobjectProcessor::new(id);
                    ok &= processor.set_state_xml(child);
                    restored.insert(id, processor);
                }
                None => {
                    warn!("Processor element with missing, invalid or duplicate id, assigning a new one");
                    ok = false;
                    unnumbered.push(child);
                }
            }
        }

        self.next_id = restored.keys().map(|id: &ProcessorId| id.0 + 1).max().unwrap_or(1);
        for child in unnumbered {
            let Some(id) = self.allocate_id() else {
                warn!("No processor ids left, dropping processor element");
                break;
            };
            let mut processor = SoundobjectProcessor::new(id);
            ok &= processor.set_state_xml(child);
            restored.insert(id, processor);
        }

        for processor in restored.values_mut() {
            prefer_remote_values(processor);
        }

        self.processors = restored;
        info!("Restored {} processors from state document", self.processors.len());
        self.processor_set_changed();
        ok
    }

    /// Whether anything worth saving changed since the last call
    pub fn take_state_dirty(&mut self) -> bool {
        let mut dirty = std::mem::take(&mut self.state_dirty);
        for processor in self.processors.values_mut() {
            dirty |= processor.take_config_dirty();
        }
        dirty
    }
}

/// Drop pending parameter sends of a receiving processor
///
/// Its first tick then polls the device instead of overwriting the live
/// values with local defaults.
fn prefer_remote_values(processor: &mut SoundobjectProcessor) {
    if processor.coms_mode().receives() {
        processor.consume_changed(ChangeParticipant::Protocol, ChangeType::SOUNDOBJECT_PARAMETERS);
    }
}

/// Current value of `kind` as it goes on the wire
fn remote_value(processor: &SoundobjectProcessor, kind: RemoteObjectKind) -> RemoteValue {
    match kind {
        RemoteObjectKind::SoundobjectPosition => {
            let (x, y) = processor.position();
            RemoteValue::Position { x, y }
        }
        RemoteObjectKind::ReverbSendGain => {
            RemoteValue::Float(processor.parameter_value(ParameterIndex::ReverbSendGain))
        }
        RemoteObjectKind::SourceSpread => {
            RemoteValue::Float(processor.parameter_value(ParameterIndex::Spread))
        }
        RemoteObjectKind::DelayMode => RemoteValue::Int(processor.delay_mode() as i32),
    }
}

fn apply_remote_value(processor: &mut SoundobjectProcessor, kind: RemoteObjectKind, value: RemoteValue) -> bool {
    let source = ChangeParticipant::Protocol;
    match (kind, value) {
        (RemoteObjectKind::SoundobjectPosition, RemoteValue::Position { x, y }) => {
            processor.set_position(source, x, y)
        }
        (RemoteObjectKind::ReverbSendGain, RemoteValue::Float(v)) => {
            processor.set_parameter_value(source, ParameterIndex::ReverbSendGain, v)
        }
        (RemoteObjectKind::SourceSpread, RemoteValue::Float(v)) => {
            processor.set_parameter_value(source, ParameterIndex::Spread, v)
        }
        (RemoteObjectKind::DelayMode, RemoteValue::Int(v)) => {
            processor.set_parameter_value(source, ParameterIndex::DelayMode, v as f32)
        }
        (kind, value) => {
            warn!("Unexpected value {:?} for {:?}", value, kind);
            false
        }
    }
}
