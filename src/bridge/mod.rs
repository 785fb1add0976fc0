//! Protocol bridges to the remote spatial audio processor
//!
//! The controller produces and consumes [`RemoteMessage`]s; a bridge turns
//! them into wire traffic. [`OscBridge`] talks OSC over UDP, [`ConsoleBridge`]
//! only logs what would be sent.

pub mod console;
pub mod osc;

pub use console::ConsoleBridge;
pub use osc::OscBridge;

use crate::change::ChangeType;
use crate::config::{BridgeConfig, BridgeProtocol};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Remote value a message refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteObjectKind {
    /// Position within a coordinate mapping area (x, y)
    SoundobjectPosition,
    /// Matrix input reverb send gain (dB)
    ReverbSendGain,
    /// Source spread (0-1)
    SourceSpread,
    /// Delay mode (0 = off, 1 = tight, 2 = full)
    DelayMode,
}

impl RemoteObjectKind {
    pub const ALL: [RemoteObjectKind; 4] = [
        RemoteObjectKind::SoundobjectPosition,
        RemoteObjectKind::ReverbSendGain,
        RemoteObjectKind::SourceSpread,
        RemoteObjectKind::DelayMode,
    ];

    /// Change category this remote value corresponds to
    pub fn change_type(self) -> ChangeType {
        match self {
            RemoteObjectKind::SoundobjectPosition => ChangeType::SOUNDOBJECT_POSITION,
            RemoteObjectKind::ReverbSendGain => ChangeType::REVERB_SEND_GAIN,
            RemoteObjectKind::SourceSpread => ChangeType::SOURCE_SPREAD,
            RemoteObjectKind::DelayMode => ChangeType::DELAY_MODE,
        }
    }

    /// Whether the address includes the mapping area
    pub fn is_mapped(self) -> bool {
        matches!(self, RemoteObjectKind::SoundobjectPosition)
    }
}

/// Payload of a set message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteValue {
    Position { x: f32, y: f32 },
    Float(f32),
    Int(i32),
}

/// A set command, a poll request (no value) or a value reported by the device
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMessage {
    pub kind: RemoteObjectKind,
    pub soundobject_id: u16,
    /// Mapping area, only meaningful for mapped kinds
    pub mapping_id: u8,
    pub value: Option<RemoteValue>,
}

impl RemoteMessage {
    pub fn set(kind: RemoteObjectKind, soundobject_id: u16, mapping_id: u8, value: RemoteValue) -> Self {
        Self {
            kind,
            soundobject_id,
            mapping_id,
            value: Some(value),
        }
    }

    pub fn poll(kind: RemoteObjectKind, soundobject_id: u16, mapping_id: u8) -> Self {
        Self {
            kind,
            soundobject_id,
            mapping_id,
            value: None,
        }
    }

    pub fn is_poll(&self) -> bool {
        self.value.is_none()
    }
}

/// Transport between the controller and the remote device
///
/// Methods take `&self` so a bridge can be shared behind an `Arc`.
#[async_trait]
pub trait ProtocolBridge: Send + Sync {
    /// Bridge name for logging (e.g. "osc", "console")
    fn name(&self) -> &str;

    /// Send one message to the remote device
    async fn send(&self, message: &RemoteMessage) -> Result<()>;

    /// Take the receiver of messages coming from the device
    ///
    /// Returns `None` if the bridge never produces inbound traffic or the
    /// receiver was already taken.
    fn take_inbound(&self) -> Option<mpsc::Receiver<RemoteMessage>> {
        None
    }

    /// Send to a new device address over the transport already open
    ///
    /// Returns `false` if this bridge has no device address to change.
    async fn retarget(&self, _host: &str, _port: u16) -> Result<bool> {
        Ok(false)
    }

    /// Stop background tasks and release the transport
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the bridge described by `config`
pub async fn connect(config: &BridgeConfig) -> Result<Arc<dyn ProtocolBridge>> {
    let bridge: Arc<dyn ProtocolBridge> = match config.protocol {
        BridgeProtocol::Osc => {
            Arc::new(OscBridge::connect(&config.host, config.port, config.listen_port).await?)
        }
        BridgeProtocol::Console => Arc::new(ConsoleBridge::new()),
    };
    Ok(bridge)
}

/// Move `current`, opened from `old`, over to the settings in `new`
///
/// A bridge keeping its protocol and listen port still holds that port, so
/// it is retargeted in place and `None` is returned. Otherwise the new bridge
/// is opened first and the old one shut down once that succeeded. On error
/// `current` is untouched and stays usable.
pub async fn reconnect(
    current: &Arc<dyn ProtocolBridge>,
    old: &BridgeConfig,
    new: &BridgeConfig,
) -> Result<Option<Arc<dyn ProtocolBridge>>> {
    if old.protocol == new.protocol && old.listen_port == new.listen_port {
        if current.retarget(&new.host, new.port).await? {
            return Ok(None);
        }
        if new.protocol == BridgeProtocol::Console {
            return Ok(None);
        }
    }

    let replacement = connect(new).await?;
    if let Err(e) = current.shutdown().await {
        warn!("Failed to shut down {} bridge: {}", current.name(), e);
    }
    info!("Switched from {} to {} bridge", current.name(), replacement.name());
    Ok(Some(replacement))
}
