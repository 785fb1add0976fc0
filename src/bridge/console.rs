//! Console bridge - logs outbound messages instead of sending them
//!
//! Useful for running without a device on the network and for checking what
//! the controller would transmit.

use super::{ProtocolBridge, RemoteMessage};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

pub struct ConsoleBridge {
    sent: AtomicU64,
}

impl ConsoleBridge {
    pub fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
        }
    }

    /// Number of messages "sent" so far
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl Default for ConsoleBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolBridge for ConsoleBridge {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, message: &RemoteMessage) -> Result<()> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        match message.value {
            Some(value) => info!(
                "[#{}] set {:?} object {} (mapping {}) -> {:?}",
                n, message.kind, message.soundobject_id, message.mapping_id, value
            ),
            None => info!(
                "[#{}] poll {:?} object {} (mapping {})",
                n, message.kind, message.soundobject_id, message.mapping_id
            ),
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        info!("ConsoleBridge shut down after {} messages", self.sent_count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{RemoteObjectKind, RemoteValue};

    #[tokio::test]
    async fn test_counts_messages_and_has_no_inbound() {
        let bridge = ConsoleBridge::new();
        bridge
            .send(&RemoteMessage::set(
                RemoteObjectKind::SourceSpread,
                3,
                1,
                RemoteValue::Float(0.5),
            ))
            .await
            .unwrap();
        bridge
            .send(&RemoteMessage::poll(RemoteObjectKind::DelayMode, 3, 1))
            .await
            .unwrap();

        assert_eq!(bridge.sent_count(), 2);
        assert!(bridge.take_inbound().is_none());
    }
}
