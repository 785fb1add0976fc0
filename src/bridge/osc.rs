//! OSC over UDP bridge to a DS100-style sound object processor
//!
//! Set commands carry values as OSC arguments; a message without arguments
//! is a poll and makes the device answer with the current value on the
//! same address.

use super::{ProtocolBridge, RemoteMessage, RemoteObjectKind, RemoteValue};
use crate::error::{Result, SurfaceError};
use async_trait::async_trait;
use rosc::{OscMessage, OscPacket, OscType};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

const POSITION_PREFIX: &str = "/dbaudio1/coordinatemapping/source_position_xy";
const REVERB_SEND_GAIN_PREFIX: &str = "/dbaudio1/matrixinput/reverbsendgain";
const SOURCE_SPREAD_PREFIX: &str = "/dbaudio1/positioning/source_spread";
const DELAY_MODE_PREFIX: &str = "/dbaudio1/positioning/source_delaymode";

const RECV_BUFFER_SIZE: usize = 1536;
const INBOUND_CHANNEL_SIZE: usize = 1024;
const RECV_ERROR_BACKOFF_MIN: Duration = Duration::from_millis(10);
const RECV_ERROR_BACKOFF_MAX: Duration = Duration::from_secs(1);

fn address_prefix(kind: RemoteObjectKind) -> &'static str {
    match kind {
        RemoteObjectKind::SoundobjectPosition => POSITION_PREFIX,
        RemoteObjectKind::ReverbSendGain => REVERB_SEND_GAIN_PREFIX,
        RemoteObjectKind::SourceSpread => SOURCE_SPREAD_PREFIX,
        RemoteObjectKind::DelayMode => DELAY_MODE_PREFIX,
    }
}

/// OSC address of a message
pub fn address_for(message: &RemoteMessage) -> String {
    let prefix = address_prefix(message.kind);
    if message.kind.is_mapped() {
        format!("{}/{}/{}", prefix, message.mapping_id, message.soundobject_id)
    } else {
        format!("{}/{}", prefix, message.soundobject_id)
    }
}

/// Build the OSC message for a set or poll
pub fn encode_message(message: &RemoteMessage) -> OscMessage {
    let args = match message.value {
        None => Vec::new(),
        Some(RemoteValue::Position { x, y }) => vec![OscType::Float(x), OscType::Float(y)],
        Some(RemoteValue::Float(v)) => vec![OscType::Float(v)],
        Some(RemoteValue::Int(v)) => vec![OscType::Int(v)],
    };
    OscMessage {
        addr: address_for(message),
        args,
    }
}

fn arg_f32(arg: Option<&OscType>) -> Option<f32> {
    match arg {
        Some(OscType::Float(v)) => Some(*v),
        Some(OscType::Double(v)) => Some(*v as f32),
        Some(OscType::Int(v)) => Some(*v as f32),
        _ => None,
    }
}

fn arg_i32(arg: Option<&OscType>) -> Option<i32> {
    match arg {
        Some(OscType::Int(v)) => Some(*v),
        Some(OscType::Long(v)) => i32::try_from(*v).ok(),
        Some(OscType::Float(v)) => Some(v.round() as i32),
        _ => None,
    }
}

/// Parse an OSC message coming from the device
///
/// Returns `None` for addresses this bridge does not know or for arguments
/// of the wrong shape.
pub fn decode_message(msg: &OscMessage) -> Option<RemoteMessage> {
    let (kind, rest) = RemoteObjectKind::ALL.iter().find_map(|kind| {
        msg.addr
            .strip_prefix(address_prefix(*kind))
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| (*kind, rest))
    })?;

    let mut segments = rest.split('/');
    let mapping_id = if kind.is_mapped() {
        segments.next()?.parse::<u8>().ok()?
    } else {
        0
    };
    let soundobject_id = segments.next()?.parse::<u16>().ok()?;
    if segments.next().is_some() {
        return None;
    }

    let value = if msg.args.is_empty() {
        None
    } else {
        Some(match kind {
            RemoteObjectKind::SoundobjectPosition => RemoteValue::Position {
                x: arg_f32(msg.args.first())?,
                y: arg_f32(msg.args.get(1))?,
            },
            RemoteObjectKind::ReverbSendGain | RemoteObjectKind::SourceSpread => {
                RemoteValue::Float(arg_f32(msg.args.first())?)
            }
            RemoteObjectKind::DelayMode => RemoteValue::Int(arg_i32(msg.args.first())?),
        })
    };

    Some(RemoteMessage {
        kind,
        soundobject_id,
        mapping_id,
        value,
    })
}

/// Flatten a packet (bundles may nest) into the messages this bridge understands
fn collect_messages(packet: OscPacket, out: &mut Vec<RemoteMessage>) {
    match packet {
        OscPacket::Message(msg) => match decode_message(&msg) {
            Some(message) => out.push(message),
            None => trace!("Ignoring OSC message {} ({} args)", msg.addr, msg.args.len()),
        },
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                collect_messages(inner, out);
            }
        }
    }
}

/// Delay before the next receive after an error, doubling up to a cap
fn next_backoff(previous: Option<Duration>) -> Duration {
    match previous {
        None => RECV_ERROR_BACKOFF_MIN,
        Some(delay) => (delay * 2).min(RECV_ERROR_BACKOFF_MAX),
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| SurfaceError::Osc(format!("cannot resolve {}:{}", host, port)))
}

/// UDP transport speaking the device's OSC dialect
pub struct OscBridge {
    socket: Arc<UdpSocket>,
    target: RwLock<SocketAddr>,
    inbound: Mutex<Option<mpsc::Receiver<RemoteMessage>>>,
    recv_task: Mutex<Option<JoinHandle<()>>>,
}

impl OscBridge {
    /// Bind the local listen port and start receiving from the device
    ///
    /// A `listen_port` of 0 lets the OS pick one (see [`local_addr`](Self::local_addr)).
    pub async fn connect(host: &str, port: u16, listen_port: u16) -> Result<Self> {
        let target = resolve(host, port).await?;
        let socket = Arc::new(UdpSocket::bind(("0.0.0.0", listen_port)).await?);
        info!(
            "OSC bridge: sending to {}, listening on {}",
            target,
            socket.local_addr()?
        );

        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_SIZE);
        let recv_task = tokio::spawn(Self::receive_loop(socket.clone(), tx));

        Ok(Self {
            socket,
            target: RwLock::new(target),
            inbound: Mutex::new(Some(rx)),
            recv_task: Mutex::new(Some(recv_task)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn target(&self) -> SocketAddr {
        *self.target.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn receive_loop(socket: Arc<UdpSocket>, tx: mpsc::Sender<RemoteMessage>) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut backoff = None;
        loop {
            let (len, from) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    // Windows reports ICMP port unreachable as a recv error
                    let delay = next_backoff(backoff);
                    debug!("OSC receive error: {} (retrying in {:?})", e, delay);
                    backoff = Some(delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };
            backoff = None;

            let packet = match rosc::decoder::decode_udp(&buf[..len]) {
                Ok((_, packet)) => packet,
                Err(e) => {
                    warn!("Malformed OSC packet from {}: {:?}", from, e);
                    continue;
                }
            };

            let mut messages = Vec::new();
            collect_messages(packet, &mut messages);
            for message in messages {
                if tx.send(message).await.is_err() {
                    debug!("OSC inbound receiver dropped, stopping receive loop");
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl ProtocolBridge for OscBridge {
    fn name(&self) -> &str {
        "osc"
    }

    async fn send(&self, message: &RemoteMessage) -> Result<()> {
        let packet = OscPacket::Message(encode_message(message));
        let bytes = rosc::encoder::encode(&packet).map_err(|e| SurfaceError::Osc(format!("{:?}", e)))?;
        self.socket.send_to(&bytes, self.target()).await?;
        Ok(())
    }

    async fn retarget(&self, host: &str, port: u16) -> Result<bool> {
        let target = resolve(host, port).await?;
        *self.target.write().unwrap_or_else(PoisonError::into_inner) = target;
        info!("OSC bridge: now sending to {}", target);
        Ok(true)
    }

    fn take_inbound(&self) -> Option<mpsc::Receiver<RemoteMessage>> {
        self.inbound.lock().ok().and_then(|mut slot| slot.take())
    }

    async fn shutdown(&self) -> Result<()> {
        let task = self.recv_task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            task.abort();
            info!("OSC bridge shut down");
        }
        Ok(())
    }
}

impl Drop for OscBridge {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.recv_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses() {
        let position = RemoteMessage::poll(RemoteObjectKind::SoundobjectPosition, 12, 2);
        assert_eq!(
            address_for(&position),
            "/dbaudio1/coordinatemapping/source_position_xy/2/12"
        );

        let gain = RemoteMessage::poll(RemoteObjectKind::ReverbSendGain, 7, 3);
        assert_eq!(address_for(&gain), "/dbaudio1/matrixinput/reverbsendgain/7");
    }

    #[test]
    fn test_encode_set_and_poll() {
        let set = RemoteMessage::set(
            RemoteObjectKind::SoundobjectPosition,
            1,
            1,
            RemoteValue::Position { x: 0.25, y: 0.75 },
        );
        let msg = encode_message(&set);
        assert_eq!(msg.args, vec![OscType::Float(0.25), OscType::Float(0.75)]);

        let poll = RemoteMessage::poll(RemoteObjectKind::DelayMode, 4, 1);
        assert!(encode_message(&poll).args.is_empty());
    }

    #[test]
    fn test_decode_device_reply() {
        let msg = OscMessage {
            addr: "/dbaudio1/positioning/source_delaymode/9".to_string(),
            args: vec![OscType::Int(2)],
        };
        let decoded = decode_message(&msg).unwrap();
        assert_eq!(decoded.kind, RemoteObjectKind::DelayMode);
        assert_eq!(decoded.soundobject_id, 9);
        assert_eq!(decoded.value, Some(RemoteValue::Int(2)));

        let msg = OscMessage {
            addr: "/dbaudio1/coordinatemapping/source_position_xy/3/40".to_string(),
            args: vec![OscType::Float(0.1), OscType::Float(0.9)],
        };
        let decoded = decode_message(&msg).unwrap();
        assert_eq!(decoded.mapping_id, 3);
        assert_eq!(decoded.soundobject_id, 40);
        assert_eq!(decoded.value, Some(RemoteValue::Position { x: 0.1, y: 0.9 }));
    }

    #[test]
    fn test_decode_rejects_unknown_and_malformed() {
        let unknown = OscMessage {
            addr: "/dbaudio1/settings/devicename".to_string(),
            args: vec![OscType::String("DS100".to_string())],
        };
        assert!(decode_message(&unknown).is_none());

        let missing_y = OscMessage {
            addr: "/dbaudio1/coordinatemapping/source_position_xy/1/1".to_string(),
            args: vec![OscType::Float(0.5)],
        };
        assert!(decode_message(&missing_y).is_none());

        let bad_id = OscMessage {
            addr: "/dbaudio1/positioning/source_spread/abc".to_string(),
            args: vec![OscType::Float(0.5)],
        };
        assert!(decode_message(&bad_id).is_none());

        let trailing = OscMessage {
            addr: "/dbaudio1/positioning/source_spread/4/extra".to_string(),
            args: vec![OscType::Float(0.5)],
        };
        assert!(decode_message(&trailing).is_none());
    }

    #[test]
    fn test_bundle_is_flattened() {
        let inner = |id: u16| {
            OscPacket::Message(encode_message(&RemoteMessage::set(
                RemoteObjectKind::SourceSpread,
                id,
                1,
                RemoteValue::Float(0.3),
            )))
        };
        let bundle = OscPacket::Bundle(rosc::OscBundle {
            timetag: rosc::OscTime { seconds: 0, fractional: 1 },
            content: vec![inner(1), inner(2)],
        });

        let mut out = Vec::new();
        collect_messages(bundle, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].soundobject_id, 2);
    }

    #[test]
    fn test_receive_error_backoff_grows_to_cap() {
        let mut delay = next_backoff(None);
        assert_eq!(delay, RECV_ERROR_BACKOFF_MIN);
        delay = next_backoff(Some(delay));
        assert_eq!(delay, RECV_ERROR_BACKOFF_MIN * 2);

        for _ in 0..20 {
            delay = next_backoff(Some(delay));
        }
        assert_eq!(delay, RECV_ERROR_BACKOFF_MAX);
    }

    #[tokio::test]
    async fn test_retarget_keeps_listen_port() {
        let first_device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let second_device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let second_port = second_device.local_addr().unwrap().port();

        let bridge = OscBridge::connect("127.0.0.1", first_device.local_addr().unwrap().port(), 0)
            .await
            .unwrap();
        let listen = bridge.local_addr().unwrap();

        assert!(bridge.retarget("127.0.0.1", second_port).await.unwrap());
        assert_eq!(bridge.target().port(), second_port);
        assert_eq!(bridge.local_addr().unwrap(), listen);

        let poll = RemoteMessage::poll(RemoteObjectKind::SourceSpread, 2, 1);
        bridge.send(&poll).await.unwrap();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), second_device.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(len > 0);

        bridge.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_loopback_send_and_receive() {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let device_port = device.local_addr().unwrap().port();

        let bridge = OscBridge::connect("127.0.0.1", device_port, 0).await.unwrap();
        let bridge_port = bridge.local_addr().unwrap().port();
        let mut inbound = bridge.take_inbound().unwrap();
        assert!(bridge.take_inbound().is_none());

        // Outbound set reaches the device
        let set = RemoteMessage::set(
            RemoteObjectKind::ReverbSendGain,
            5,
            1,
            RemoteValue::Float(-12.0),
        );
        bridge.send(&set).await.unwrap();

        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), device.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..len]).unwrap();
        match packet {
            OscPacket::Message(msg) => {
                let mut expected = set.clone();
                expected.mapping_id = 0;
                assert_eq!(decode_message(&msg), Some(expected));
            }
            OscPacket::Bundle(_) => panic!("expected a plain message"),
        }

        // Device reply comes back through the inbound channel
        let reply = rosc::encoder::encode(&OscPacket::Message(OscMessage {
            addr: "/dbaudio1/positioning/source_spread/5".to_string(),
            args: vec![OscType::Float(0.6)],
        }))
        .unwrap();
        device
            .send_to(&reply, ("127.0.0.1", bridge_port))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), inbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.kind, RemoteObjectKind::SourceSpread);
        assert_eq!(received.value, Some(RemoteValue::Float(0.6)));

        bridge.shutdown().await.unwrap();
    }
}
