//! UDP link from the sensor bridge
//!
//! The bridge sends one JSON object per datagram:
//!
//! ```json
//! {"type": "motion", "yaw": 0.1, "pitch": 0.0, "roll": 1.57,
//!  "gravity": {"x": 0.0, "y": -1.0, "z": 0.0},
//!  "user_acceleration": {"x": 0.01, "y": 0.0, "z": 0.02}}
//! {"type": "foreground"}
//! {"type": "end_of_media"}
//! {"type": "field_of_view", "degrees": 90}
//! ```
//!
//! Samples are stamped with the local clock on receipt.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use kiosk_core::{Clock, DeviceTime, KioskResult, MotionSample, Vector3};

use crate::ControllerEvent;

/// Largest datagram accepted
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// Pause after a failed receive before trying again
pub const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Wire form of a bridge message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkMessage {
    Motion {
        yaw: f64,
        pitch: f64,
        roll: f64,
        gravity: Vector3,
        #[serde(alias = "acceleration")]
        user_acceleration: Vector3,
    },
    Foreground,
    EndOfMedia,
    FieldOfView {
        degrees: f64,
    },
}

impl LinkMessage {
    /// Controller event for this message, stamped `now`
    pub fn into_event(self, now: DeviceTime) -> ControllerEvent {
        match self {
            LinkMessage::Motion {
                yaw,
                pitch,
                roll,
                gravity,
                user_acceleration,
            } => ControllerEvent::Motion(MotionSample {
                yaw,
                pitch,
                roll,
                gravity,
                user_acceleration,
                timestamp: now,
            }),
            LinkMessage::Foreground => ControllerEvent::Foreground,
            LinkMessage::EndOfMedia => ControllerEvent::EndOfMedia,
            LinkMessage::FieldOfView { degrees } => ControllerEvent::FieldOfView(degrees),
        }
    }
}

/// Decode one datagram
pub fn decode_datagram(bytes: &[u8], now: DeviceTime) -> Result<ControllerEvent, serde_json::Error> {
    serde_json::from_slice::<LinkMessage>(bytes).map(|m| m.into_event(now))
}

/// Where bridge datagrams come from
#[async_trait]
pub trait DatagramSource: Send + Sync + 'static {
    async fn recv_datagram(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)>;
}

#[async_trait]
impl DatagramSource for UdpSocket {
    async fn recv_datagram(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.recv_from(buf).await
    }
}

/// Decode datagrams from `source` and forward them until the controller
/// goes away. A receive error is logged and retried after
/// [`RECEIVE_ERROR_BACKOFF`].
pub async fn forward_datagrams<S>(source: Arc<S>, clock: Arc<dyn Clock>, events: mpsc::Sender<ControllerEvent>)
where
    S: DatagramSource + ?Sized,
{
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        match source.recv_datagram(&mut buf).await {
            Ok((len, peer)) => match decode_datagram(&buf[..len], clock.now()) {
                Ok(event) => {
                    if events.send(event).await.is_err() {
                        break; // Controller gone
                    }
                }
                Err(e) => tracing::debug!(%peer, error = %e, "ignoring malformed datagram"),
            },
            Err(e) => {
                tracing::warn!(error = %e, "motion link receive error");
                tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
            }
        }
    }
}

/// Bound UDP socket for the sensor bridge
pub struct MotionLink {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl MotionLink {
    pub async fn bind(addr: SocketAddr) -> KioskResult<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        tracing::info!(%local_addr, "motion link listening");
        Ok(MotionLink {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Forward decoded datagrams to the controller until it goes away
    pub fn start_receive_loop(
        &self,
        clock: Arc<dyn Clock>,
        events: mpsc::Sender<ControllerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(forward_datagrams(Arc::clone(&self.socket), clock, events))
    }
}
