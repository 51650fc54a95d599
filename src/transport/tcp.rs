//! TCP transport for framed control events from native input devices

use crate::command;
use crate::transport::traits::ControlEventSource;
use crate::vehicle::VehicleControl;
use anyhow::Result;
use async_trait::async_trait;
use gamepad_shared::codec::FrameDecoder;
use gamepad_shared::{CommandCatalog, ControlEvent};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Control events read from one TCP connection
pub struct TcpControlSource {
    stream: TcpStream,
    peer: SocketAddr,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl TcpControlSource {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 4096],
        }
    }
}

#[async_trait]
impl ControlEventSource for TcpControlSource {
    async fn next_event(&mut self) -> Option<ControlEvent> {
        loop {
            // Drain complete frames before reading more
            match self.decoder.decode_next() {
                Ok(Some(envelope)) => {
                    if let Some(header) = &envelope.header {
                        debug!(
                            "[{}] seq={} from {}",
                            header.device_id, header.sequence_id, self.peer
                        );
                    }
                    match envelope.control {
                        Some(event) => return Some(event),
                        None => {
                            debug!("Envelope from {} without control payload", self.peer);
                            continue;
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Dropping connection from {}: {}", self.peer, e);
                    return None;
                }
            }

            match self.stream.read(&mut self.read_buf).await {
                Ok(0) => {
                    if self.decoder.buffer_len() > 0 {
                        debug!(
                            "{} closed with {} bytes of partial frame",
                            self.peer,
                            self.decoder.buffer_len()
                        );
                    }
                    return None;
                }
                Ok(n) => self.decoder.extend(&self.read_buf[..n]),
                Err(e) => {
                    warn!("Read error from {}: {}", self.peer, e);
                    return None;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "TCP"
    }
}

/// Pause before accepting again after `e`
///
/// Errors tied to a single aborted connection are retried at once. Anything
/// else (e.g. out of file descriptors) would spin, so back off.
fn accept_retry_delay(e: &io::Error) -> Duration {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted => Duration::ZERO,
        _ => Duration::from_millis(500),
    }
}

/// Accept input devices forever, one dispatcher per connection
///
/// Only fails if the listener address cannot be read; accept errors are logged
/// and retried.
pub async fn serve(
    listener: TcpListener,
    vehicle: Arc<dyn VehicleControl>,
    catalog: Arc<CommandCatalog>,
) -> Result<()> {
    info!("Control listener on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                let delay = accept_retry_delay(&e);
                warn!("Accept failed, retrying in {:?}: {}", delay, e);
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        info!("Input device connected: {}", peer);

        command::init(
            vehicle.clone(),
            catalog.clone(),
            TcpControlSource::new(stream, peer),
        );
    }
}
