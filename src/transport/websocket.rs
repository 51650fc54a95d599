//! WebSocket transport for browser input devices
//!
//! Browsers send one JSON-encoded control event per text frame.

use crate::command::ControlDispatcher;
use crate::transport::traits::ControlEventSource;
use crate::vehicle::VehicleControl;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use gamepad_shared::{CommandCatalog, ControlEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Path of the control socket
pub const SOCKET_PATH: &str = "/nodecopter-gamepad/socket";

/// Shared by every socket handler
#[derive(Clone)]
pub struct ControlHub {
    pub vehicle: Arc<dyn VehicleControl>,
    pub catalog: Arc<CommandCatalog>,
}

/// Router exposing the control socket
pub fn router(hub: ControlHub) -> Router {
    Router::new()
        .route(SOCKET_PATH, get(upgrade))
        .with_state(hub)
}

async fn upgrade(ws: WebSocketUpgrade, State(hub): State<ControlHub>) -> Response {
    ws.on_upgrade(move |socket| async move {
        info!("Browser input device connected");
        ControlDispatcher::new(hub.vehicle, hub.catalog)
            .run(WebSocketControlSource::new(socket))
            .await;
    })
}

/// Control events read from one WebSocket
pub struct WebSocketControlSource {
    socket: WebSocket,
}

impl WebSocketControlSource {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl ControlEventSource for WebSocketControlSource {
    async fn next_event(&mut self) -> Option<ControlEvent> {
        loop {
            match self.socket.recv().await? {
                Ok(Message::Text(text)) => {
                    if let Some(event) = parse_control_message(&text) {
                        return Some(event);
                    }
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error: {}", e);
                    return None;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "WebSocket"
    }
}

/// Parse one text frame; malformed frames are logged and skipped
fn parse_control_message(text: &str) -> Option<ControlEvent> {
    match serde_json::from_str::<ControlEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Ignoring malformed control message: {}", e);
            debug!("  payload: {}", text);
            None
        }
    }
}
