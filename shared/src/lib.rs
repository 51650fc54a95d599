//! Gamepad Relay Shared Types
//!
//! This crate provides the control-event wire types, the command catalog and the
//! framing codec shared by the relay process and the remote input devices.

pub mod catalog;
pub mod codec;
pub mod protocol;

use std::time::{SystemTime, UNIX_EPOCH};

pub use catalog::{Action, Animation, CatalogError, CommandCatalog, Movement};
pub use protocol::{ControlEvent, Envelope, Header};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Bounds applied to control parameters
pub mod limits {
    /// Upper bound for movement speed; larger values are clamped
    pub const MAX_SPEED: f64 = 1.0;

    /// Speed used when a movement event carries none
    pub const DEFAULT_SPEED: f64 = 1.0;
}

/// Builder helpers for creating messages
impl Header {
    /// Create a new header for the given input device
    pub fn new(device_id: impl Into<String>, sequence_id: u64) -> Self {
        Self {
            device_id: device_id.into(),
            sequence_id,
            timestamp_ms: now_ms(),
        }
    }
}

impl Envelope {
    /// Wrap a control event for transmission
    pub fn control(header: Header, event: ControlEvent) -> Self {
        Self {
            header: Some(header),
            control: Some(event),
        }
    }
}

impl ControlEvent {
    /// A bare action without parameters, e.g. `stop` or `takeoffOrLand`
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            speed: None,
            animation: None,
            duration: None,
        }
    }

    /// A movement at the given speed
    pub fn movement(action: impl Into<String>, speed: f64) -> Self {
        Self {
            speed: Some(speed),
            ..Self::action(action)
        }
    }

    /// An `animate` action
    pub fn animate(animation: impl Into<String>, duration: Option<f64>) -> Self {
        Self {
            animation: Some(animation.into()),
            duration,
            ..Self::action("animate")
        }
    }
}
