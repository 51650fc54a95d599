//! Control-event wire types
//!
//! The same structs travel as protobuf inside length-prefixed frames (TCP input
//! devices) and as JSON objects (browser clients over WebSocket).

use prost::Message;
use serde::{Deserialize, Serialize};

/// A single control intent from a remote input device
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
pub struct ControlEvent {
    /// Command name, looked up in the command catalog
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub action: String,

    /// Movement speed; absent means full speed
    #[prost(double, optional, tag = "2")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    /// Animation name, only read for `animate`
    #[prost(string, optional, tag = "3")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,

    /// Animation duration in milliseconds, passed through unvalidated
    #[prost(double, optional, tag = "4")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Per-message metadata added by the input device
#[derive(Clone, PartialEq, Message)]
pub struct Header {
    #[prost(string, tag = "1")]
    pub device_id: String,

    #[prost(uint64, tag = "2")]
    pub sequence_id: u64,

    #[prost(uint64, tag = "3")]
    pub timestamp_ms: u64,
}

/// Top-level frame payload
#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,

    #[prost(message, optional, tag = "2")]
    pub control: Option<ControlEvent>,
}
