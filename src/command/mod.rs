//! Control-event handling
//!
//! This module handles:
//! - Classifying command names against the command catalog
//! - Validating and clamping control parameters
//! - Resolving `takeoffOrLand` from the last known flying state
//! - Issuing exactly one vehicle command per valid event

mod classifier;
mod dispatcher;

pub use dispatcher::{init, ControlDispatcher};
