//! Parrot AR.Drone 2.0 vehicle client

pub mod at;
pub mod client;
pub mod navdata;

pub use client::{ArDroneClient, ArDroneConfig};
