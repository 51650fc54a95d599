//! Navdata packet parsing
//!
//! Packets are little-endian: a 16-byte header followed by a list of
//! `(id, size, body)` options, where `size` counts the 4-byte option header.

use crate::vehicle::{DroneStateReport, FlightStateNotification};
use bytes::Buf;
use thiserror::Error;

pub const NAVDATA_HEADER: u32 = 0x5566_7788;

const HEADER_LEN: usize = 16;
const OPTION_HEADER_LEN: usize = 4;
const OPTION_DEMO: u16 = 0;
const OPTION_CHECKSUM: u16 = 0xFFFF;
const DEMO_BODY_LEN: usize = 36;

#[derive(Error, Debug, PartialEq)]
pub enum NavdataError {
    #[error("Packet too short: {0} bytes")]
    Truncated(usize),

    #[error("Bad navdata header: {0:#010x}")]
    BadHeader(u32),

    #[error("Option {id} claims {size} bytes, {available} available")]
    BadOption {
        id: u16,
        size: u16,
        available: usize,
    },

    #[error("Checksum mismatch: packet says {expected:#x}, computed {computed:#x}")]
    Checksum { expected: u32, computed: u32 },
}

/// The 32-bit drone state word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroneStateFlags(pub u32);

impl DroneStateFlags {
    const FLYING: u32 = 1 << 0;
    const LOW_BATTERY: u32 = 1 << 15;
    const NAVDATA_BOOTSTRAP: u32 = 1 << 11;
    const COM_WATCHDOG: u32 = 1 << 30;
    const EMERGENCY: u32 = 1 << 31;

    pub fn flying(self) -> bool {
        self.0 & Self::FLYING != 0
    }

    pub fn low_battery(self) -> bool {
        self.0 & Self::LOW_BATTERY != 0
    }

    /// Set until the drone is told which navdata set to send
    pub fn navdata_bootstrap(self) -> bool {
        self.0 & Self::NAVDATA_BOOTSTRAP != 0
    }

    /// Set when the drone has not seen a valid AT sequence recently
    pub fn com_watchdog(self) -> bool {
        self.0 & Self::COM_WATCHDOG != 0
    }

    pub fn emergency(self) -> bool {
        self.0 & Self::EMERGENCY != 0
    }
}

/// Body of the demo option
#[derive(Debug, Clone, PartialEq)]
pub struct NavdataDemo {
    pub control_state: u32,
    pub battery_percent: u32,
    /// Pitch, roll and yaw in millidegrees
    pub theta: f32,
    pub phi: f32,
    pub psi: f32,
    pub altitude_m: f32,
    /// Estimated speed in mm/s
    pub velocity: [f32; 3],
}

impl NavdataDemo {
    fn parse(mut body: &[u8]) -> Self {
        let control_state = body.get_u32_le();
        let battery_percent = body.get_u32_le();
        let theta = body.get_f32_le();
        let phi = body.get_f32_le();
        let psi = body.get_f32_le();
        let altitude_mm = body.get_i32_le();
        let velocity = [body.get_f32_le(), body.get_f32_le(), body.get_f32_le()];

        Self {
            control_state,
            battery_percent,
            theta,
            phi,
            psi,
            altitude_m: altitude_mm as f32 / 1000.0,
            velocity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Navdata {
    pub state: DroneStateFlags,
    pub sequence: u32,
    pub vision_defined: bool,
    pub demo: Option<NavdataDemo>,
}

impl Navdata {
    pub fn parse(packet: &[u8]) -> Result<Self, NavdataError> {
        if packet.len() < HEADER_LEN {
            return Err(NavdataError::Truncated(packet.len()));
        }

        let mut buf = packet;
        let header = buf.get_u32_le();
        if header != NAVDATA_HEADER {
            return Err(NavdataError::BadHeader(header));
        }
        let state = DroneStateFlags(buf.get_u32_le());
        let sequence = buf.get_u32_le();
        let vision_defined = buf.get_u32_le() != 0;

        let mut demo = None;
        while buf.remaining() >= OPTION_HEADER_LEN {
            let option_start = packet.len() - buf.remaining();
            let id = buf.get_u16_le();
            let size = buf.get_u16_le();

            let body_len = (size as usize)
                .checked_sub(OPTION_HEADER_LEN)
                .filter(|len| *len <= buf.remaining())
                .ok_or(NavdataError::BadOption {
                    id,
                    size,
                    available: buf.remaining(),
                })?;
            let (mut body, rest) = buf.split_at(body_len);
            buf = rest;

            match id {
                OPTION_DEMO => {
                    if body.len() < DEMO_BODY_LEN {
                        return Err(NavdataError::BadOption {
                            id,
                            size,
                            available: body.len(),
                        });
                    }
                    demo = Some(NavdataDemo::parse(body));
                }
                OPTION_CHECKSUM => {
                    if body.len() < 4 {
                        return Err(NavdataError::BadOption {
                            id,
                            size,
                            available: body.len(),
                        });
                    }
                    let expected = body.get_u32_le();
                    let computed = checksum(&packet[..option_start]);
                    if expected != computed {
                        return Err(NavdataError::Checksum { expected, computed });
                    }
                    break;
                }
                _ => {}
            }
        }

        Ok(Self {
            state,
            sequence,
            vision_defined,
            demo,
        })
    }
}

/// Wrapping byte sum of everything before the checksum option
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, b| acc.wrapping_add(u32::from(*b)))
}

impl From<&Navdata> for FlightStateNotification {
    fn from(navdata: &Navdata) -> Self {
        Self {
            drone_state: DroneStateReport {
                flying: Some(navdata.state.flying()),
                emergency: Some(navdata.state.emergency()),
                low_battery: Some(navdata.state.low_battery()),
            },
            battery_percent: navdata.demo.as_ref().map(|demo| demo.battery_percent),
            altitude_m: navdata.demo.as_ref().map(|demo| demo.altitude_m),
        }
    }
}
