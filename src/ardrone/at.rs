//! AT command encoding and the per-tick control state
//!
//! Commands are ASCII lines terminated by `\r`, each carrying a sequence number
//! the drone uses to discard stale datagrams.

use crate::vehicle::VehicleCommand;
use gamepad_shared::Movement;

/// Bits that must always be set in `AT*REF`
const REF_BASE: u32 = (1 << 18) | (1 << 20) | (1 << 22) | (1 << 24) | (1 << 28);
const REF_FLY: u32 = 1 << 9;
const REF_EMERGENCY: u32 = 1 << 8;

/// Progressive command values, each in `[-1, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pcmd {
    pub roll: f64,
    pub pitch: f64,
    pub gaz: f64,
    pub yaw: f64,
}

impl Pcmd {
    pub fn is_hover(&self) -> bool {
        self.roll == 0.0 && self.pitch == 0.0 && self.gaz == 0.0 && self.yaw == 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtCommand {
    Ref { fly: bool, emergency: bool },
    Pcmd(Pcmd),
    Config { key: String, value: String },
    ComWdg,
}

impl AtCommand {
    pub fn config(key: impl Into<String>, value: impl Into<String>) -> Self {
        AtCommand::Config {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Enables the reduced navdata set carrying flight state and battery
    pub fn navdata_demo() -> Self {
        Self::config("general:navdata_demo", "TRUE")
    }

    pub fn encode(&self, seq: u32) -> String {
        match self {
            AtCommand::Ref { fly, emergency } => {
                let mut bits = REF_BASE;
                if *fly {
                    bits |= REF_FLY;
                }
                if *emergency {
                    bits |= REF_EMERGENCY;
                }
                format!("AT*REF={},{}\r", seq, bits)
            }
            AtCommand::Pcmd(pcmd) if pcmd.is_hover() => format!("AT*PCMD={},0,0,0,0,0\r", seq),
            AtCommand::Pcmd(pcmd) => format!(
                "AT*PCMD={},1,{},{},{},{}\r",
                seq,
                float_arg(pcmd.roll),
                float_arg(pcmd.pitch),
                float_arg(pcmd.gaz),
                float_arg(pcmd.yaw)
            ),
            AtCommand::Config { key, value } => {
                format!("AT*CONFIG={},\"{}\",\"{}\"\r", seq, key, value)
            }
            AtCommand::ComWdg => format!("AT*COMWDG={}\r", seq),
        }
    }
}

/// Floats travel as the signed integer view of their IEEE-754 single bits
pub fn float_arg(value: f64) -> i32 {
    let value = if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    };
    (value as f32).to_bits() as i32
}

/// Whole milliseconds for `control:flight_anim`
///
/// Rounds to nearest and saturates: negative and NaN become 0.
pub fn duration_ms(duration: f64) -> u32 {
    duration.round() as u32
}

/// What the drone should be doing, re-sent on every tick
#[derive(Debug)]
pub struct ControlState {
    fly: bool,
    emergency: bool,
    pcmd: Pcmd,
    pending: Vec<AtCommand>,
    sequence: u32,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlState {
    pub fn new() -> Self {
        Self {
            fly: false,
            emergency: false,
            pcmd: Pcmd::default(),
            pending: vec![AtCommand::navdata_demo()],
            sequence: 0,
        }
    }

    #[cfg(test)]
    pub fn pcmd(&self) -> Pcmd {
        self.pcmd
    }

    #[cfg(test)]
    pub fn is_flying(&self) -> bool {
        self.fly
    }

    /// Fold one vehicle command into the state
    pub fn apply(&mut self, command: &VehicleCommand) {
        match *command {
            VehicleCommand::Move { movement, speed } => match movement {
                Movement::Left => self.pcmd.roll = -speed,
                Movement::Right => self.pcmd.roll = speed,
                Movement::Front => self.pcmd.pitch = -speed,
                Movement::Back => self.pcmd.pitch = speed,
                Movement::Up => self.pcmd.gaz = speed,
                Movement::Down => self.pcmd.gaz = -speed,
                Movement::Clockwise => self.pcmd.yaw = speed,
                Movement::CounterClockwise => self.pcmd.yaw = -speed,
            },
            VehicleCommand::Stop => self.pcmd = Pcmd::default(),
            VehicleCommand::Takeoff => self.fly = true,
            VehicleCommand::Land => self.fly = false,
            VehicleCommand::DisableEmergency => self.emergency = true,
            VehicleCommand::Animate {
                animation,
                duration,
            } => {
                // duration 0 lets the firmware use the animation's default length
                let value = format!("{},{}", animation.id(), duration.map_or(0, duration_ms));
                self.queue(AtCommand::config("control:flight_anim", value));
            }
        }
    }

    /// Send `command` once with the next flush
    pub fn queue(&mut self, command: AtCommand) {
        self.pending.push(command);
    }

    /// Encode queued commands followed by the current REF and PCMD
    ///
    /// The emergency toggle is only sent in a single datagram.
    pub fn flush(&mut self) -> String {
        let mut out = String::new();

        for command in std::mem::take(&mut self.pending) {
            let seq = self.next_sequence();
            out.push_str(&command.encode(seq));
        }

        let seq = self.next_sequence();
        out.push_str(
            &AtCommand::Ref {
                fly: self.fly,
                emergency: self.emergency,
            }
            .encode(seq),
        );

        let seq = self.next_sequence();
        out.push_str(&AtCommand::Pcmd(self.pcmd).encode(seq));

        self.emergency = false;
        out
    }

    fn next_sequence(&mut self) -> u32 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }
}
