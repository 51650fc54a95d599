//! Vehicle-control client interface
//!
//! The dispatcher talks to the vehicle only through [`VehicleControl`]. Every
//! operation is fire-and-forget: it queues the command and returns immediately.

use gamepad_shared::{Animation, Movement};
use tokio::sync::broadcast;

/// Flying-related flags reported by the vehicle; `None` means not reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroneStateReport {
    pub flying: Option<bool>,
    pub emergency: Option<bool>,
    pub low_battery: Option<bool>,
}

/// Flight-state notification emitted by the vehicle client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlightStateNotification {
    pub drone_state: DroneStateReport,
    pub battery_percent: Option<u32>,
    pub altitude_m: Option<f32>,
}

#[cfg(test)]
impl FlightStateNotification {
    /// Notification carrying only the flying flag
    pub fn flying(flying: Option<bool>) -> Self {
        Self {
            drone_state: DroneStateReport {
                flying,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// A client that can command one vehicle
pub trait VehicleControl: Send + Sync {
    fn stop(&self);
    fn takeoff(&self);
    fn land(&self);
    fn disable_emergency(&self);

    /// Play a flight animation; `duration` is in milliseconds
    fn animate(&self, animation: Animation, duration: Option<f64>);

    fn left(&self, speed: f64);
    fn right(&self, speed: f64);
    fn front(&self, speed: f64);
    fn back(&self, speed: f64);
    fn up(&self, speed: f64);
    fn down(&self, speed: f64);
    fn clockwise(&self, speed: f64);
    fn counter_clockwise(&self, speed: f64);

    /// Subscribe to flight-state notifications
    fn subscribe_flight_state(&self) -> broadcast::Receiver<FlightStateNotification>;
}

/// Exactly one call on a [`VehicleControl`]
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    Move { movement: Movement, speed: f64 },
    Stop,
    Takeoff,
    Land,
    DisableEmergency,
    Animate {
        animation: Animation,
        duration: Option<f64>,
    },
}

impl VehicleCommand {
    /// Perform this command on the given client
    pub fn apply(&self, vehicle: &dyn VehicleControl) {
        match *self {
            VehicleCommand::Move { movement, speed } => match movement {
                Movement::Left => vehicle.left(speed),
                Movement::Right => vehicle.right(speed),
                Movement::Front => vehicle.front(speed),
                Movement::Back => vehicle.back(speed),
                Movement::Up => vehicle.up(speed),
                Movement::Down => vehicle.down(speed),
                Movement::Clockwise => vehicle.clockwise(speed),
                Movement::CounterClockwise => vehicle.counter_clockwise(speed),
            },
            VehicleCommand::Stop => vehicle.stop(),
            VehicleCommand::Takeoff => vehicle.takeoff(),
            VehicleCommand::Land => vehicle.land(),
            VehicleCommand::DisableEmergency => vehicle.disable_emergency(),
            VehicleCommand::Animate {
                animation,
                duration,
            } => vehicle.animate(animation, duration),
        }
    }
}
