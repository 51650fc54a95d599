//! Command Catalog
//!
//! The fixed sets of movement, action and animation identifiers the relay
//! understands. A catalog is built once at startup and never mutated afterwards.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

/// Errors raised while building a catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Command id listed more than once: {0}")]
    Duplicate(&'static str),

    #[error("Unknown command id: {0}")]
    Unknown(String),
}

/// Continuous movements; each takes a speed in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    Left,
    Right,
    Front,
    Back,
    Up,
    Down,
    Clockwise,
    CounterClockwise,
}

impl Movement {
    pub const ALL: [Movement; 8] = [
        Movement::Left,
        Movement::Right,
        Movement::Front,
        Movement::Back,
        Movement::Up,
        Movement::Down,
        Movement::Clockwise,
        Movement::CounterClockwise,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Movement::Left => "left",
            Movement::Right => "right",
            Movement::Front => "front",
            Movement::Back => "back",
            Movement::Up => "up",
            Movement::Down => "down",
            Movement::Clockwise => "clockwise",
            Movement::CounterClockwise => "counterClockwise",
        }
    }
}

/// Discrete actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Stop,
    Takeoff,
    Land,
    /// Carries the animation name in a separate field
    Animate,
    /// Resolved to takeoff or land from the last known flying state
    TakeoffOrLand,
    DisableEmergency,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Stop,
        Action::Takeoff,
        Action::Land,
        Action::Animate,
        Action::TakeoffOrLand,
        Action::DisableEmergency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Stop => "stop",
            Action::Takeoff => "takeoff",
            Action::Land => "land",
            Action::Animate => "animate",
            Action::TakeoffOrLand => "takeoffOrLand",
            Action::DisableEmergency => "disableEmergency",
        }
    }
}

/// Flight animations, in firmware order (the discriminant is the wire id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Animation {
    PhiM30Deg = 0,
    Phi30Deg,
    ThetaM30Deg,
    Theta30Deg,
    Theta20degYaw200deg,
    Theta20degYawM200deg,
    Turnaround,
    TurnaroundGodown,
    YawShake,
    YawDance,
    PhiDance,
    ThetaDance,
    VzDance,
    Wave,
    PhiThetaMixed,
    DoublePhiThetaMixed,
    FlipAhead,
    FlipBehind,
    FlipLeft,
    FlipRight,
}

impl Animation {
    pub const ALL: [Animation; 20] = [
        Animation::PhiM30Deg,
        Animation::Phi30Deg,
        Animation::ThetaM30Deg,
        Animation::Theta30Deg,
        Animation::Theta20degYaw200deg,
        Animation::Theta20degYawM200deg,
        Animation::Turnaround,
        Animation::TurnaroundGodown,
        Animation::YawShake,
        Animation::YawDance,
        Animation::PhiDance,
        Animation::ThetaDance,
        Animation::VzDance,
        Animation::Wave,
        Animation::PhiThetaMixed,
        Animation::DoublePhiThetaMixed,
        Animation::FlipAhead,
        Animation::FlipBehind,
        Animation::FlipLeft,
        Animation::FlipRight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Animation::PhiM30Deg => "phiM30Deg",
            Animation::Phi30Deg => "phi30Deg",
            Animation::ThetaM30Deg => "thetaM30Deg",
            Animation::Theta30Deg => "theta30Deg",
            Animation::Theta20degYaw200deg => "theta20degYaw200deg",
            Animation::Theta20degYawM200deg => "theta20degYawM200deg",
            Animation::Turnaround => "turnaround",
            Animation::TurnaroundGodown => "turnaroundGodown",
            Animation::YawShake => "yawShake",
            Animation::YawDance => "yawDance",
            Animation::PhiDance => "phiDance",
            Animation::ThetaDance => "thetaDance",
            Animation::VzDance => "vzDance",
            Animation::Wave => "wave",
            Animation::PhiThetaMixed => "phiThetaMixed",
            Animation::DoublePhiThetaMixed => "doublePhiThetaMixed",
            Animation::FlipAhead => "flipAhead",
            Animation::FlipBehind => "flipBehind",
            Animation::FlipLeft => "flipLeft",
            Animation::FlipRight => "flipRight",
        }
    }

    /// Numeric id understood by the vehicle firmware
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three identifier sets used for classification and validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCatalog {
    movements: Vec<Movement>,
    actions: Vec<Action>,
    animations: Vec<Animation>,
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl CommandCatalog {
    /// Every command the relay knows about
    pub fn standard() -> Self {
        Self {
            movements: Movement::ALL.to_vec(),
            actions: Action::ALL.to_vec(),
            animations: Animation::ALL.to_vec(),
        }
    }

    /// Build a catalog from explicit sets; every id must be unique across all three
    pub fn new(
        movements: Vec<Movement>,
        actions: Vec<Action>,
        animations: Vec<Animation>,
    ) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        let ids = movements
            .iter()
            .map(|m| m.as_str())
            .chain(actions.iter().map(|a| a.as_str()))
            .chain(animations.iter().map(|a| a.as_str()));

        for id in ids {
            if !seen.insert(id) {
                return Err(CatalogError::Duplicate(id));
            }
        }

        Ok(Self {
            movements,
            actions,
            animations,
        })
    }

    /// Copy of this catalog with the named ids removed from whichever set holds them
    pub fn without<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, CatalogError> {
        for name in names {
            let name = name.as_ref();
            if !self.contains(name) {
                return Err(CatalogError::Unknown(name.to_string()));
            }
        }

        let removed = |id: &str| names.iter().any(|n| n.as_ref() == id);

        Ok(Self {
            movements: self
                .movements
                .iter()
                .copied()
                .filter(|m| !removed(m.as_str()))
                .collect(),
            actions: self
                .actions
                .iter()
                .copied()
                .filter(|a| !removed(a.as_str()))
                .collect(),
            animations: self
                .animations
                .iter()
                .copied()
                .filter(|a| !removed(a.as_str()))
                .collect(),
        })
    }

    pub fn movements(&self) -> &[Movement] {
        &self.movements
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    /// Look up a movement by its wire name
    pub fn movement(&self, name: &str) -> Option<Movement> {
        self.movements.iter().copied().find(|m| m.as_str() == name)
    }

    /// Look up an action by its wire name
    pub fn action(&self, name: &str) -> Option<Action> {
        self.actions.iter().copied().find(|a| a.as_str() == name)
    }

    /// Look up an animation by its wire name
    pub fn animation(&self, name: &str) -> Option<Animation> {
        self.animations.iter().copied().find(|a| a.as_str() == name)
    }

    fn contains(&self, name: &str) -> bool {
        self.movement(name).is_some()
            || self.action(name).is_some()
            || self.animation(name).is_some()
    }
}
