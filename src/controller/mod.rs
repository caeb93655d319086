//! Controller subsystem: logical devices, frames and command recognition
//!
//! Per tick, each controller runs a two-phase pipeline:
//!
//! 1. [`device`] - logical devices sample the snapshot into a [`ControllerFrame`]
//! 2. [`command`] - commands match step sequences over their frame ring
//!
//! [`profile`] turns the JSON profile format into a [`Controller`] and back.
//!
//! # Architecture
//!
//! ```text
//! InputSnapshot ──► LogicalDevice::sample ──► ControllerFrame ──► Command::update
//!                   (staged values)           (ring of 20)        (fired names)
//! ```

#[allow(clippy::module_inception)]
pub mod controller;
pub mod command;
pub mod device;
pub mod profile;

pub use command::{conditions, Command, CommandSpecError, Condition, Step};
pub use controller::{Controller, ControllerFrame};
pub use device::{
    ignore, Button, DeviceDefaults, DeviceValue, Dpad, LogicalDevice, ThumbStick, Trigger,
};
pub use profile::{load_profiles, ControllerProfile, DeviceKind, DeviceProfile};
