//! Tickwork - deterministic, frame-driven input and event core
//!
//! Every game tick runs one dependency chain:
//!
//! ```text
//! InputSource ──► Controller ──► Command ──► EventBus ──► Clock / Action ──► Model
//!  (snapshot)     (frame ring)   (matcher)   (routing)    (deferred work)    (fan-out)
//! ```
//!
//! - [`mapping`]: physical input snapshots and the mapping primitives reading them
//! - [`controller`]: logical devices, controller frames, command recognition, profiles
//! - [`events`]: events, timers, clocks, actions, listeners and the handler arena
//! - [`model`]: named observable values
//! - [`runtime`]: the per-tick orchestration tying it all together

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod mapping;
pub mod model;
pub mod runtime;

pub use config::Settings;
pub use controller::{Command, Controller, ControllerFrame, ControllerProfile, DeviceValue, Step};
pub use error::CoreError;
pub use events::{Action, ActionTemplate, Clock, Event, EventBus, HandlerId, Listener, Timer, Value};
pub use mapping::{InputSnapshot, InputSource, Mapping, ScriptedInput};
pub use model::Model;
pub use runtime::{Collaborator, Runtime};

/// Core tuning constants
pub mod consts {
    /// Number of controller frames kept in a controller's ring buffer
    pub const FRAME_SLICE_SIZE: usize = 20;

    /// Axis magnitude that counts as a deliberate push during mapping discovery
    pub const AXIS_MIN: f32 = 0.9;
    /// Axis magnitude below which an axis is considered at rest
    pub const AXIS_REST: f32 = 0.01;

    /// Default threshold for axis press mappings and thumb sticks
    pub const DEFAULT_DEAD_ZONE: f32 = 0.1;

    /// Frames a button stays silent after its first press
    pub const DEFAULT_INIT_DELAY: u32 = 12;
    /// Frames between repeated fires once the initial delay has passed
    pub const DEFAULT_REPEAT_DELAY: u32 = 4;
}
