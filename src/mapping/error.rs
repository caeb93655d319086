//! Error definitions for the mapping layer

use thiserror::Error;

/// Errors raised while loading or building a controller profile.
///
/// A profile that fails with one of these is dropped; other profiles keep loading.
#[derive(Debug, Error)]
pub enum ProfileLoadError {
    /// The profile file could not be read or written
    #[error("Profile I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The profile is not valid JSON or does not match the profile schema
    #[error("Malformed profile: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A mapping record carries a `map_type` this crate does not know
    #[error("Unknown mapping type: {0}")]
    UnknownMapType(String),

    /// A mapping references a joystick index that is not connected
    #[error("Joystick {joy_id} is not available ({available} connected)")]
    MissingJoystick { joy_id: usize, available: usize },

    /// The joystick at `joy_id` is a different device than the one recorded
    #[error("Joystick {joy_id} is '{found}', profile expects '{expected}'")]
    JoystickMismatch {
        joy_id: usize,
        expected: String,
        found: String,
    },

    /// A mapping field is outside its allowed range
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Two devices in one profile share a name
    #[error("Duplicate device name: {0}")]
    DuplicateDevice(String),
}

/// A mapping tried to read a physical device that is absent right now.
///
/// Never fatal: the sampling device degrades to its neutral value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingSampleError {
    #[error("Joystick {0} is not connected")]
    JoystickAbsent(usize),

    #[error("Joystick {joy_id} has no {kind} {id}")]
    InputAbsent {
        joy_id: usize,
        kind: &'static str,
        id: usize,
    },
}

/// Errors raised by the blocking mapping recorder
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No qualifying input arrived within the poll budget
    #[error("No input recorded after {0} polls")]
    Timeout(u32),

    /// The recorded input cannot be turned into a mapping
    #[error("Recorded input rejected: {0}")]
    Rejected(#[from] ProfileLoadError),
}
