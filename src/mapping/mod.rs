//! Mapping layer: from physical input to logical presses
//!
//! 1. [`source`] - host input surface and per-tick snapshots
//! 2. [`primitives`] - key/button/axis/hat readers and their profile records
//! 3. [`gilrs_source`] - gamepad backend
//! 4. [`discovery`] - blocking mapping recorder for building profiles
//!
//! ```text
//! Host ──► InputSource::poll ──► InputSnapshot ──► Mapping::is_pressed / value
//! ```

pub mod discovery;
pub mod error;
pub mod gilrs_source;
pub mod primitives;
pub mod source;

pub use discovery::{AxisNeutralLatch, MappingRecorder, RecorderSettings};
pub use error::{DiscoveryError, MappingSampleError, ProfileLoadError};
pub use gilrs_source::{GilrsInput, GilrsSourceError};
pub use primitives::{AxisMapping, AxisMappingRecord, HatAxis, Mapping, MappingRecord, Sign};
pub use source::{
    InputSnapshot, InputSource, JoystickDescriptor, JoystickState, RawInputEvent, ScriptedInput,
};
