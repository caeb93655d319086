//! Controller profiles: the JSON description of a controller's devices
//!
//! ```text
//! file ──► from_json ──► ControllerProfile ──► build(joysticks) ──► Controller
//!   ▲                                                                  │
//!   └────────────── save ◄── to_json ◄──── Controller::to_profile ◄───┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use super::controller::Controller;
use super::device::{Button, DeviceDefaults, Dpad, LogicalDevice, ThumbStick, Trigger};
use crate::mapping::primitives::check_dead_zone;
use crate::mapping::{
    AxisMapping, AxisMappingRecord, JoystickDescriptor, Mapping, MappingRecord, ProfileLoadError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Button,
    Dpad,
    ThumbStick,
    Trigger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeviceProfile {
    Button {
        name: String,
        mapping: MappingRecord,
    },
    Dpad {
        name: String,
        up: MappingRecord,
        down: MappingRecord,
        left: MappingRecord,
        right: MappingRecord,
    },
    ThumbStick {
        name: String,
        x_axis: AxisMappingRecord,
        y_axis: AxisMappingRecord,
        /// Falls back to the host's stick dead zone when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dead_zone: Option<f32>,
    },
    Trigger {
        name: String,
        axis: AxisMappingRecord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dead_zone: Option<f32>,
    },
}

impl DeviceProfile {
    pub fn name(&self) -> &str {
        match self {
            DeviceProfile::Button { name, .. }
            | DeviceProfile::Dpad { name, .. }
            | DeviceProfile::ThumbStick { name, .. }
            | DeviceProfile::Trigger { name, .. } => name,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceProfile::Button { .. } => DeviceKind::Button,
            DeviceProfile::Dpad { .. } => DeviceKind::Dpad,
            DeviceProfile::ThumbStick { .. } => DeviceKind::ThumbStick,
            DeviceProfile::Trigger { .. } => DeviceKind::Trigger,
        }
    }

    fn build(
        &self,
        joysticks: &[JoystickDescriptor],
        defaults: &DeviceDefaults,
    ) -> Result<LogicalDevice, ProfileLoadError> {
        let button = |part: &str, record: &MappingRecord| -> Result<Button, ProfileLoadError> {
            Ok(Button::new(
                format!("{}.{}", self.name(), part),
                Mapping::from_record(record, joysticks)?,
                defaults,
            ))
        };

        let device = match self {
            DeviceProfile::Button { name, mapping } => LogicalDevice::Button(Button::new(
                name.clone(),
                Mapping::from_record(mapping, joysticks)?,
                defaults,
            )),
            DeviceProfile::Dpad {
                name,
                up,
                down,
                left,
                right,
            } => LogicalDevice::Dpad(Dpad::new(
                name.clone(),
                button("up", up)?,
                button("down", down)?,
                button("left", left)?,
                button("right", right)?,
            )),
            DeviceProfile::ThumbStick {
                name,
                x_axis,
                y_axis,
                dead_zone,
            } => LogicalDevice::ThumbStick(ThumbStick::new(
                name.clone(),
                AxisMapping::from_record(x_axis, joysticks)?,
                AxisMapping::from_record(y_axis, joysticks)?,
                check_dead_zone(dead_zone.unwrap_or(defaults.stick_dead_zone))?,
            )),
            DeviceProfile::Trigger {
                name,
                axis,
                dead_zone,
            } => LogicalDevice::Trigger(Trigger::new(
                name.clone(),
                AxisMapping::from_record(axis, joysticks)?,
                check_dead_zone(dead_zone.unwrap_or(defaults.stick_dead_zone))?,
                defaults,
            )),
        };
        Ok(device)
    }

    fn of(device: &LogicalDevice) -> Self {
        match device {
            LogicalDevice::Button(button) => DeviceProfile::Button {
                name: button.name().to_string(),
                mapping: button.mapping().to_record(),
            },
            LogicalDevice::Dpad(dpad) => {
                let [up, down, left, right] = dpad.buttons().map(|b| b.mapping().to_record());
                DeviceProfile::Dpad {
                    name: device.name().to_string(),
                    up,
                    down,
                    left,
                    right,
                }
            }
            LogicalDevice::ThumbStick(stick) => {
                let (x, y) = stick.axes();
                DeviceProfile::ThumbStick {
                    name: device.name().to_string(),
                    x_axis: x.to_record(),
                    y_axis: y.to_record(),
                    dead_zone: Some(stick.dead_zone()),
                }
            }
            LogicalDevice::Trigger(trigger) => DeviceProfile::Trigger {
                name: device.name().to_string(),
                axis: trigger.axis().to_record(),
                dead_zone: Some(trigger.dead_zone()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerProfile {
    pub name: String,
    pub devices: Vec<DeviceProfile>,
}

impl ControllerProfile {
    pub fn from_json(json: &str) -> Result<Self, ProfileLoadError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        check_map_types(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String, ProfileLoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ProfileLoadError> {
        let json = fs::read_to_string(path).map_err(|source| ProfileLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProfileLoadError> {
        let io_error = |source| ProfileLoadError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, self.to_json()?).map_err(io_error)?;
        info!("Saved profile '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Resolves every mapping against the connected joysticks
    pub fn build(
        &self,
        joysticks: &[JoystickDescriptor],
        defaults: &DeviceDefaults,
    ) -> Result<Controller, ProfileLoadError> {
        let mut seen = HashSet::new();
        let mut devices = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            if !seen.insert(device.name()) {
                return Err(ProfileLoadError::DuplicateDevice(device.name().to_string()));
            }
            devices.push(device.build(joysticks, defaults)?);
        }
        Ok(Controller::new(self.name.clone(), devices))
    }
}

impl Controller {
    pub fn to_profile(&self) -> ControllerProfile {
        ControllerProfile {
            name: self.name().to_string(),
            devices: self.devices().iter().map(DeviceProfile::of).collect(),
        }
    }
}

// Serde reports an unknown internal tag as a generic error; look for it first
fn check_map_types(value: &serde_json::Value) -> Result<(), ProfileLoadError> {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(tag) = map.get("map_type") {
                let known = tag
                    .as_str()
                    .is_some_and(|t| MappingRecord::MAP_TYPES.contains(&t));
                if !known {
                    return Err(ProfileLoadError::UnknownMapType(tag.to_string()));
                }
            }
            map.values().try_for_each(check_map_types)
        }
        serde_json::Value::Array(items) => items.iter().try_for_each(check_map_types),
        _ => Ok(()),
    }
}

/// Loads and builds every profile; a failing file is logged and skipped.
pub fn load_profiles(
    paths: &[PathBuf],
    joysticks: &[JoystickDescriptor],
    defaults: &DeviceDefaults,
) -> (Vec<Controller>, Vec<(PathBuf, ProfileLoadError)>) {
    let mut controllers = Vec::new();
    let mut failures = Vec::new();
    for path in paths {
        match ControllerProfile::load(path).and_then(|p| p.build(joysticks, defaults)) {
            Ok(controller) => {
                info!("Loaded profile {} as '{}'", path.display(), controller.name());
                controllers.push(controller);
            }
            Err(e) => {
                error!("Dropping profile {}: {}", path.display(), e);
                failures.push((path.clone(), e));
            }
        }
    }
    (controllers, failures)
}
