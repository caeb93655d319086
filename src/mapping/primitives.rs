//! Mapping primitives
//!
//! A [`Mapping`] reads one field of the current [`InputSnapshot`] and turns it
//! into a logical press. [`AxisMapping`] is the continuous counterpart used by
//! sticks and triggers. Both round-trip through tagged records that make up
//! the controller profile format.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{MappingSampleError, ProfileLoadError};
use super::source::{InputSnapshot, JoystickDescriptor};

/// Direction an axis must travel to count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn factor(self) -> f32 {
        match self {
            Sign::Positive => 1.0,
            Sign::Negative => -1.0,
        }
    }

    pub fn of(value: f32) -> Self {
        if value < 0.0 {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }
}

impl TryFrom<i8> for Sign {
    type Error = ProfileLoadError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Sign::Positive),
            -1 => Ok(Sign::Negative),
            other => Err(ProfileLoadError::InvalidField {
                field: "sign",
                reason: format!("expected -1 or 1, got {}", other),
            }),
        }
    }
}

impl From<Sign> for i8 {
    fn from(sign: Sign) -> Self {
        match sign {
            Sign::Positive => 1,
            Sign::Negative => -1,
        }
    }
}

/// Which coordinate of a hat position a mapping compares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HatAxis {
    /// The full (x, y) position must match
    Both,
    X,
    Y,
}

impl TryFrom<i8> for HatAxis {
    type Error = ProfileLoadError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(HatAxis::Both),
            0 => Ok(HatAxis::X),
            1 => Ok(HatAxis::Y),
            other => Err(ProfileLoadError::InvalidField {
                field: "axis",
                reason: format!("expected -1, 0 or 1, got {}", other),
            }),
        }
    }
}

impl From<HatAxis> for i8 {
    fn from(axis: HatAxis) -> Self {
        match axis {
            HatAxis::Both => -1,
            HatAxis::X => 0,
            HatAxis::Y => 1,
        }
    }
}

/// Translates one physical input into a logical press
#[derive(Debug, Clone, PartialEq)]
pub enum Mapping {
    Key {
        id: u32,
        name: String,
    },
    Button {
        joy_id: usize,
        joy_name: String,
        id: usize,
    },
    Axis {
        joy_id: usize,
        joy_name: String,
        id: usize,
        sign: Sign,
        dead_zone: f32,
    },
    Hat {
        joy_id: usize,
        joy_name: String,
        id: usize,
        axis: HatAxis,
        position: (i8, i8),
    },
}

impl Mapping {
    pub fn key(id: u32, name: impl Into<String>) -> Self {
        Mapping::Key {
            id,
            name: name.into(),
        }
    }

    pub fn is_pressed(&self, snapshot: &InputSnapshot) -> Result<bool, MappingSampleError> {
        match self {
            Mapping::Key { id, .. } => Ok(snapshot.key(*id)),
            Mapping::Button { joy_id, id, .. } => snapshot.button(*joy_id, *id),
            Mapping::Axis {
                joy_id,
                id,
                sign,
                dead_zone,
                ..
            } => Ok(snapshot.axis(*joy_id, *id)? * sign.factor() > *dead_zone),
            Mapping::Hat {
                joy_id,
                id,
                axis,
                position,
                ..
            } => {
                let current = snapshot.hat(*joy_id, *id)?;
                Ok(match axis {
                    HatAxis::Both => current == *position,
                    HatAxis::X => current.0 == position.0,
                    HatAxis::Y => current.1 == position.1,
                })
            }
        }
    }

    /// Signed axis value for axis mappings, 0/1 for everything else
    pub fn value(&self, snapshot: &InputSnapshot) -> Result<f32, MappingSampleError> {
        match self {
            Mapping::Axis {
                joy_id, id, sign, ..
            } => Ok((snapshot.axis(*joy_id, *id)? * sign.factor()).clamp(-1.0, 1.0)),
            other => Ok(if other.is_pressed(snapshot)? { 1.0 } else { 0.0 }),
        }
    }

    /// Index of the joystick this mapping reads, if any
    pub fn joy_id(&self) -> Option<usize> {
        match self {
            Mapping::Key { .. } => None,
            Mapping::Button { joy_id, .. }
            | Mapping::Axis { joy_id, .. }
            | Mapping::Hat { joy_id, .. } => Some(*joy_id),
        }
    }

    pub fn from_record(
        record: &MappingRecord,
        joysticks: &[JoystickDescriptor],
    ) -> Result<Self, ProfileLoadError> {
        match record {
            MappingRecord::Key { map_id, key_name } => Ok(Mapping::Key {
                id: *map_id,
                name: key_name.clone(),
            }),
            MappingRecord::Button {
                map_id,
                joy_id,
                joy_name,
            } => {
                let joy = validate_joystick(joysticks, *joy_id, joy_name)?;
                check_index("map_id", *map_id, joy.buttons)?;
                Ok(Mapping::Button {
                    joy_id: *joy_id,
                    joy_name: joy_name.clone(),
                    id: *map_id,
                })
            }
            MappingRecord::Axis {
                map_id,
                joy_id,
                joy_name,
                sign,
                dead_zone,
            } => {
                let joy = validate_joystick(joysticks, *joy_id, joy_name)?;
                check_index("map_id", *map_id, joy.axes)?;
                Ok(Mapping::Axis {
                    joy_id: *joy_id,
                    joy_name: joy_name.clone(),
                    id: *map_id,
                    sign: Sign::try_from(*sign)?,
                    dead_zone: check_dead_zone(*dead_zone)?,
                })
            }
            MappingRecord::Hat {
                map_id,
                joy_id,
                joy_name,
                position,
                axis,
            } => {
                let joy = validate_joystick(joysticks, *joy_id, joy_name)?;
                check_index("map_id", *map_id, joy.hats)?;
                if !(-1..=1).contains(&position.0) || !(-1..=1).contains(&position.1) {
                    return Err(ProfileLoadError::InvalidField {
                        field: "position",
                        reason: format!("hat position {:?} outside [-1, 1]", position),
                    });
                }
                Ok(Mapping::Hat {
                    joy_id: *joy_id,
                    joy_name: joy_name.clone(),
                    id: *map_id,
                    axis: HatAxis::try_from(*axis)?,
                    position: *position,
                })
            }
        }
    }

    pub fn to_record(&self) -> MappingRecord {
        match self {
            Mapping::Key { id, name } => MappingRecord::Key {
                map_id: *id,
                key_name: name.clone(),
            },
            Mapping::Button {
                joy_id,
                joy_name,
                id,
            } => MappingRecord::Button {
                map_id: *id,
                joy_id: *joy_id,
                joy_name: joy_name.clone(),
            },
            Mapping::Axis {
                joy_id,
                joy_name,
                id,
                sign,
                dead_zone,
            } => MappingRecord::Axis {
                map_id: *id,
                joy_id: *joy_id,
                joy_name: joy_name.clone(),
                sign: (*sign).into(),
                dead_zone: *dead_zone,
            },
            Mapping::Hat {
                joy_id,
                joy_name,
                id,
                axis,
                position,
            } => MappingRecord::Hat {
                map_id: *id,
                joy_id: *joy_id,
                joy_name: joy_name.clone(),
                position: *position,
                axis: (*axis).into(),
            },
        }
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mapping::Key { name, id } => write!(f, "key {} ({})", name, id),
            Mapping::Button { joy_name, id, .. } => write!(f, "{} button {}", joy_name, id),
            Mapping::Axis {
                joy_name, id, sign, ..
            } => write!(f, "{} axis {} {:+}", joy_name, id, i8::from(*sign)),
            Mapping::Hat {
                joy_name,
                id,
                position,
                ..
            } => write!(f, "{} hat {} {:?}", joy_name, id, position),
        }
    }
}

/// Continuous axis reader; returns the signed magnitude without thresholding
#[derive(Debug, Clone, PartialEq)]
pub struct AxisMapping {
    pub joy_id: usize,
    pub joy_name: String,
    pub id: usize,
    pub sign: Sign,
}

impl AxisMapping {
    pub fn value(&self, snapshot: &InputSnapshot) -> Result<f32, MappingSampleError> {
        Ok((snapshot.axis(self.joy_id, self.id)? * self.sign.factor()).clamp(-1.0, 1.0))
    }

    /// Press mapping over the same axis, so thresholds match the continuous value
    pub fn as_press(&self, dead_zone: f32) -> Mapping {
        Mapping::Axis {
            joy_id: self.joy_id,
            joy_name: self.joy_name.clone(),
            id: self.id,
            sign: self.sign,
            dead_zone,
        }
    }

    pub fn from_record(
        record: &AxisMappingRecord,
        joysticks: &[JoystickDescriptor],
    ) -> Result<Self, ProfileLoadError> {
        let joy = validate_joystick(joysticks, record.joy_id, &record.joy_name)?;
        check_index("map_id", record.map_id, joy.axes)?;
        Ok(Self {
            joy_id: record.joy_id,
            joy_name: record.joy_name.clone(),
            id: record.map_id,
            sign: Sign::try_from(record.sign)?,
        })
    }

    pub fn to_record(&self) -> AxisMappingRecord {
        AxisMappingRecord {
            map_id: self.id,
            joy_id: self.joy_id,
            joy_name: self.joy_name.clone(),
            sign: self.sign.into(),
        }
    }
}

/// Serialized form of a [`Mapping`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "map_type", rename_all = "lowercase")]
pub enum MappingRecord {
    Key {
        map_id: u32,
        key_name: String,
    },
    Button {
        map_id: usize,
        joy_id: usize,
        joy_name: String,
    },
    Axis {
        map_id: usize,
        joy_id: usize,
        joy_name: String,
        sign: i8,
        dead_zone: f32,
    },
    Hat {
        map_id: usize,
        joy_id: usize,
        joy_name: String,
        position: (i8, i8),
        axis: i8,
    },
}

impl MappingRecord {
    pub const MAP_TYPES: [&'static str; 4] = ["key", "button", "axis", "hat"];
}

/// Serialized form of an [`AxisMapping`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisMappingRecord {
    pub map_id: usize,
    pub joy_id: usize,
    pub joy_name: String,
    pub sign: i8,
}

fn validate_joystick<'a>(
    joysticks: &'a [JoystickDescriptor],
    joy_id: usize,
    joy_name: &str,
) -> Result<&'a JoystickDescriptor, ProfileLoadError> {
    let joy = joysticks
        .get(joy_id)
        .ok_or(ProfileLoadError::MissingJoystick {
            joy_id,
            available: joysticks.len(),
        })?;
    if joy.name != joy_name {
        return Err(ProfileLoadError::JoystickMismatch {
            joy_id,
            expected: joy_name.to_string(),
            found: joy.name.clone(),
        });
    }
    Ok(joy)
}

fn check_index(field: &'static str, index: usize, count: usize) -> Result<(), ProfileLoadError> {
    if index < count {
        Ok(())
    } else {
        Err(ProfileLoadError::InvalidField {
            field,
            reason: format!("index {} out of range ({} available)", index, count),
        })
    }
}

pub(crate) fn check_dead_zone(dead_zone: f32) -> Result<f32, ProfileLoadError> {
    if dead_zone > 0.0 && dead_zone < 1.0 {
        Ok(dead_zone)
    } else {
        Err(ProfileLoadError::InvalidField {
            field: "dead_zone",
            reason: format!("{} is not inside (0, 1)", dead_zone),
        })
    }
}
