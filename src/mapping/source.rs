//! Physical input surface
//!
//! The host owns the actual devices. Once per tick it hands the core an
//! [`InputSnapshot`]; every mapping is a pure reader of that snapshot, so all
//! devices of all controllers observe the same instant.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

use super::error::MappingSampleError;

/// Static description of a connected joystick, used to validate profiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoystickDescriptor {
    pub name: String,
    pub buttons: usize,
    pub axes: usize,
    pub hats: usize,
}

// Polled state of a single joystick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoystickState {
    pub name: String,
    pub connected: bool,
    pub buttons: Vec<bool>,
    pub axes: Vec<f32>,
    pub hats: Vec<(i8, i8)>,
}

impl JoystickState {
    /// A connected joystick with every input at rest
    pub fn neutral(descriptor: &JoystickDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            connected: true,
            buttons: vec![false; descriptor.buttons],
            axes: vec![0.0; descriptor.axes],
            hats: vec![(0, 0); descriptor.hats],
        }
    }

    pub fn descriptor(&self) -> JoystickDescriptor {
        JoystickDescriptor {
            name: self.name.clone(),
            buttons: self.buttons.len(),
            axes: self.axes.len(),
            hats: self.hats.len(),
        }
    }
}

/// Everything the mappings may read during one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub keys: HashSet<u32>,
    pub joysticks: Vec<JoystickState>,
}

impl InputSnapshot {
    pub fn key(&self, id: u32) -> bool {
        self.keys.contains(&id)
    }

    fn joystick(&self, joy_id: usize) -> Result<&JoystickState, MappingSampleError> {
        match self.joysticks.get(joy_id) {
            Some(joy) if joy.connected => Ok(joy),
            _ => Err(MappingSampleError::JoystickAbsent(joy_id)),
        }
    }

    pub fn button(&self, joy_id: usize, id: usize) -> Result<bool, MappingSampleError> {
        self.joystick(joy_id)?
            .buttons
            .get(id)
            .copied()
            .ok_or(MappingSampleError::InputAbsent {
                joy_id,
                kind: "button",
                id,
            })
    }

    pub fn axis(&self, joy_id: usize, id: usize) -> Result<f32, MappingSampleError> {
        self.joystick(joy_id)?
            .axes
            .get(id)
            .copied()
            .ok_or(MappingSampleError::InputAbsent {
                joy_id,
                kind: "axis",
                id,
            })
    }

    pub fn hat(&self, joy_id: usize, id: usize) -> Result<(i8, i8), MappingSampleError> {
        self.joystick(joy_id)?
            .hats
            .get(id)
            .copied()
            .ok_or(MappingSampleError::InputAbsent {
                joy_id,
                kind: "hat",
                id,
            })
    }

    /// True when every axis of every connected joystick is at rest
    pub fn axes_at_rest(&self, rest: f32) -> bool {
        self.joysticks
            .iter()
            .filter(|joy| joy.connected)
            .flat_map(|joy| joy.axes.iter())
            .all(|value| value.abs() < rest)
    }

    /// Largest axis magnitude over every connected joystick
    pub fn peak_axis(&self) -> f32 {
        self.joysticks
            .iter()
            .filter(|joy| joy.connected)
            .flat_map(|joy| joy.axes.iter())
            .fold(0.0, |peak: f32, value| peak.max(value.abs()))
    }
}

/// Discrete input events, consumed only by mapping discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawInputEvent {
    KeyDown {
        key: u32,
        name: String,
    },
    JoyButtonDown {
        joy_id: usize,
        button: usize,
    },
    JoyAxisMotion {
        joy_id: usize,
        axis: usize,
        value: f32,
    },
    JoyHatMotion {
        joy_id: usize,
        hat: usize,
        position: (i8, i8),
    },
}

/// Host surface the core samples from.
///
/// `poll` is called exactly once per tick. `poll_events` is only drained by the
/// blocking [`MappingRecorder`](super::discovery::MappingRecorder).
pub trait InputSource {
    fn joysticks(&self) -> Vec<JoystickDescriptor>;

    fn poll(&mut self) -> InputSnapshot;

    fn poll_events(&mut self) -> Vec<RawInputEvent>;
}

/// Deterministic input source replaying a prepared script.
///
/// Each `poll` pops the next snapshot; once the script is exhausted the last
/// neutral state is repeated. Raw events are handed out in batches, one batch
/// per `poll_events` call.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    joysticks: Vec<JoystickDescriptor>,
    frames: VecDeque<InputSnapshot>,
    events: VecDeque<Vec<RawInputEvent>>,
    polled: u64,
}

impl ScriptedInput {
    pub fn new(joysticks: Vec<JoystickDescriptor>) -> Self {
        Self {
            joysticks,
            ..Default::default()
        }
    }

    /// Snapshot with every attached joystick connected and at rest
    pub fn neutral(&self) -> InputSnapshot {
        InputSnapshot {
            keys: HashSet::new(),
            joysticks: self.joysticks.iter().map(JoystickState::neutral).collect(),
        }
    }

    pub fn push_frame(&mut self, snapshot: InputSnapshot) -> &mut Self {
        self.frames.push_back(snapshot);
        self
    }

    /// Queue one frame built from the neutral state
    pub fn push_with(&mut self, edit: impl FnOnce(&mut InputSnapshot)) -> &mut Self {
        let mut snapshot = self.neutral();
        edit(&mut snapshot);
        self.push_frame(snapshot)
    }

    /// Queue one frame per entry, each with only the listed keys held
    pub fn push_keys<I>(&mut self, frames: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: IntoIterator<Item = u32>,
    {
        for keys in frames {
            let keys: HashSet<u32> = keys.into_iter().collect();
            self.push_with(|snapshot| snapshot.keys = keys);
        }
        self
    }

    pub fn push_events(&mut self, batch: Vec<RawInputEvent>) -> &mut Self {
        self.events.push_back(batch);
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn polled(&self) -> u64 {
        self.polled
    }
}

impl InputSource for ScriptedInput {
    fn joysticks(&self) -> Vec<JoystickDescriptor> {
        self.joysticks.clone()
    }

    fn poll(&mut self) -> InputSnapshot {
        self.polled += 1;
        match self.frames.pop_front() {
            Some(snapshot) => snapshot,
            None => {
                debug!("Script exhausted after {} polls, repeating neutral", self.polled);
                self.neutral()
            }
        }
    }

    fn poll_events(&mut self) -> Vec<RawInputEvent> {
        self.events.pop_front().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad() -> JoystickDescriptor {
        JoystickDescriptor {
            name: "Pad".into(),
            buttons: 4,
            axes: 2,
            hats: 1,
        }
    }

    #[test]
    fn test_absent_joystick_is_an_error() {
        let snapshot = InputSnapshot::default();
        assert_eq!(
            snapshot.button(0, 0),
            Err(MappingSampleError::JoystickAbsent(0))
        );
    }

    #[test]
    fn test_disconnected_joystick_is_absent() {
        let mut state = JoystickState::neutral(&pad());
        state.connected = false;
        let snapshot = InputSnapshot {
            keys: HashSet::new(),
            joysticks: vec![state],
        };
        assert!(snapshot.axis(0, 0).is_err());
    }

    #[test]
    fn test_script_repeats_neutral_when_exhausted() {
        let mut input = ScriptedInput::new(vec![pad()]);
        input.push_keys([vec![32]]);
        assert!(input.poll().key(32));
        let after = input.poll();
        assert!(!after.key(32));
        assert_eq!(after.joysticks.len(), 1);
        assert_eq!(input.polled(), 2);
    }

    #[test]
    fn test_axes_at_rest() {
        let mut input = ScriptedInput::new(vec![pad()]);
        let mut snapshot = input.neutral();
        assert!(snapshot.axes_at_rest(0.01));
        snapshot.joysticks[0].axes[1] = -0.5;
        assert!(!snapshot.axes_at_rest(0.01));
        assert!(input.poll_events().is_empty());
    }
}
