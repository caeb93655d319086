//! Gamepad input source backed by gilrs
//!
//! gilrs only updates its cached gamepad state while its event queue is being
//! drained, so every `poll` first pumps the queue, remembers the discrete
//! events for mapping discovery, and then reads the cached state into an
//! [`InputSnapshot`].
//!
//! Keyboard keys are not visible to gilrs; the host window forwards them
//! through [`GilrsInput::press_key`] / [`GilrsInput::release_key`].

use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, error, info, warn};

use super::source::{InputSnapshot, InputSource, JoystickDescriptor, JoystickState, RawInputEvent};

/// Button index order exposed to mappings
const BUTTONS: [Button; 19] = [
    Button::South,
    Button::East,
    Button::North,
    Button::West,
    Button::C,
    Button::Z,
    Button::LeftTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
];

/// Stick axes, exposed as axis indices 0..4
const STICKS: [Axis; 4] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
];

/// Analog triggers, exposed as axis indices 4 and 5. Most pads report them as
/// button values; the rest use the Z axes.
const TRIGGERS: [(Button, Axis); 2] = [
    (Button::LeftTrigger2, Axis::LeftZ),
    (Button::RightTrigger2, Axis::RightZ),
];

const AXIS_COUNT: usize = STICKS.len() + TRIGGERS.len();

fn stick_slot(axis: Axis) -> Option<usize> {
    STICKS.iter().position(|a| *a == axis)
}

fn trigger_slot_of_button(button: Button) -> Option<usize> {
    TRIGGERS
        .iter()
        .position(|(b, _)| *b == button)
        .map(|i| STICKS.len() + i)
}

fn trigger_slot_of_axis(axis: Axis) -> Option<usize> {
    TRIGGERS
        .iter()
        .position(|(_, a)| *a == axis)
        .map(|i| STICKS.len() + i)
}

// Whichever of the two readings the pad actually drives
fn trigger_value(button: f32, z_axis: f32) -> f32 {
    if button.abs() >= z_axis.abs() {
        button
    } else {
        z_axis
    }
}

/// Raw events kept for discovery before the oldest get dropped
const EVENT_BACKLOG: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum GilrsSourceError {
    #[error("Failed to initialize gilrs: {0}")]
    InitializationError(String),
}

pub struct GilrsInput {
    gilrs: Gilrs,
    // Joystick index -> gilrs id, in first-seen order so indices stay stable
    pads: Vec<GamepadId>,
    keys: HashSet<u32>,
    backlog: VecDeque<RawInputEvent>,
}

impl GilrsInput {
    pub fn new() -> Result<Self, GilrsSourceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => g,
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(GilrsSourceError::InitializationError(e.to_string()));
            }
        };

        let pads: Vec<GamepadId> = gilrs.gamepads().map(|(id, _)| id).collect();
        if pads.is_empty() {
            warn!("No gamepad connected, keyboard mappings only");
        } else {
            for (idx, (id, gamepad)) in gilrs.gamepads().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
        }

        Ok(Self {
            gilrs,
            pads,
            keys: HashSet::new(),
            backlog: VecDeque::new(),
        })
    }

    pub fn press_key(&mut self, key: u32, name: impl Into<String>) {
        if self.keys.insert(key) {
            self.remember(RawInputEvent::KeyDown {
                key,
                name: name.into(),
            });
        }
    }

    pub fn release_key(&mut self, key: u32) {
        self.keys.remove(&key);
    }

    fn remember(&mut self, event: RawInputEvent) {
        if self.backlog.len() == EVENT_BACKLOG {
            self.backlog.pop_front();
        }
        self.backlog.push_back(event);
    }

    fn joy_index(&mut self, id: GamepadId) -> usize {
        match self.pads.iter().position(|pad| *pad == id) {
            Some(index) => index,
            None => {
                self.pads.push(id);
                self.pads.len() - 1
            }
        }
    }

    // Drain gilrs so its cached state is current
    fn pump(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            let joy_id = self.joy_index(id);
            match event {
                EventType::ButtonPressed(button, _) => {
                    if let Some(index) = BUTTONS.iter().position(|b| *b == button) {
                        self.remember(RawInputEvent::JoyButtonDown {
                            joy_id,
                            button: index,
                        });
                    }
                }
                EventType::AxisChanged(axis, value, _) => {
                    if let Some(index) = stick_slot(axis).or_else(|| trigger_slot_of_axis(axis)) {
                        self.remember(RawInputEvent::JoyAxisMotion {
                            joy_id,
                            axis: index,
                            value,
                        });
                    }
                }
                EventType::ButtonChanged(button, value, _) => {
                    if let Some(index) = trigger_slot_of_button(button) {
                        self.remember(RawInputEvent::JoyAxisMotion {
                            joy_id,
                            axis: index,
                            value,
                        });
                    }
                }
                EventType::Connected => info!("Gamepad {} connected as joystick {}", id, joy_id),
                EventType::Disconnected => warn!("Gamepad {} (joystick {}) disconnected", id, joy_id),
                other => debug!("Unhandled gilrs event: {:?}", other),
            }
        }
    }

    fn joystick_state(&self, id: GamepadId) -> JoystickState {
        match self.gilrs.connected_gamepad(id) {
            Some(gamepad) => {
                let pressed = |button: Button| gamepad.is_pressed(button);
                let x = pressed(Button::DPadRight) as i8 - pressed(Button::DPadLeft) as i8;
                let y = pressed(Button::DPadDown) as i8 - pressed(Button::DPadUp) as i8;
                JoystickState {
                    name: gamepad.name().to_string(),
                    connected: true,
                    buttons: BUTTONS.iter().map(|b| gamepad.is_pressed(*b)).collect(),
                    axes: STICKS
                        .iter()
                        .map(|a| gamepad.value(*a))
                        .chain(TRIGGERS.iter().map(|(button, axis)| {
                            let pulled = gamepad.button_data(*button).map_or(0.0, |d| d.value());
                            trigger_value(pulled, gamepad.value(*axis))
                        }))
                        .collect(),
                    hats: vec![(x, y)],
                }
            }
            None => JoystickState {
                name: self.gilrs.gamepad(id).name().to_string(),
                connected: false,
                ..Default::default()
            },
        }
    }
}

impl InputSource for GilrsInput {
    fn joysticks(&self) -> Vec<JoystickDescriptor> {
        self.pads
            .iter()
            .map(|id| JoystickDescriptor {
                name: self.gilrs.gamepad(*id).name().to_string(),
                buttons: BUTTONS.len(),
                axes: AXIS_COUNT,
                hats: 1,
            })
            .collect()
    }

    fn poll(&mut self) -> InputSnapshot {
        self.pump();
        InputSnapshot {
            keys: self.keys.clone(),
            joysticks: self.pads.iter().map(|id| self.joystick_state(*id)).collect(),
        }
    }

    fn poll_events(&mut self) -> Vec<RawInputEvent> {
        self.pump();
        self.backlog.drain(..).collect()
    }
}
