//! Logical devices
//!
//! Devices compose mappings into the values a game actually reads. Each tick
//! runs in two phases so that a frame is complete before any counter moves:
//!
//! 1. [`LogicalDevice::sample`] reads the snapshot and stages the raw presses
//! 2. [`LogicalDevice::update`] commits them (held counters, last direction)

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_DEAD_ZONE, DEFAULT_INIT_DELAY, DEFAULT_REPEAT_DELAY};
use crate::mapping::{AxisMapping, InputSnapshot, Mapping, MappingSampleError};

/// Per-tick value of one logical device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DeviceValue {
    Button(bool),
    Dpad(i8, i8),
    Stick(f32, f32),
    Trigger(f32, bool),
}

impl DeviceValue {
    pub fn pressed(&self) -> bool {
        match *self {
            DeviceValue::Button(pressed) => pressed,
            DeviceValue::Dpad(x, y) => x != 0 || y != 0,
            DeviceValue::Stick(x, y) => x != 0.0 || y != 0.0,
            DeviceValue::Trigger(_, pressed) => pressed,
        }
    }

    pub fn direction(&self) -> Option<(i8, i8)> {
        match *self {
            DeviceValue::Dpad(x, y) => Some((x, y)),
            _ => None,
        }
    }

    pub fn axes(&self) -> Option<(f32, f32)> {
        match *self {
            DeviceValue::Stick(x, y) => Some((x, y)),
            DeviceValue::Trigger(value, _) => Some((value, 0.0)),
            _ => None,
        }
    }
}

/// Repeat timing shared by every button a profile builds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceDefaults {
    pub init_delay: u32,
    pub repeat_delay: u32,
    pub stick_dead_zone: f32,
}

impl Default for DeviceDefaults {
    fn default() -> Self {
        Self {
            init_delay: DEFAULT_INIT_DELAY,
            repeat_delay: DEFAULT_REPEAT_DELAY,
            stick_dead_zone: DEFAULT_DEAD_ZONE,
        }
    }
}

/// Silence schedule for held buttons: fire on the first frame, stay quiet
/// until `init_delay`, then fire every `repeat_delay` frames.
pub fn ignore(held: u32, init_delay: u32, repeat_delay: u32) -> bool {
    if held > 1 && held < init_delay {
        return true;
    }
    held >= init_delay && (held - init_delay) % repeat_delay.max(1) != 0
}

#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    name: String,
    mapping: Mapping,
    held: u32,
    previous: bool,
    current: bool,
    staged: bool,
    init_delay: u32,
    repeat_delay: u32,
}

impl Button {
    pub fn new(name: impl Into<String>, mapping: Mapping, defaults: &DeviceDefaults) -> Self {
        Self {
            name: name.into(),
            mapping,
            held: 0,
            previous: false,
            current: false,
            staged: false,
            init_delay: defaults.init_delay,
            repeat_delay: defaults.repeat_delay.max(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn held(&self) -> u32 {
        self.held
    }

    pub fn pressed(&self) -> bool {
        self.current
    }

    pub fn check(&self) -> bool {
        self.held > 0 && !ignore(self.held, self.init_delay, self.repeat_delay)
    }

    pub fn negative_edge(&self) -> bool {
        self.previous && !self.current
    }

    fn sample(&mut self, snapshot: &InputSnapshot) -> Result<bool, MappingSampleError> {
        let result = self.mapping.is_pressed(snapshot);
        self.staged = *result.as_ref().unwrap_or(&false);
        result
    }

    fn stage_neutral(&mut self) {
        self.staged = false;
    }

    fn update(&mut self) {
        self.previous = self.current;
        self.current = self.staged;
        self.held = if self.current { self.held + 1 } else { 0 };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dpad {
    name: String,
    up: Button,
    down: Button,
    left: Button,
    right: Button,
    last_direction: (i8, i8),
    current: (i8, i8),
}

impl Dpad {
    pub fn new(name: impl Into<String>, up: Button, down: Button, left: Button, right: Button) -> Self {
        Self {
            name: name.into(),
            up,
            down,
            left,
            right,
            last_direction: (1, 0),
            current: (0, 0),
        }
    }

    pub fn buttons(&self) -> [&Button; 4] {
        [&self.up, &self.down, &self.left, &self.right]
    }

    pub fn direction(&self) -> (i8, i8) {
        self.current
    }

    /// Most recent pure cardinal direction; diagonals never update it
    pub fn last_direction(&self) -> (i8, i8) {
        self.last_direction
    }

    /// `check` of whichever direction has been held longest
    pub fn check(&self) -> bool {
        self.buttons()
            .into_iter()
            .max_by_key(|button| button.held())
            .map(|button| button.check())
            .unwrap_or(false)
    }

    fn sample(&mut self, snapshot: &InputSnapshot) -> Result<(i8, i8), MappingSampleError> {
        let up = self.up.sample(snapshot)? as i8;
        let down = self.down.sample(snapshot)? as i8;
        let left = self.left.sample(snapshot)? as i8;
        let right = self.right.sample(snapshot)? as i8;
        Ok((right - left, down - up))
    }

    fn stage_neutral(&mut self) {
        for button in [&mut self.up, &mut self.down, &mut self.left, &mut self.right] {
            button.stage_neutral();
        }
    }

    fn update(&mut self) {
        for button in [&mut self.up, &mut self.down, &mut self.left, &mut self.right] {
            button.update();
        }
        let x = self.right.pressed() as i8 - self.left.pressed() as i8;
        let y = self.down.pressed() as i8 - self.up.pressed() as i8;
        self.current = (x, y);
        if x.abs() + y.abs() == 1 {
            self.last_direction = (x, y);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThumbStick {
    name: String,
    x_axis: AxisMapping,
    y_axis: AxisMapping,
    dead_zone: f32,
    staged: (f32, f32),
    current: (f32, f32),
}

impl ThumbStick {
    pub fn new(name: impl Into<String>, x_axis: AxisMapping, y_axis: AxisMapping, dead_zone: f32) -> Self {
        Self {
            name: name.into(),
            x_axis,
            y_axis,
            dead_zone,
            staged: (0.0, 0.0),
            current: (0.0, 0.0),
        }
    }

    pub fn axes(&self) -> (&AxisMapping, &AxisMapping) {
        (&self.x_axis, &self.y_axis)
    }

    pub fn dead_zone(&self) -> f32 {
        self.dead_zone
    }

    pub fn value(&self) -> (f32, f32) {
        self.current
    }

    pub fn magnitude(&self) -> f32 {
        let (x, y) = self.current;
        (x * x + y * y).sqrt()
    }

    pub fn is_neutral(&self) -> bool {
        self.magnitude() < self.dead_zone
    }

    pub fn check(&self) -> bool {
        !self.is_neutral()
    }

    fn sample(&mut self, snapshot: &InputSnapshot) -> Result<(f32, f32), MappingSampleError> {
        self.staged = (self.x_axis.value(snapshot)?, self.y_axis.value(snapshot)?);
        Ok(self.staged)
    }

    fn stage_neutral(&mut self) {
        self.staged = (0.0, 0.0);
    }

    fn update(&mut self) {
        self.current = self.staged;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    name: String,
    axis: AxisMapping,
    button: Button,
    dead_zone: f32,
    staged: f32,
    current: f32,
}

impl Trigger {
    pub fn new(
        name: impl Into<String>,
        axis: AxisMapping,
        dead_zone: f32,
        defaults: &DeviceDefaults,
    ) -> Self {
        let name = name.into();
        let button = Button::new(name.clone(), axis.as_press(dead_zone), defaults);
        Self {
            name,
            axis,
            button,
            dead_zone,
            staged: 0.0,
            current: 0.0,
        }
    }

    pub fn axis(&self) -> &AxisMapping {
        &self.axis
    }

    pub fn dead_zone(&self) -> f32 {
        self.dead_zone
    }

    pub fn value(&self) -> (f32, bool) {
        (self.current, self.button.pressed())
    }

    pub fn button(&self) -> &Button {
        &self.button
    }

    pub fn check(&self) -> bool {
        self.button.check()
    }

    fn sample(&mut self, snapshot: &InputSnapshot) -> Result<(f32, bool), MappingSampleError> {
        self.staged = self.axis.value(snapshot)?;
        let pressed = self.button.sample(snapshot)?;
        Ok((self.staged, pressed))
    }

    fn stage_neutral(&mut self) {
        self.staged = 0.0;
        self.button.stage_neutral();
    }

    fn update(&mut self) {
        self.current = self.staged;
        self.button.update();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalDevice {
    Button(Button),
    Dpad(Dpad),
    ThumbStick(ThumbStick),
    Trigger(Trigger),
}

impl LogicalDevice {
    pub fn name(&self) -> &str {
        match self {
            LogicalDevice::Button(d) => &d.name,
            LogicalDevice::Dpad(d) => &d.name,
            LogicalDevice::ThumbStick(d) => &d.name,
            LogicalDevice::Trigger(d) => &d.name,
        }
    }

    pub fn neutral_value(&self) -> DeviceValue {
        match self {
            LogicalDevice::Button(_) => DeviceValue::Button(false),
            LogicalDevice::Dpad(_) => DeviceValue::Dpad(0, 0),
            LogicalDevice::ThumbStick(_) => DeviceValue::Stick(0.0, 0.0),
            LogicalDevice::Trigger(_) => DeviceValue::Trigger(0.0, false),
        }
    }

    /// Reads the snapshot and stages the result for [`update`](Self::update).
    ///
    /// On a sample error nothing usable was read; the device stages its neutral
    /// value and the error is handed back for logging.
    pub fn sample(&mut self, snapshot: &InputSnapshot) -> (DeviceValue, Option<MappingSampleError>) {
        let result = match self {
            LogicalDevice::Button(d) => d.sample(snapshot).map(DeviceValue::Button),
            LogicalDevice::Dpad(d) => d.sample(snapshot).map(|(x, y)| DeviceValue::Dpad(x, y)),
            LogicalDevice::ThumbStick(d) => {
                d.sample(snapshot).map(|(x, y)| DeviceValue::Stick(x, y))
            }
            LogicalDevice::Trigger(d) => {
                d.sample(snapshot).map(|(v, p)| DeviceValue::Trigger(v, p))
            }
        };
        match result {
            Ok(value) => (value, None),
            Err(e) => {
                self.stage_neutral();
                (self.neutral_value(), Some(e))
            }
        }
    }

    fn stage_neutral(&mut self) {
        match self {
            LogicalDevice::Button(d) => d.stage_neutral(),
            LogicalDevice::Dpad(d) => d.stage_neutral(),
            LogicalDevice::ThumbStick(d) => d.stage_neutral(),
            LogicalDevice::Trigger(d) => d.stage_neutral(),
        }
    }

    pub fn update(&mut self) {
        match self {
            LogicalDevice::Button(d) => d.update(),
            LogicalDevice::Dpad(d) => d.update(),
            LogicalDevice::ThumbStick(d) => d.update(),
            LogicalDevice::Trigger(d) => d.update(),
        }
    }

    pub fn check(&self) -> bool {
        match self {
            LogicalDevice::Button(d) => d.check(),
            LogicalDevice::Dpad(d) => d.check(),
            LogicalDevice::ThumbStick(d) => d.check(),
            LogicalDevice::Trigger(d) => d.check(),
        }
    }

    pub fn as_button(&self) -> Option<&Button> {
        match self {
            LogicalDevice::Button(d) => Some(d),
            LogicalDevice::Trigger(d) => Some(d.button()),
            _ => None,
        }
    }

    pub fn as_dpad(&self) -> Option<&Dpad> {
        match self {
            LogicalDevice::Dpad(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_stick(&self) -> Option<&ThumbStick> {
        match self {
            LogicalDevice::ThumbStick(d) => Some(d),
            _ => None,
        }
    }

    /// Joysticks this device reads, for per-device degradation logging
    pub fn joy_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = match self {
            LogicalDevice::Button(d) => d.mapping.joy_id().into_iter().collect(),
            LogicalDevice::Dpad(d) => d
                .buttons()
                .iter()
                .filter_map(|b| b.mapping.joy_id())
                .collect(),
            LogicalDevice::ThumbStick(d) => vec![d.x_axis.joy_id, d.y_axis.joy_id],
            LogicalDevice::Trigger(d) => vec![d.axis.joy_id],
        };
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{JoystickDescriptor, ScriptedInput, Sign};

    fn step(device: &mut LogicalDevice, snapshot: &InputSnapshot) -> DeviceValue {
        let (value, _) = device.sample(snapshot);
        device.update();
        value
    }

    fn keys(ids: &[u32]) -> InputSnapshot {
        InputSnapshot {
            keys: ids.iter().copied().collect(),
            joysticks: Vec::new(),
        }
    }

    fn key_button(name: &str, id: u32, defaults: &DeviceDefaults) -> Button {
        Button::new(name, Mapping::key(id, name), defaults)
    }

    fn dpad() -> LogicalDevice {
        let d = DeviceDefaults::default();
        LogicalDevice::Dpad(Dpad::new(
            "dpad",
            key_button("up", 1, &d),
            key_button("down", 2, &d),
            key_button("left", 3, &d),
            key_button("right", 4, &d),
        ))
    }

    #[test]
    fn test_ignore_schedule() {
        assert!(!ignore(1, 12, 4));
        assert!(ignore(2, 12, 4));
        assert!(ignore(11, 12, 4));
        assert!(!ignore(12, 12, 4));
        assert!(ignore(13, 12, 4));
        assert!(!ignore(16, 12, 4));
    }

    #[test]
    fn test_held_is_suffix_of_presses() {
        let mut device = LogicalDevice::Button(key_button("a", 32, &DeviceDefaults::default()));
        let pattern = [1, 1, 0, 1, 1, 1, 0, 0, 1];
        let mut run = 0;
        for pressed in pattern {
            let snapshot = if pressed == 1 { keys(&[32]) } else { keys(&[]) };
            step(&mut device, &snapshot);
            run = if pressed == 1 { run + 1 } else { 0 };
            assert_eq!(device.as_button().unwrap().held(), run);
        }
    }

    #[test]
    fn test_dpad_value_and_last_direction() {
        let mut device = dpad();
        assert_eq!(step(&mut device, &keys(&[1])), DeviceValue::Dpad(0, -1));
        assert_eq!(device.as_dpad().unwrap().last_direction(), (0, -1));

        // Diagonal leaves the cardinal untouched
        assert_eq!(step(&mut device, &keys(&[2, 4])), DeviceValue::Dpad(1, 1));
        assert_eq!(device.as_dpad().unwrap().last_direction(), (0, -1));

        // Opposites cancel
        assert_eq!(step(&mut device, &keys(&[3, 4])), DeviceValue::Dpad(0, 0));
        step(&mut device, &keys(&[3]));
        assert_eq!(device.as_dpad().unwrap().last_direction(), (-1, 0));
    }

    #[test]
    fn test_dpad_check_follows_longest_held() {
        let mut device = dpad();
        step(&mut device, &keys(&[4]));
        assert!(device.check());
        // right held for 2 frames is silenced even though up just fired
        step(&mut device, &keys(&[1, 4]));
        assert!(!device.check());
    }

    #[test]
    fn test_stick_and_trigger_neutral_on_missing_joystick() {
        let axis = |id| AxisMapping {
            joy_id: 0,
            joy_name: "Pad".into(),
            id,
            sign: Sign::Positive,
        };
        let defaults = DeviceDefaults::default();
        let mut stick = LogicalDevice::ThumbStick(ThumbStick::new("stick", axis(0), axis(1), 0.1));
        let mut trigger = LogicalDevice::Trigger(Trigger::new("rt", axis(2), 0.5, &defaults));

        let (value, error) = stick.sample(&InputSnapshot::default());
        assert_eq!(value, DeviceValue::Stick(0.0, 0.0));
        assert!(error.is_some());
        let (value, error) = trigger.sample(&InputSnapshot::default());
        assert_eq!(value, DeviceValue::Trigger(0.0, false));
        assert!(error.is_some());

        let input = ScriptedInput::new(vec![JoystickDescriptor {
            name: "Pad".into(),
            buttons: 0,
            axes: 3,
            hats: 0,
        }]);
        let mut snapshot = input.neutral();
        snapshot.joysticks[0].axes = vec![0.6, 0.8, 0.7];
        assert_eq!(step(&mut stick, &snapshot), DeviceValue::Stick(0.6, 0.8));
        assert!((stick.as_stick().unwrap().magnitude() - 1.0).abs() < 1e-6);
        assert!(stick.check());
        assert_eq!(step(&mut trigger, &snapshot), DeviceValue::Trigger(0.7, true));
        assert!(trigger.check());
    }
}
