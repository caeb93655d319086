//! Command recognition over a sliding window of controller frames
//!
//! A [`Command`] is an ordered list of [`Step`]s. Every tick the newest frame,
//! projected onto the command's devices, is pushed into a ring of
//! `frame_window` frames and the steps are matched greedily from the oldest
//! frame forward. A match marks the command active for that tick and clears
//! the ring, so overlapping windows never fire twice.

use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

use super::device::DeviceValue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandSpecError {
    #[error("Command '{0}' has no steps")]
    EmptySteps(String),

    #[error("Step '{0}' has a frame window of 0")]
    ZeroFrameWindow(String),

    #[error("Command '{command}' references unknown device '{device}'")]
    UnknownDevice { command: String, device: String },
}

/// Predicate over one projected frame; index `i` is the command's `i`-th device
pub type Condition = Box<dyn Fn(&[DeviceValue]) -> bool>;

pub struct Step {
    description: String,
    conditions: Vec<Condition>,
    frame_window: usize,
}

impl Step {
    pub fn new(description: impl Into<String>, frame_window: usize) -> Result<Self, CommandSpecError> {
        let description = description.into();
        if frame_window == 0 {
            return Err(CommandSpecError::ZeroFrameWindow(description));
        }
        Ok(Self {
            description,
            conditions: Vec::new(),
            frame_window,
        })
    }

    pub fn with_condition(mut self, condition: impl Fn(&[DeviceValue]) -> bool + 'static) -> Self {
        self.conditions.push(Box::new(condition));
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn frame_window(&self) -> usize {
        self.frame_window
    }

    /// 1-based offset of the first sub-window of `frame_window` frames in
    /// which every condition holds on at least one frame; 0 if there is none.
    pub fn check<F: AsRef<[DeviceValue]>>(&self, frames: &[F]) -> usize {
        let width = self.frame_window;
        if frames.len() < width {
            return 0;
        }

        let matrix: Vec<Vec<bool>> = self
            .conditions
            .iter()
            .map(|condition| frames.iter().map(|f| condition(f.as_ref())).collect())
            .collect();

        (0..=frames.len() - width)
            .find(|&offset| {
                matrix
                    .iter()
                    .all(|row| row[offset..offset + width].iter().any(|hit| *hit))
            })
            .map_or(0, |offset| offset + 1)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("description", &self.description)
            .field("conditions", &self.conditions.len())
            .field("frame_window", &self.frame_window)
            .finish()
    }
}

#[derive(Debug)]
pub struct Command {
    name: String,
    steps: Vec<Step>,
    devices: Vec<String>,
    frame_window: usize,
    frames: VecDeque<Vec<DeviceValue>>,
    active: bool,
}

impl Command {
    /// `frame_window` defaults to the sum of the step windows and is never
    /// smaller than that sum.
    pub fn new(
        name: impl Into<String>,
        devices: Vec<String>,
        steps: Vec<Step>,
        frame_window: Option<usize>,
    ) -> Result<Self, CommandSpecError> {
        let name = name.into();
        if steps.is_empty() {
            return Err(CommandSpecError::EmptySteps(name));
        }
        let needed: usize = steps.iter().map(Step::frame_window).sum();
        let frame_window = frame_window.unwrap_or(needed).max(needed);
        debug!(
            "Command '{}' with {} steps over {:?}, window {}",
            name,
            steps.len(),
            devices,
            frame_window
        );
        Ok(Self {
            name,
            steps,
            devices,
            frame_window,
            frames: VecDeque::with_capacity(frame_window),
            active: false,
        })
    }

    /// Command whose steps walk a dpad through `directions`, one frame each
    pub fn motion(
        name: impl Into<String>,
        dpad: impl Into<String>,
        directions: &[(i8, i8)],
        frame_window: Option<usize>,
    ) -> Result<Self, CommandSpecError> {
        let steps = directions
            .iter()
            .map(|&direction| {
                Step::new(format!("{:?}", direction), 1)
                    .map(|step| step.with_condition(conditions::dpad_is(0, direction)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(name, vec![dpad.into()], steps, frame_window)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn frame_window(&self) -> usize {
        self.frame_window
    }

    pub fn frames(&self) -> &VecDeque<Vec<DeviceValue>> {
        &self.frames
    }

    pub fn active(&self) -> bool {
        self.active
    }

    /// Pushes one projected frame and matches; returns whether the command fired
    pub fn update(&mut self, frame: Vec<DeviceValue>) -> bool {
        if self.frames.len() == self.frame_window {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);

        self.active = self.matches();
        if self.active {
            debug!("Command '{}' fired", self.name);
            self.frames.clear();
        }
        self.active
    }

    // Greedy, non-backtracking walk of the steps over the ring
    fn matches(&self) -> bool {
        let frames: Vec<&[DeviceValue]> = self.frames.iter().map(Vec::as_slice).collect();
        let mut cursor = 0;
        for step in &self.steps {
            let offset = step.check(&frames[cursor..]);
            if offset == 0 {
                return false;
            }
            cursor += offset;
        }
        true
    }
}

/// Condition builders; `device` is an index into the command's device list
pub mod conditions {
    use super::DeviceValue;

    pub fn button_pressed(device: usize) -> impl Fn(&[DeviceValue]) -> bool {
        move |frame| frame.get(device).is_some_and(DeviceValue::pressed)
    }

    pub fn button_released(device: usize) -> impl Fn(&[DeviceValue]) -> bool {
        move |frame| frame.get(device).is_some_and(|v| !v.pressed())
    }

    pub fn dpad_is(device: usize, direction: (i8, i8)) -> impl Fn(&[DeviceValue]) -> bool {
        move |frame| {
            frame
                .get(device)
                .and_then(DeviceValue::direction)
                .is_some_and(|d| d == direction)
        }
    }

    pub fn dpad_neutral(device: usize) -> impl Fn(&[DeviceValue]) -> bool {
        dpad_is(device, (0, 0))
    }

    pub fn stick_beyond(device: usize, magnitude: f32) -> impl Fn(&[DeviceValue]) -> bool {
        move |frame| {
            frame
                .get(device)
                .and_then(DeviceValue::axes)
                .is_some_and(|(x, y)| (x * x + y * y).sqrt() >= magnitude)
        }
    }

    pub fn trigger_pressed(device: usize) -> impl Fn(&[DeviceValue]) -> bool {
        move |frame| matches!(frame.get(device), Some(DeviceValue::Trigger(_, true)))
    }
}

#[cfg(test)]
mod tests {
    use super::conditions::*;
    use super::*;

    fn x_is(x: i8) -> impl Fn(&[DeviceValue]) -> bool {
        move |frame| frame[0].direction().is_some_and(|d| d.0 == x)
    }

    fn dpad(x: i8, y: i8) -> Vec<DeviceValue> {
        vec![DeviceValue::Dpad(x, y)]
    }

    #[test]
    fn test_rejects_empty_steps_and_zero_window() {
        assert_eq!(
            Command::new("c", vec![], vec![], None).unwrap_err(),
            CommandSpecError::EmptySteps("c".into())
        );
        assert!(matches!(
            Step::new("s", 0),
            Err(CommandSpecError::ZeroFrameWindow(_))
        ));
    }

    #[test]
    fn test_frame_window_is_at_least_step_sum() {
        let steps = || {
            vec![
                Step::new("a", 2).unwrap(),
                Step::new("b", 3).unwrap(),
            ]
        };
        assert_eq!(Command::new("c", vec![], steps(), None).unwrap().frame_window(), 5);
        assert_eq!(Command::new("c", vec![], steps(), Some(3)).unwrap().frame_window(), 5);
        assert_eq!(Command::new("c", vec![], steps(), Some(8)).unwrap().frame_window(), 8);
    }

    #[test]
    fn test_step_check_returns_smallest_offset() {
        let step = Step::new("p and q", 2)
            .unwrap()
            .with_condition(x_is(1))
            .with_condition(x_is(-1));
        let frames = [dpad(0, 0), dpad(1, 0), dpad(0, 0), dpad(-1, 0), dpad(1, 0)];
        // [1,0] misses q, [0,-1] misses p, [-1,1] has both
        assert_eq!(step.check(&frames), 4);
        assert_eq!(step.check(&frames[..4]), 0);
        assert_eq!(step.check(&frames[..1]), 0);
    }

    #[test]
    fn test_step_window_tolerance() {
        let p = Step::new("p", 2).unwrap().with_condition(x_is(1));
        let q = Step::new("q", 2).unwrap().with_condition(x_is(-1));
        let mut command = Command::new("pq", vec!["dpad".into()], vec![p, q], None).unwrap();
        let fired: Vec<bool> = [0, 1, 0, -1]
            .into_iter()
            .map(|x| command.update(dpad(x, 0)))
            .collect();
        assert_eq!(fired, vec![false, false, false, true]);
        assert!(command.frames().is_empty());
    }

    #[test]
    fn test_cleared_ring_prevents_refire() {
        let mut command =
            Command::motion("tap", "dpad", &[(0, -1), (0, 0), (0, -1)], Some(8)).unwrap();
        let script = [(0, -1), (0, 0), (0, -1), (0, 0), (0, -1)];
        let fired: Vec<bool> = script
            .into_iter()
            .map(|(x, y)| command.update(dpad(x, y)))
            .collect();
        // The last "up" of the first match cannot start a second one
        assert_eq!(fired, vec![false, false, true, false, false]);
        assert!(!command.active());
    }

    #[test]
    fn test_ring_is_bounded_by_frame_window() {
        let step = Step::new("never", 1).unwrap().with_condition(|_| false);
        let mut command = Command::new("c", vec![], vec![step], Some(3)).unwrap();
        for _ in 0..10 {
            command.update(dpad(0, 0));
        }
        assert_eq!(command.frames().len(), 3);
    }

    #[test]
    fn test_condition_helpers() {
        let frame = vec![
            DeviceValue::Button(true),
            DeviceValue::Dpad(0, 0),
            DeviceValue::Stick(0.3, 0.4),
            DeviceValue::Trigger(0.9, true),
        ];
        assert!(button_pressed(0)(&frame));
        assert!(!button_released(0)(&frame));
        assert!(dpad_neutral(1)(&frame));
        assert!(stick_beyond(2, 0.45)(&frame));
        assert!(!stick_beyond(2, 0.55)(&frame));
        assert!(trigger_pressed(3)(&frame));
        assert!(!button_pressed(9)(&frame));
    }
}
