use std::collections::{HashSet, VecDeque};
use std::ops::Index;
use tracing::{debug, info, warn};

use super::command::{Command, CommandSpecError};
use super::device::{DeviceValue, LogicalDevice};
use crate::consts::FRAME_SLICE_SIZE;
use crate::mapping::{AxisNeutralLatch, InputSnapshot};

/// Values of every device of one controller, captured on a single tick,
/// in the controller's declared device order
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerFrame {
    values: Vec<DeviceValue>,
}

impl ControllerFrame {
    pub fn values(&self) -> &[DeviceValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn project(&self, indices: &[usize]) -> Vec<DeviceValue> {
        indices.iter().map(|&i| self.values[i]).collect()
    }
}

impl Index<usize> for ControllerFrame {
    type Output = DeviceValue;

    fn index(&self, index: usize) -> &DeviceValue {
        &self.values[index]
    }
}

struct AttachedCommand {
    command: Command,
    // Positions of the command's devices inside a controller frame
    projection: Vec<usize>,
}

pub struct Controller {
    name: String,
    devices: Vec<LogicalDevice>,
    frames: VecDeque<ControllerFrame>,
    capacity: usize,
    commands: Vec<AttachedCommand>,
    latch: AxisNeutralLatch,

    // Devices already reported as degraded this session
    degraded: HashSet<String>,

    fired: Vec<String>,
}

impl Controller {
    pub fn new(name: impl Into<String>, devices: Vec<LogicalDevice>) -> Self {
        Self::with_capacity(name, devices, FRAME_SLICE_SIZE)
    }

    pub fn with_capacity(name: impl Into<String>, devices: Vec<LogicalDevice>, capacity: usize) -> Self {
        let name = name.into();
        let capacity = capacity.max(1);
        info!(
            "Controller '{}' with {} devices, keeping {} frames",
            name,
            devices.len(),
            capacity
        );
        Self {
            name,
            devices,
            frames: VecDeque::with_capacity(capacity),
            capacity,
            commands: Vec::new(),
            latch: AxisNeutralLatch::default(),
            degraded: HashSet::new(),
            fired: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn devices(&self) -> &[LogicalDevice] {
        &self.devices
    }

    pub fn device(&self, name: &str) -> Option<&LogicalDevice> {
        self.devices.iter().find(|d| d.name() == name)
    }

    fn device_index(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.name() == name)
    }

    /// Frames oldest first; at most `capacity` of them
    pub fn frames(&self) -> &VecDeque<ControllerFrame> {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&ControllerFrame> {
        self.frames.back()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resizes the frame ring, dropping the oldest frames if it shrinks
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
    }

    /// Column of the frame ring for one device, oldest first
    pub fn frames_for(&self, device: &str) -> Option<Vec<DeviceValue>> {
        let index = self.device_index(device)?;
        Some(self.frames.iter().map(|frame| frame[index]).collect())
    }

    pub fn axis_neutral(&self) -> bool {
        self.latch.is_neutral()
    }

    pub fn add_command(&mut self, command: Command) -> Result<(), CommandSpecError> {
        let projection = command
            .devices()
            .iter()
            .map(|device| {
                self.device_index(device)
                    .ok_or_else(|| CommandSpecError::UnknownDevice {
                        command: command.name().to_string(),
                        device: device.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Attached command '{}' to controller '{}'",
            command.name(),
            self.name
        );
        self.commands.push(AttachedCommand {
            command,
            projection,
        });
        Ok(())
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().map(|attached| &attached.command)
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands().find(|c| c.name() == name)
    }

    /// Names of the commands that fired on the latest tick, in attach order
    pub fn fired(&self) -> &[String] {
        &self.fired
    }

    /// One full tick: sample, record, advance devices, then match commands
    pub fn tick(&mut self, snapshot: &InputSnapshot) -> &[String] {
        self.advance_frame(snapshot);
        self.update_commands()
    }

    /// Sampling phase. The frame is complete before any device counter moves.
    pub fn advance_frame(&mut self, snapshot: &InputSnapshot) {
        self.latch.track(snapshot);

        let mut values = Vec::with_capacity(self.devices.len());
        for device in &mut self.devices {
            let (value, error) = device.sample(snapshot);
            if let Some(e) = error {
                if self.degraded.insert(device.name().to_string()) {
                    warn!(
                        "Device '{}' of controller '{}' degraded to neutral: {}",
                        device.name(),
                        self.name,
                        e
                    );
                }
            }
            values.push(value);
        }

        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(ControllerFrame { values });

        for device in &mut self.devices {
            device.update();
        }
    }

    /// Command phase; feeds the newest frame to every attached command
    pub fn update_commands(&mut self) -> &[String] {
        self.fired.clear();
        let Some(frame) = self.frames.back() else {
            return &self.fired;
        };
        for attached in &mut self.commands {
            if attached.command.update(frame.project(&attached.projection)) {
                self.fired.push(attached.command.name().to_string());
            }
        }
        if !self.fired.is_empty() {
            debug!("Controller '{}' fired {:?}", self.name, self.fired);
        }
        &self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::command::{conditions, Step};
    use crate::controller::device::{Button, DeviceDefaults, Dpad};
    use crate::mapping::{JoystickDescriptor, Mapping, ScriptedInput};

    fn keys(ids: &[u32]) -> InputSnapshot {
        InputSnapshot {
            keys: ids.iter().copied().collect(),
            joysticks: Vec::new(),
        }
    }

    fn controller(capacity: usize) -> Controller {
        let d = DeviceDefaults::default();
        let button = |name: &str, id| Button::new(name, Mapping::key(id, name), &d);
        Controller::with_capacity(
            "p1",
            vec![
                LogicalDevice::Button(button("a", 32)),
                LogicalDevice::Dpad(Dpad::new(
                    "dpad",
                    button("up", 1),
                    button("down", 2),
                    button("left", 3),
                    button("right", 4),
                )),
            ],
            capacity,
        )
    }

    #[test]
    fn test_ring_holds_min_of_ticks_and_capacity() {
        for ticks in [0usize, 3, 5, 12] {
            let mut c = controller(5);
            for n in 0..ticks {
                let pressed: &[u32] = if n % 2 == 0 { &[32] } else { &[] };
                c.tick(&keys(pressed));
            }
            assert_eq!(c.frames().len(), ticks.min(5));
            // Oldest first: the last frame matches the last tick
            if ticks > 0 {
                let expected = (ticks - 1) % 2 == 0;
                assert_eq!(c.last_frame().unwrap()[0], DeviceValue::Button(expected));
            }
        }
    }

    #[test]
    fn test_frames_for_slices_a_column() {
        let mut c = controller(4);
        c.tick(&keys(&[1]));
        c.tick(&keys(&[]));
        c.tick(&keys(&[4, 32]));
        assert_eq!(
            c.frames_for("dpad").unwrap(),
            vec![
                DeviceValue::Dpad(0, -1),
                DeviceValue::Dpad(0, 0),
                DeviceValue::Dpad(1, 0)
            ]
        );
        assert!(c.frames_for("missing").is_none());
    }

    #[test]
    fn test_command_sees_projected_frames() {
        let mut c = controller(4);
        let step = Step::new("a with up", 1)
            .unwrap()
            .with_condition(conditions::dpad_is(0, (0, -1)))
            .with_condition(conditions::button_pressed(1));
        let command =
            Command::new("dash", vec!["dpad".into(), "a".into()], vec![step], None).unwrap();
        c.add_command(command).unwrap();

        assert!(c.tick(&keys(&[1])).is_empty());
        assert_eq!(c.tick(&keys(&[1, 32])), ["dash".to_string()]);
        assert!(c.command("dash").unwrap().active());
        assert!(c.command("dash").unwrap().frames().is_empty());
    }

    #[test]
    fn test_unknown_command_device_is_rejected() {
        let mut c = controller(4);
        let step = Step::new("s", 1).unwrap();
        let command = Command::new("x", vec!["stick".into()], vec![step], None).unwrap();
        assert!(matches!(
            c.add_command(command),
            Err(CommandSpecError::UnknownDevice { .. })
        ));
    }

    #[test]
    fn test_axis_neutral_latch_tracks_rest() {
        let input = ScriptedInput::new(vec![JoystickDescriptor {
            name: "Pad".into(),
            buttons: 0,
            axes: 2,
            hats: 0,
        }]);
        let mut c = controller(2);
        let mut pushed = input.neutral();
        pushed.joysticks[0].axes[0] = 0.4;
        c.tick(&pushed);
        assert!(!c.axis_neutral());
        c.tick(&input.neutral());
        assert!(c.axis_neutral());

        let mut held = input.neutral();
        held.joysticks[0].axes[1] = -0.95;
        c.tick(&held);
        assert!(!c.axis_neutral());
        c.tick(&held);
        c.tick(&pushed);
        assert!(!c.axis_neutral());
        c.tick(&input.neutral());
        assert!(c.axis_neutral());
    }
}
