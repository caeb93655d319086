//! Mapping discovery for profile recording
//!
//! Recording is the one place the core blocks: the recorder polls the input
//! source until the player presses something usable. It never runs inside the
//! gameplay tick.
//!
//! Noisy sticks make naive recording fire on whatever axis drifts first, so an
//! axis only counts once the [`AxisNeutralLatch`] has seen every axis at rest.

use statum::{machine, state};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::DiscoveryError;
use super::primitives::{AxisMapping, HatAxis, Mapping, MappingRecord, Sign};
use super::source::{InputSnapshot, InputSource, JoystickDescriptor, RawInputEvent};
use crate::consts::{AXIS_MIN, AXIS_REST, DEFAULT_DEAD_ZONE};
use crate::controller::profile::{ControllerProfile, DeviceKind, DeviceProfile};

/// Set exactly when all axes of all joysticks are at rest; cleared by the
/// first axis crossing that is allowed to produce a discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisNeutralLatch {
    neutral: bool,
}

impl AxisNeutralLatch {
    pub fn refresh(&mut self, snapshot: &InputSnapshot) {
        if snapshot.axes_at_rest(AXIS_REST) {
            self.neutral = true;
        }
    }

    /// Per-tick update: set on full rest, cleared by any axis past `AXIS_MIN`
    pub fn track(&mut self, snapshot: &InputSnapshot) {
        self.refresh(snapshot);
        self.claim(snapshot.peak_axis());
    }

    pub fn is_neutral(&self) -> bool {
        self.neutral
    }

    /// Consumes the latch if `value` is a deliberate push
    pub fn claim(&mut self, value: f32) -> bool {
        if self.neutral && value.abs() > AXIS_MIN {
            self.neutral = false;
            true
        } else {
            false
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecorderSettings {
    /// Polls per mapping before giving up
    pub poll_budget: u32,
    pub poll_interval: Duration,
    /// Threshold stored on recorded axis press mappings
    pub dead_zone: f32,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            poll_budget: 60 * 30,
            poll_interval: Duration::from_millis(16),
            dead_zone: DEFAULT_DEAD_ZONE,
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum RecorderState {
    Idle,
    Listening,
}

#[machine]
#[derive(Debug)]
pub struct MappingRecorder<S: RecorderState> {
    settings: RecorderSettings,

    // Joysticks seen when listening started; recorded mappings are validated against them
    joysticks: Vec<JoystickDescriptor>,

    latch: AxisNeutralLatch,
}

impl<S: RecorderState> MappingRecorder<S> {
    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }
}

impl MappingRecorder<Idle> {
    pub fn create(settings: Option<RecorderSettings>) -> Self {
        let settings = settings.unwrap_or_default();
        debug!("Creating mapping recorder with settings: {:?}", settings);
        Self::new(settings, Vec::new(), AxisNeutralLatch::default())
    }

    /// Snapshot the connected joysticks, drop stale events and start listening
    pub fn listen(mut self, source: &mut dyn InputSource) -> MappingRecorder<Listening> {
        self.joysticks = source.joysticks();
        let stale = source.poll_events();
        if !stale.is_empty() {
            debug!("Discarding {} stale input events", stale.len());
        }
        info!(
            "Mapping recorder listening on {} joysticks",
            self.joysticks.len()
        );
        self.transition()
    }
}

impl MappingRecorder<Listening> {
    /// Blocks until any press-style input arrives
    pub fn record_mapping(
        &mut self,
        source: &mut dyn InputSource,
    ) -> Result<Mapping, DiscoveryError> {
        self.record_where(source, Some)
    }

    /// Blocks until an axis is pushed and returns it as a continuous mapping
    pub fn record_axis(
        &mut self,
        source: &mut dyn InputSource,
    ) -> Result<AxisMapping, DiscoveryError> {
        self.record_where(source, |mapping| match mapping {
            Mapping::Axis {
                joy_id,
                joy_name,
                id,
                sign,
                ..
            } => Some(AxisMapping {
                joy_id,
                joy_name,
                id,
                sign,
            }),
            _ => None,
        })
    }

    pub fn record_device(
        &mut self,
        source: &mut dyn InputSource,
        name: &str,
        kind: DeviceKind,
    ) -> Result<DeviceProfile, DiscoveryError> {
        let device = match kind {
            DeviceKind::Button => DeviceProfile::Button {
                name: name.to_string(),
                mapping: self.record_part(source, name, "button")?,
            },
            DeviceKind::Dpad => DeviceProfile::Dpad {
                name: name.to_string(),
                up: self.record_part(source, name, "up")?,
                down: self.record_part(source, name, "down")?,
                left: self.record_part(source, name, "left")?,
                right: self.record_part(source, name, "right")?,
            },
            DeviceKind::ThumbStick => {
                info!("Push {} right", name);
                let x_axis = self.record_axis(source)?.to_record();
                info!("Push {} down", name);
                let y_axis = self.record_axis(source)?.to_record();
                DeviceProfile::ThumbStick {
                    name: name.to_string(),
                    x_axis,
                    y_axis,
                    dead_zone: Some(self.settings.dead_zone),
                }
            }
            DeviceKind::Trigger => {
                info!("Pull {}", name);
                DeviceProfile::Trigger {
                    name: name.to_string(),
                    axis: self.record_axis(source)?.to_record(),
                    dead_zone: Some(self.settings.dead_zone),
                }
            }
        };
        Ok(device)
    }

    pub fn record_profile(
        &mut self,
        source: &mut dyn InputSource,
        name: &str,
        layout: &[(&str, DeviceKind)],
    ) -> Result<ControllerProfile, DiscoveryError> {
        let mut devices = Vec::with_capacity(layout.len());
        for (device_name, kind) in layout {
            devices.push(self.record_device(source, device_name, *kind)?);
        }
        info!("Recorded profile '{}' with {} devices", name, devices.len());
        Ok(ControllerProfile {
            name: name.to_string(),
            devices,
        })
    }

    fn record_part(
        &mut self,
        source: &mut dyn InputSource,
        name: &str,
        part: &str,
    ) -> Result<MappingRecord, DiscoveryError> {
        info!("Press input for {} {}", name, part);
        Ok(self.record_mapping(source)?.to_record())
    }

    pub fn finish(self) -> MappingRecorder<Idle> {
        debug!("Mapping recorder going idle");
        self.transition()
    }

    fn record_where<T>(
        &mut self,
        source: &mut dyn InputSource,
        select: impl Fn(Mapping) -> Option<T>,
    ) -> Result<T, DiscoveryError> {
        for _ in 0..self.settings.poll_budget {
            let snapshot = source.poll();
            self.latch.refresh(&snapshot);

            for event in source.poll_events() {
                if let Some(mapping) = self.qualify(event)? {
                    let described = mapping.to_string();
                    match select(mapping) {
                        Some(recorded) => {
                            info!("Recorded mapping: {}", described);
                            return Ok(recorded);
                        }
                        None => debug!("Ignoring {} while waiting for another input kind", described),
                    }
                }
            }

            if !self.settings.poll_interval.is_zero() {
                std::thread::sleep(self.settings.poll_interval);
            }
        }
        warn!(
            "No usable input within {} polls",
            self.settings.poll_budget
        );
        Err(DiscoveryError::Timeout(self.settings.poll_budget))
    }

    fn qualify(&mut self, event: RawInputEvent) -> Result<Option<Mapping>, DiscoveryError> {
        let joy_name = |joysticks: &[JoystickDescriptor], joy_id: usize| {
            joysticks
                .get(joy_id)
                .map(|joy| joy.name.clone())
                .unwrap_or_default()
        };

        let mapping = match event {
            RawInputEvent::KeyDown { key, name } => Some(Mapping::key(key, name)),
            RawInputEvent::JoyButtonDown { joy_id, button } => {
                let record = MappingRecord::Button {
                    map_id: button,
                    joy_id,
                    joy_name: joy_name(&self.joysticks, joy_id),
                };
                Some(Mapping::from_record(&record, &self.joysticks)?)
            }
            RawInputEvent::JoyAxisMotion {
                joy_id,
                axis,
                value,
            } => {
                if self.latch.claim(value) {
                    let record = MappingRecord::Axis {
                        map_id: axis,
                        joy_id,
                        joy_name: joy_name(&self.joysticks, joy_id),
                        sign: Sign::of(value).into(),
                        dead_zone: self.settings.dead_zone,
                    };
                    Some(Mapping::from_record(&record, &self.joysticks)?)
                } else {
                    None
                }
            }
            RawInputEvent::JoyHatMotion {
                joy_id,
                hat,
                position,
            } => {
                if position == (0, 0) {
                    None
                } else {
                    let record = MappingRecord::Hat {
                        map_id: hat,
                        joy_id,
                        joy_name: joy_name(&self.joysticks, joy_id),
                        position,
                        axis: HatAxis::Both.into(),
                    };
                    Some(Mapping::from_record(&record, &self.joysticks)?)
                }
            }
        };
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::source::ScriptedInput;

    fn pad() -> JoystickDescriptor {
        JoystickDescriptor {
            name: "Pad".into(),
            buttons: 4,
            axes: 2,
            hats: 1,
        }
    }

    fn fast() -> Option<RecorderSettings> {
        Some(RecorderSettings {
            poll_budget: 10,
            poll_interval: Duration::ZERO,
            dead_zone: 0.2,
        })
    }

    #[test]
    fn test_latch_requires_rest_before_claim() {
        let input = ScriptedInput::new(vec![pad()]);
        let mut latch = AxisNeutralLatch::default();
        assert!(!latch.claim(0.95));

        let mut pushed = input.neutral();
        pushed.joysticks[0].axes[0] = 0.5;
        latch.refresh(&pushed);
        assert!(!latch.is_neutral());

        latch.refresh(&input.neutral());
        assert!(latch.is_neutral());
        assert!(!latch.claim(0.5));
        assert!(latch.claim(-0.95));
        assert!(!latch.claim(0.95));
    }

    #[test]
    fn test_records_key_press() {
        let mut input = ScriptedInput::new(vec![pad()]);
        input.push_events(vec![]).push_events(vec![RawInputEvent::KeyDown {
            key: 32,
            name: "space".into(),
        }]);
        let mut recorder = MappingRecorder::create(fast()).listen(&mut input);
        let mapping = recorder.record_mapping(&mut input).unwrap();
        assert_eq!(mapping, Mapping::key(32, "space"));
    }

    #[test]
    fn test_axis_needs_neutral_latch() {
        let mut input = ScriptedInput::new(vec![pad()]);
        // First poll shows the stick already pushed, so its motion is ignored
        input.push_with(|s| s.joysticks[0].axes[1] = 0.95);
        input.push_events(vec![]);
        input.push_events(vec![RawInputEvent::JoyAxisMotion {
            joy_id: 0,
            axis: 1,
            value: 0.95,
        }]);
        input.push_events(vec![RawInputEvent::JoyAxisMotion {
            joy_id: 0,
            axis: 0,
            value: -0.97,
        }]);
        let mut recorder = MappingRecorder::create(fast()).listen(&mut input);
        let axis = recorder.record_axis(&mut input).unwrap();
        assert_eq!(axis.id, 0);
        assert_eq!(axis.sign, Sign::Negative);
    }

    #[test]
    fn test_times_out_without_input() {
        let mut input = ScriptedInput::new(vec![pad()]);
        let mut recorder = MappingRecorder::create(fast()).listen(&mut input);
        assert!(matches!(
            recorder.record_mapping(&mut input),
            Err(DiscoveryError::Timeout(10))
        ));
    }

    #[test]
    fn test_records_dpad_profile() {
        let mut input = ScriptedInput::new(vec![pad()]);
        input.push_events(vec![]);
        for (i, position) in [(0, -1), (-1, 0), (1, 0)].into_iter().enumerate() {
            input.push_events(vec![RawInputEvent::JoyHatMotion {
                joy_id: 0,
                hat: 0,
                position,
            }]);
            if i == 0 {
                // Button presses are valid dpad parts too; this one becomes "down"
                input.push_events(vec![RawInputEvent::JoyButtonDown {
                    joy_id: 0,
                    button: 3,
                }]);
            }
        }
        let mut recorder = MappingRecorder::create(fast()).listen(&mut input);
        let profile = recorder
            .record_profile(&mut input, "p1", &[("dpad", DeviceKind::Dpad)])
            .unwrap();
        assert_eq!(profile.devices.len(), 1);
        assert_eq!(profile.devices[0].name(), "dpad");
        assert_eq!(profile.devices[0].kind(), DeviceKind::Dpad);
        match &profile.devices[0] {
            DeviceProfile::Dpad { down, left, .. } => {
                assert!(matches!(down, MappingRecord::Button { map_id: 3, .. }));
                assert!(matches!(left, MappingRecord::Hat { position: (-1, 0), .. }));
            }
            other => panic!("unexpected device {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_button_is_rejected() {
        let mut input = ScriptedInput::new(vec![pad()]);
        input.push_events(vec![]);
        input.push_events(vec![RawInputEvent::JoyButtonDown {
            joy_id: 0,
            button: 9,
        }]);
        let mut recorder = MappingRecorder::create(fast()).listen(&mut input);
        assert!(matches!(
            recorder.record_mapping(&mut input),
            Err(DiscoveryError::Rejected(_))
        ));
        let _idle = recorder.finish();
    }
}
