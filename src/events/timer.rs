use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::meter::Meter;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimerSpecError {
    #[error("Timer '{name}' needs a positive duration, got {duration}")]
    NonPositiveDuration { name: String, duration: f32 },

    #[error("Unknown timer unit: {0}")]
    UnknownUnit(String),
}

/// What one unit of a timer's duration means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerUnit {
    /// One per tick, whatever the tick's duration
    #[default]
    Frame,
    /// Real seconds, consumed by `dt`
    Second,
}

impl FromStr for TimerUnit {
    type Err = TimerSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "frame" | "frames" | "f" => Ok(TimerUnit::Frame),
            "second" | "seconds" | "s" => Ok(TimerUnit::Second),
            other => Err(TimerSpecError::UnknownUnit(other.to_string())),
        }
    }
}

impl fmt::Display for TimerUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerUnit::Frame => write!(f, "frame"),
            TimerUnit::Second => write!(f, "second"),
        }
    }
}

pub type TimerCallback = Box<dyn FnMut(&Timer)>;

/// Countdown over a [`Meter`]; off once the meter hits its minimum
pub struct Timer {
    name: String,
    meter: Meter,
    unit: TimerUnit,
    temp: bool,
    off: bool,
    on_tick: Option<TimerCallback>,
    on_switch_off: Option<TimerCallback>,
}

impl Timer {
    /// Temporary timer starting full; `duration` must be positive
    pub fn new(name: impl Into<String>, duration: f32, unit: TimerUnit) -> Result<Self, TimerSpecError> {
        let name = name.into();
        if duration.is_nan() || duration <= 0.0 {
            return Err(TimerSpecError::NonPositiveDuration { name, duration });
        }
        Ok(Self::build(name, duration, unit))
    }

    pub fn frames(name: impl Into<String>, frames: u32) -> Result<Self, TimerSpecError> {
        Self::new(name, frames as f32, TimerUnit::Frame)
    }

    pub fn seconds(name: impl Into<String>, seconds: f32) -> Result<Self, TimerSpecError> {
        Self::new(name, seconds, TimerUnit::Second)
    }

    pub(crate) fn build(name: String, duration: f32, unit: TimerUnit) -> Self {
        Self {
            name,
            meter: Meter::new(duration),
            unit,
            temp: true,
            off: false,
            on_tick: None,
            on_switch_off: None,
        }
    }

    /// Non-temporary timers are refilled by their clock instead of dropped
    pub fn looping(mut self) -> Self {
        self.temp = false;
        self
    }

    pub fn on_tick(mut self, callback: impl FnMut(&Timer) + 'static) -> Self {
        self.on_tick = Some(Box::new(callback));
        self
    }

    pub fn on_switch_off(mut self, callback: impl FnMut(&Timer) + 'static) -> Self {
        self.on_switch_off = Some(Box::new(callback));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> TimerUnit {
        self.unit
    }

    pub fn temp(&self) -> bool {
        self.temp
    }

    pub fn value(&self) -> f32 {
        self.meter.value()
    }

    pub fn duration(&self) -> f32 {
        self.meter.maximum()
    }

    /// Fraction of the duration already consumed
    pub fn progress(&self) -> f32 {
        1.0 - self.meter.ratio()
    }

    pub fn is_off(&self) -> bool {
        self.off
    }

    pub fn refill(&mut self) {
        self.meter.refill();
        self.off = false;
    }

    /// Counts down once; true iff this tick switched the timer off
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.off {
            return false;
        }
        let step = match self.unit {
            TimerUnit::Frame => 1.0,
            TimerUnit::Second => dt,
        };
        self.meter.add(-step);
        self.fire(|t| &mut t.on_tick);

        if self.meter.is_empty() {
            self.off = true;
            debug!("Timer '{}' switched off", self.name);
            self.fire(|t| &mut t.on_switch_off);
            return true;
        }
        false
    }

    // The callback is lent out while it runs so it can read the timer
    fn fire(&mut self, slot: fn(&mut Timer) -> &mut Option<TimerCallback>) {
        if let Some(mut callback) = slot(self).take() {
            callback(self);
            *slot(self) = Some(callback);
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("meter", &self.meter)
            .field("unit", &self.unit)
            .field("temp", &self.temp)
            .field("off", &self.off)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_rejects_non_positive_duration() {
        assert!(matches!(
            Timer::frames("t", 0),
            Err(TimerSpecError::NonPositiveDuration { .. })
        ));
        assert!(Timer::seconds("t", -1.0).is_err());
        assert!(Timer::seconds("t", f32::NAN).is_err());
        assert_eq!(
            "minutes".parse::<TimerUnit>(),
            Err(TimerSpecError::UnknownUnit("minutes".into()))
        );
        assert_eq!("Seconds".parse::<TimerUnit>(), Ok(TimerUnit::Second));
    }

    #[test]
    fn test_frame_timer_ignores_dt() {
        let mut timer = Timer::frames("t", 3).unwrap();
        assert!(!timer.tick(10.0));
        assert_eq!(timer.value(), 2.0);
    }

    #[test]
    fn test_switch_off_fires_once_per_transition() {
        let offs = Rc::new(Cell::new(0));
        let ticks = Rc::new(Cell::new(0));
        let (o, t) = (offs.clone(), ticks.clone());
        let mut timer = Timer::seconds("t", 0.5)
            .unwrap()
            .on_tick(move |_| t.set(t.get() + 1))
            .on_switch_off(move |timer| {
                assert!(timer.is_off());
                o.set(o.get() + 1)
            });

        assert!(!timer.tick(0.25));
        assert!(timer.tick(0.25));
        assert!(!timer.tick(0.25));
        assert_eq!(offs.get(), 1);
        assert_eq!(ticks.get(), 2);
        assert_eq!(timer.progress(), 1.0);

        timer.refill();
        assert!(!timer.is_off());
        assert!(timer.tick(1.0));
        assert_eq!(offs.get(), 2);
    }
}
