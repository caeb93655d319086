use std::fmt;

/// Clamped value between a minimum and a maximum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meter {
    value: f32,
    minimum: f32,
    maximum: f32,
}

impl Meter {
    /// Full meter over `[0, maximum]`
    pub fn new(maximum: f32) -> Self {
        Self::with_bounds(maximum, 0.0, maximum)
    }

    pub fn with_bounds(value: f32, minimum: f32, maximum: f32) -> Self {
        let (minimum, maximum) = if minimum <= maximum {
            (minimum, maximum)
        } else {
            (maximum, minimum)
        };
        Self {
            value: value.clamp(minimum, maximum),
            minimum,
            maximum,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn minimum(&self) -> f32 {
        self.minimum
    }

    pub fn maximum(&self) -> f32 {
        self.maximum
    }

    pub fn set(&mut self, value: f32) {
        self.value = value.clamp(self.minimum, self.maximum);
    }

    pub fn add(&mut self, delta: f32) {
        self.set(self.value + delta);
    }

    pub fn refill(&mut self) {
        self.value = self.maximum;
    }

    pub fn is_empty(&self) -> bool {
        self.value <= self.minimum
    }

    pub fn is_full(&self) -> bool {
        self.value >= self.maximum
    }

    /// Position inside the bounds, 0 at the minimum and 1 at the maximum
    pub fn ratio(&self) -> f32 {
        let span = self.maximum - self.minimum;
        if span <= 0.0 {
            return 1.0;
        }
        (self.value - self.minimum) / span
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.maximum)
    }
}

/// Integer meter indexing a table of named states
#[derive(Debug, Clone, PartialEq)]
pub struct StateMeter {
    meter: Meter,
    states: Vec<String>,
}

impl StateMeter {
    pub fn new<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let states: Vec<String> = states.into_iter().map(Into::into).collect();
        let last = states.len().saturating_sub(1) as f32;
        Self {
            meter: Meter::with_bounds(0.0, 0.0, last),
            states,
        }
    }

    pub fn index(&self) -> usize {
        self.meter.value() as usize
    }

    pub fn state(&self) -> Option<&str> {
        self.states.get(self.index()).map(String::as_str)
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn set_index(&mut self, index: usize) {
        self.meter.set(index as f32);
    }

    /// Moves to the named state; false if there is no such state
    pub fn set_state(&mut self, name: &str) -> bool {
        match self.states.iter().position(|s| s == name) {
            Some(index) => {
                self.set_index(index);
                true
            }
            None => false,
        }
    }

    /// Steps forward, staying on the last state
    pub fn next(&mut self) -> Option<&str> {
        self.meter.add(1.0);
        self.state()
    }

    pub fn prev(&mut self) -> Option<&str> {
        self.meter.add(-1.0);
        self.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_clamps_on_assignment() {
        let mut meter = Meter::with_bounds(5.0, 0.0, 10.0);
        meter.set(12.0);
        assert_eq!(meter.value(), 10.0);
        assert!(meter.is_full());
        meter.add(-30.0);
        assert_eq!(meter.value(), 0.0);
        assert!(meter.is_empty());
        assert_eq!(Meter::with_bounds(-1.0, 0.0, 4.0).value(), 0.0);
    }

    #[test]
    fn test_meter_ratio() {
        let mut meter = Meter::with_bounds(0.0, 2.0, 6.0);
        meter.set(4.0);
        assert_eq!(meter.ratio(), 0.5);
    }

    #[test]
    fn test_state_meter_walks_its_table() {
        let mut states = StateMeter::new(["idle", "walk", "run"]);
        assert_eq!(states.state(), Some("idle"));
        assert_eq!(states.next(), Some("walk"));
        assert_eq!(states.next(), Some("run"));
        assert_eq!(states.next(), Some("run"));
        assert!(states.set_state("idle"));
        assert!(!states.set_state("fly"));
        assert_eq!(states.prev(), Some("idle"));
        assert_eq!(StateMeter::new(Vec::<String>::new()).state(), None);
    }
}
