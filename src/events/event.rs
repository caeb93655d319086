use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::handler::HandlerId;
use super::timer::{Timer, TimerUnit};

/// Payload keys an event answers itself; a payload may not shadow them
pub const RESERVED_KEYS: [&str; 5] = ["name", "id", "timer", "handlers", "trigger"];

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventPayloadError {
    #[error("Payload key '{0}' is reserved")]
    ReservedKey(String),
}

/// Dynamic payload value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// Truthiness used by listener conditions
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(i as i64)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// State of the action timer that delivered an event
#[derive(Debug, Clone, PartialEq)]
pub struct TimerProgress {
    pub name: String,
    pub value: f32,
    pub duration: f32,
    pub unit: TimerUnit,
}

impl TimerProgress {
    pub fn of(timer: &Timer) -> Self {
        Self {
            name: timer.name().to_string(),
            value: timer.value(),
            duration: timer.duration(),
            unit: timer.unit(),
        }
    }

    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        1.0 - self.value / self.duration
    }

    fn get(&self, key: &str) -> Option<Value> {
        match key {
            "name" => Some(self.name.as_str().into()),
            "value" => Some(self.value.into()),
            "duration" => Some(self.duration.into()),
            "progress" => Some(self.progress().into()),
            "unit" => Some(self.unit.to_string().into()),
            _ => None,
        }
    }
}

/// A named occurrence with a free-form payload
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    name: String,
    id: u64,
    payload: BTreeMap<String, Value>,
    trigger: Option<Box<Event>>,
    timer: Option<TimerProgress>,
    handlers_visited: Vec<HandlerId>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
            payload: BTreeMap::new(),
            trigger: None,
            timer: None,
            handlers_visited: Vec::new(),
        }
    }

    pub fn with_payload<I, K, V>(name: impl Into<String>, payload: I) -> Result<Self, EventPayloadError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut event = Self::new(name);
        for (key, value) in payload {
            event.insert(key, value)?;
        }
        Ok(event)
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Self, EventPayloadError> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, EventPayloadError> {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(EventPayloadError::ReservedKey(key));
        }
        Ok(self.payload.insert(key, value.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Monotone across the process
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Copy with a fresh id and no delivery history
    pub fn renewed(&self) -> Self {
        Self {
            id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
            timer: None,
            handlers_visited: Vec::new(),
            ..self.clone()
        }
    }

    pub fn payload(&self) -> &BTreeMap<String, Value> {
        &self.payload
    }

    pub fn trigger(&self) -> Option<&Event> {
        self.trigger.as_deref()
    }

    pub fn set_trigger(&mut self, trigger: Event) {
        self.trigger = Some(Box::new(trigger));
    }

    pub fn timer(&self) -> Option<&TimerProgress> {
        self.timer.as_ref()
    }

    pub(crate) fn set_timer(&mut self, timer: TimerProgress) {
        self.timer = Some(timer);
    }

    pub fn handlers_visited(&self) -> &[HandlerId] {
        &self.handlers_visited
    }

    pub(crate) fn visit(&mut self, handler: HandlerId) {
        self.handlers_visited.push(handler);
    }

    pub(crate) fn clear_visits(&mut self) {
        self.handlers_visited.clear();
    }

    /// Looks a key up; `trigger.` and `timer.` prefixes descend into the
    /// trigger event and the delivering timer.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "name" => return Some(self.name.as_str().into()),
            "id" => return Some(self.id.into()),
            "handlers" => {
                return Some(Value::List(
                    self.handlers_visited.iter().map(|h| h.0.into()).collect(),
                ))
            }
            _ => {}
        }
        if let Some(rest) = key.strip_prefix("trigger.") {
            return self.trigger.as_ref()?.get(rest);
        }
        if let Some(rest) = key.strip_prefix("timer.") {
            return self.timer.as_ref()?.get(rest);
        }
        self.payload.get(key).cloned()
    }

    /// Truthiness of a key; missing keys are false
    pub fn is(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.truthy())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}
