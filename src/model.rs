//! Model: named observable values
//!
//! Every mutation runs the callbacks subscribed to that name, synchronously and
//! in subscription order. Mutations can also arrive as events ([`ModelChange`])
//! through the handler [`Model::attach`] registers, which lets them be scheduled
//! as actions or answered by listeners. An event carrying a truthy `ignore`
//! applies its change without fan-out.

use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::events::{
    ActionTemplate, Event, EventBus, EventHandler, EventPayloadError, HandlerId, Value,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelConstraintError {
    #[error("Value '{name}' is {found}, not a list")]
    NotASequence { name: String, found: &'static str },

    #[error("Index {index} is past the end of '{name}' (length {len})")]
    IndexOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },

    #[error("Event '{event}' lacks a usable '{key}'")]
    MissingField { event: String, key: &'static str },

    #[error("Key '{0}' resolves to nothing on the event")]
    Unresolved(String),

    #[error("'{0}' is not a model change")]
    UnknownChange(String),
}

pub type ModelCallback = Box<dyn FnMut(&Value)>;

#[derive(Default)]
pub struct Model {
    values: HashMap<String, Value>,
    callbacks: HashMap<String, Vec<ModelCallback>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn subscribe(&mut self, name: impl Into<String>, callback: impl FnMut(&Value) + 'static) {
        self.callbacks
            .entry(name.into())
            .or_default()
            .push(Box::new(callback));
    }

    pub fn subscribers(&self, name: &str) -> usize {
        self.callbacks.get(name).map_or(0, Vec::len)
    }

    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.assign(name.into(), value.into(), true);
    }

    /// Assigns without running callbacks
    pub fn set_silent(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.assign(name.into(), value.into(), false);
    }

    /// Flips the truthiness of a value; a missing value becomes `true`
    pub fn toggle_value(&mut self, name: &str) -> bool {
        self.toggle(name, true)
    }

    pub fn append_value(
        &mut self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), ModelConstraintError> {
        self.append(name, value.into(), true)
    }

    /// Replaces the item at `index`; `index == len` appends
    pub fn set_at_index(
        &mut self,
        name: &str,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<(), ModelConstraintError> {
        self.put(name, index, value.into(), true)
    }

    /// Applies a change event addressed to the model
    pub fn apply(&mut self, event: &Event) -> Result<(), ModelConstraintError> {
        let notify = !event.is("ignore");
        match ModelChange::from_event(event)? {
            ModelChange::ChangeValue { name, value } => self.assign(name, value, notify),
            ModelChange::ToggleValue { name } => {
                self.toggle(&name, notify);
            }
            ModelChange::AppendValue { name, value } => self.append(&name, value, notify)?,
            ModelChange::SetAtIndex { name, index, value } => {
                self.put(&name, index, value, notify)?
            }
            ModelChange::SetTo { name, key } => {
                let value = event
                    .get(&key)
                    .ok_or(ModelConstraintError::Unresolved(key))?;
                self.assign(name, value, notify);
            }
        }
        Ok(())
    }

    /// Registers a `model` handler answering every [`ModelChange`] event
    pub fn attach(bus: &mut EventBus) -> HandlerId {
        let mut handler = EventHandler::new("model");
        for change in ModelChange::EVENT_NAMES {
            handler.add_method(change, |ctx, event| {
                if let Err(e) = ctx.model().apply(event) {
                    warn!("Model change {} rejected: {}", event, e);
                }
            });
        }
        bus.register(handler)
    }

    fn assign(&mut self, name: String, value: Value, notify: bool) {
        debug!("Model '{}' = {}", name, value);
        self.values.insert(name.clone(), value);
        if notify {
            self.notify(&name);
        }
    }

    fn toggle(&mut self, name: &str, notify: bool) -> bool {
        let flipped = !self.values.get(name).is_some_and(Value::truthy);
        self.assign(name.to_string(), Value::Bool(flipped), notify);
        flipped
    }

    fn list_mut(&mut self, name: &str) -> Result<&mut Vec<Value>, ModelConstraintError> {
        let value = self.values.get_mut(name);
        let found = value.as_ref().map_or("missing", |v| v.kind());
        value
            .and_then(Value::as_list_mut)
            .ok_or_else(|| ModelConstraintError::NotASequence {
                name: name.to_string(),
                found,
            })
    }

    fn append(&mut self, name: &str, value: Value, notify: bool) -> Result<(), ModelConstraintError> {
        self.list_mut(name)?.push(value);
        if notify {
            self.notify(name);
        }
        Ok(())
    }

    fn put(
        &mut self,
        name: &str,
        index: usize,
        value: Value,
        notify: bool,
    ) -> Result<(), ModelConstraintError> {
        let list = self.list_mut(name)?;
        match index.cmp(&list.len()) {
            std::cmp::Ordering::Less => list[index] = value,
            std::cmp::Ordering::Equal => list.push(value),
            std::cmp::Ordering::Greater => {
                return Err(ModelConstraintError::IndexOutOfRange {
                    name: name.to_string(),
                    index,
                    len: list.len(),
                })
            }
        }
        if notify {
            self.notify(name);
        }
        Ok(())
    }

    fn notify(&mut self, name: &str) {
        if let (Some(callbacks), Some(value)) = (self.callbacks.get_mut(name), self.values.get(name)) {
            for callback in callbacks.iter_mut() {
                callback(value);
            }
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("values", &self.values)
            .field("subscribed", &self.callbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A model mutation in event form
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChange {
    ChangeValue { name: String, value: Value },
    ToggleValue { name: String },
    AppendValue { name: String, value: Value },
    SetAtIndex { name: String, index: usize, value: Value },
    /// Copies whatever `key` resolves to on the applying event, e.g. `trigger.x`
    SetTo { name: String, key: String },
}

impl ModelChange {
    pub const EVENT_NAMES: [&'static str; 5] = [
        "change_value",
        "toggle_value",
        "append_value",
        "set_at_index",
        "set_to",
    ];

    pub fn event_name(&self) -> &'static str {
        match self {
            ModelChange::ChangeValue { .. } => "change_value",
            ModelChange::ToggleValue { .. } => "toggle_value",
            ModelChange::AppendValue { .. } => "append_value",
            ModelChange::SetAtIndex { .. } => "set_at_index",
            ModelChange::SetTo { .. } => "set_to",
        }
    }

    pub fn value_name(&self) -> &str {
        match self {
            ModelChange::ChangeValue { name, .. }
            | ModelChange::ToggleValue { name }
            | ModelChange::AppendValue { name, .. }
            | ModelChange::SetAtIndex { name, .. }
            | ModelChange::SetTo { name, .. } => name,
        }
    }

    pub fn to_event(&self) -> Result<Event, EventPayloadError> {
        let event = Event::new(self.event_name()).with("value_name", self.value_name())?;
        match self {
            ModelChange::ChangeValue { value, .. } | ModelChange::AppendValue { value, .. } => {
                event.with("value", value.clone())
            }
            ModelChange::ToggleValue { .. } => Ok(event),
            ModelChange::SetAtIndex { index, value, .. } => {
                event.with("index", *index)?.with("value", value.clone())
            }
            ModelChange::SetTo { key, .. } => event.with("key", key.as_str()),
        }
    }

    pub fn from_event(event: &Event) -> Result<Self, ModelConstraintError> {
        let missing = |key| ModelConstraintError::MissingField {
            event: event.name().to_string(),
            key,
        };
        let text = |key| {
            event
                .get(key)
                .and_then(|v| v.as_str().map(str::to_string))
                .ok_or_else(|| missing(key))
        };
        let value = || event.get("value").ok_or_else(|| missing("value"));

        let name = text("value_name")?;
        let change = match event.name() {
            "change_value" => ModelChange::ChangeValue {
                name,
                value: value()?,
            },
            "toggle_value" => ModelChange::ToggleValue { name },
            "append_value" => ModelChange::AppendValue {
                name,
                value: value()?,
            },
            "set_at_index" => ModelChange::SetAtIndex {
                name,
                index: event
                    .get("index")
                    .and_then(|v| v.as_int())
                    .and_then(|i| usize::try_from(i).ok())
                    .ok_or_else(|| missing("index"))?,
                value: value()?,
            },
            "set_to" => ModelChange::SetTo {
                name,
                key: text("key")?,
            },
            other => return Err(ModelConstraintError::UnknownChange(other.to_string())),
        };
        Ok(change)
    }

    /// One-frame action carrying this change to the model handler
    pub fn action(&self, model: HandlerId) -> Result<ActionTemplate, EventPayloadError> {
        Ok(ActionTemplate::new(self.to_event()?, model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Listener;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_callbacks_run_in_subscription_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut model = Model::new();
        for tag in ["c1", "c2", "c3"] {
            let calls = calls.clone();
            model.subscribe("v", move |value| calls.borrow_mut().push((tag, value.clone())));
        }
        model.set_value("v", 7);
        assert_eq!(
            *calls.borrow(),
            vec![("c1", Value::Int(7)), ("c2", Value::Int(7)), ("c3", Value::Int(7))]
        );
    }

    #[test]
    fn test_ignore_suppresses_fan_out() {
        let count = Rc::new(RefCell::new(0));
        let mut model = Model::new();
        let c = count.clone();
        model.subscribe("hp", move |_| *c.borrow_mut() += 1);

        let change = ModelChange::ChangeValue {
            name: "hp".into(),
            value: Value::Int(3),
        };
        model
            .apply(&change.to_event().unwrap().with("ignore", true).unwrap())
            .unwrap();
        assert_eq!(model.get("hp"), Some(&Value::Int(3)));
        assert_eq!(*count.borrow(), 0);

        model.apply(&change.to_event().unwrap()).unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_sequence_constraints_leave_model_unchanged() {
        let mut model = Model::new();
        model.set_value("n", 1);
        assert!(matches!(
            model.append_value("n", 2),
            Err(ModelConstraintError::NotASequence { found: "int", .. })
        ));
        assert_eq!(model.get("n"), Some(&Value::Int(1)));

        model.set_value("xs", vec![1, 2]);
        model.set_at_index("xs", 0, 9).unwrap();
        model.set_at_index("xs", 2, 3).unwrap();
        assert_eq!(
            model.set_at_index("xs", 5, 0),
            Err(ModelConstraintError::IndexOutOfRange {
                name: "xs".into(),
                index: 5,
                len: 3
            })
        );
        assert_eq!(model.get("xs"), Some(&Value::from(vec![9, 2, 3])));
    }

    #[test]
    fn test_toggle() {
        let mut model = Model::new();
        assert!(model.toggle_value("paused"));
        assert!(!model.toggle_value("paused"));
    }

    #[test]
    fn test_change_round_trips_through_event() {
        let changes = [
            ModelChange::ToggleValue { name: "a".into() },
            ModelChange::SetAtIndex {
                name: "b".into(),
                index: 2,
                value: Value::from("x"),
            },
            ModelChange::SetTo {
                name: "c".into(),
                key: "trigger.x".into(),
            },
        ];
        for change in changes {
            let event = change.to_event().unwrap();
            assert_eq!(ModelChange::from_event(&event).unwrap(), change);
        }
        assert!(matches!(
            ModelChange::from_event(&Event::new("change_value")),
            Err(ModelConstraintError::MissingField { key: "value_name", .. })
        ));
    }

    #[test]
    fn test_attached_model_copies_from_trigger() {
        let mut bus = EventBus::new();
        let model = Model::attach(&mut bus);
        let player = bus.register(EventHandler::new("player"));
        let set_to = ModelChange::SetTo {
            name: "last_x".into(),
            key: "trigger.x".into(),
        };
        bus.listen(player, Listener::respond("moved", set_to.action(model).unwrap()))
            .unwrap();

        bus.send(player, Event::new("moved").with("x", 4).unwrap())
            .unwrap();
        bus.update(0.0);
        assert!(bus.model().get("last_x").is_none());
        bus.update(0.0);
        assert_eq!(bus.model().get("last_x"), Some(&Value::Int(4)));
    }
}
