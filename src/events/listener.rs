use std::fmt;

use super::action::ActionTemplate;
use super::event::Event;
use super::handler::HandlerId;

/// What a listener does with a matching event
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Deliver the same event to another handler, synchronously
    Pass(HandlerId),
    /// Start an action built from the template on the next tick
    Respond(ActionTemplate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditionsMode {
    #[default]
    All,
    Any,
    NotAll,
    NotAny,
}

impl ConditionsMode {
    fn aggregate(self, results: impl Iterator<Item = bool>) -> bool {
        let mut results = results;
        match self {
            ConditionsMode::All => results.all(|r| r),
            ConditionsMode::Any => results.any(|r| r),
            ConditionsMode::NotAll => !results.all(|r| r),
            ConditionsMode::NotAny => !results.any(|r| r),
        }
    }
}

pub enum Condition {
    /// Truthiness of a payload key, optionally inverted
    Key { key: String, negate: bool },
    Predicate(Box<dyn Fn(&Event) -> bool>),
}

impl Condition {
    /// Parses `"key"` or `"not key"`
    pub fn key(text: &str) -> Self {
        match text.strip_prefix("not ") {
            Some(key) => Condition::Key {
                key: key.trim().to_string(),
                negate: true,
            },
            None => Condition::Key {
                key: text.trim().to_string(),
                negate: false,
            },
        }
    }

    pub fn holds(&self, event: &Event) -> bool {
        match self {
            Condition::Key { key, negate } => event.is(key) != *negate,
            Condition::Predicate(predicate) => predicate(event),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Key { key, negate } => {
                write!(f, "Key({}{})", if *negate { "not " } else { "" }, key)
            }
            Condition::Predicate(_) => write!(f, "Predicate"),
        }
    }
}

/// Maps a trigger event name to a response, optionally gated by conditions
#[derive(Debug)]
pub struct Listener {
    trigger: String,
    response: Response,
    conditions: Vec<Condition>,
    mode: ConditionsMode,
    temp: bool,
}

impl Listener {
    pub fn new(trigger: impl Into<String>, response: Response) -> Self {
        Self {
            trigger: trigger.into(),
            response,
            conditions: Vec::new(),
            mode: ConditionsMode::All,
            temp: false,
        }
    }

    pub fn pass(trigger: impl Into<String>, target: HandlerId) -> Self {
        Self::new(trigger, Response::Pass(target))
    }

    pub fn respond(trigger: impl Into<String>, template: ActionTemplate) -> Self {
        Self::new(trigger, Response::Respond(template))
    }

    pub fn when(mut self, key: &str) -> Self {
        self.conditions.push(Condition::key(key));
        self
    }

    pub fn when_fn(mut self, predicate: impl Fn(&Event) -> bool + 'static) -> Self {
        self.conditions.push(Condition::Predicate(Box::new(predicate)));
        self
    }

    pub fn mode(mut self, mode: ConditionsMode) -> Self {
        self.mode = mode;
        self
    }

    /// Removed from its handler the first time it fires
    pub fn temporary(mut self) -> Self {
        self.temp = true;
        self
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn temp(&self) -> bool {
        self.temp
    }

    /// Name match plus the aggregated conditions; no conditions always passes
    pub fn matches(&self, event: &Event) -> bool {
        if event.name() != self.trigger {
            return false;
        }
        if self.conditions.is_empty() {
            return true;
        }
        self.mode
            .aggregate(self.conditions.iter().map(|c| c.holds(event)))
    }
}
