//! Actions: events carried across ticks by a timer
//!
//! An [`Action`] re-delivers its event to its target on every tick of its
//! timer. Chains are stored as a shared slice of [`ActionTemplate`]s plus a
//! cursor; when a link switches off, the next template is instantiated with
//! the finished link's event as its trigger.

use std::rc::Rc;

use super::clock::Countable;
use super::event::{Event, TimerProgress};
use super::handler::HandlerId;
use super::timer::{Timer, TimerSpecError, TimerUnit};

/// Recipe for an [`Action`]; listeners in respond mode hold one
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTemplate {
    name: String,
    event: Event,
    target: HandlerId,
    duration: f32,
    unit: TimerUnit,
    temp: bool,
}

impl ActionTemplate {
    /// One-frame action delivering `event` to `target`
    pub fn new(event: Event, target: HandlerId) -> Self {
        Self {
            name: event.name().to_string(),
            event,
            target,
            duration: 1.0,
            unit: TimerUnit::Frame,
            temp: true,
        }
    }

    pub fn lasting(mut self, duration: f32, unit: TimerUnit) -> Result<Self, TimerSpecError> {
        if duration.is_nan() || duration <= 0.0 {
            return Err(TimerSpecError::NonPositiveDuration {
                name: self.name,
                duration,
            });
        }
        self.duration = duration;
        self.unit = unit;
        Ok(self)
    }

    pub fn frames(self, frames: u32) -> Result<Self, TimerSpecError> {
        self.lasting(frames as f32, TimerUnit::Frame)
    }

    pub fn seconds(self, seconds: f32) -> Result<Self, TimerSpecError> {
        self.lasting(seconds, TimerUnit::Second)
    }

    /// Timer name; defaults to the event name and is what `remove_action` matches
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn looping(mut self) -> Self {
        self.temp = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn target(&self) -> HandlerId {
        self.target
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn unit(&self) -> TimerUnit {
        self.unit
    }

    /// Fresh action with its own event id; `trigger` becomes the event's trigger
    pub fn instantiate(&self, trigger: Option<Event>) -> Action {
        let mut event = self.event.renewed();
        if let Some(trigger) = trigger {
            event.set_trigger(trigger);
        }
        let mut timer = Timer::build(self.name.clone(), self.duration, self.unit);
        if !self.temp {
            timer = timer.looping();
        }
        Action {
            timer,
            event,
            target: self.target,
            chain: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Chain {
    links: Rc<[ActionTemplate]>,
    next: usize,
    looping: bool,
}

#[derive(Debug)]
pub struct Action {
    timer: Timer,
    event: Event,
    target: HandlerId,
    chain: Option<Chain>,
}

impl Action {
    pub fn name(&self) -> &str {
        self.timer.name()
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn target(&self) -> HandlerId {
        self.target
    }

    /// The event as delivered on the current tick
    pub fn delivery(&self) -> Event {
        let mut event = self.event.clone();
        event.clear_visits();
        event.set_timer(TimerProgress::of(&self.timer));
        event
    }

    /// Next link of the chain, triggered by this action's event
    pub fn successor(&self) -> Option<Action> {
        let chain = self.chain.as_ref()?;
        let index = if chain.next < chain.links.len() {
            chain.next
        } else if chain.looping {
            0
        } else {
            return None;
        };
        let mut next = chain.links[index].instantiate(Some(self.event.clone()));
        next.chain = Some(Chain {
            links: chain.links.clone(),
            next: index + 1,
            looping: chain.looping,
        });
        Some(next)
    }
}

impl Countable for Action {
    fn timer(&self) -> &Timer {
        &self.timer
    }

    fn timer_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }
}

fn link(templates: Vec<ActionTemplate>, looping: bool) -> Option<Action> {
    let links: Rc<[ActionTemplate]> = templates.into();
    let mut head = links.first()?.instantiate(None);
    head.chain = Some(Chain {
        links: links.clone(),
        next: 1,
        looping,
    });
    Some(head)
}

/// Head of a chain where each link starts when the previous one switches off
pub fn chain_actions(templates: Vec<ActionTemplate>) -> Option<Action> {
    link(templates, false)
}

/// Like [`chain_actions`], but the last link starts the head again
pub fn loop_actions(templates: Vec<ActionTemplate>) -> Option<Action> {
    link(templates, true)
}
