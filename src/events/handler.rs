//! Event handlers and the bus that owns them
//!
//! Handlers live in an append-only arena and refer to each other by
//! [`HandlerId`]. A dispatch checks the target out of the arena, so its
//! method can reach the [`Model`] and queue work on the bus through a
//! [`Context`] while the handler itself is borrowed.
//!
//! ```text
//! dispatch(target, event)
//!   ├─ method for event.name (if any)    ── effects queued in Context
//!   ├─ listeners, in insertion order     ── temp listeners that fire are dropped
//!   ├─ effects: emit / start / listen
//!   └─ responses: Pass ──► dispatch(other, same event)
//!                 Respond ──► Action queued in the target's clock (next tick)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use super::action::Action;
use super::clock::Clock;
use super::event::Event;
use super::listener::{Listener, Response};
use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId(pub usize);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("No handler registered as {0}")]
    UnknownHandler(HandlerId),
}

pub type Method = Box<dyn FnMut(&mut Context<'_>, &Event)>;

enum Effect {
    Emit(HandlerId, Event),
    Start(Action),
    Listen(HandlerId, Listener),
}

/// What a method may touch while its handler is checked out
pub struct Context<'a> {
    handler: HandlerId,
    tick: u64,
    model: &'a mut Model,
    effects: Vec<Effect>,
}

impl Context<'_> {
    pub fn handler(&self) -> HandlerId {
        self.handler
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn model(&mut self) -> &mut Model {
        &mut *self.model
    }

    /// Dispatches `event` to `target` right after this method returns
    pub fn emit(&mut self, target: HandlerId, event: Event) {
        self.effects.push(Effect::Emit(target, event));
    }

    /// Queues an action in its target's clock
    pub fn start(&mut self, action: Action) {
        self.effects.push(Effect::Start(action));
    }

    pub fn listen(&mut self, target: HandlerId, listener: Listener) {
        self.effects.push(Effect::Listen(target, listener));
    }
}

pub struct EventHandler {
    name: String,
    methods: HashMap<String, Method>,
    listeners: Vec<Listener>,
    clock: Clock<Action>,
    last_event: Option<Event>,
}

impl EventHandler {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            clock: Clock::new(name.clone()),
            name,
            methods: HashMap::new(),
            listeners: Vec::new(),
            last_event: None,
        }
    }

    /// Builder form of [`add_method`](Self::add_method)
    pub fn on(
        mut self,
        event_name: impl Into<String>,
        method: impl FnMut(&mut Context<'_>, &Event) + 'static,
    ) -> Self {
        self.add_method(event_name, method);
        self
    }

    pub fn add_method(
        &mut self,
        event_name: impl Into<String>,
        method: impl FnMut(&mut Context<'_>, &Event) + 'static,
    ) {
        self.methods.insert(event_name.into(), Box::new(method));
    }

    pub fn listen(&mut self, listener: Listener) {
        debug!("Handler '{}' listens for '{}'", self.name, listener.trigger());
        self.listeners.push(listener);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_method(&self, event_name: &str) -> bool {
        self.methods.contains_key(event_name)
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    pub fn clock(&self) -> &Clock<Action> {
        &self.clock
    }

    /// Last event a method of this handler ran for
    pub fn last_event(&self) -> Option<&Event> {
        self.last_event.as_ref()
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("EventHandler")
            .field("name", &self.name)
            .field("methods", &methods)
            .field("listeners", &self.listeners.len())
            .field("actions", &self.clock.timers().len())
            .finish()
    }
}

/// Arena of handlers plus the model they share
pub struct EventBus {
    slots: Vec<Option<EventHandler>>,
    model: Model,
    tick: u64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_model(Model::new())
    }

    pub fn with_model(model: Model) -> Self {
        Self {
            slots: Vec::new(),
            model,
            tick: 0,
        }
    }

    pub fn register(&mut self, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.slots.len());
        debug!("Registered handler '{}' as {}", handler.name(), id);
        self.slots.push(Some(handler));
        id
    }

    pub fn handler(&self, id: HandlerId) -> Option<&EventHandler> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn handler_mut(&mut self, id: HandlerId) -> Option<&mut EventHandler> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    pub fn find(&self, name: &str) -> Option<HandlerId> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|h| h.name() == name))
            .map(HandlerId)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    /// Completed updates; events dispatched during tick `n` see `n`
    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn slot(&mut self, id: HandlerId) -> Result<&mut EventHandler, DispatchError> {
        self.handler_mut(id).ok_or(DispatchError::UnknownHandler(id))
    }

    pub fn listen(&mut self, target: HandlerId, listener: Listener) -> Result<(), DispatchError> {
        self.slot(target)?.listen(listener);
        Ok(())
    }

    /// Queues `action` in its target's clock; it first ticks next update
    pub fn start(&mut self, action: Action) -> Result<(), DispatchError> {
        let target = action.target();
        self.slot(target)?.clock.add_timer(action);
        Ok(())
    }

    pub fn remove_action(&mut self, target: HandlerId, name: &str) -> Result<(), DispatchError> {
        self.slot(target)?.clock.remove_timer(name);
        Ok(())
    }

    /// Convenience over [`dispatch`](Self::dispatch) for an owned event
    pub fn send(&mut self, target: HandlerId, mut event: Event) -> Result<Event, DispatchError> {
        self.dispatch(target, &mut event)?;
        Ok(event)
    }

    /// Runs `target`'s method and listeners for `event`, then everything they
    /// triggered. Pass listeners forward the same event, so `handlers_visited`
    /// accumulates across the whole delivery. A handler already visited by
    /// this event is skipped to keep pass cycles finite.
    pub fn dispatch(&mut self, target: HandlerId, event: &mut Event) -> Result<(), DispatchError> {
        let mut handler = self
            .slots
            .get_mut(target.0)
            .and_then(Option::take)
            .ok_or(DispatchError::UnknownHandler(target))?;

        event.visit(target);
        let mut context = Context {
            handler: target,
            tick: self.tick,
            model: &mut self.model,
            effects: Vec::new(),
        };
        if let Some(method) = handler.methods.get_mut(event.name()) {
            debug!("{} '{}' handles {}", target, handler.name, event);
            method(&mut context, event);
            handler.last_event = Some(event.clone());
        }
        let effects = context.effects;

        let mut responses = Vec::new();
        handler.listeners.retain(|listener| {
            if !listener.matches(event) {
                return true;
            }
            responses.push(listener.response().clone());
            !listener.temp()
        });
        self.slots[target.0] = Some(handler);

        for effect in effects {
            let result = match effect {
                Effect::Emit(to, mut emitted) => self.dispatch(to, &mut emitted),
                Effect::Start(action) => self.start(action),
                Effect::Listen(to, listener) => self.listen(to, listener),
            };
            if let Err(e) = result {
                warn!("Effect of {} on {} dropped: {}", event, target, e);
            }
        }

        for response in responses {
            let result = match response {
                Response::Pass(next) => {
                    if event.handlers_visited().contains(&next) {
                        warn!("{} already visited {}, not passing again", event, next);
                        continue;
                    }
                    self.dispatch(next, event)
                }
                Response::Respond(template) => {
                    let action = template.instantiate(Some(event.clone()));
                    debug!("{} responds to {} with '{}'", target, event, action.name());
                    self.start(action)
                }
            };
            if let Err(e) = result {
                warn!("Response of {} to {} dropped: {}", target, event, e);
            }
        }
        Ok(())
    }

    /// Ticks every handler's clock in registration order and delivers the
    /// events of the actions that ticked.
    pub fn update(&mut self, dt: f32) {
        let mut deliveries = Vec::new();
        let mut successors = Vec::new();
        for handler in self.slots.iter_mut().flatten() {
            handler.clock.tick_with(dt, |action, switched_off| {
                deliveries.push((action.target(), action.delivery()));
                if switched_off {
                    successors.extend(action.successor());
                }
            });
        }

        for (target, mut event) in deliveries {
            if let Err(e) = self.dispatch(target, &mut event) {
                warn!("Delivery of {} dropped: {}", event, e);
            }
        }
        for action in successors {
            if let Err(e) = self.start(action) {
                warn!("Chained action dropped: {}", e);
            }
        }

        // Work queued while delivering joins the clocks for the next tick
        for handler in self.slots.iter_mut().flatten() {
            handler.clock.settle();
        }
        self.tick += 1;
    }

    /// Pending and active actions of `target`, by name
    pub fn actions(&self, target: HandlerId) -> Vec<&str> {
        self.handler(target)
            .map(|h| {
                h.clock
                    .timers()
                    .iter()
                    .chain(h.clock.pending())
                    .map(|a| a.name())
                    .collect()
            })
            .unwrap_or_default()
    }
}
