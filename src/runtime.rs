//! Per-tick orchestration
//!
//! ```text
//! tick(dt):
//!   1. InputSource::poll                         one snapshot for everyone
//!   2. Controller::advance_frame  (all)          frames complete first
//!   3. Controller::update_commands (all)         fired command names
//!   4. dispatch command events                   subscribers, in order
//!   5. Collaborator::update                      UI / world / renderer stand-ins
//!   6. EventBus::update                          clocks, actions, deliveries
//! ```

use tracing::{debug, info, warn};

use crate::controller::Controller;
use crate::events::{Event, EventBus, HandlerId};
use crate::mapping::InputSource;

/// Anything outside the core that wants a slice of every tick
pub trait Collaborator {
    fn name(&self) -> &str;

    fn update(&mut self, dt: f32, bus: &mut EventBus);
}

/// A command that fired on a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredCommand {
    pub controller: String,
    pub command: String,
}

pub struct Runtime {
    source: Box<dyn InputSource>,
    controllers: Vec<Controller>,
    bus: EventBus,
    subscribers: Vec<HandlerId>,
    collaborators: Vec<Box<dyn Collaborator>>,
    fired_total: u64,
}

impl Runtime {
    pub fn new(source: Box<dyn InputSource>) -> Self {
        Self::with_bus(source, EventBus::new())
    }

    pub fn with_bus(source: Box<dyn InputSource>, bus: EventBus) -> Self {
        info!(
            "Runtime over {} joystick(s)",
            source.joysticks().len()
        );
        Self {
            source,
            controllers: Vec::new(),
            bus,
            subscribers: Vec::new(),
            collaborators: Vec::new(),
            fired_total: 0,
        }
    }

    pub fn add_controller(&mut self, controller: Controller) {
        info!("Runtime drives controller '{}'", controller.name());
        self.controllers.push(controller);
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn controller(&self, name: &str) -> Option<&Controller> {
        self.controllers.iter().find(|c| c.name() == name)
    }

    pub fn controller_mut(&mut self, name: &str) -> Option<&mut Controller> {
        self.controllers.iter_mut().find(|c| c.name() == name)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn source_mut(&mut self) -> &mut dyn InputSource {
        self.source.as_mut()
    }

    /// Command events go to every subscriber, in subscription order
    pub fn subscribe(&mut self, handler: HandlerId) {
        if !self.subscribers.contains(&handler) {
            self.subscribers.push(handler);
        }
    }

    pub fn add_collaborator(&mut self, collaborator: Box<dyn Collaborator>) {
        debug!("Runtime collaborator '{}'", collaborator.name());
        self.collaborators.push(collaborator);
    }

    /// Index of the tick the next call to [`tick`](Self::tick) runs
    pub fn ticks(&self) -> u64 {
        self.bus.tick()
    }

    pub fn fired_total(&self) -> u64 {
        self.fired_total
    }

    pub fn tick(&mut self, dt: f32) -> Vec<FiredCommand> {
        let tick = self.bus.tick();
        let snapshot = self.source.poll();

        for controller in &mut self.controllers {
            controller.advance_frame(&snapshot);
        }

        let mut fired = Vec::new();
        for controller in &mut self.controllers {
            controller.update_commands();
            for command in controller.fired() {
                fired.push(FiredCommand {
                    controller: controller.name().to_string(),
                    command: command.clone(),
                });
            }
        }
        self.fired_total += fired.len() as u64;

        for f in &fired {
            for &handler in &self.subscribers {
                let event = Event::new(f.command.as_str())
                    .with("controller", f.controller.as_str())
                    .and_then(|e| e.with("tick", tick));
                let result = match event {
                    Ok(event) => self.bus.send(handler, event).map(drop),
                    Err(e) => {
                        warn!("Command event for '{}' not built: {}", f.command, e);
                        continue;
                    }
                };
                if let Err(e) = result {
                    warn!("Command '{}' not delivered: {}", f.command, e);
                }
            }
        }

        for collaborator in &mut self.collaborators {
            collaborator.update(dt, &mut self.bus);
        }
        self.bus.update(dt);
        fired
    }
}
