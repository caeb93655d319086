//! Event subsystem: named occurrences, timers and the handler bus
//!
//! 1. [`event`] - events, payload values and dotted-key lookup
//! 2. [`meter`] / [`timer`] / [`clock`] - countdowns ticked once per frame
//! 3. [`action`] - events carried across ticks by a timer, with chaining
//! 4. [`listener`] - trigger name to pass/respond mapping with conditions
//! 5. [`handler`] - per-entity method tables, listeners and action clocks
//!
//! # Architecture
//!
//! ```text
//! Event ──► EventBus::dispatch ──► method ──► listeners ──┬─► Pass: dispatch(other)
//!                                                          └─► Respond: Clock<Action>
//! EventBus::update ──► Clock<Action>::tick ──► deliveries ──► dispatch
//! ```

pub mod action;
pub mod clock;
pub mod event;
pub mod handler;
pub mod listener;
pub mod meter;
pub mod timer;

pub use action::{chain_actions, loop_actions, Action, ActionTemplate};
pub use clock::{Clock, Countable};
pub use event::{Event, EventPayloadError, TimerProgress, Value, RESERVED_KEYS};
pub use handler::{Context, DispatchError, EventBus, EventHandler, HandlerId, Method};
pub use listener::{Condition, ConditionsMode, Listener, Response};
pub use meter::{Meter, StateMeter};
pub use timer::{Timer, TimerCallback, TimerSpecError, TimerUnit};
