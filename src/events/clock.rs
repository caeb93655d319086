//! Clock: an ordered group of timers ticked together
//!
//! ```text
//! add_timer ──► pending_add ──(end of tick)──► active ──► tick ──► off?
//!                                                 ▲               │
//!                                   refill ◄──────┴── looping ◄───┤
//!                                                                 └──► temp: purged
//! ```
//!
//! A timer added at any point of tick `n` is promoted when tick `n` settles,
//! so it counts down for the first time on tick `n + 1`.

use std::collections::HashSet;
use std::mem;
use tracing::debug;

use super::timer::Timer;

/// Anything a [`Clock`] can count down
pub trait Countable {
    fn timer(&self) -> &Timer;
    fn timer_mut(&mut self) -> &mut Timer;

    fn name(&self) -> &str {
        self.timer().name()
    }
}

impl Countable for Timer {
    fn timer(&self) -> &Timer {
        self
    }

    fn timer_mut(&mut self) -> &mut Timer {
        self
    }
}

pub struct Clock<T: Countable = Timer> {
    name: String,
    active: Vec<T>,
    pending_add: Vec<T>,
    pending_remove: HashSet<String>,
    ticks: u64,
}

impl<T: Countable> Clock<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: Vec::new(),
            pending_add: Vec::new(),
            pending_remove: HashSet::new(),
            ticks: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Queues a timer; it joins the active set when the current tick settles
    pub fn add_timer(&mut self, timer: T) {
        debug!("Clock '{}' queued timer '{}'", self.name, timer.name());
        self.pending_add.push(timer);
    }

    /// Cancels every timer with this name, active or queued
    pub fn remove_timer(&mut self, name: &str) {
        self.pending_remove.insert(name.to_string());
    }

    pub fn timers(&self) -> &[T] {
        &self.active
    }

    pub fn pending(&self) -> &[T] {
        &self.pending_add
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.active
            .iter()
            .chain(&self.pending_add)
            .find(|t| t.name() == name && !self.pending_remove.contains(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.pending_add.is_empty()
    }

    pub fn tick(&mut self, dt: f32) {
        self.tick_with(dt, |_, _| {});
    }

    /// Ticks every active timer in insertion order, handing each to `visit`
    /// together with whether this tick switched it off, then settles.
    pub fn tick_with(&mut self, dt: f32, mut visit: impl FnMut(&mut T, bool)) {
        self.ticks += 1;
        for timer in &mut self.active {
            if self.pending_remove.contains(timer.name()) {
                continue;
            }
            let switched_off = timer.timer_mut().tick(dt);
            visit(timer, switched_off);
        }

        self.active.retain_mut(|timer| {
            let t = timer.timer_mut();
            if t.is_off() {
                if t.temp() {
                    return false;
                }
                t.refill();
            }
            true
        });
        self.settle();
    }

    /// Applies removals and promotes queued timers
    pub fn settle(&mut self) {
        let removed = mem::take(&mut self.pending_remove);
        if !removed.is_empty() {
            self.active.retain(|t| !removed.contains(t.name()));
            self.pending_add.retain(|t| !removed.contains(t.name()));
        }
        let promoted = mem::take(&mut self.pending_add);
        self.active.extend(promoted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn test_added_timer_waits_one_tick() {
        let offs = Rc::new(Cell::new(0));
        let o = offs.clone();
        let mut clock = Clock::new("world");

        // Tick n
        clock.add_timer(
            Timer::frames("t", 2)
                .unwrap()
                .on_switch_off(move |_| o.set(o.get() + 1)),
        );
        clock.tick(1.0);
        assert_eq!(clock.get("t").unwrap().value(), 2.0);

        clock.tick(1.0);
        assert_eq!(clock.get("t").unwrap().value(), 1.0);

        clock.tick(1.0);
        assert_eq!(offs.get(), 1);
        assert!(!clock.contains("t"));
    }

    #[test]
    fn test_visits_in_insertion_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut clock = Clock::new("c");
        for name in ["a", "b", "c"] {
            let s = seen.clone();
            clock.add_timer(
                Timer::frames(name, 5)
                    .unwrap()
                    .on_tick(move |t| s.borrow_mut().push(t.name().to_string())),
            );
        }
        clock.tick(0.0);
        clock.tick(0.0);
        assert_eq!(*seen.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_looping_timer_is_refilled() {
        let mut clock = Clock::new("c");
        clock.add_timer(Timer::frames("loop", 2).unwrap().looping());
        clock.tick(0.0);
        let mut offs = 0;
        for _ in 0..6 {
            clock.tick_with(0.0, |_, off| offs += off as i32);
        }
        assert_eq!(offs, 3);
        assert!(clock.contains("loop"));
    }

    #[test]
    fn test_remove_matches_active_and_pending() {
        let mut clock = Clock::new("c");
        clock.add_timer(Timer::frames("x", 5).unwrap());
        clock.tick(0.0);
        clock.add_timer(Timer::frames("x", 5).unwrap());
        clock.remove_timer("x");
        assert!(!clock.contains("x"));

        let mut visited = 0;
        clock.tick_with(0.0, |_, _| visited += 1);
        assert_eq!(visited, 0);
        assert!(clock.is_empty());
    }

    #[test]
    fn test_second_timer_consumes_dt() {
        let mut clock = Clock::new("c");
        clock.add_timer(Timer::seconds("s", 1.0).unwrap());
        clock.tick(0.5);
        let mut off = false;
        clock.tick_with(0.6, |_, switched| off |= switched);
        assert!(!off);
        clock.tick_with(0.6, |_, switched| off |= switched);
        assert!(off);
    }
}
