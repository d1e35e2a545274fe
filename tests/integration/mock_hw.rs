//! Mock hardware for integration tests.
//!
//! [`MockOutput`] records every line operation stamped with the virtual
//! time of a shared [`VirtualClock`]; [`ManualExecutor`] only fires its
//! deferred callbacks when the test advances that clock.  Together they make
//! dose timing fully deterministic on the host.

use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use growvalve::app::ports::{DeferredExecutor, DeferredFn, DigitalOutput, Level, LineId};

// ── Virtual clock ─────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct VirtualClock {
    micros: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }

    fn set(&self, t: Duration) {
        self.micros.store(t.as_micros() as u64, Ordering::SeqCst);
    }
}

// ── Output call record ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutCall {
    Configure(LineId, Level),
    Write(Level),
    Release(LineId),
}

// ── MockOutput ────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockOutput {
    clock: VirtualClock,
    pub calls: Arc<Mutex<Vec<(Duration, OutCall)>>>,
}

#[allow(dead_code)]
impl MockOutput {
    pub fn new(clock: &VirtualClock) -> Self {
        Self {
            clock: clock.clone(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn history(&self) -> Vec<(Duration, OutCall)> {
        self.calls.lock().unwrap().clone()
    }

    /// Last level driven onto the line.
    pub fn level(&self) -> Level {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|(_, c)| match c {
                OutCall::Configure(_, l) | OutCall::Write(l) => Some(*l),
                OutCall::Release(_) => None,
            })
            .unwrap_or(Level::Low)
    }

    pub fn releases(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| matches!(c, OutCall::Release(_)))
            .count()
    }

    /// Virtual timestamps of every LOW write.
    pub fn low_writes(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| *c == OutCall::Write(Level::Low))
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl DigitalOutput for MockOutput {
    fn configure(&mut self, line: LineId, initial: Level) -> growvalve::Result<()> {
        self.record(OutCall::Configure(line, initial));
        Ok(())
    }

    fn write(&mut self, level: Level) {
        self.record(OutCall::Write(level));
    }

    fn release(&mut self, line: LineId) {
        self.record(OutCall::Release(line));
    }
}

impl MockOutput {
    fn record(&self, call: OutCall) {
        self.calls.lock().unwrap().push((self.clock.now(), call));
    }
}

// ── ManualExecutor ────────────────────────────────────────────

struct ManualTimer {
    due: Duration,
    callback: Option<DeferredFn>,
}

#[derive(Clone)]
pub struct ManualExecutor {
    clock: VirtualClock,
    timers: Rc<RefCell<Vec<ManualTimer>>>,
}

#[allow(dead_code)]
impl ManualExecutor {
    pub fn new(clock: &VirtualClock) -> Self {
        Self {
            clock: clock.clone(),
            timers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Move virtual time forward, firing every timer that comes due in
    /// deadline order.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.now() + by;
        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let idx = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.callback.is_some() && t.due <= target)
                    .min_by_key(|(_, t)| t.due)
                    .map(|(i, _)| i);
                idx.map(|i| (timers[i].due, timers[i].callback.take()))
            };
            match next {
                Some((due, Some(callback))) => {
                    self.clock.set(due);
                    callback();
                }
                _ => break,
            }
        }
        self.clock.set(target);
    }

    pub fn scheduled(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn pending(&self) -> usize {
        self.timers
            .borrow()
            .iter()
            .filter(|t| t.callback.is_some())
            .count()
    }
}

impl DeferredExecutor for ManualExecutor {
    type Handle = usize;

    fn schedule(&self, delay: Duration, callback: DeferredFn) -> usize {
        let mut timers = self.timers.borrow_mut();
        timers.push(ManualTimer {
            due: self.clock.now() + delay,
            callback: Some(callback),
        });
        timers.len() - 1
    }

    fn cancel(&self, handle: &usize) {
        if let Some(t) = self.timers.borrow_mut().get_mut(*handle) {
            t.callback = None;
        }
    }

    fn is_pending(&self, handle: &usize) -> bool {
        self.timers
            .borrow()
            .get(*handle)
            .is_some_and(|t| t.callback.is_some())
    }
}
