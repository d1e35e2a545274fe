//! Thread-backed one-shot timers for the deferred valve close.
//!
//! Each [`ThreadExecutor::schedule`] call spawns a short-lived timer task
//! (pinned to the APP core on ESP-IDF) that sleeps on a condition variable
//! until its deadline or until it is cancelled.
//!
//! ```text
//!   Armed ──deadline──▶ Firing ──callback returns──▶ Fired
//!     │
//!     └──cancel()──▶ Cancelled
//! ```
//!
//! ## Cancellation race
//!
//! The timer commits to firing under the phase lock, then runs the callback
//! with the lock released.  A `cancel` that arrives after that commit is a
//! no-op and the callback still runs once.  Nothing reports this to the
//! caller.

use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error};
use parking_lot::{Condvar, Mutex};

use crate::app::ports::{DeferredExecutor, DeferredFn};
use crate::drivers::task_pin::{self, Core};

const TIMER_TASK_NAME: &str = "valve-timer\0";
const TIMER_PRIORITY: u8 = 5;
const TIMER_STACK_KB: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Armed,
    Firing,
    Fired,
    Cancelled,
}

struct TimerSlot {
    phase: Mutex<TimerPhase>,
    wake: Condvar,
    callback: Mutex<Option<DeferredFn>>,
}

/// Handle to one scheduled callback.
#[derive(Clone)]
pub struct TimerHandle {
    id: u64,
    slot: Arc<TimerSlot>,
}

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> TimerPhase {
        *self.slot.phase.lock()
    }
}

impl core::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .finish()
    }
}

/// [`DeferredExecutor`] that runs each callback on its own timer thread.
pub struct ThreadExecutor {
    next_id: AtomicU64,
    core: Core,
    priority: u8,
    stack_kb: usize,
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadExecutor {
    pub fn new() -> Self {
        Self::with_task_params(Core::App, TIMER_PRIORITY, TIMER_STACK_KB)
    }

    pub fn with_task_params(core: Core, priority: u8, stack_kb: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            core,
            priority,
            stack_kb,
        }
    }
}

impl DeferredExecutor for ThreadExecutor {
    type Handle = TimerHandle;

    fn schedule(&self, delay: Duration, callback: DeferredFn) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(TimerSlot {
            phase: Mutex::new(TimerPhase::Armed),
            wake: Condvar::new(),
            callback: Mutex::new(Some(callback)),
        });
        // A delay past the end of the clock's range never comes due; the
        // timer then waits for cancellation only.
        let deadline = Instant::now().checked_add(delay);

        let worker = Arc::clone(&slot);
        let spawned = task_pin::spawn_on_core(
            self.core,
            self.priority,
            self.stack_kb,
            TIMER_TASK_NAME,
            move || run_timer(id, &worker, deadline),
        );

        if let Err(e) = spawned {
            // Without a timer task nothing would ever close the valve, so
            // the callback runs now instead.
            error!("timer {}: spawn failed ({}), firing immediately", id, e);
            fire(&slot);
        } else {
            debug!("timer {}: armed for {:?}", id, delay);
        }

        TimerHandle { id, slot }
    }

    fn cancel(&self, handle: &TimerHandle) {
        let mut phase = handle.slot.phase.lock();
        if *phase == TimerPhase::Armed {
            *phase = TimerPhase::Cancelled;
            handle.slot.callback.lock().take();
            handle.slot.wake.notify_all();
            debug!("timer {}: cancelled", handle.id);
        }
    }

    fn is_pending(&self, handle: &TimerHandle) -> bool {
        matches!(handle.phase(), TimerPhase::Armed | TimerPhase::Firing)
    }
}

fn run_timer(id: u64, slot: &TimerSlot, deadline: Option<Instant>) {
    let mut phase = slot.phase.lock();
    while *phase == TimerPhase::Armed {
        match deadline {
            Some(deadline) => {
                if slot.wake.wait_until(&mut phase, deadline).timed_out() {
                    break;
                }
            }
            None => slot.wake.wait(&mut phase),
        }
    }
    if *phase != TimerPhase::Armed {
        return;
    }
    drop(phase);

    debug!("timer {}: firing", id);
    fire(slot);
}

fn fire(slot: &TimerSlot) {
    {
        let mut phase = slot.phase.lock();
        if *phase != TimerPhase::Armed {
            return;
        }
        *phase = TimerPhase::Firing;
    }
    let callback = slot.callback.lock().take();
    if let Some(callback) = callback {
        callback();
    }
    *slot.phase.lock() = TimerPhase::Fired;
}
