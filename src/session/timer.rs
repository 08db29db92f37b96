//! Rotation and watchdog timers
//!
//! Timers never touch session state. Each one runs as a tokio task that posts
//! a tagged event into the session queue. Arming bumps the generation and
//! aborts the previous task, so only the latest armed instance is honored.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use super::events::Event;

#[derive(Debug, Default)]
struct TimerSlot {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl TimerSlot {
    fn arm<F>(&mut self, spawn: F)
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        self.disarm();
        self.generation += 1;
        self.task = Some(spawn(self.generation));
    }

    fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_armed() && self.generation == generation
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Recurring timer forcing chunk boundaries
#[derive(Debug)]
pub(crate) struct RotationTimer {
    period: Duration,
    slot: TimerSlot,
}

impl RotationTimer {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            slot: TimerSlot::default(),
        }
    }

    /// Start a fresh full period
    pub(crate) fn arm(&mut self, queue: &mpsc::WeakSender<Event>) {
        let queue = queue.clone();
        let period = self.period;

        self.slot.arm(|generation| {
            tokio::spawn(async move {
                let mut ticker = time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    ticker.tick().await;
                    // Only callers keep the session alive
                    let Some(tx) = queue.upgrade() else {
                        break;
                    };
                    if tx.send(Event::RotationTick { generation }).await.is_err() {
                        break;
                    }
                }
            })
        });

        debug!("Rotation timer armed ({:?})", period);
    }

    pub(crate) fn disarm(&mut self) {
        if self.slot.is_armed() {
            debug!("Rotation timer disarmed");
        }
        self.slot.disarm();
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.slot.is_current(generation)
    }
}

/// Single-shot grace timer confirming a stalled capture
#[derive(Debug)]
pub(crate) struct WatchdogTimer {
    grace: Duration,
    slot: TimerSlot,
}

impl WatchdogTimer {
    pub(crate) fn new(grace: Duration) -> Self {
        Self {
            grace,
            slot: TimerSlot::default(),
        }
    }

    pub(crate) fn grace(&self) -> Duration {
        self.grace
    }

    pub(crate) fn arm(&mut self, queue: &mpsc::WeakSender<Event>) {
        let queue = queue.clone();
        let grace = self.grace;

        self.slot.arm(|generation| {
            tokio::spawn(async move {
                time::sleep(grace).await;
                if let Some(tx) = queue.upgrade() {
                    let _ = tx.send(Event::WatchdogFired { generation }).await;
                }
            })
        });
    }

    pub(crate) fn disarm(&mut self) {
        self.slot.disarm();
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.slot.is_armed()
    }

    /// Consume a firing: true if `generation` is the live instance
    pub(crate) fn fire(&mut self, generation: u64) -> bool {
        if !self.slot.is_current(generation) {
            return false;
        }
        self.slot.task = None;
        true
    }
}
