//! Cancel-and-reschedule timer for debounced full-graph scans.

use parking_lot::Mutex;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::{runtime::Handle, task::JoinHandle, time::sleep};

/// Collapses bursts of [Debouncer::arm] calls into one run of the armed task, fired once the
/// delay has passed without another arm. Re-arming aborts the pending task rather than queueing
/// a second one. A task that has already woken up and started is left to finish.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    runtime: Option<Handle>,
    pending: Mutex<Option<JoinHandle<()>>>,
    warned: AtomicBool,
}

impl Debouncer {
    pub fn new(delay: Duration, runtime: Option<Handle>) -> Self {
        Debouncer {
            delay,
            runtime,
            pending: Mutex::new(None),
            warned: AtomicBool::new(false),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn can_schedule(&self) -> bool {
        self.runtime.is_some()
    }

    /// Schedule `task` to run after the delay, replacing any pending one. Returns false when
    /// there is no runtime to schedule on.
    pub fn arm<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            if !self.warned.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    "[Debouncer] no tokio runtime available, debounced scans are disabled"
                );
            }
            return false;
        };

        let delay = self.delay;
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            if !previous.is_finished() {
                tracing::debug!("[Debouncer] re-armed, aborting pending task");
            }
            previous.abort();
        }
        *pending = Some(runtime.spawn(async move {
            sleep(delay).await;
            tracing::debug!("[Debouncer] quiescence reached, firing");
            task();
        }));
        true
    }

    /// Abort the pending task, if any. Returns whether one was still waiting.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}
