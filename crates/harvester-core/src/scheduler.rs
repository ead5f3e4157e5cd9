//! Change scheduler: at most one extraction pass per frame.
//!
//! Any number of `request` calls before the next frame collapse into a single
//! run that carries the last reason. A request made from inside a run lands
//! on the following frame, requested once the run returns.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::error::{HarvestError, HarvestResult};

/// Deferred single-shot callback.
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// Host primitive that runs a callback once, at the next frame boundary.
pub trait FrameHost: Send + Sync {
    fn request_frame(&self, callback: FrameCallback);
}

/// Frame host stepped explicitly by the caller.
#[derive(Default)]
pub struct ManualFrames {
    queue: Mutex<VecDeque<FrameCallback>>,
    frames: AtomicU64,
}

impl ManualFrames {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run one frame: every callback queued before this call, in order.
    ///
    /// Callbacks queued while the frame runs wait for the next frame.
    /// Returns the number of callbacks run.
    pub fn run_frame(&self) -> usize {
        let due: Vec<FrameCallback> = self.queue.lock().drain(..).collect();
        self.frames.fetch_add(1, Ordering::Relaxed);
        let count = due.len();
        for callback in due {
            callback();
        }
        count
    }

    /// Run frames until nothing is queued, at most `max_frames` of them.
    /// Returns the number of frames that ran callbacks.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut ran = 0;
        while ran < max_frames && self.queued() > 0 {
            self.run_frame();
            ran += 1;
        }
        ran
    }

    /// Callbacks waiting for the next frame.
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn frames_run(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl FrameHost for ManualFrames {
    fn request_frame(&self, callback: FrameCallback) {
        self.queue.lock().push_back(callback);
    }
}

/// Frame host that fires after a fixed interval on a tokio runtime.
pub struct TokioFrames {
    handle: Handle,
    interval: Duration,
}

impl TokioFrames {
    pub fn new(handle: Handle, interval: Duration) -> Self {
        Self { handle, interval }
    }

    /// Use the runtime of the calling context.
    pub fn current(interval: Duration) -> HarvestResult<Self> {
        let handle = Handle::try_current().map_err(|e| HarvestError::NoRuntime(e.to_string()))?;
        Ok(Self::new(handle, interval))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FrameHost for TokioFrames {
    fn request_frame(&self, callback: FrameCallback) {
        let interval = self.interval;
        self.handle.spawn(async move {
            tokio::time::sleep(interval).await;
            callback();
        });
    }
}

/// Run invoked once per frame with the last requested reason.
pub type FrameRun = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct SchedulerState {
    /// A run is owed: either a frame is requested or one will be once the
    /// current run returns.
    scheduled: bool,
    /// A run is in progress.
    running: bool,
    closed: bool,
    reason: Option<String>,
}

/// Coalesces extraction requests into frame-sized runs.
///
/// Runs never overlap. A request made while a run is in progress is held
/// until that run returns and then goes to the next frame, even on hosts
/// that fire callbacks from several threads.
pub struct ChangeScheduler {
    host: Arc<dyn FrameHost>,
    run: FrameRun,
    state: Mutex<SchedulerState>,
    me: Weak<ChangeScheduler>,
}

impl ChangeScheduler {
    pub fn new(host: Arc<dyn FrameHost>, run: FrameRun) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            host,
            run,
            state: Mutex::new(SchedulerState::default()),
            me: me.clone(),
        })
    }

    /// Ask for a run on the next frame.
    ///
    /// Returns `true` if this call scheduled a run, `false` if it was
    /// absorbed into one already scheduled (or the scheduler is closed).
    pub fn request(&self, reason: &str) -> bool {
        let request_now = {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.reason = Some(reason.to_string());
            if state.scheduled {
                trace!(reason, "Request coalesced");
                return false;
            }
            state.scheduled = true;
            !state.running
        };

        if request_now {
            debug!(reason, "Frame scheduled");
            self.request_frame();
        } else {
            debug!(reason, "Frame deferred until the current run returns");
        }
        true
    }

    fn request_frame(&self) {
        let me = self.me.clone();
        self.host.request_frame(Box::new(move || {
            if let Some(scheduler) = me.upgrade() {
                scheduler.fire();
            }
        }));
    }

    fn fire(&self) {
        let reason = {
            let mut state = self.state.lock();
            if state.closed || state.running || !state.scheduled {
                return;
            }
            state.scheduled = false;
            state.running = true;
            state.reason.take().unwrap_or_default()
        };

        let _guard = RunGuard { scheduler: self };
        (self.run)(&reason);
    }

    /// Called when a run returns or unwinds.
    fn finish_run(&self) {
        let request_now = {
            let mut state = self.state.lock();
            state.running = false;
            state.scheduled && !state.closed
        };
        if request_now {
            self.request_frame();
        }
    }

    /// Whether a run is waiting for its frame.
    pub fn pending(&self) -> bool {
        self.state.lock().scheduled
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Stop scheduling. A frame already requested becomes a no-op.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.scheduled = false;
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

struct RunGuard<'a> {
    scheduler: &'a ChangeScheduler,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.finish_run();
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
