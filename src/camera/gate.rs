//! Hand-off point between the camera callback thread and the grabbing thread.
//!
//! A single mutex guards the capture state, the waiting flag and the "next"
//! frame slot. The producer never waits on the consumer: every delivery
//! overwrites the "next" slot, so a grab always sees the freshest frame and
//! frames nobody grabbed in between are dropped. The only place that blocks
//! is [`Gate::wait_for_frame`].

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use super::buffers::{prepare_slot, FrameSlot};
use super::types::{CaptureState, CaptureStats, GrabOutcome, Resolution};

#[derive(Debug, Default)]
struct GateState {
    state: CaptureState,
    /// A consumer is blocked in `wait_for_frame`
    waiting: bool,
    auto_grab: bool,
    /// Width/height changed since the last grab
    params_changed: bool,
    /// Set once on teardown; nothing is accepted afterwards
    closed: bool,
    next: FrameSlot,
    stats: CaptureStats,
}

impl GateState {
    /// Copy an already validated buffer into "next" and mark it unclaimed.
    fn store(&mut self, data: &[u8], resolution: Resolution) {
        if !self.waiting && !self.auto_grab {
            log::trace!("Refreshing next frame with no consumer waiting");
        }
        if self.state == CaptureState::NewFrameUnclaimed {
            self.stats.frames_overwritten += 1;
        }

        prepare_slot(&mut self.next, resolution, data.len()).fill_from(data);
        self.state = CaptureState::NewFrameUnclaimed;
        self.waiting = false;
    }
}

/// Mutex + condition variable coordinating `deliver` and `wait_for_frame`.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    state: Mutex<GateState>,
    frame_ready: Condvar,
}

impl Gate {
    pub fn new(auto_grab: bool) -> Self {
        Self {
            state: Mutex::new(GateState {
                auto_grab,
                ..GateState::default()
            }),
            frame_ready: Condvar::new(),
        }
    }

    /// A poisoned lock means a thread panicked mid-update; treat the
    /// capture as torn down instead of propagating the panic.
    fn lock(&self) -> Option<MutexGuard<'_, GateState>> {
        match self.state.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                log::error!("Frame gate lock is poisoned, capture is probably being destroyed");
                None
            }
        }
    }

    /// Copy a buffer from the camera callback into the "next" slot.
    ///
    /// `frame_size` is queried under the lock, so a size change applied by
    /// a concurrent grab is always seen. Returns false if the gate is closed,
    /// the reported size does not fit in memory or the buffer size does not
    /// match; state and buffers are then untouched.
    pub fn deliver<F>(&self, data: &[u8], frame_size: F) -> bool
    where
        F: FnOnce() -> Resolution,
    {
        let Some(mut guard) = self.lock() else {
            return false;
        };
        let gate = &mut *guard;
        if gate.closed {
            return false;
        }
        gate.stats.frames_received += 1;

        let resolution = frame_size();
        let Some(expected) = resolution.yuv420_len() else {
            gate.stats.frames_rejected += 1;
            log::error!(
                "Frame size {} does not fit in memory, dropping buffer of {} bytes",
                resolution,
                data.len()
            );
            return false;
        };
        if data.len() != expected {
            gate.stats.frames_rejected += 1;
            log::error!(
                "Error reading YUV buffer: width={}, height={}, size={}, received size={}",
                resolution.width,
                resolution.height,
                expected,
                data.len()
            );
            return false;
        }

        gate.store(data, resolution);
        self.frame_ready.notify_all();
        true
    }

    /// Claim the newest delivered frame, swapping it into `current`.
    ///
    /// Pending property changes are applied first through
    /// `apply_properties` and any frame already delivered is discarded.
    /// Blocks until a frame arrives, the gate closes, or `timeout` expires.
    pub fn wait_for_frame<F>(
        &self,
        current: &mut FrameSlot,
        timeout: Option<Duration>,
        apply_properties: F,
    ) -> GrabOutcome
    where
        F: FnOnce(),
    {
        let Some(mut guard) = self.lock() else {
            return GrabOutcome::Closed;
        };
        if guard.closed {
            return GrabOutcome::Closed;
        }

        if guard.params_changed {
            apply_properties();
            guard.params_changed = false;
            guard.state = CaptureState::NoFrame;
        }

        let mut timed_out = false;
        if guard.state != CaptureState::NewFrameUnclaimed {
            guard.waiting = true;
            let pending =
                |gate: &mut GateState| gate.state != CaptureState::NewFrameUnclaimed && !gate.closed;

            let woken = match timeout {
                None => self.frame_ready.wait_while(guard, pending).map_err(|_| ()),
                Some(limit) => self
                    .frame_ready
                    .wait_timeout_while(guard, limit, pending)
                    .map(|(guard, result)| {
                        timed_out = result.timed_out();
                        guard
                    })
                    .map_err(|_| ()),
            };
            guard = match woken {
                Ok(guard) => guard,
                Err(()) => {
                    log::error!("Frame gate wait failed, capture is probably being destroyed");
                    return GrabOutcome::Closed;
                }
            };
            guard.waiting = false;
        }

        if guard.closed {
            return GrabOutcome::Closed;
        }
        if guard.state != CaptureState::NewFrameUnclaimed {
            log::debug!("No new frame (timed out: {})", timed_out);
            return GrabOutcome::TimedOut;
        }

        let gate = &mut *guard;
        std::mem::swap(current, &mut gate.next);
        // keep a buffer of the grabbed size ready so delivery reuses it
        if let Some(frame) = current.as_ref() {
            prepare_slot(&mut gate.next, frame.resolution(), frame.data().len());
        }
        gate.state = CaptureState::FrameGrabbed;
        gate.stats.frames_grabbed += 1;
        GrabOutcome::Grabbed
    }

    /// Ask the next grab to apply new camera parameters and drop stale frames.
    pub fn mark_properties_changed(&self) {
        if let Some(mut guard) = self.lock() {
            guard.params_changed = true;
        }
    }

    pub fn set_auto_grab(&self, enabled: bool) {
        if let Some(mut guard) = self.lock() {
            guard.auto_grab = enabled;
        }
    }

    /// Release the "next" buffer, reset the state and wake every waiter.
    ///
    /// Recovers a poisoned lock: teardown has to complete regardless.
    pub fn close(&self) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        guard.next = None;
        guard.state = CaptureState::NoFrame;
        guard.waiting = false;
        guard.closed = true;
        self.frame_ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().map_or(true, |guard| guard.closed)
    }

    pub fn state(&self) -> CaptureState {
        self.lock()
            .map_or(CaptureState::NoFrame, |guard| guard.state)
    }

    pub fn is_waiting(&self) -> bool {
        self.lock().is_some_and(|guard| guard.waiting)
    }

    pub fn auto_grab(&self) -> bool {
        self.lock().is_some_and(|guard| guard.auto_grab)
    }

    pub fn stats(&self) -> CaptureStats {
        self.lock().map(|guard| guard.stats).unwrap_or_default()
    }
}
