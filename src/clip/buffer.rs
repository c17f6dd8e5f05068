//! Bounded frame ring with the clip trigger protocol.
//!
//! `ClipBuffer` holds the most recent frames in FIFO order, evicting the
//! oldest on overflow. Producers call [`ClipBuffer::push_frame`]; the export
//! worker blocks in [`ClipBuffer::wait_for_snapshot`] until a trigger
//! arrives. A trigger only results in a drain when the buffer is full, so
//! partial or empty clips are never produced; otherwise the worker goes back
//! to waiting.
//!
//! The drain is atomic: a concurrent push either fully precedes or fully
//! follows it, never lands in the middle. Everything under the lock is a
//! short queue/flag operation, so pushing never waits on encoding.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::frame::CameraFrame;

/// Default ring capacity, also the clip length in frames.
pub const DEFAULT_CLIP_CAPACITY: usize = 100;

struct BufferState {
    frames: VecDeque<CameraFrame>,
    export_requested: bool,
    shutdown: bool,
}

pub struct ClipBuffer {
    state: Mutex<BufferState>,
    wake: Condvar,
    capacity: usize,
}

impl ClipBuffer {
    /// `capacity` is the snapshot size; it must be at least 1.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity >= 1);
        Self {
            state: Mutex::new(BufferState {
                frames: VecDeque::with_capacity(capacity),
                export_requested: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
            capacity,
        }
    }

    /// Insert a frame, evicting and releasing the oldest one when full.
    /// Never blocks on the export worker.
    pub fn push_frame(&self, frame: CameraFrame) {
        let evicted = {
            let mut state = self.state.lock().unwrap();
            let evicted = if state.frames.len() >= self.capacity {
                state.frames.pop_front()
            } else {
                None
            };
            state.frames.push_back(frame);
            evicted
        };
        // The evicted frame is released here, outside the critical section.
        drop(evicted);
    }

    /// Wake the export worker. Whether a drain happens is decided by the
    /// worker against the capacity check; a trigger on a part-full buffer is
    /// a no-op. The request is latched, so a trigger that arrives before the
    /// worker starts waiting is not lost.
    pub fn trigger_export(&self) {
        let mut state = self.state.lock().unwrap();
        state.export_requested = true;
        self.wake.notify_all();
    }

    /// Block until a trigger finds the buffer full, then drain it as one
    /// FIFO snapshot. Returns `None` once [`ClipBuffer::shutdown`] is
    /// called.
    pub fn wait_for_snapshot(&self) -> Option<Vec<CameraFrame>> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.shutdown {
                return None;
            }
            if state.export_requested {
                state.export_requested = false;
                if state.frames.len() >= self.capacity {
                    return Some(state.frames.drain(..).collect());
                }
                // Triggered below capacity: skip and keep waiting.
            }
            state = self.wake.wait(state).unwrap();
        }
    }

    /// Non-blocking drain-if-full. Same capacity rule as the waiting path.
    pub fn try_export_snapshot(&self) -> Option<Vec<CameraFrame>> {
        let mut state = self.state.lock().unwrap();
        if state.frames.len() >= self.capacity {
            Some(state.frames.drain(..).collect())
        } else {
            None
        }
    }

    /// Wake the worker and make the wait return `None`. Frames still in the
    /// buffer stay owned by it and are released when the buffer drops.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutdown = true;
        self.wake.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
