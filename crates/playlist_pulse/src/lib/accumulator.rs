//! # Weekly Accumulator
//!
//! The one piece of shared mutable state in the system: the window of video
//! references collected since the last scheduled flush. The listener appends,
//! the scheduler drains.

use std::sync::Mutex;

use crate::types::VideoRef;

#[derive(Debug, Default)]
pub struct Accumulator {
    window: Mutex<Vec<VideoRef>>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reference in arrival order.
    pub fn add(&self, video_ref: VideoRef) {
        self.window.lock().unwrap().push(video_ref);
    }

    /// Atomically empties the window and returns its prior contents. A
    /// reference added concurrently lands either in the returned batch or in
    /// the next window, never in both.
    pub fn flush(&self) -> Vec<VideoRef> {
        std::mem::take(&mut *self.window.lock().unwrap())
    }

    /// Puts a batch that could not be published back at the front of the
    /// window, ahead of anything accumulated since, so first-seen order
    /// survives a retried flush.
    pub fn restore(&self, mut refs: Vec<VideoRef>) {
        let mut window = self.window.lock().unwrap();
        refs.append(&mut window);
        *window = refs;
    }

    pub fn len(&self) -> usize {
        self.window.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
