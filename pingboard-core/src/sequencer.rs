//! Self-drive sequencer: time-division multiplexing of the drive lines.
//!
//! The sequencer is shared between the drive timer interrupt and the power
//! supply interrupt, so its state lives in single-word atomics and every
//! method takes `&self`. Only plain loads and stores are used, which AVR
//! supports without compare-and-swap. The index has one writer at a time:
//! the timer tick while running, `start` while the timer is stopped.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::hal::DriveLines;
use crate::GROUPS;

pub struct SelfDriveSequencer {
    index: AtomicU8,
    running: AtomicBool,
}

impl SelfDriveSequencer {
    pub const fn new() -> Self {
        Self {
            index: AtomicU8::new(0),
            running: AtomicBool::new(false),
        }
    }

    /// (Re)start from drive line 0 so scanning resynchronizes from a known phase.
    pub fn start(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.index.store(0, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        log::debug!("self-drive started");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        log::debug!("self-drive stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Index of the drive line the next tick will energize.
    pub fn current(&self) -> usize {
        usize::from(self.index.load(Ordering::SeqCst))
    }

    /// Timer handler: energize the current line and advance modulo 9.
    /// Ticks that arrive while stopped are ignored.
    pub fn tick<D: DriveLines>(&self, lines: &mut D) {
        if !self.is_running() {
            return;
        }
        let index = self.index.load(Ordering::SeqCst);
        lines.energize(usize::from(index));
        self.index.store((index + 1) % GROUPS as u8, Ordering::SeqCst);
    }
}

impl Default for SelfDriveSequencer {
    fn default() -> Self {
        Self::new()
    }
}
