//! Works out which drive group is currently being sensed.
//!
//! The self-drive sequencer energizes drive lines on its own clock, so the
//! main loop has to infer the active group from the nine sense lines. Each
//! sense line is debounced on a stable-interval basis: a new raw level is
//! trusted only after it has held for the configured settle time.

use crate::config::{ScanConfig, ScanPolicy};
use crate::hal::{Level, Micros, SenseLines};
use crate::GROUPS;

#[derive(Copy, Clone)]
struct SenseLine {
    /// Debounced level.
    stable: Level,
    /// Last raw level seen.
    raw: Level,
    /// When `raw` last changed.
    changed_at: Micros,
    /// Debounced level went High -> Low on the latest update.
    fell: bool,
}

impl SenseLine {
    const fn new() -> Self {
        Self {
            stable: Level::High,
            raw: Level::High,
            changed_at: 0,
            fell: false,
        }
    }

    fn update(&mut self, raw: Level, now: Micros, settle: Micros) {
        self.fell = false;

        if raw != self.raw {
            self.raw = raw;
            self.changed_at = now;
        }

        if raw != self.stable && now.wrapping_sub(self.changed_at) >= settle {
            self.stable = raw;
            self.fell = raw.is_active();
        }
    }
}

pub struct GroupScanner {
    lines: [SenseLine; GROUPS],
    policy: ScanPolicy,
    settle: Micros,
}

impl GroupScanner {
    pub const fn new(config: &ScanConfig) -> Self {
        Self {
            lines: [SenseLine::new(); GROUPS],
            policy: config.policy,
            settle: config.settle_us,
        }
    }

    /// Sample all sense lines and return the active group, if any.
    ///
    /// Must be called on every scan iteration, including ones that end up
    /// doing nothing, so the per-line settle clocks stay current.
    pub fn active_group<S: SenseLines>(&mut self, sense: &mut S, now: Micros) -> Option<usize> {
        for (group, line) in self.lines.iter_mut().enumerate() {
            line.update(sense.sense_level(group), now, self.settle);
        }

        match self.policy {
            ScanPolicy::StrictUniqueness => self.unique_active(),
            ScanPolicy::EdgePriority => self.first_edge_or_active(),
        }
    }

    /// Exactly one active line, otherwise nothing.
    fn unique_active(&self) -> Option<usize> {
        let mut active = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.stable.is_active())
            .map(|(group, _)| group);

        match (active.next(), active.next()) {
            (Some(group), None) => Some(group),
            _ => None,
        }
    }

    fn first_edge_or_active(&self) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.fell)
            .or_else(|| self.lines.iter().position(|line| line.stable.is_active()))
    }
}
