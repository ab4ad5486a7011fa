//! Supply monitoring.
//!
//! The startup handler runs once, synchronously, before scanning begins and
//! either starts or stops the self-drive sequencer depending on the supply.
//! Any supply change after that is a hard fault: the sequencer and its timer
//! are stopped and the monitor latches `Faulted` until an external reset.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::hal::{DriveTimer, Micros};
use crate::sequencer::SelfDriveSequencer;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Supply {
    Present,
    Absent,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PowerState {
    /// Startup handler has not run yet.
    Uninitialized,
    /// Supply present at startup; self-drive running.
    Driving,
    /// Supply absent at startup; self-drive stopped.
    Suspended,
    /// Supply changed after startup. Terminal.
    Faulted,
}

impl PowerState {
    const fn to_bits(self) -> u8 {
        match self {
            PowerState::Uninitialized => 0,
            PowerState::Driving => 1,
            PowerState::Suspended => 2,
            PowerState::Faulted => 3,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        match bits {
            0 => PowerState::Uninitialized,
            1 => PowerState::Driving,
            2 => PowerState::Suspended,
            _ => PowerState::Faulted,
        }
    }
}

pub struct PowerMonitor {
    state: AtomicU8,
}

impl PowerMonitor {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(PowerState::Uninitialized.to_bits()),
        }
    }

    pub fn state(&self) -> PowerState {
        PowerState::from_bits(self.state.load(Ordering::SeqCst))
    }

    pub fn is_faulted(&self) -> bool {
        self.state() == PowerState::Faulted
    }

    fn set(&self, state: PowerState) {
        self.state.store(state.to_bits(), Ordering::SeqCst);
    }

    /// Establish the initial drive state. A second call counts as a supply
    /// change after startup and faults.
    pub fn startup<T: DriveTimer>(
        &self,
        supply: Supply,
        sequencer: &SelfDriveSequencer,
        timer: &mut T,
        period: Micros,
    ) -> PowerState {
        if self.state() != PowerState::Uninitialized {
            return self.on_supply_change(supply, sequencer, timer);
        }

        let state = match supply {
            Supply::Present => {
                sequencer.start();
                timer.start(period);
                PowerState::Driving
            }
            Supply::Absent => {
                timer.stop();
                sequencer.stop();
                PowerState::Suspended
            }
        };
        log::debug!("supply {:?} at startup: {:?}", supply, state);
        self.set(state);
        state
    }

    /// Edge handler for the supply-sense line after startup.
    pub fn on_supply_change<T: DriveTimer>(
        &self,
        supply: Supply,
        sequencer: &SelfDriveSequencer,
        timer: &mut T,
    ) -> PowerState {
        timer.stop();
        sequencer.stop();
        self.set(PowerState::Faulted);
        log::debug!("supply changed to {:?} after startup: halting", supply);
        PowerState::Faulted
    }
}

impl Default for PowerMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::DriveLines;

    #[derive(Default)]
    struct FakeTimer {
        period: Option<Micros>,
    }

    impl DriveTimer for FakeTimer {
        fn start(&mut self, period: Micros) {
            self.period = Some(period);
        }

        fn stop(&mut self) {
            self.period = None;
        }
    }

    struct Count(usize);

    impl DriveLines for Count {
        fn energize(&mut self, _group: usize) {
            self.0 += 1;
        }
    }

    #[test]
    fn startup_without_supply_leaves_drive_stopped() {
        let monitor = PowerMonitor::new();
        let sequencer = SelfDriveSequencer::new();
        let mut timer = FakeTimer::default();

        let state = monitor.startup(Supply::Absent, &sequencer, &mut timer, 100);

        assert_eq!(state, PowerState::Suspended);
        assert!(!sequencer.is_running());
        assert_eq!(timer.period, None);
    }

    #[test]
    fn startup_with_supply_starts_drive_at_zero() {
        let monitor = PowerMonitor::new();
        let sequencer = SelfDriveSequencer::new();
        let mut timer = FakeTimer::default();

        let state = monitor.startup(Supply::Present, &sequencer, &mut timer, 100);

        assert_eq!(state, PowerState::Driving);
        assert!(sequencer.is_running());
        assert_eq!(sequencer.current(), 0);
        assert_eq!(timer.period, Some(100));
    }

    #[test]
    fn any_later_change_faults_for_good() {
        for later in [Supply::Present, Supply::Absent] {
            let monitor = PowerMonitor::new();
            let sequencer = SelfDriveSequencer::new();
            let mut timer = FakeTimer::default();
            let mut lines = Count(0);

            monitor.startup(Supply::Present, &sequencer, &mut timer, 100);
            sequencer.tick(&mut lines);
            sequencer.tick(&mut lines);

            assert_eq!(monitor.on_supply_change(later, &sequencer, &mut timer), PowerState::Faulted);
            assert!(monitor.is_faulted());
            assert_eq!(timer.period, None);

            let index = sequencer.current();
            for _ in 0..20 {
                sequencer.tick(&mut lines);
            }
            assert_eq!(lines.0, 2);
            assert_eq!(sequencer.current(), index);
        }
    }

    #[test]
    fn second_startup_call_faults() {
        let monitor = PowerMonitor::new();
        let sequencer = SelfDriveSequencer::new();
        let mut timer = FakeTimer::default();

        monitor.startup(Supply::Absent, &sequencer, &mut timer, 100);
        let state = monitor.startup(Supply::Present, &sequencer, &mut timer, 100);

        assert_eq!(state, PowerState::Faulted);
        assert!(!sequencer.is_running());
        assert_eq!(timer.period, None);
    }
}
