//! Scanning core for the Pingboard diode-matrix MIDI keyboard.
//!
//! This crate is `no_std`-compatible so it can be used by both the AVR
//! firmware and the native CLI tool. Everything that touches hardware goes
//! through the small traits in [`hal`], which keeps the scanning logic
//! testable on a development host.
//!
//! The matrix is 9 drive groups by 6 key lines. The last group only has one
//! real key; its other five positions are phantom contacts that are never
//! read.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod debounce;
pub mod hal;
pub mod note;
pub mod power;
pub mod scan;
pub mod scanner;
pub mod sequencer;

pub use config::{ConfigError, ScanConfig, ScanPolicy, Wiring};
pub use debounce::{DebounceTable, KeyEvent};
pub use hal::{Clock, DriveLines, DriveTimer, EventSink, InboundDrain, KeyLines, Level, Micros, SenseLines};
pub use note::{map_to_note, NoteName};
pub use power::{PowerMonitor, PowerState, Supply};
pub use scan::{ScanLoop, ScanOutcome};
pub use scanner::GroupScanner;
pub use sequencer::SelfDriveSequencer;

/// Number of drive groups (self-drive lines / sense lines).
pub const GROUPS: usize = 9;
/// Number of key lines multiplexed onto every drive group.
pub const KEY_LINES: usize = 6;
/// Number of real keys on the keyboard.
pub const NUM_KEYS: usize = (GROUPS - 1) * KEY_LINES + 1;

/// Name the device enumerates with.
pub const DEVICE_NAME: &str = "Pingboard";

/// MIDI channel used for every note event (1-based).
pub const MIDI_CHANNEL: u8 = 1;
/// Velocity sent with every note-on. There is no velocity sensing.
pub const VELOCITY_ON: u8 = 127;
/// Velocity sent with every note-off.
pub const VELOCITY_OFF: u8 = 0;

/// Number of readable key positions in a drive group.
///
/// Due to the circuitry the last group has one real key followed by phantom
/// contacts that read as constantly pressed, so only its first position is
/// scanned.
pub const fn positions_in_group(group: usize) -> usize {
    if group == GROUPS - 1 {
        1
    } else {
        KEY_LINES
    }
}

/// A physical key, addressed by drive group and position within the group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyPosition {
    pub group: usize,
    pub position: usize,
}

impl KeyPosition {
    pub const fn new(group: usize, position: usize) -> Self {
        Self { group, position }
    }

    /// Whether this position is a real key rather than a phantom contact.
    pub const fn is_real(self) -> bool {
        self.group < GROUPS && self.position < positions_in_group(self.group)
    }

    /// All real keys, in ascending (group, position) order.
    pub fn all() -> impl Iterator<Item = KeyPosition> {
        (0..GROUPS).flat_map(|group| {
            (0..positions_in_group(group)).map(move |position| KeyPosition::new(group, position))
        })
    }

    /// The MIDI note this key plays.
    pub fn note(self) -> u8 {
        map_to_note(self.group, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_has_49_real_keys() {
        assert_eq!(NUM_KEYS, 49);
        assert_eq!(KeyPosition::all().count(), NUM_KEYS);
        assert!(KeyPosition::all().all(KeyPosition::is_real));
    }

    #[test]
    fn last_group_positions_past_the_first_are_phantom() {
        assert!(KeyPosition::new(8, 0).is_real());
        for position in 1..KEY_LINES {
            assert!(!KeyPosition::new(8, position).is_real());
        }
        assert!(KeyPosition::new(7, 5).is_real());
    }
}
