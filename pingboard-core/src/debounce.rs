//! Per-key debounce logic.
//!
//! Each key has a saturating counter of consecutive pressed readings. A
//! press is reported once, on the reading that brings the counter up to the
//! threshold. The first released reading resets the counter and reports a
//! release if a press had been reported. With a threshold of 1 this is an
//! immediate-trigger "already down" flag.

use crate::hal::Level;
use crate::{KeyPosition, GROUPS, KEY_LINES};

/// Result of feeding one reading into the table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed,
    Released,
    NoChange,
}

pub struct DebounceTable {
    /// Consecutive pressed readings per position, phantom positions included.
    counters: [[u8; KEY_LINES]; GROUPS],
    threshold: u8,
}

impl DebounceTable {
    /// A threshold of 0 is treated as 1.
    pub const fn new(threshold: u8) -> Self {
        Self {
            counters: [[0; KEY_LINES]; GROUPS],
            threshold: if threshold == 0 { 1 } else { threshold },
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Feed one raw reading for a key. `Level::Low` is pressed.
    pub fn observe(&mut self, key: KeyPosition, level: Level) -> KeyEvent {
        let counter = &mut self.counters[key.group][key.position];

        if level.is_active() {
            let before = *counter;
            *counter = before.saturating_add(1);
            if before < self.threshold && *counter >= self.threshold {
                KeyEvent::Pressed
            } else {
                KeyEvent::NoChange
            }
        } else {
            let was_down = *counter >= self.threshold;
            *counter = 0;
            if was_down {
                KeyEvent::Released
            } else {
                KeyEvent::NoChange
            }
        }
    }

    /// Whether a press has been reported and not yet released.
    pub fn is_down(&self, key: KeyPosition) -> bool {
        self.counters[key.group][key.position] >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY: KeyPosition = KeyPosition::new(3, 2);

    fn feed(table: &mut DebounceTable, levels: &[Level]) -> Vec<KeyEvent> {
        levels.iter().map(|&level| table.observe(KEY, level)).collect()
    }

    #[test]
    fn press_press_release_with_threshold_two() {
        let mut table = DebounceTable::new(2);
        let events = feed(&mut table, &[Level::Low, Level::Low, Level::High]);
        assert_eq!(events, [KeyEvent::NoChange, KeyEvent::Pressed, KeyEvent::Released]);
    }

    #[test]
    fn short_press_is_ignored() {
        let mut table = DebounceTable::new(3);
        let events = feed(&mut table, &[Level::Low, Level::Low, Level::High, Level::High]);
        assert!(events.iter().all(|&e| e == KeyEvent::NoChange));
        assert!(!table.is_down(KEY));
    }

    #[test]
    fn held_key_reports_once() {
        let mut table = DebounceTable::new(2);
        let events = feed(&mut table, &[Level::Low; 10]);
        let presses = events.iter().filter(|&&e| e == KeyEvent::Pressed).count();
        assert_eq!(presses, 1);
        assert_eq!(events[1], KeyEvent::Pressed);
    }

    #[test]
    fn threshold_one_triggers_immediately() {
        let mut table = DebounceTable::new(1);
        let events = feed(&mut table, &[Level::Low, Level::Low, Level::High, Level::Low]);
        assert_eq!(
            events,
            [KeyEvent::Pressed, KeyEvent::NoChange, KeyEvent::Released, KeyEvent::Pressed]
        );
    }

    #[test]
    fn zero_threshold_behaves_like_one() {
        let table = DebounceTable::new(0);
        assert_eq!(table.threshold(), 1);
    }

    #[test]
    fn counter_saturates_instead_of_wrapping() {
        let mut table = DebounceTable::new(2);
        for _ in 0..1000 {
            table.observe(KEY, Level::Low);
        }
        assert!(table.is_down(KEY));
        assert_eq!(table.observe(KEY, Level::Low), KeyEvent::NoChange);
        assert_eq!(table.observe(KEY, Level::High), KeyEvent::Released);
    }

    #[test]
    fn max_threshold_is_reachable() {
        let mut table = DebounceTable::new(u8::MAX);
        let events = feed(&mut table, &[Level::Low; 300]);
        assert_eq!(events[254], KeyEvent::Pressed);
        assert_eq!(events.iter().filter(|&&e| e == KeyEvent::Pressed).count(), 1);
    }

    #[test]
    fn keys_are_independent() {
        let mut table = DebounceTable::new(1);
        let other = KeyPosition::new(3, 3);
        assert_eq!(table.observe(KEY, Level::Low), KeyEvent::Pressed);
        assert_eq!(table.observe(other, Level::High), KeyEvent::NoChange);
        assert!(table.is_down(KEY));
        assert!(!table.is_down(other));
    }

    proptest! {
        #[test]
        fn presses_and_releases_alternate(
            threshold in 1u8..6,
            pressed in proptest::collection::vec(any::<bool>(), 0..400),
        ) {
            let mut table = DebounceTable::new(threshold);
            let mut down = false;
            for active in pressed {
                match table.observe(KEY, Level::from_active(active)) {
                    KeyEvent::Pressed => {
                        prop_assert!(!down);
                        down = true;
                    }
                    KeyEvent::Released => {
                        prop_assert!(down);
                        down = false;
                    }
                    KeyEvent::NoChange => {}
                }
                prop_assert_eq!(down, table.is_down(KEY));
            }
        }

        #[test]
        fn press_fires_exactly_at_threshold(threshold in 1u8..10, held in 0usize..20) {
            let mut table = DebounceTable::new(threshold);
            let mut fired_at = None;
            for cycle in 1..=held {
                if table.observe(KEY, Level::Low) == KeyEvent::Pressed {
                    prop_assert!(fired_at.is_none());
                    fired_at = Some(cycle);
                }
            }
            if held >= usize::from(threshold) {
                prop_assert_eq!(fired_at, Some(usize::from(threshold)));
            } else {
                prop_assert_eq!(fired_at, None);
            }
        }
    }
}
