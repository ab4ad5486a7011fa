//! One iteration of the main scan loop.
//!
//! Find the active drive group, read its key lines, push each reading
//! through the debounce table and emit note events, then drain whatever the
//! host has sent. Only keys of the active group are observed on a given
//! iteration; keys of other groups keep their counters frozen.

use crate::config::{ScanConfig, Wiring};
use crate::debounce::{DebounceTable, KeyEvent};
use crate::hal::{Clock, EventSink, InboundDrain, KeyLines, SenseLines};
use crate::note::map_to_note;
use crate::power::PowerMonitor;
use crate::scanner::GroupScanner;
use crate::{positions_in_group, KeyPosition, MIDI_CHANNEL, VELOCITY_OFF, VELOCITY_ON};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// No single drive group could be identified.
    Idle,
    /// A group was scanned and `events` note events were emitted.
    Scanned { group: usize, events: usize },
    /// The power monitor has faulted. Nothing was read or emitted.
    Halted,
}

pub struct ScanLoop<'a> {
    scanner: GroupScanner,
    table: DebounceTable,
    wiring: Wiring,
    power: &'a PowerMonitor,
    last_group: Option<usize>,
}

impl<'a> ScanLoop<'a> {
    pub fn new(config: &ScanConfig, wiring: Wiring, power: &'a PowerMonitor) -> Self {
        Self {
            scanner: GroupScanner::new(config),
            table: DebounceTable::new(config.debounce_threshold),
            wiring,
            power,
            last_group: None,
        }
    }

    pub fn debounce_table(&self) -> &DebounceTable {
        &self.table
    }

    /// Run one iteration. `host` is the USB side: the event sink and the
    /// inbound queue that gets drained.
    pub fn step<M, C, H>(&mut self, matrix: &mut M, clock: &C, host: &mut H) -> ScanOutcome
    where
        M: SenseLines + KeyLines,
        C: Clock,
        H: EventSink + InboundDrain,
    {
        if self.power.is_faulted() {
            return ScanOutcome::Halted;
        }

        let active = self.scanner.active_group(matrix, clock.now());
        if active != self.last_group {
            log::trace!("active group {:?}", active);
            self.last_group = active;
        }

        let outcome = match active {
            None => ScanOutcome::Idle,
            Some(group) => {
                let events = self.scan_group(group, matrix, host);
                ScanOutcome::Scanned { group, events }
            }
        };

        while host.discard_pending() {}

        outcome
    }

    fn scan_group<K: KeyLines, E: EventSink>(&mut self, group: usize, keys: &mut K, sink: &mut E) -> usize {
        let mut events = 0;

        for position in 0..positions_in_group(group) {
            let key = KeyPosition::new(group, position);
            let level = keys.key_level(self.wiring.key_line(position));

            match self.table.observe(key, level) {
                KeyEvent::Pressed => {
                    let note = map_to_note(group, position);
                    log::trace!("note on {} ({:?})", note, key);
                    sink.note_on(note, VELOCITY_ON, MIDI_CHANNEL);
                    events += 1;
                }
                KeyEvent::Released => {
                    let note = map_to_note(group, position);
                    log::trace!("note off {} ({:?})", note, key);
                    sink.note_off(note, VELOCITY_OFF, MIDI_CHANNEL);
                    events += 1;
                }
                KeyEvent::NoChange => {}
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{Level, Micros};
    use crate::{DriveTimer, SelfDriveSequencer, Supply, GROUPS, KEY_LINES};
    use core::cell::Cell;

    #[derive(Default)]
    struct FakeMatrix {
        active: Vec<usize>,
        /// Pressed physical key lines.
        pressed: Vec<usize>,
        key_reads: Vec<usize>,
    }

    impl SenseLines for FakeMatrix {
        fn sense_level(&mut self, group: usize) -> Level {
            Level::from_active(self.active.contains(&group))
        }
    }

    impl KeyLines for FakeMatrix {
        fn key_level(&mut self, line: usize) -> Level {
            self.key_reads.push(line);
            Level::from_active(self.pressed.contains(&line))
        }
    }

    struct FakeClock(Cell<Micros>);

    impl Clock for FakeClock {
        fn now(&self) -> Micros {
            let now = self.0.get();
            self.0.set(now + 10);
            now
        }
    }

    #[derive(Debug, PartialEq)]
    enum Sent {
        On(u8, u8, u8),
        Off(u8, u8, u8),
    }

    #[derive(Default)]
    struct FakeHost {
        sent: Vec<Sent>,
        pending: usize,
        polls: usize,
    }

    impl EventSink for FakeHost {
        fn note_on(&mut self, note: u8, velocity: u8, channel: u8) {
            self.sent.push(Sent::On(note, velocity, channel));
        }

        fn note_off(&mut self, note: u8, velocity: u8, channel: u8) {
            self.sent.push(Sent::Off(note, velocity, channel));
        }
    }

    impl InboundDrain for FakeHost {
        fn discard_pending(&mut self) -> bool {
            self.polls += 1;
            if self.pending > 0 {
                self.pending -= 1;
                true
            } else {
                false
            }
        }
    }

    struct NoTimer;

    impl DriveTimer for NoTimer {
        fn start(&mut self, _period: Micros) {}
        fn stop(&mut self) {}
    }

    struct Rig {
        matrix: FakeMatrix,
        clock: FakeClock,
        host: FakeHost,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                matrix: FakeMatrix::default(),
                clock: FakeClock(Cell::new(0)),
                host: FakeHost::default(),
            }
        }

        fn step(&mut self, scan: &mut ScanLoop<'_>) -> ScanOutcome {
            scan.step(&mut self.matrix, &self.clock, &mut self.host)
        }
    }

    #[test]
    fn press_and_release_emit_note_events() {
        let power = PowerMonitor::new();
        let mut scan = ScanLoop::new(&ScanConfig::new(), Wiring::straight(), &power);
        let mut rig = Rig::new();
        rig.matrix.active = vec![1];
        rig.matrix.pressed = vec![0];

        assert_eq!(rig.step(&mut scan), ScanOutcome::Scanned { group: 1, events: 0 });
        assert_eq!(rig.step(&mut scan), ScanOutcome::Scanned { group: 1, events: 1 });
        assert_eq!(rig.step(&mut scan), ScanOutcome::Scanned { group: 1, events: 0 });
        rig.matrix.pressed.clear();
        assert_eq!(rig.step(&mut scan), ScanOutcome::Scanned { group: 1, events: 1 });

        assert_eq!(rig.host.sent, [Sent::On(42, 127, 1), Sent::Off(42, 0, 1)]);
    }

    #[test]
    fn crossed_lines_are_resolved_by_wiring() {
        let power = PowerMonitor::new();
        let config = ScanConfig {
            debounce_threshold: 1,
            ..ScanConfig::new()
        };
        let mut scan = ScanLoop::new(&config, Wiring::pingboard(), &power);
        let mut rig = Rig::new();
        rig.matrix.active = vec![0];
        rig.matrix.pressed = vec![4];

        rig.step(&mut scan);

        // Physical line 4 is logical position 3: D#2.
        assert_eq!(rig.host.sent, [Sent::On(39, 127, 1)]);
    }

    #[test]
    fn last_group_reads_only_its_real_key() {
        let power = PowerMonitor::new();
        let config = ScanConfig {
            debounce_threshold: 1,
            ..ScanConfig::new()
        };
        let mut scan = ScanLoop::new(&config, Wiring::straight(), &power);
        let mut rig = Rig::new();
        rig.matrix.active = vec![GROUPS - 1];
        // Phantom contacts read as pressed.
        rig.matrix.pressed = (0..KEY_LINES).collect();

        assert_eq!(rig.step(&mut scan), ScanOutcome::Scanned { group: 8, events: 1 });
        assert_eq!(rig.matrix.key_reads, [0]);
        assert_eq!(rig.host.sent, [Sent::On(84, 127, 1)]);
    }

    #[test]
    fn ambiguous_groups_only_drain() {
        let power = PowerMonitor::new();
        let mut scan = ScanLoop::new(&ScanConfig::new(), Wiring::default(), &power);
        let mut rig = Rig::new();
        rig.matrix.active = vec![2, 3];
        rig.matrix.pressed = vec![0];
        rig.host.pending = 3;

        assert_eq!(rig.step(&mut scan), ScanOutcome::Idle);
        assert!(rig.matrix.key_reads.is_empty());
        assert_eq!(rig.host.pending, 0);
        assert_eq!(rig.host.polls, 4);
    }

    #[test]
    fn inbound_is_drained_after_a_scan() {
        let power = PowerMonitor::new();
        let mut scan = ScanLoop::new(&ScanConfig::new(), Wiring::default(), &power);
        let mut rig = Rig::new();
        rig.matrix.active = vec![0];
        rig.host.pending = 2;

        rig.step(&mut scan);
        assert_eq!(rig.host.pending, 0);
    }

    #[test]
    fn unselected_groups_keep_their_counters() {
        let power = PowerMonitor::new();
        let mut scan = ScanLoop::new(&ScanConfig::new(), Wiring::straight(), &power);
        let mut rig = Rig::new();
        rig.matrix.pressed = vec![2];

        rig.matrix.active = vec![0];
        rig.step(&mut scan);
        // Group 1 is scanned with the key released; group 0's count stays at 1.
        rig.matrix.active = vec![1];
        rig.matrix.pressed.clear();
        rig.step(&mut scan);
        rig.matrix.active = vec![0];
        rig.matrix.pressed = vec![2];
        rig.step(&mut scan);

        assert_eq!(rig.host.sent, [Sent::On(38, 127, 1)]);
        assert!(scan.debounce_table().is_down(KeyPosition::new(0, 2)));
    }

    #[test]
    fn fault_stops_everything() {
        let power = PowerMonitor::new();
        let sequencer = SelfDriveSequencer::new();
        power.startup(Supply::Present, &sequencer, &mut NoTimer, 100);
        let mut scan = ScanLoop::new(&ScanConfig::new(), Wiring::default(), &power);
        let mut rig = Rig::new();
        rig.matrix.active = vec![0];
        rig.matrix.pressed = vec![0];
        rig.host.pending = 1;

        rig.step(&mut scan);
        power.on_supply_change(Supply::Absent, &sequencer, &mut NoTimer);
        let polls = rig.host.polls;
        let reads = rig.matrix.key_reads.len();

        for _ in 0..10 {
            assert_eq!(rig.step(&mut scan), ScanOutcome::Halted);
        }
        assert!(rig.host.sent.is_empty());
        assert_eq!(rig.matrix.key_reads.len(), reads);
        assert_eq!(rig.host.polls, polls);
    }
}
