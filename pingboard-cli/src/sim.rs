//! Runs the scanning core against a simulated Pingboard matrix.
//!
//! The simulated board answers the sense line of whichever group was last
//! energized by the self-drive sequencer, closes key lines according to the
//! script, and reads the phantom contacts of the last group as always
//! pressed. Timer interrupts are replayed between scan loop iterations.

use std::cell::Cell;

use indicatif::ProgressBar;
use pingboard_core::{
    Clock, DriveLines, DriveTimer, EventSink, InboundDrain, KeyLines, Level, Micros, PowerMonitor,
    ScanConfig, ScanLoop, ScanOutcome, SelfDriveSequencer, SenseLines, Wiring, GROUPS, KEY_LINES,
};

use crate::script::Script;

/// How often the progress bar is updated, in iterations.
const PROGRESS_EVERY: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub at: Micros,
    pub kind: NoteKind,
    pub note: u8,
    pub velocity: u8,
    pub channel: u8,
}

#[derive(Debug, Default)]
pub struct Report {
    pub events: Vec<NoteEvent>,
    pub iterations: u64,
    pub idle: u64,
    pub drive_ticks: u64,
    pub discarded: usize,
    pub halted_at: Option<Micros>,
}

struct SimMatrix<'a> {
    script: &'a Script,
    wiring: Wiring,
    now: Micros,
    driven: Option<usize>,
}

impl SimMatrix<'_> {
    /// Physical key lines closed for `group` at the current time.
    fn closed_lines(&self, group: usize) -> [bool; KEY_LINES] {
        let mut closed = [false; KEY_LINES];
        if group == GROUPS - 1 {
            // Phantom contacts past the first position
            closed[1..].fill(true);
        }
        for press in &self.script.presses {
            if press.group == group && press.is_closed(self.now, self.script.step_us) {
                closed[self.wiring.key_line(press.position)] = true;
            }
        }
        closed
    }
}

impl SenseLines for SimMatrix<'_> {
    fn sense_level(&mut self, group: usize) -> Level {
        Level::from_active(self.driven == Some(group))
    }
}

impl KeyLines for SimMatrix<'_> {
    fn key_level(&mut self, line: usize) -> Level {
        match self.driven {
            Some(group) => Level::from_active(self.closed_lines(group)[line]),
            None => Level::High,
        }
    }
}

impl DriveLines for SimMatrix<'_> {
    fn energize(&mut self, group: usize) {
        self.driven = Some(group);
    }
}

#[derive(Default)]
struct SimTimer {
    period: Option<Micros>,
    next_fire: Micros,
    now: Micros,
}

impl DriveTimer for SimTimer {
    fn start(&mut self, period: Micros) {
        self.period = Some(period);
        // A deadline past the end of the clock never fires
        self.next_fire = self.now.saturating_add(period);
    }

    fn stop(&mut self) {
        self.period = None;
    }
}

struct SimClock(Cell<Micros>);

impl Clock for SimClock {
    fn now(&self) -> Micros {
        self.0.get()
    }
}

struct SimHost<'a> {
    now: Micros,
    events: Vec<NoteEvent>,
    inbound: &'a [Micros],
    discarded: usize,
}

impl SimHost<'_> {
    fn push(&mut self, kind: NoteKind, note: u8, velocity: u8, channel: u8) {
        self.events.push(NoteEvent {
            at: self.now,
            kind,
            note,
            velocity,
            channel,
        });
    }
}

impl EventSink for SimHost<'_> {
    fn note_on(&mut self, note: u8, velocity: u8, channel: u8) {
        self.push(NoteKind::On, note, velocity, channel);
    }

    fn note_off(&mut self, note: u8, velocity: u8, channel: u8) {
        self.push(NoteKind::Off, note, velocity, channel);
    }
}

impl InboundDrain for SimHost<'_> {
    fn discard_pending(&mut self) -> bool {
        match self.inbound.get(self.discarded) {
            Some(&arrival) if arrival <= self.now => {
                self.discarded += 1;
                true
            }
            _ => false,
        }
    }
}

/// Play `script` through the scanning core.
pub fn run(script: &Script, config: &ScanConfig, wiring: Wiring, progress: &ProgressBar) -> Report {
    let sequencer = SelfDriveSequencer::new();
    let power = PowerMonitor::new();
    let mut timer = SimTimer::default();
    let mut matrix = SimMatrix {
        script,
        wiring,
        now: 0,
        driven: None,
    };
    let clock = SimClock(Cell::new(0));
    let mut inbound = script.inbound_us.clone();
    inbound.sort_unstable();
    let mut host = SimHost {
        now: 0,
        events: Vec::new(),
        inbound: &inbound,
        discarded: 0,
    };
    let mut supply_changes = script.supply.clone();
    supply_changes.sort_by_key(|change| change.at_us);
    let mut supply_changes = supply_changes.into_iter().peekable();

    power.startup(script.initial_supply(), &sequencer, &mut timer, config.drive_period_us);
    let mut scan = ScanLoop::new(config, wiring, &power);
    let mut report = Report::default();

    let mut now: Micros = 0;
    while now < script.duration_us {
        timer.now = now;
        matrix.now = now;
        host.now = now;
        clock.0.set(now);

        // Interrupts that fell due since the previous iteration
        while let Some(period) = timer.period {
            if timer.next_fire > now {
                break;
            }
            sequencer.tick(&mut matrix);
            report.drive_ticks += 1;
            timer.next_fire = timer.next_fire.saturating_add(period);
        }
        while let Some(change) = supply_changes.next_if(|change| change.at_us <= now) {
            power.on_supply_change(change.supply(), &sequencer, &mut timer);
        }

        report.iterations += 1;
        match scan.step(&mut matrix, &clock, &mut host) {
            ScanOutcome::Halted => {
                log::warn!("supply changed at {}us, halted", now);
                report.halted_at = Some(now);
                break;
            }
            ScanOutcome::Idle => report.idle += 1,
            ScanOutcome::Scanned { .. } => {}
        }

        if report.iterations % PROGRESS_EVERY == 0 {
            progress.set_position(u64::from(now));
        }
        now = now.saturating_add(script.step_us);
    }

    progress.set_position(u64::from(now.min(script.duration_us)));
    report.events = host.events;
    report.discarded = host.discarded;
    report
}
