//! Hardware seams between the scanning core and the board.
//!
//! The firmware implements these over ATmega32U4 registers, the CLI over a
//! simulated matrix, and the unit tests over in-memory fakes.

/// Free-running microsecond timestamp. Wraps; compare with `wrapping_sub`.
pub type Micros = u32;

/// Electrical level of a line. Every line in the matrix is active low.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Low means driven-and-returned for sense lines and pressed for keys.
    pub const fn is_active(self) -> bool {
        matches!(self, Level::Low)
    }

    pub const fn from_active(active: bool) -> Self {
        if active {
            Level::Low
        } else {
            Level::High
        }
    }
}

/// The nine group sense lines.
pub trait SenseLines {
    fn sense_level(&mut self, group: usize) -> Level;
}

/// The six physical key lines shared by all drive groups.
pub trait KeyLines {
    fn key_level(&mut self, line: usize) -> Level;
}

/// The nine self-drive outputs.
pub trait DriveLines {
    fn energize(&mut self, group: usize);
}

/// Periodic timer that fires the self-drive sequencer.
pub trait DriveTimer {
    fn start(&mut self, period: Micros);
    fn stop(&mut self);
}

pub trait Clock {
    fn now(&self) -> Micros;
}

/// Outbound note transport.
pub trait EventSink {
    fn note_on(&mut self, note: u8, velocity: u8, channel: u8);
    fn note_off(&mut self, note: u8, velocity: u8, channel: u8);
}

/// Inbound message queue. Controllers discard whatever the host sends.
pub trait InboundDrain {
    /// Read and drop one pending message. Returns `false` when none was pending.
    fn discard_pending(&mut self) -> bool;
}
