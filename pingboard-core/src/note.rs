//! Key position to MIDI note mapping.
//!
//! Adjacent drive groups interleave two half-octaves: even groups carry
//! C..F and odd groups carry F#..B of the same octave, and every pair of
//! groups moves up one octave.

use core::fmt;

/// Lowest note of an even group in the first octave (C2).
const LOWER_BASE: u8 = 36;
/// Lowest note of an odd group in the first octave (F#2).
const UPPER_BASE: u8 = 42;

/// MIDI note for a logical key position.
///
/// `position` is the logical position within the group; crossed key lines
/// are resolved by [`Wiring`](crate::Wiring) before a position gets here.
/// Phantom positions are never passed in.
pub fn map_to_note(group: usize, position: usize) -> u8 {
    let octave_offset = (group / 2) as u8 * 12;
    let base = if group & 1 == 1 { UPPER_BASE } else { LOWER_BASE };
    octave_offset + base + position as u8
}

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Displays a MIDI note number as a name with octave, e.g. `C2` for 36.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NoteName(pub u8);

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octave = i16::from(self.0 / 12) - 1;
        write!(f, "{}{}", PITCH_CLASSES[usize::from(self.0 % 12)], octave)
    }
}
