//! Teensy 2.0 pin assignment for the Pingboard matrix.
//!
//! Pin mapping on the ATmega32U4:
//!   Sense lines (inputs):      PB0-PB7 = groups 0-7, PE6 = group 8
//!   Key lines (inputs):        PF0, PF1, PF4, PF5, PF6, PF7
//!   Self-drive lines (outputs): PD1-PD7 = groups 0-6, PC6, PC7 = groups 7-8
//!   Supply sense (INT0):       PD0, low while the supply is present
//!
//! The sense and key lines are driven by the matrix itself, so no pull-ups.

use avr_device::atmega32u4::Peripherals;
use pingboard_core::{DriveLines, KeyLines, Level, SenseLines, Supply};

/// Bit positions of the six key lines on port F.
const KEY_BITS: [u8; 6] = [0, 1, 4, 5, 6, 7];
const KEY_MASK: u8 = 0xF3;
/// Self-drive lines on port D (PD1-PD7).
const DRIVE_MASK_D: u8 = 0xFE;
/// Self-drive lines on port C (PC6, PC7).
const DRIVE_MASK_C: u8 = 0xC0;
const SENSE_BIT_E: u8 = 1 << 6;
const SUPPLY_BIT_D: u8 = 1 << 0;

/// Configure every matrix and supply pin.
pub fn init_gpio(dp: &Peripherals) {
    // Sense lines: PB0-PB7 and PE6, plain inputs
    dp.PORTB.ddrb.write(|w| unsafe { w.bits(0x00) });
    dp.PORTB.portb.write(|w| unsafe { w.bits(0x00) });
    dp.PORTE.ddre.modify(|r, w| unsafe { w.bits(r.bits() & !SENSE_BIT_E) });
    dp.PORTE.porte.modify(|r, w| unsafe { w.bits(r.bits() & !SENSE_BIT_E) });

    // Key lines: PF0, PF1, PF4-PF7, plain inputs
    dp.PORTF.ddrf.modify(|r, w| unsafe { w.bits(r.bits() & !KEY_MASK) });
    dp.PORTF.portf.modify(|r, w| unsafe { w.bits(r.bits() & !KEY_MASK) });

    // Self-drive lines: outputs, initially released
    dp.PORTD.ddrd.modify(|r, w| unsafe { w.bits(r.bits() | DRIVE_MASK_D) });
    dp.PORTD.portd.modify(|r, w| unsafe { w.bits(r.bits() & !DRIVE_MASK_D) });
    dp.PORTC.ddrc.modify(|r, w| unsafe { w.bits(r.bits() | DRIVE_MASK_C) });
    dp.PORTC.portc.modify(|r, w| unsafe { w.bits(r.bits() & !DRIVE_MASK_C) });

    // Supply sense: PD0 input
    dp.PORTD.ddrd.modify(|r, w| unsafe { w.bits(r.bits() & !SUPPLY_BIT_D) });
}

/// Read the supply sense pin. Inverted: low means present.
pub fn supply(dp: &Peripherals) -> Supply {
    if dp.PORTD.pind.read().bits() & SUPPLY_BIT_D == 0 {
        Supply::Present
    } else {
        Supply::Absent
    }
}

/// Matrix access for the scan loop and the self-drive timer.
pub struct Board<'a> {
    dp: &'a Peripherals,
}

impl<'a> Board<'a> {
    pub fn new(dp: &'a Peripherals) -> Self {
        Self { dp }
    }
}

impl SenseLines for Board<'_> {
    fn sense_level(&mut self, group: usize) -> Level {
        let high = match group {
            0..=7 => self.dp.PORTB.pinb.read().bits() & (1 << group) != 0,
            _ => self.dp.PORTE.pine.read().bits() & SENSE_BIT_E != 0,
        };
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl KeyLines for Board<'_> {
    fn key_level(&mut self, line: usize) -> Level {
        let pinf = self.dp.PORTF.pinf.read().bits();
        if pinf & (1 << KEY_BITS[line]) != 0 {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl DriveLines for Board<'_> {
    /// Raise one self-drive line, releasing the others.
    fn energize(&mut self, group: usize) {
        let portd = &self.dp.PORTD;
        let portc = &self.dp.PORTC;

        portd.portd.modify(|r, w| unsafe { w.bits(r.bits() & !DRIVE_MASK_D) });
        portc.portc.modify(|r, w| unsafe { w.bits(r.bits() & !DRIVE_MASK_C) });

        match group {
            0..=6 => portd
                .portd
                .modify(|r, w| unsafe { w.bits(r.bits() | 1 << (group + 1)) }),
            7 => portc.portc.modify(|r, w| unsafe { w.bits(r.bits() | 0x40) }), // PC6
            8 => portc.portc.modify(|r, w| unsafe { w.bits(r.bits() | 0x80) }), // PC7
            _ => {}
        }
    }
}

/// Release every self-drive line and stop for good. Only an external reset
/// gets out of here.
pub fn halt(dp: &Peripherals) -> ! {
    avr_device::interrupt::disable();
    dp.PORTD.portd.modify(|r, w| unsafe { w.bits(r.bits() & !DRIVE_MASK_D) });
    dp.PORTC.portc.modify(|r, w| unsafe { w.bits(r.bits() & !DRIVE_MASK_C) });
    loop {}
}
