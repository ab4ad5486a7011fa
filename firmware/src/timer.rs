//! Timer0 microsecond clock and the Timer1 self-drive timer.

use core::cell::Cell;

use avr_device::atmega32u4::Peripherals;
use avr_device::interrupt::Mutex;
use pingboard_core::{Clock, DriveTimer, Micros};

/// Timer0 runs at 16MHz / 64, so one tick is 4us and it overflows every 1024us.
const US_PER_TICK: u32 = 4;
const TIMER0_PRESCALE_64: u8 = 0b011;
const TOIE0: u8 = 1 << 0;
const TOV0: u8 = 1 << 0;

/// Timer1 runs at 16MHz / 8: two ticks per microsecond.
const TIMER1_TICKS_PER_US: u32 = 2;
/// WGM12 (CTC on OCR1A) | CS11 (prescaler 8)
const TIMER1_CTC_PRESCALE_8: u8 = (1 << 3) | (1 << 1);
const OCIE1A: u8 = 1 << 1;

static OVERFLOWS: Mutex<Cell<u32>> = Mutex::new(Cell::new(0));

/// Start Timer0 free-running with its overflow interrupt enabled.
pub fn init_clock(dp: &Peripherals) {
    let tc0 = &dp.TC0;
    tc0.tccr0a.write(|w| unsafe { w.bits(0) });
    tc0.tccr0b.write(|w| unsafe { w.bits(TIMER0_PRESCALE_64) });
    tc0.timsk0.write(|w| unsafe { w.bits(TOIE0) });

    avr_device::interrupt::free(|cs| OVERFLOWS.borrow(cs).set(0));
}

/// Called from the TIMER0_OVF interrupt.
pub fn on_overflow() {
    avr_device::interrupt::free(|cs| {
        let overflows = OVERFLOWS.borrow(cs);
        overflows.set(overflows.get().wrapping_add(1));
    })
}

pub struct MicrosClock<'a> {
    dp: &'a Peripherals,
}

impl<'a> MicrosClock<'a> {
    pub fn new(dp: &'a Peripherals) -> Self {
        Self { dp }
    }
}

impl Clock for MicrosClock<'_> {
    fn now(&self) -> Micros {
        let tc0 = &self.dp.TC0;
        avr_device::interrupt::free(|cs| {
            let mut overflows = OVERFLOWS.borrow(cs).get();
            let ticks = tc0.tcnt0.read().bits();
            // An overflow that fired while interrupts were off has not been counted yet
            if tc0.tifr0.read().bits() & TOV0 != 0 && ticks < 255 {
                overflows = overflows.wrapping_add(1);
            }
            (overflows << 8 | u32::from(ticks)).wrapping_mul(US_PER_TICK)
        })
    }
}

/// Timer1 in CTC mode; the compare-match interrupt fires the self-drive sequencer.
pub struct SelfDriveTimer<'a> {
    dp: &'a Peripherals,
}

impl<'a> SelfDriveTimer<'a> {
    pub fn new(dp: &'a Peripherals) -> Self {
        Self { dp }
    }
}

impl DriveTimer for SelfDriveTimer<'_> {
    fn start(&mut self, period: Micros) {
        let tc1 = &self.dp.TC1;
        let compare = period
            .saturating_mul(TIMER1_TICKS_PER_US)
            .saturating_sub(1)
            .min(u32::from(u16::MAX)) as u16;

        tc1.tccr1a.write(|w| unsafe { w.bits(0) });
        tc1.ocr1a.write(|w| unsafe { w.bits(compare) });
        tc1.tcnt1.write(|w| unsafe { w.bits(0) });
        tc1.tccr1b.write(|w| unsafe { w.bits(TIMER1_CTC_PRESCALE_8) });
        tc1.timsk1.modify(|r, w| unsafe { w.bits(r.bits() | OCIE1A) });
    }

    fn stop(&mut self) {
        let tc1 = &self.dp.TC1;
        tc1.timsk1.modify(|r, w| unsafe { w.bits(r.bits() & !OCIE1A) });
        tc1.tccr1b.write(|w| unsafe { w.bits(0) });
    }
}
