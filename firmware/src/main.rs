//! Pingboard MIDI keyboard firmware for ATmega32U4 (Teensy 2.0).
//!
//! - Self-drive of the nine matrix drive lines from the Timer1 interrupt
//! - Group sensing, per-key debouncing and note mapping in the main loop
//! - Fail-stop on any supply change after startup (INT0)
//! - Class-compliant USB-MIDI output

#![no_std]
#![no_main]
#![feature(abi_avr_interrupt)]

mod board;
mod midi;
mod timer;

use avr_device::atmega32u4::Peripherals;
use pingboard_core::{PowerMonitor, ScanConfig, ScanLoop, ScanOutcome, SelfDriveSequencer, Wiring};

use board::Board;
use midi::UsbMidi;
use timer::{MicrosClock, SelfDriveTimer};

const CONFIG: ScanConfig = ScanConfig::new();

static SEQUENCER: SelfDriveSequencer = SelfDriveSequencer::new();
static POWER: PowerMonitor = PowerMonitor::new();

/// INT0 on any logical change
const ISC00: u8 = 1 << 0;
const INT0_BIT: u8 = 1 << 0;

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    let dp = unsafe { Peripherals::steal() };
    board::halt(&dp)
}

#[avr_device::interrupt(atmega32u4)]
fn TIMER1_COMPA() {
    let dp = unsafe { Peripherals::steal() };
    SEQUENCER.tick(&mut Board::new(&dp));
}

#[avr_device::interrupt(atmega32u4)]
fn TIMER0_OVF() {
    timer::on_overflow();
}

/// Supply changed after startup: stop driving and never come back.
#[avr_device::interrupt(atmega32u4)]
fn INT0() {
    let dp = unsafe { Peripherals::steal() };
    POWER.on_supply_change(board::supply(&dp), &SEQUENCER, &mut SelfDriveTimer::new(&dp));
    board::halt(&dp)
}

#[no_mangle]
pub extern "C" fn main() -> ! {
    let dp = unsafe { Peripherals::steal() };

    // Disable clock prescaler (CLKPR)
    dp.CPU.clkpr.write(|w| w.clkpce().set_bit());
    dp.CPU.clkpr.write(|w| unsafe { w.bits(0) });

    board::init_gpio(&dp);
    timer::init_clock(&dp);

    let mut usb = UsbMidi::new(&dp);
    usb.init();

    // Establish the drive state before the supply interrupt is armed
    POWER.startup(
        board::supply(&dp),
        &SEQUENCER,
        &mut SelfDriveTimer::new(&dp),
        CONFIG.drive_period_us,
    );

    dp.EXINT.eicra.modify(|r, w| unsafe { w.bits(r.bits() | ISC00) });
    dp.EXINT.eifr.write(|w| unsafe { w.bits(INT0_BIT) });
    dp.EXINT.eimsk.modify(|r, w| unsafe { w.bits(r.bits() | INT0_BIT) });

    unsafe { avr_device::interrupt::enable() };

    let clock = MicrosClock::new(&dp);
    let mut matrix = Board::new(&dp);
    let mut scan = ScanLoop::new(&CONFIG, Wiring::pingboard(), &POWER);

    loop {
        usb.poll();

        if scan.step(&mut matrix, &clock, &mut usb) == ScanOutcome::Halted {
            board::halt(&dp);
        }
    }
}
