//! Port-level driver for the 8×8 switch/LED matrix.
//!
//! Pin mapping on the ATmega32U4:
//!   Switch inputs (pull-ups):  PB0-PB7, row r on PBr
//!   LED outputs:               PD0-PD7, row 0 on PD7 (same bit order as the LED state bytes)
//!   Column select:             PF4-PF6, binary column number into a 3-to-8 decoder
//!
//! Timer 0 runs free at clk/64. Each overflow is one scan tick, about
//! 977 Hz at 16 MHz, so every column is refreshed at roughly 122 Hz.

use avr_device::atmega32u4::Peripherals;

use gnusbmatrix_core::MatrixPins;

/// Column address lines on PORTF.
const COLUMN_SHIFT: u8 = 4;
const COLUMN_MASK: u8 = 0x70;

/// TCCR0B clock select: clk/64.
const TIMER0_PRESCALE_64: u8 = 0x03;
/// TOV0 in TIFR0.
const TOV0: u8 = 0x01;

/// Busy-loop iterations per microsecond at 16 MHz (about 4 cycles each).
const LOOPS_PER_US: u16 = 4;

pub struct BoardPins<'a> {
    dp: &'a Peripherals,
}

impl<'a> BoardPins<'a> {
    pub fn new(dp: &'a Peripherals) -> Self {
        Self { dp }
    }

    /// Configure the matrix ports and start the scan timer.
    pub fn init(&mut self) {
        let dp = self.dp;

        // PORTB: switches, all inputs with pull-ups
        dp.PORTB.ddrb.write(|w| unsafe { w.bits(0x00) });
        dp.PORTB.portb.write(|w| unsafe { w.bits(0xFF) });

        // PORTD: LEDs, all outputs, off
        dp.PORTD.ddrd.write(|w| unsafe { w.bits(0xFF) });
        dp.PORTD.portd.write(|w| unsafe { w.bits(0x00) });

        // PF4-PF6: column address, outputs, column 0
        dp.PORTF
            .ddrf
            .modify(|r, w| unsafe { w.bits(r.bits() | COLUMN_MASK) });
        dp.PORTF
            .portf
            .modify(|r, w| unsafe { w.bits(r.bits() & !COLUMN_MASK) });

        // Timer 0: normal mode, free running
        dp.TC0.tccr0a.write(|w| unsafe { w.bits(0) });
        dp.TC0.tccr0b.write(|w| unsafe { w.bits(TIMER0_PRESCALE_64) });
    }
}

impl MatrixPins for BoardPins<'_> {
    fn take_tick(&mut self) -> bool {
        let tc0 = &self.dp.TC0;
        if tc0.tifr0.read().bits() & TOV0 == 0 {
            return false;
        }
        // Flag is cleared by writing a one to it
        tc0.tifr0.write(|w| unsafe { w.bits(TOV0) });
        true
    }

    fn blank_leds(&mut self) {
        self.dp.PORTD.portd.write(|w| unsafe { w.bits(0x00) });
    }

    fn select_column(&mut self, column: usize) {
        let address = ((column as u8) << COLUMN_SHIFT) & COLUMN_MASK;
        self.dp
            .PORTF
            .portf
            .modify(|r, w| unsafe { w.bits((r.bits() & !COLUMN_MASK) | address) });
    }

    fn drive_leds(&mut self, pattern: u8) {
        self.dp.PORTD.portd.write(|w| unsafe { w.bits(pattern) });
    }

    fn settle(&mut self, micros: u16) {
        for _ in 0..micros.saturating_mul(LOOPS_PER_US) {
            unsafe { core::arch::asm!("nop") };
        }
    }

    fn read_switches(&mut self) -> u8 {
        self.dp.PORTB.pinb.read().bits()
    }
}
