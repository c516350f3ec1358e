//! Shared fixtures for gnusbmatrix-core integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use gnusbmatrix_core::{MatrixPins, COLUMNS};

// ============================================================================
// Mock matrix hardware
// ============================================================================

/// Simulated switch matrix. Ticks are handed out explicitly.
pub struct MockPins {
    pending_ticks: u32,
    /// Physical switch state, 1 = pressed, per column.
    pub pressed: [u8; COLUMNS],
    selected: usize,
    /// Last pattern driven per column.
    pub shown: [u8; COLUMNS],
    pub settle_calls: u32,
}

impl MockPins {
    pub fn new() -> Self {
        Self {
            pending_ticks: 0,
            pressed: [0; COLUMNS],
            selected: 0,
            shown: [0; COLUMNS],
            settle_calls: 0,
        }
    }

    pub fn press(&mut self, column: usize, row: usize) {
        self.pressed[column] |= 1 << row;
    }

    pub fn release(&mut self, column: usize, row: usize) {
        self.pressed[column] &= !(1 << row);
    }

    pub fn queue_ticks(&mut self, ticks: u32) {
        self.pending_ticks += ticks;
    }
}

impl MatrixPins for MockPins {
    fn take_tick(&mut self) -> bool {
        if self.pending_ticks == 0 {
            return false;
        }
        self.pending_ticks -= 1;
        true
    }

    fn blank_leds(&mut self) {}

    fn select_column(&mut self, column: usize) {
        self.selected = column;
    }

    fn drive_leds(&mut self, pattern: u8) {
        self.shown[self.selected] = pattern;
    }

    fn settle(&mut self, _micros: u16) {
        self.settle_calls += 1;
    }

    fn read_switches(&mut self) -> u8 {
        !self.pressed[self.selected]
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Run main-loop passes, one tick each, until every column has been
/// sampled once with the current switch state.
pub fn sweep(device: &mut gnusbmatrix_core::Device, pins: &mut MockPins) {
    for _ in 0..COLUMNS {
        pins.queue_ticks(1);
        device.scan(pins);
        // A couple of idle passes, as the main loop would make between ticks.
        device.scan(pins);
        device.scan(pins);
    }
}
