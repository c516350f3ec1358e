//! Power-on light show.
//!
//! A diagonal band of lit LEDs fills in from the last column and then
//! scrolls out, one shift every fourth sweep of the matrix.

use crate::device::Device;
use crate::scan::{show_column, MatrixPins};
use crate::COLUMNS;

pub struct Attract {
    steps: u8,
    column: usize,
}

impl Attract {
    /// Full sweeps the show lasts.
    pub const STEPS: u8 = 128;

    pub const fn new() -> Self {
        Self {
            steps: Self::STEPS,
            column: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.steps == 0
    }

    /// Per-sweep animation step. Returns false once the show is over.
    pub fn advance(&mut self, leds: &mut [u8; COLUMNS]) -> bool {
        if self.steps == 0 {
            return false;
        }
        self.steps -= 1;
        if self.steps % 4 == 0 {
            leds.copy_within(1.., 0);
            leds[COLUMNS - 1] <<= 1;
            if self.steps > Self::STEPS / 2 {
                leds[COLUMNS - 1] |= 1;
            }
        }
        self.steps != 0
    }

    /// Handle one timer tick: move to the next column and show it,
    /// advancing the animation after each full sweep.
    pub fn tick<P: MatrixPins>(&mut self, pins: &mut P, leds: &mut [u8; COLUMNS]) {
        self.column += 1;
        if self.column == COLUMNS {
            self.column = 0;
            self.advance(leds);
        }
        show_column(pins, self.column, leds[self.column]);
    }
}

impl Default for Attract {
    fn default() -> Self {
        Self::new()
    }
}

impl Device {
    /// Run the whole light show, blocking until it finishes.
    pub fn play_intro<P: MatrixPins>(&mut self, pins: &mut P) {
        let mut attract = Attract::new();
        while !attract.is_finished() {
            if pins.take_tick() {
                attract.tick(pins, &mut self.leds);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_then_drain() {
        let mut leds = [0u8; COLUMNS];
        let mut attract = Attract::new();

        // Four sweeps per shift; the first shift lands on step 124.
        for _ in 0..4 {
            attract.advance(&mut leds);
        }
        assert_eq!(leds, [0, 0, 0, 0, 0, 0, 0, 0x01]);

        for _ in 0..4 {
            attract.advance(&mut leds);
        }
        assert_eq!(leds, [0, 0, 0, 0, 0, 0, 0x01, 0x03]);

        let mut sweeps = 8;
        while attract.advance(&mut leds) {
            sweeps += 1;
        }
        assert_eq!(sweeps + 1, Attract::STEPS as usize);
        assert!(attract.is_finished());
        assert_eq!(leds, [0; COLUMNS]);
        assert!(!attract.advance(&mut leds));
    }
}
