//! Timer-driven matrix scanning.
//!
//! One column is driven at a time. Every timer overflow moves on to the
//! next column, drives its LEDs and samples its eight switches. Edge
//! detection runs on every main-loop pass against the active column, so a
//! change is seen as soon as it is sampled.
//!
//! Each column is only re-sampled every eighth tick, which means an edge
//! keeps being reported on every pass until its column comes round again.
//! Impulse and radio handling are idempotent, and toggle is held off by its
//! debounce counter, which outlasts a full sweep.

use crate::device::Device;
use crate::COLUMNS;

/// Scan ticks a toggle button ignores further presses for after firing.
pub const DEBOUNCE_TICKS: u8 = 100;

/// Minimum time between selecting a column and sampling its switches.
pub const MUX_SETTLE_US: u16 = 10;

/// The port-level operations a scan needs.
pub trait MatrixPins {
    /// True once per timer overflow. Clears the overflow flag.
    fn take_tick(&mut self) -> bool;

    /// Turn every LED output off.
    fn blank_leds(&mut self);

    /// Put `column` on the mux address lines.
    fn select_column(&mut self, column: usize);

    /// Drive the LED outputs of the selected column.
    fn drive_leds(&mut self, pattern: u8);

    /// Wait at least `micros` microseconds.
    fn settle(&mut self, micros: u16);

    /// Raw switch port level. Inputs are pulled up, so 1 means released.
    fn read_switches(&mut self) -> u8;
}

impl Device {
    /// One main-loop pass of the scanner.
    pub fn scan<P: MatrixPins>(&mut self, pins: &mut P) {
        if pins.take_tick() {
            self.column = (self.column + 1) % COLUMNS;
            let column = self.column;
            self.switches_before[column] = self.switches[column];

            show_column(pins, column, self.leds[column]);
            pins.settle(MUX_SETTLE_US);
            self.switches[column] = !pins.read_switches();

            for counter in self.debounce.iter_mut() {
                *counter = counter.saturating_sub(1);
            }
        }

        let column = self.column;
        let now = self.switches[column];
        let before = self.switches_before[column];
        if now == before {
            return;
        }

        self.apply_edges(column, !before & now, before & !now);
    }

    /// Switch states (1 = pressed) of every column as last sampled.
    pub fn switches(&self) -> [u8; COLUMNS] {
        self.switches
    }
}

/// Blank, select, then drive. Selecting with the LEDs still lit would
/// flash the previous column's pattern on the new one.
pub fn show_column<P: MatrixPins>(pins: &mut P, column: usize, pattern: u8) {
    pins.blank_leds();
    pins.select_column(column);
    pins.drive_leds(pattern);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ButtonMode;
    use crate::button_index;

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    enum Op {
        Blank,
        Select(usize),
        Drive(u8),
        Settle(u16),
        Read,
    }

    /// Pins whose switches report `pressed` (1 = pressed) for every column.
    struct FakePins {
        tick: bool,
        pressed: [u8; COLUMNS],
        selected: usize,
        ops: Vec<Op>,
    }

    impl FakePins {
        fn new() -> Self {
            Self {
                tick: false,
                pressed: [0; COLUMNS],
                selected: 0,
                ops: Vec::new(),
            }
        }
    }

    impl MatrixPins for FakePins {
        fn take_tick(&mut self) -> bool {
            core::mem::replace(&mut self.tick, false)
        }
        fn blank_leds(&mut self) {
            self.ops.push(Op::Blank);
        }
        fn select_column(&mut self, column: usize) {
            self.selected = column;
            self.ops.push(Op::Select(column));
        }
        fn drive_leds(&mut self, pattern: u8) {
            self.ops.push(Op::Drive(pattern));
        }
        fn settle(&mut self, micros: u16) {
            self.ops.push(Op::Settle(micros));
        }
        fn read_switches(&mut self) -> u8 {
            self.ops.push(Op::Read);
            !self.pressed[self.selected]
        }
    }

    /// Tick until `column` is the active one.
    fn tick_to(device: &mut Device, pins: &mut FakePins, column: usize) {
        loop {
            pins.tick = true;
            device.scan(pins);
            if device.active_column() == column {
                return;
            }
        }
    }

    #[test]
    fn test_no_tick_no_port_access() {
        let mut device = Device::new();
        let mut pins = FakePins::new();
        device.scan(&mut pins);
        assert!(pins.ops.is_empty());
        assert_eq!(device.active_column(), 0);
    }

    #[test]
    fn test_tick_sequence() {
        let mut device = Device::new();
        device.leds_mut()[1] = 0x3C;
        let mut pins = FakePins::new();
        pins.tick = true;
        device.scan(&mut pins);

        assert_eq!(device.active_column(), 1);
        assert_eq!(
            pins.ops,
            vec![
                Op::Blank,
                Op::Select(1),
                Op::Drive(0x3C),
                Op::Settle(MUX_SETTLE_US),
                Op::Read
            ]
        );
    }

    #[test]
    fn test_columns_round_robin() {
        let mut device = Device::new();
        let mut pins = FakePins::new();
        let mut seen = Vec::new();
        for _ in 0..16 {
            pins.tick = true;
            device.scan(&mut pins);
            seen.push(device.active_column());
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7, 0, 1, 2, 3, 4, 5, 6, 7, 0]);
    }

    #[test]
    fn test_switches_are_inverted() {
        let mut device = Device::new();
        let mut pins = FakePins::new();
        pins.pressed[1] = 0b0000_0010;
        tick_to(&mut device, &mut pins, 1);
        assert_eq!(device.switches()[1], 0b0000_0010);
    }

    #[test]
    fn test_debounce_ages_once_per_tick() {
        let mut device = Device::new();
        device.debounce[5] = 2;
        device.debounce[60] = 1;
        let mut pins = FakePins::new();

        pins.tick = true;
        device.scan(&mut pins);
        assert_eq!(device.debounce(5), 1);
        assert_eq!(device.debounce(60), 0);

        // Passes without a tick do not age.
        device.scan(&mut pins);
        assert_eq!(device.debounce(5), 1);

        pins.tick = true;
        device.scan(&mut pins);
        pins.tick = true;
        device.scan(&mut pins);
        assert_eq!(device.debounce(5), 0);
    }

    #[test]
    fn test_press_and_release_drive_impulse() {
        let mut device = Device::new();
        let button = button_index(3, 6);
        device.set_mode(button, ButtonMode::Impulse);
        let mut pins = FakePins::new();

        pins.pressed[3] = 1 << 6;
        tick_to(&mut device, &mut pins, 3);
        assert!(device.led(button));

        pins.pressed[3] = 0;
        tick_to(&mut device, &mut pins, 3);
        assert!(!device.led(button));
    }

    #[test]
    fn test_held_edge_toggles_once_per_sweep() {
        let mut device = Device::new();
        let button = button_index(2, 0);
        device.set_mode(button, ButtonMode::Toggle);
        let mut pins = FakePins::new();

        pins.pressed[2] = 1;
        tick_to(&mut device, &mut pins, 2);
        assert!(device.led(button));

        // The edge stays visible until column 2 is sampled again.
        for _ in 0..10 {
            device.scan(&mut pins);
        }
        assert!(device.led(button));

        // Holding the button produces no new edge.
        tick_to(&mut device, &mut pins, 2);
        assert!(device.led(button));
    }

    #[test]
    fn test_fast_retoggle_is_debounced() {
        let mut device = Device::new();
        let button = button_index(0, 4);
        device.set_mode(button, ButtonMode::Toggle);
        let mut pins = FakePins::new();

        pins.pressed[0] = 1 << 4;
        tick_to(&mut device, &mut pins, 0);
        assert!(device.led(button));

        pins.pressed[0] = 0;
        tick_to(&mut device, &mut pins, 0);
        pins.pressed[0] = 1 << 4;
        tick_to(&mut device, &mut pins, 0);
        // Sixteen ticks in, well inside the window.
        assert!(device.led(button));

        pins.pressed[0] = 0;
        for _ in 0..DEBOUNCE_TICKS {
            pins.tick = true;
            device.scan(&mut pins);
        }
        pins.pressed[0] = 1 << 4;
        tick_to(&mut device, &mut pins, 0);
        assert!(!device.led(button));
    }
}
