//! Shared logic for the gnusbmatrix 8×8 button/LED controller.
//!
//! This crate is `no_std` so the AVR firmware and the host client can both
//! depend on it. It holds the command codes shared between the two sides,
//! the button-mode encoding, and the whole device state machine: matrix
//! scanning, debouncing, mode handling, the control-channel handler and
//! preset persistence. The firmware only supplies the register glue.

#![cfg_attr(not(test), no_std)]

pub mod buttons;
pub mod device;
pub mod intro;
pub mod mode;
pub mod protocol;
pub mod scan;
pub mod storage;

pub use device::Device;
pub use mode::{ButtonMode, RadioGroup};
pub use protocol::{Command, Request, Response, WriteStatus};
pub use scan::MatrixPins;
pub use storage::{MemoryStorage, Storage};

/// Number of multiplexed columns.
pub const COLUMNS: usize = 8;
/// Number of switches/LEDs per column.
pub const ROWS: usize = 8;
/// Total number of buttons in the matrix.
pub const BUTTONS: usize = COLUMNS * ROWS;

/// Flat button index for a matrix position: `8 * column + row`.
pub const fn button_index(column: usize, row: usize) -> usize {
    column * ROWS + row
}

/// Column of a flat button index.
pub const fn column_of(index: usize) -> usize {
    index / ROWS
}

/// Row of a flat button index.
pub const fn row_of(index: usize) -> usize {
    index % ROWS
}

/// LED bit for a row within its column byte. Row 0 is the MSB.
pub const fn led_mask(row: usize) -> u8 {
    1 << (7 - row)
}
