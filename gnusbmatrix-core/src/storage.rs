//! Non-volatile storage layout.
//!
//! ```text
//! 0x000..0x040   mode table, one byte per button
//! 0x040..0x140   presets, 8 bytes (one LED snapshot) each
//! ```
//!
//! The backing store only moves bytes; every address is computed and checked
//! here. Preset addresses are computed in `u16` and bounded by the preset
//! region, so an out-of-range preset can never land on the mode table.

use crate::mode::ButtonMode;
use crate::{BUTTONS, COLUMNS};

/// Byte-level access to the persistent store (EEPROM on the device).
pub trait Storage {
    fn read_byte(&mut self, address: u16) -> u8;
    fn write_byte(&mut self, address: u16, value: u8);
}

/// Cells reserved for the mode table.
pub const MODE_TABLE_LEN: u16 = BUTTONS as u16;
/// First preset cell.
pub const PRESET_BASE: u16 = MODE_TABLE_LEN;
/// Cells per preset.
pub const PRESET_LEN: u16 = COLUMNS as u16;
/// Size of the preset region.
pub const PRESET_REGION_LEN: u16 = 0x100;
/// Number of preset slots that fit the region.
pub const PRESET_SLOTS: u8 = (PRESET_REGION_LEN / PRESET_LEN) as u8;
/// Total cells used by the layout.
pub const STORAGE_LEN: usize = (PRESET_BASE + PRESET_REGION_LEN) as usize;

/// First cell of preset slot `preset`, or `None` if it is outside the region.
pub const fn preset_address(preset: u8) -> Option<u16> {
    if preset < PRESET_SLOTS {
        Some(PRESET_BASE + preset as u16 * PRESET_LEN)
    } else {
        None
    }
}

pub fn load_modes<S: Storage>(storage: &mut S, modes: &mut [ButtonMode; BUTTONS]) {
    for (address, mode) in (0..MODE_TABLE_LEN).zip(modes.iter_mut()) {
        *mode = ButtonMode::from_byte(storage.read_byte(address));
    }
}

/// Persist one mode table entry. Indices past the table are ignored.
pub fn store_mode<S: Storage>(storage: &mut S, index: usize, mode: ButtonMode) {
    if index < BUTTONS {
        storage.write_byte(index as u16, mode.to_byte());
    }
}

pub fn store_all_modes<S: Storage>(storage: &mut S, modes: &[ButtonMode; BUTTONS]) {
    for (address, mode) in (0..MODE_TABLE_LEN).zip(modes.iter()) {
        storage.write_byte(address, mode.to_byte());
    }
}

/// Returns false without writing anything if `preset` is out of range.
pub fn store_preset<S: Storage>(storage: &mut S, preset: u8, leds: &[u8; COLUMNS]) -> bool {
    let Some(base) = preset_address(preset) else {
        return false;
    };
    for (offset, &value) in (0..PRESET_LEN).zip(leds.iter()) {
        storage.write_byte(base + offset, value);
    }
    true
}

pub fn load_preset<S: Storage>(storage: &mut S, preset: u8) -> Option<[u8; COLUMNS]> {
    let base = preset_address(preset)?;
    let mut leds = [0; COLUMNS];
    for (offset, value) in (0..PRESET_LEN).zip(leds.iter_mut()) {
        *value = storage.read_byte(base + offset);
    }
    Some(leds)
}

/// RAM-backed store covering the whole layout. Starts erased (`0xFF`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStorage {
    cells: [u8; STORAGE_LEN],
}

impl MemoryStorage {
    pub const ERASED: u8 = 0xFF;

    pub const fn new() -> Self {
        Self {
            cells: [Self::ERASED; STORAGE_LEN],
        }
    }

    /// Read a cell. Addresses past the end read as erased.
    pub fn read(&self, address: u16) -> u8 {
        self.cells
            .get(address as usize)
            .copied()
            .unwrap_or(Self::ERASED)
    }

    /// Write a cell. Addresses past the end are dropped.
    pub fn write(&mut self, address: u16, value: u8) {
        if let Some(cell) = self.cells.get_mut(address as usize) {
            *cell = value;
        }
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn read_byte(&mut self, address: u16) -> u8 {
        self.read(address)
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        self.write(address, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_addresses() {
        assert_eq!(preset_address(0), Some(0x40));
        assert_eq!(preset_address(1), Some(0x48));
        assert_eq!(preset_address(31), Some(0x138));
        assert_eq!(preset_address(32), None);
        assert_eq!(preset_address(255), None);
        assert_eq!(PRESET_SLOTS, 32);
        assert_eq!(STORAGE_LEN, 0x140);
    }

    #[test]
    fn test_presets_never_touch_mode_table() {
        for preset in 0..=u8::MAX {
            if let Some(address) = preset_address(preset) {
                assert!(address >= MODE_TABLE_LEN);
                assert!(((address + PRESET_LEN) as usize) <= STORAGE_LEN);
            }
        }
    }

    #[test]
    fn test_last_slot_fills_end_of_region() {
        let mut storage = MemoryStorage::new();
        assert!(store_preset(&mut storage, 31, &[7; COLUMNS]));
        assert_eq!(&storage.cells()[STORAGE_LEN - 8..], &[7; 8]);
        assert_eq!(load_preset(&mut storage, 31), Some([7; COLUMNS]));
    }

    #[test]
    fn test_out_of_range_preset_writes_nothing() {
        let mut storage = MemoryStorage::new();
        assert!(!store_preset(&mut storage, 32, &[0; COLUMNS]));
        assert_eq!(storage, MemoryStorage::new());
        assert_eq!(load_preset(&mut storage, 32), None);
    }

    #[test]
    fn test_mode_table_round_trip() {
        let mut storage = MemoryStorage::new();
        let mut modes = [ButtonMode::Toggle; BUTTONS];
        modes[63] = ButtonMode::from_byte(0xC7);
        store_all_modes(&mut storage, &modes);

        let mut loaded = [ButtonMode::None; BUTTONS];
        load_modes(&mut storage, &mut loaded);
        assert_eq!(loaded, modes);
        assert_eq!(storage.read(63), 0xC7);
    }

    #[test]
    fn test_erased_storage_loads_as_radio_group_63() {
        // A blank EEPROM reads 0xFF everywhere.
        let mut storage = MemoryStorage::new();
        let mut modes = [ButtonMode::None; BUTTONS];
        load_modes(&mut storage, &mut modes);
        assert!(modes.iter().all(|m| m.to_byte() == 0xFF));
    }
}
