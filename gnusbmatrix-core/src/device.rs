//! The device state aggregate.
//!
//! All mutable firmware state lives in one `Device`. The scan step
//! (`scan.rs`), the button logic (`buttons.rs`), the control-channel handler
//! (`handler` methods below) and persistence (`storage.rs`) all operate on
//! `&mut Device`, so only one of them can touch the LED array at a time.

use crate::mode::ButtonMode;
use crate::protocol::{Command, Request, Response, WriteStatus};
use crate::storage::{self, Storage};
use crate::{column_of, led_mask, row_of, BUTTONS, COLUMNS};

/// What an open bulk-write session is filling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteTarget {
    LedValues,
    Modes,
}

impl WriteTarget {
    const fn capacity(self) -> usize {
        match self {
            WriteTarget::LedValues => COLUMNS,
            WriteTarget::Modes => BUTTONS,
        }
    }
}

/// A bulk upload in progress.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriteSession {
    pub target: WriteTarget,
    /// Next byte position in the target buffer.
    pub cursor: usize,
    /// Position at which the session completes. Never exceeds the target size.
    pub len: usize,
}

pub struct Device {
    pub(crate) leds: [u8; COLUMNS],
    pub(crate) modes: [ButtonMode; BUTTONS],
    pub(crate) debounce: [u8; BUTTONS],
    pub(crate) switches: [u8; COLUMNS],
    pub(crate) switches_before: [u8; COLUMNS],
    pub(crate) column: usize,
    session: Option<WriteSession>,
}

impl Device {
    pub const fn new() -> Self {
        Self {
            leds: [0; COLUMNS],
            modes: [ButtonMode::None; BUTTONS],
            debounce: [0; BUTTONS],
            switches: [0; COLUMNS],
            switches_before: [0; COLUMNS],
            column: 0,
            session: None,
        }
    }

    /// Power-on state: mode table and preset 0 from storage.
    pub fn load<S: Storage>(&mut self, storage: &mut S) {
        storage::load_modes(storage, &mut self.modes);
        self.recall_preset(storage, 0);
    }

    /// LED state, one byte per column, row 0 in the MSB.
    pub fn leds(&self) -> [u8; COLUMNS] {
        self.leds
    }

    pub fn leds_mut(&mut self) -> &mut [u8; COLUMNS] {
        &mut self.leds
    }

    pub fn led(&self, index: usize) -> bool {
        index < BUTTONS && self.leds[column_of(index)] & led_mask(row_of(index)) != 0
    }

    pub fn set_led(&mut self, index: usize, on: bool) {
        if index >= BUTTONS {
            return;
        }
        let mask = led_mask(row_of(index));
        if on {
            self.leds[column_of(index)] |= mask;
        } else {
            self.leds[column_of(index)] &= !mask;
        }
    }

    pub fn mode(&self, index: usize) -> ButtonMode {
        self.modes.get(index).copied().unwrap_or_default()
    }

    pub fn modes(&self) -> &[ButtonMode; BUTTONS] {
        &self.modes
    }

    /// Change a mode in memory only. Returns false for an out-of-range index.
    pub fn set_mode(&mut self, index: usize, mode: ButtonMode) -> bool {
        match self.modes.get_mut(index) {
            Some(slot) => {
                *slot = mode;
                true
            }
            None => false,
        }
    }

    pub fn debounce(&self, index: usize) -> u8 {
        self.debounce.get(index).copied().unwrap_or(0)
    }

    /// Column currently being driven.
    pub fn active_column(&self) -> usize {
        self.column
    }

    pub fn session(&self) -> Option<WriteSession> {
        self.session
    }

    /// Write the current LED state into preset slot `preset`.
    ///
    /// Returns false, leaving storage untouched, if the slot lies outside the
    /// preset region.
    pub fn store_preset<S: Storage>(&self, storage: &mut S, preset: u8) -> bool {
        storage::store_preset(storage, preset, &self.leds)
    }

    /// Replace the LED state with preset slot `preset`. Returns false if the
    /// slot is out of range.
    pub fn recall_preset<S: Storage>(&mut self, storage: &mut S, preset: u8) -> bool {
        match storage::load_preset(storage, preset) {
            Some(leds) => {
                self.leds = leds;
                true
            }
            None => false,
        }
    }

    /// Dispatch one control request. Runs to completion.
    pub fn handle_request<S: Storage>(&mut self, storage: &mut S, request: Request) -> Response {
        let Some(command) = request.command() else {
            return Response::Empty;
        };

        match command {
            Command::Poll => return Response::Snapshot(self.leds),
            Command::SetMode => {
                let index = request.param as usize;
                let mode = ButtonMode::from_byte(request.index);
                if self.set_mode(index, mode) {
                    storage::store_mode(storage, index, mode);
                }
            }
            Command::StorePreset => {
                self.store_preset(storage, request.param);
            }
            Command::RecallPreset => {
                self.recall_preset(storage, request.param);
            }
            Command::Clear => self.leds = [0; COLUMNS],
            Command::Set => {
                self.begin_write(WriteTarget::LedValues, request.param, request.index);
                return Response::ExpectData;
            }
            Command::SetAllModes => {
                self.begin_write(WriteTarget::Modes, request.param, request.index);
                return Response::ExpectData;
            }
            Command::StartBootloader => return Response::EnterBootloader,
        }

        Response::Empty
    }

    fn begin_write(&mut self, target: WriteTarget, count: u8, start: u8) {
        self.session = Some(WriteSession {
            target,
            cursor: start as usize,
            len: (count as usize).min(target.capacity()),
        });
    }

    /// Feed one data-phase chunk into the open write session.
    ///
    /// Bytes are stored at the session cursor until `len` is reached; the
    /// rest of the chunk is dropped. When a mode-table upload completes the
    /// whole table is persisted.
    ///
    /// Mode bytes are decoded on the way in, so storage holds the canonical
    /// encoding: low bits of non-radio modes are dropped.
    pub fn handle_data<S: Storage>(&mut self, storage: &mut S, data: &[u8]) -> WriteStatus {
        let Some(mut session) = self.session else {
            return WriteStatus::Stall;
        };

        for &byte in data {
            if session.cursor >= session.len {
                break;
            }
            match session.target {
                WriteTarget::LedValues => self.leds[session.cursor] = byte,
                WriteTarget::Modes => self.modes[session.cursor] = ButtonMode::from_byte(byte),
            }
            session.cursor += 1;
        }

        if session.cursor < session.len {
            self.session = Some(session);
            return WriteStatus::NeedMore;
        }

        self.session = None;
        if session.target == WriteTarget::Modes {
            storage::store_all_modes(storage, &self.modes);
        }
        WriteStatus::Complete
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}
