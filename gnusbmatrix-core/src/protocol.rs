//! Command codes and request/response shapes shared by firmware and host.
//!
//! Requests arrive as vendor control transfers. The handler only looks at
//! three bytes of the 8-byte setup block:
//!
//! - byte 1: command code (`bRequest`)
//! - byte 2: first parameter (count / button index / preset), low byte of `wValue`
//! - byte 4: second parameter (start index / mode byte), low byte of `wIndex`

/// USB vendor id (VOTI shared id).
pub const VENDOR_ID: u16 = 0x16C0;
/// USB product id (Obdev's free shared PID for vendor-class devices).
pub const PRODUCT_ID: u16 = 0x05DC;
/// Manufacturer string used to tell our device apart from other shared-PID devices.
pub const MANUFACTURER: &str = "www.anyma.ch";
/// Product string.
pub const PRODUCT: &str = "gnusbmatrix";

/// Raw command codes.
pub mod cmd {
    /// Read the 8-byte LED state.
    pub const POLL: u8 = 0x02;

    // Sensor-box commands. Part of the shared code table but not
    // implemented by the matrix firmware.
    pub const SET_PORTC: u8 = 0x03;
    pub const SET_PORTB: u8 = 0x04;
    pub const INPUT_PORTB: u8 = 0x05;
    pub const INPUT_PORTC: u8 = 0x06;
    pub const SET_SMOOTHING: u8 = 0x07;

    pub const SETMODE: u8 = 0xC1;
    pub const STORE_PRESET: u8 = 0xC2;
    pub const RECALL_PRESET: u8 = 0xC3;
    pub const CLEAR: u8 = 0xC4;
    pub const SET: u8 = 0xC5;
    pub const SET_ALL_MODES: u8 = 0xC6;

    /// Reboot into the firmware-update bootloader.
    pub const START_BOOTLOADER: u8 = 0xF8;
}

/// Commands the matrix firmware acts on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Poll,
    SetMode,
    StorePreset,
    RecallPreset,
    Clear,
    Set,
    SetAllModes,
    StartBootloader,
}

impl Command {
    /// Map a raw code to a command. Codes the matrix does not handle map to `None`.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            cmd::POLL => Some(Command::Poll),
            cmd::SETMODE => Some(Command::SetMode),
            cmd::STORE_PRESET => Some(Command::StorePreset),
            cmd::RECALL_PRESET => Some(Command::RecallPreset),
            cmd::CLEAR => Some(Command::Clear),
            cmd::SET => Some(Command::Set),
            cmd::SET_ALL_MODES => Some(Command::SetAllModes),
            cmd::START_BOOTLOADER => Some(Command::StartBootloader),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Command::Poll => cmd::POLL,
            Command::SetMode => cmd::SETMODE,
            Command::StorePreset => cmd::STORE_PRESET,
            Command::RecallPreset => cmd::RECALL_PRESET,
            Command::Clear => cmd::CLEAR,
            Command::Set => cmd::SET,
            Command::SetAllModes => cmd::SET_ALL_MODES,
            Command::StartBootloader => cmd::START_BOOTLOADER,
        }
    }
}

/// The parts of an inbound control block the handler reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Request {
    pub code: u8,
    pub param: u8,
    pub index: u8,
}

impl Request {
    pub const fn new(code: u8, param: u8, index: u8) -> Self {
        Self { code, param, index }
    }

    /// Parse a raw 8-byte setup block.
    pub const fn from_setup(block: &[u8; 8]) -> Self {
        Self {
            code: block[1],
            param: block[2],
            index: block[4],
        }
    }

    pub const fn command(&self) -> Option<Command> {
        Command::from_code(self.code)
    }
}

/// Result of dispatching a request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// No payload.
    Empty,
    /// LED state returned to a `POLL`.
    Snapshot([u8; 8]),
    /// A write session is open; the transport must deliver the data phase.
    ExpectData,
    /// The transport must hand over to the bootloader. Never comes back.
    EnterBootloader,
}

/// Acknowledgement for a data-phase chunk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum WriteStatus {
    NeedMore = 0,
    Complete = 1,
    Stall = 0xFF,
}

impl WriteStatus {
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}
