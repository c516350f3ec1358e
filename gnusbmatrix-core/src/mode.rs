//! Button modes and their one-byte wire/storage encoding.
//!
//! The top two bits of a mode byte select the mode. For radio buttons the low
//! six bits carry the radio group; for every other mode they are ignored.

/// Raw selector values.
pub const MODE_NONE: u8 = 0x00;
pub const MODE_IMPULSE: u8 = 0x40;
pub const MODE_TOGGLE: u8 = 0x80;
pub const MODE_RADIO: u8 = 0xC0;
pub const MODE_MASK: u8 = 0xC0;
pub const GROUP_MASK: u8 = 0x3F;

/// Radio group id (0-63).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioGroup(u8);

impl RadioGroup {
    pub const MAX: u8 = GROUP_MASK;

    /// Returns `None` if `group` does not fit in six bits.
    pub const fn new(group: u8) -> Option<Self> {
        if group <= Self::MAX {
            Some(Self(group))
        } else {
            None
        }
    }

    /// Clamp any value into the valid group range.
    pub const fn saturating(group: u8) -> Self {
        if group > Self::MAX {
            Self(Self::MAX)
        } else {
            Self(group)
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

/// How a button turns switch transitions into LED state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonMode {
    /// Switch is ignored.
    #[default]
    None,
    /// LED follows the switch: on while pressed.
    Impulse,
    /// Each debounced press flips the LED.
    Toggle,
    /// Press lights this LED and clears every other LED in the same group.
    Radio(RadioGroup),
}

impl ButtonMode {
    pub const fn from_byte(byte: u8) -> Self {
        match byte & MODE_MASK {
            MODE_IMPULSE => ButtonMode::Impulse,
            MODE_TOGGLE => ButtonMode::Toggle,
            MODE_RADIO => ButtonMode::Radio(RadioGroup(byte & GROUP_MASK)),
            _ => ButtonMode::None,
        }
    }

    pub const fn to_byte(self) -> u8 {
        match self {
            ButtonMode::None => MODE_NONE,
            ButtonMode::Impulse => MODE_IMPULSE,
            ButtonMode::Toggle => MODE_TOGGLE,
            ButtonMode::Radio(group) => MODE_RADIO | group.0,
        }
    }

    /// Parse a mode name as typed on the host side.
    ///
    /// Accepts `none`, `impulse`, `toggle` and `radio` and their first
    /// letters. `group` is only used for radio and is clamped to 0-63.
    pub fn parse(name: &str, group: u8) -> Option<Self> {
        match name {
            "none" | "n" => Some(ButtonMode::None),
            "impulse" | "i" => Some(ButtonMode::Impulse),
            "toggle" | "t" => Some(ButtonMode::Toggle),
            "radio" | "r" => Some(ButtonMode::Radio(RadioGroup::saturating(group))),
            _ => None,
        }
    }
}

impl From<u8> for ButtonMode {
    fn from(byte: u8) -> Self {
        ButtonMode::from_byte(byte)
    }
}

impl From<ButtonMode> for u8 {
    fn from(mode: ButtonMode) -> Self {
        mode.to_byte()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_selectors() {
        assert_eq!(ButtonMode::from_byte(0x00), ButtonMode::None);
        assert_eq!(ButtonMode::from_byte(0x40), ButtonMode::Impulse);
        assert_eq!(ButtonMode::from_byte(0x80), ButtonMode::Toggle);
        assert_eq!(
            ButtonMode::from_byte(0xC5),
            ButtonMode::Radio(RadioGroup::new(5).unwrap())
        );
    }

    #[test]
    fn test_low_bits_ignored_outside_radio() {
        assert_eq!(ButtonMode::from_byte(0x85), ButtonMode::Toggle);
        assert_eq!(ButtonMode::from_byte(0x7F), ButtonMode::Impulse);
        assert_eq!(ButtonMode::from_byte(0x85).to_byte(), 0x80);
    }

    #[test]
    fn test_radio_encoding_keeps_group() {
        for group in 0..=RadioGroup::MAX {
            let byte = MODE_RADIO | group;
            assert_eq!(ButtonMode::from_byte(byte).to_byte(), byte);
        }
    }

    #[test]
    fn test_group_bounds() {
        assert!(RadioGroup::new(63).is_some());
        assert!(RadioGroup::new(64).is_none());
        assert_eq!(RadioGroup::saturating(200).get(), 63);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(ButtonMode::parse("t", 0), Some(ButtonMode::Toggle));
        assert_eq!(ButtonMode::parse("impulse", 9), Some(ButtonMode::Impulse));
        assert_eq!(
            ButtonMode::parse("r", 99),
            Some(ButtonMode::Radio(RadioGroup::saturating(63)))
        );
        assert_eq!(ButtonMode::parse("latch", 0), None);
    }
}
