//! Button mode state machine: switch edges in, LED changes out.

use crate::device::Device;
use crate::mode::ButtonMode;
use crate::scan::DEBOUNCE_TICKS;
use crate::{button_index, column_of, led_mask, row_of, BUTTONS, ROWS};

impl Device {
    /// Apply the edges of one column, rows 0 to 7 in order.
    ///
    /// `pressed` and `released` are bitmasks with bit `row` set for each
    /// switch that went down or up.
    pub fn apply_edges(&mut self, column: usize, pressed: u8, released: u8) {
        for row in 0..ROWS {
            let bit = 1 << row;
            self.transition(
                button_index(column, row),
                pressed & bit != 0,
                released & bit != 0,
            );
        }
    }

    /// Apply one button's edge according to its mode.
    pub fn transition(&mut self, index: usize, pressed: bool, released: bool) {
        if index >= BUTTONS {
            return;
        }
        let column = column_of(index);
        let mask = led_mask(row_of(index));

        match self.modes[index] {
            ButtonMode::None => {}
            ButtonMode::Toggle => {
                if !pressed || self.debounce[index] != 0 {
                    return;
                }
                self.debounce[index] = DEBOUNCE_TICKS;
                self.leds[column] ^= mask;
            }
            ButtonMode::Impulse => {
                if pressed {
                    self.leds[column] |= mask;
                } else if released {
                    self.leds[column] &= !mask;
                }
            }
            mode @ ButtonMode::Radio(_) => {
                if !pressed {
                    return;
                }
                for other in 0..BUTTONS {
                    if self.modes[other] == mode {
                        self.leds[column_of(other)] &= !led_mask(row_of(other));
                    }
                }
                self.leds[column] |= mask;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::RadioGroup;

    fn radio(group: u8) -> ButtonMode {
        ButtonMode::Radio(RadioGroup::new(group).unwrap())
    }

    #[test]
    fn test_none_ignores_edges() {
        let mut device = Device::new();
        device.transition(3, true, false);
        device.transition(3, false, true);
        assert_eq!(device.leds(), [0; 8]);
    }

    #[test]
    fn test_toggle_flips_and_arms_debounce() {
        let mut device = Device::new();
        device.set_mode(10, ButtonMode::Toggle);

        device.transition(10, true, false);
        assert!(device.led(10));
        assert_eq!(device.debounce(10), DEBOUNCE_TICKS);

        // Still bouncing.
        device.transition(10, true, false);
        assert!(device.led(10));

        device.debounce[10] = 0;
        device.transition(10, true, false);
        assert!(!device.led(10));
    }

    #[test]
    fn test_toggle_ignores_release() {
        let mut device = Device::new();
        device.set_mode(0, ButtonMode::Toggle);
        device.transition(0, false, true);
        assert!(!device.led(0));
        assert_eq!(device.debounce(0), 0);
    }

    #[test]
    fn test_toggle_changes_exactly_one_bit() {
        let mut device = Device::new();
        for index in 0..BUTTONS {
            device.set_mode(index, ButtonMode::Toggle);
        }
        device.leds_mut().copy_from_slice(&[0x5A; 8]);

        for index in 0..BUTTONS {
            let before = device.leds();
            device.transition(index, true, false);
            let changed: u32 = before
                .iter()
                .zip(device.leds().iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum();
            assert_eq!(changed, 1, "button {index}");
        }
    }

    #[test]
    fn test_impulse_follows_switch() {
        let mut device = Device::new();
        device.set_mode(63, ButtonMode::Impulse);

        device.transition(63, true, false);
        assert!(device.led(63));
        device.transition(63, false, true);
        assert!(!device.led(63));
        assert_eq!(device.debounce(63), 0);
    }

    #[test]
    fn test_radio_keeps_one_led_per_group() {
        let mut device = Device::new();
        for index in [1, 9, 17, 40] {
            device.set_mode(index, radio(5));
        }
        device.set_mode(2, radio(6));
        device.set_led(2, true);

        for &index in &[9, 40, 1, 17, 17, 9] {
            device.transition(index, true, false);
            let lit: Vec<usize> = [1, 9, 17, 40]
                .into_iter()
                .filter(|&i| device.led(i))
                .collect();
            assert_eq!(lit, vec![index]);
        }
        // Other group untouched.
        assert!(device.led(2));
    }

    #[test]
    fn test_radio_ignores_release() {
        let mut device = Device::new();
        device.set_mode(4, radio(0));
        device.set_led(4, true);
        device.transition(4, false, true);
        assert!(device.led(4));
    }

    #[test]
    fn test_apply_edges_row_order_and_masks() {
        let mut device = Device::new();
        for row in 0..ROWS {
            device.set_mode(button_index(2, row), ButtonMode::Impulse);
        }
        device.apply_edges(2, 0b0000_0101, 0);
        assert_eq!(device.leds()[2], 0b1010_0000);

        device.apply_edges(2, 0b1000_0000, 0b0000_0001);
        assert_eq!(device.leds()[2], 0b0010_0001);
    }
}
