//! gnusbmatrix firmware for ATmega32U4 (Teensy 2.0).
//!
//! An 8×8 button/LED matrix controller:
//! - Timer-driven multiplexed scan of the switch and LED matrix
//! - Toggle, impulse and radio-group button modes
//! - Vendor control requests for polling, mode configuration and presets
//! - Mode table and presets kept in EEPROM
//!
//! Everything runs from one loop: service USB, then one scan pass. Each
//! request is handled to completion before the next scan pass begins.

#![no_std]
#![no_main]
#![feature(asm_experimental_arch)]

mod eeprom;
mod matrix;
mod usb;

use avr_device::atmega32u4::Peripherals;

use gnusbmatrix_core::Device;

use eeprom::Eeprom;
use matrix::BoardPins;
use usb::UsbControl;

/// Panic handler: on AVR we just loop forever.
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

/// Main entry point.
#[no_mangle]
pub extern "C" fn main() -> ! {
    let dp = unsafe { Peripherals::steal() };

    // Disable clock prescaler (CLKPR), run at the full 16MHz
    dp.CPU.clkpr.write(|w| w.clkpce().set_bit());
    dp.CPU.clkpr.write(|w| unsafe { w.bits(0) });

    let mut pins = BoardPins::new(&dp);
    pins.init();

    let mut storage = Eeprom::new(&dp.EEPROM);
    let mut device = Device::new();

    // Light show, then the persisted modes and preset 0
    device.play_intro(&mut pins);
    device.load(&mut storage);

    let mut usb = UsbControl::new();
    usb.init(&dp);

    loop {
        usb.poll(&dp, &mut device, &mut storage);
        device.scan(&mut pins);
    }
}
