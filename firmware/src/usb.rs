//! Vendor-class USB control channel for ATmega32U4.
//!
//! The device exposes only endpoint 0. Standard requests are answered here;
//! vendor requests are handed to the core's request handler, and the data
//! stage of `SET`/`SET_ALL_MODES` is streamed into its write session.
//! A transfer the host abandons (a new SETUP while we wait) is dropped and
//! the main loop keeps scanning.

use avr_device::atmega32u4::Peripherals;

use gnusbmatrix_core::protocol::{MANUFACTURER, PRODUCT, PRODUCT_ID, VENDOR_ID};
use gnusbmatrix_core::{Device, Request, Response, Storage, WriteStatus};

const EP0_SIZE: u8 = 64;

/// bmRequestType type field.
const REQUEST_TYPE_MASK: u8 = 0x60;
const REQUEST_TYPE_VENDOR: u8 = 0x40;
/// bmRequestType direction bit (device-to-host).
const DIRECTION_IN: u8 = 0x80;

// Vendor-class device with only the default control pipe
static DEVICE_DESCRIPTOR: [u8; 18] = [
    18,   // bLength
    1,    // bDescriptorType (Device)
    0x10, 0x01, // bcdUSB (1.1)
    0xFF, // bDeviceClass (vendor specific)
    0,    // bDeviceSubClass
    0,    // bDeviceProtocol
    EP0_SIZE, // bMaxPacketSize0
    VENDOR_ID as u8, (VENDOR_ID >> 8) as u8, // idVendor
    PRODUCT_ID as u8, (PRODUCT_ID >> 8) as u8, // idProduct
    0x00, 0x01, // bcdDevice (1.0)
    1,    // iManufacturer
    2,    // iProduct
    0,    // iSerialNumber
    1,    // bNumConfigurations
];

static CONFIG_DESCRIPTOR: [u8; 18] = [
    // Configuration descriptor
    9,    // bLength
    2,    // bDescriptorType (Configuration)
    18, 0, // wTotalLength
    1,    // bNumInterfaces
    1,    // bConfigurationValue
    0,    // iConfiguration
    0x80, // bmAttributes (bus powered)
    50,   // bMaxPower (100mA)
    // Interface descriptor
    9,    // bLength
    4,    // bDescriptorType (Interface)
    0,    // bInterfaceNumber
    0,    // bAlternateSetting
    0,    // bNumEndpoints (control only)
    0xFF, // bInterfaceClass (vendor specific)
    0,    // bInterfaceSubClass
    0,    // bInterfaceProtocol
    0,    // iInterface
];

/// String descriptor 0 (language ID)
static STRING_DESC_0: [u8; 4] = [4, 3, 0x09, 0x04]; // English (US)

/// String descriptor 1 (manufacturer)
static STRING_DESC_1: [u8; 2 + 2 * MANUFACTURER.len()] = string_descriptor(MANUFACTURER);

/// String descriptor 2 (product)
static STRING_DESC_2: [u8; 2 + 2 * PRODUCT.len()] = string_descriptor(PRODUCT);

/// UTF-16LE string descriptor from an ASCII string.
const fn string_descriptor<const N: usize>(text: &str) -> [u8; N] {
    let bytes = text.as_bytes();
    let mut desc = [0u8; N];
    desc[0] = N as u8;
    desc[1] = 3;
    let mut i = 0;
    while i < bytes.len() {
        desc[2 + 2 * i] = bytes[i];
        i += 1;
    }
    desc
}

/// Endpoint 0 state. The matrix never leaves the default control pipe, so
/// the only thing worth remembering is whether the host configured us.
pub struct UsbControl {
    configured: bool,
}

impl UsbControl {
    pub const fn new() -> Self {
        Self { configured: false }
    }

    /// Bring up the USB block and attach. Runs once, after the attract
    /// sequence and the EEPROM load, so the host never sees a device that
    /// is still busy lighting LEDs.
    pub fn init(&mut self, dp: &Peripherals) {
        let usb = &dp.USB_DEVICE;

        // The Teensy runs from USB VBUS; the pad regulator feeds the PHY
        usb.uhwcon.write(|w| w.uvrege().set_bit());
        usb.usbcon
            .write(|w| w.usbe().set_bit().otgpade().set_bit());

        // 16 MHz crystal, PLL input divided by 2
        dp.PLL.pllcsr.write(|w| w.pindiv().set_bit().plle().set_bit());
        while dp.PLL.pllcsr.read().plock().bit_is_clear() {}

        usb.usbcon.modify(|_, w| w.frzclk().clear_bit());
        usb.udcon.modify(|_, w| w.detach().clear_bit());

        // Bus reset is only polled through UDINT; the enable bit keeps the
        // flag latched
        usb.udien.write(|w| w.eorste().set_bit());

        self.configured = false;
    }

    /// One pass of the control pipe, called between scan passes.
    ///
    /// A vendor request is dispatched to `device` and fully completed,
    /// including its data stage, before this returns.
    pub fn poll<S: Storage>(&mut self, dp: &Peripherals, device: &mut Device, storage: &mut S) {
        let usb = &dp.USB_DEVICE;

        // Bus reset wipes the endpoint setup and our address
        if usb.udint.read().eorsti().bit_is_set() {
            usb.udint.modify(|_, w| w.eorsti().clear_bit());
            self.setup_ep0(dp);
            self.configured = false;
        }

        usb.uenum.write(|w| w.bits(0));
        if usb.ueintx.read().rxstpi().bit_is_set() {
            self.handle_setup(dp, device, storage);
        }
    }

    /// Control endpoint, single 64-byte bank.
    fn setup_ep0(&self, dp: &Peripherals) {
        let usb = &dp.USB_DEVICE;

        usb.uenum.write(|w| w.bits(0));
        usb.ueconx.write(|w| w.epen().set_bit());
        usb.uecfg0x.write(|w| w.eptype().bits(0b00));
        usb.uecfg1x.write(|w| w.epsize().bits(0b011).alloc().set_bit());
    }

    fn handle_setup<S: Storage>(&mut self, dp: &Peripherals, device: &mut Device, storage: &mut S) {
        let usb = &dp.USB_DEVICE;

        let mut setup = [0u8; 8];
        for byte in setup.iter_mut() {
            *byte = usb.uedatx.read().bits();
        }

        usb.ueintx.modify(|_, w| w.rxstpi().clear_bit());

        let [bm_request_type, b_request, w_value_l, w_value_h, _, _, w_length_l, w_length_h] =
            setup;
        let w_length = (w_length_h as u16) << 8 | w_length_l as u16;

        if bm_request_type & REQUEST_TYPE_MASK == REQUEST_TYPE_VENDOR {
            self.handle_vendor(dp, &setup, w_length, device, storage);
            return;
        }

        match (bm_request_type, b_request) {
            // GET_DESCRIPTOR
            (0x80, 0x06) => {
                let desc_type = w_value_h;
                let desc_index = w_value_l;
                match desc_type {
                    1 => self.send_in(dp, &DEVICE_DESCRIPTOR, w_length),
                    2 => self.send_in(dp, &CONFIG_DESCRIPTOR, w_length),
                    3 => {
                        // String descriptor
                        match desc_index {
                            0 => self.send_in(dp, &STRING_DESC_0, w_length),
                            1 => self.send_in(dp, &STRING_DESC_1, w_length),
                            2 => self.send_in(dp, &STRING_DESC_2, w_length),
                            _ => self.stall(dp),
                        }
                    }
                    _ => self.stall(dp),
                }
            }

            // SET_ADDRESS
            (0x00, 0x05) => {
                // The address only takes effect after the status stage
                usb.ueintx.modify(|_, w| w.txini().clear_bit());
                if !self.wait_in(dp) {
                    return;
                }
                usb.udaddr
                    .write(|w| w.uadd().bits(w_value_l & 0x7F).adden().set_bit());
            }

            // SET_CONFIGURATION
            (0x00, 0x09) => {
                usb.ueintx.modify(|_, w| w.txini().clear_bit());
                self.configured = w_value_l != 0;
            }

            // GET_CONFIGURATION
            (0x80, 0x08) => {
                self.send_in(dp, &[self.configured as u8], w_length);
            }

            // GET_STATUS (device): bus powered, no remote wakeup
            (0x80, 0x00) => {
                self.send_in(dp, &[0, 0], w_length);
            }

            _ => {
                self.stall(dp);
            }
        }
    }

    fn handle_vendor<S: Storage>(
        &self,
        dp: &Peripherals,
        setup: &[u8; 8],
        w_length: u16,
        device: &mut Device,
        storage: &mut S,
    ) {
        match device.handle_request(storage, Request::from_setup(setup)) {
            Response::Snapshot(leds) => self.send_in(dp, &leds, w_length),
            Response::Empty => {
                if setup[0] & DIRECTION_IN != 0 && w_length > 0 {
                    self.send_in(dp, &[], w_length);
                } else {
                    self.send_status(dp);
                }
            }
            Response::ExpectData => self.receive_data(dp, w_length, device, storage),
            Response::EnterBootloader => {
                self.send_status(dp);
                jump_to_bootloader(dp);
            }
        }
    }

    /// Data stage of an OUT transfer: feed each packet to the write session.
    fn receive_data<S: Storage>(
        &self,
        dp: &Peripherals,
        w_length: u16,
        device: &mut Device,
        storage: &mut S,
    ) {
        let usb = &dp.USB_DEVICE;
        let mut packet = [0u8; EP0_SIZE as usize];
        let mut remaining = w_length;

        while remaining > 0 {
            if !self.wait_out(dp) {
                // Host gave up on the data stage; the session stays open
                // until the next SET/SET_ALL_MODES replaces it
                return;
            }

            let count = (usb.uebclx.read().bits() as usize).min(packet.len());
            for byte in packet[..count].iter_mut() {
                *byte = usb.uedatx.read().bits();
            }
            usb.ueintx.modify(|_, w| w.rxouti().clear_bit());

            if device.handle_data(storage, &packet[..count]) == WriteStatus::Stall {
                self.stall(dp);
                return;
            }
            if count == 0 {
                break;
            }
            remaining = remaining.saturating_sub(count as u16);
        }

        self.send_status(dp);
    }

    /// Send `data` (truncated to the host's wLength) in EP0-sized packets,
    /// then wait for the host's status stage.
    fn send_in(&self, dp: &Peripherals, data: &[u8], max_length: u16) {
        let usb = &dp.USB_DEVICE;
        let len = core::cmp::min(data.len(), max_length as usize);
        let mut sent = 0;

        loop {
            if !self.wait_in(dp) {
                return;
            }

            let chunk_end = core::cmp::min(sent + EP0_SIZE as usize, len);
            for &byte in &data[sent..chunk_end] {
                usb.uedatx.write(|w| w.bits(byte));
            }

            usb.ueintx.modify(|_, w| w.txini().clear_bit());
            let short_packet = chunk_end - sent < EP0_SIZE as usize;
            sent = chunk_end;
            if short_packet || sent >= len {
                break;
            }
        }

        // Status stage: host answers with a ZLP
        if self.wait_out(dp) {
            usb.ueintx.modify(|_, w| w.rxouti().clear_bit());
        }
    }

    /// Wait for an OUT packet on EP0. Returns `false` if a new SETUP
    /// arrives first, which leaves it for the next `poll`.
    fn wait_out(&self, dp: &Peripherals) -> bool {
        let usb = &dp.USB_DEVICE;
        loop {
            let ueintx = usb.ueintx.read();
            if ueintx.rxstpi().bit_is_set() {
                return false;
            }
            if ueintx.rxouti().bit_is_set() {
                return true;
            }
        }
    }

    /// Wait until the IN bank is free. Returns `false` if the host
    /// abandoned the transfer with a new SETUP.
    fn wait_in(&self, dp: &Peripherals) -> bool {
        let usb = &dp.USB_DEVICE;
        loop {
            let ueintx = usb.ueintx.read();
            if ueintx.rxstpi().bit_is_set() {
                return false;
            }
            if ueintx.txini().bit_is_set() {
                return true;
            }
        }
    }

    /// Zero-length IN packet for the status stage.
    fn send_status(&self, dp: &Peripherals) {
        if self.wait_in(dp) {
            dp.USB_DEVICE.ueintx.modify(|_, w| w.txini().clear_bit());
        }
    }

    fn stall(&self, dp: &Peripherals) {
        dp.USB_DEVICE
            .ueconx
            .modify(|_, w| w.stallrq().set_bit());
    }
}

/// Hand the chip to the Teensy bootloader at 0x7E00.
///
/// The bootloader expects a quiet chip: no pending EEPROM write, the scan
/// timer stopped and every matrix pin back to a floating input. It then
/// re-enumerates with its own identity.
fn jump_to_bootloader(dp: &Peripherals) -> ! {
    avr_device::interrupt::disable();

    // Drop off the bus first so the host sees the matrix go away
    dp.USB_DEVICE.udcon.write(|w| w.detach().set_bit());
    dp.USB_DEVICE.usbcon.write(|w| w.frzclk().set_bit());
    for _ in 0..20000u16 {
        unsafe { core::arch::asm!("nop") };
    }

    dp.TC0.tccr0b.write(|w| unsafe { w.bits(0) });
    while dp.EEPROM.eecr.read().bits() & 0x02 != 0 {}
    dp.EEPROM.eecr.write(|w| unsafe { w.bits(0) });

    // Switches, LED rows, column address
    dp.PORTB.ddrb.write(|w| unsafe { w.bits(0) });
    dp.PORTB.portb.write(|w| unsafe { w.bits(0) });
    dp.PORTD.ddrd.write(|w| unsafe { w.bits(0) });
    dp.PORTD.portd.write(|w| unsafe { w.bits(0) });
    dp.PORTF.ddrf.write(|w| unsafe { w.bits(0) });
    dp.PORTF.portf.write(|w| unsafe { w.bits(0) });

    unsafe { core::arch::asm!("jmp 0x7E00", options(noreturn)) }
}
