//! Byte access to the ATmega32U4's internal EEPROM.

use avr_device::atmega32u4::EEPROM;

use gnusbmatrix_core::Storage;

// EECR bits
const EERE: u8 = 0x01;
const EEPE: u8 = 0x02;
const EEMPE: u8 = 0x04;

pub struct Eeprom<'a> {
    regs: &'a EEPROM,
}

impl<'a> Eeprom<'a> {
    pub fn new(regs: &'a EEPROM) -> Self {
        Self { regs }
    }

    /// Wait for a previous write to finish.
    fn wait_ready(&self) {
        while self.regs.eecr.read().bits() & EEPE != 0 {}
    }
}

impl Storage for Eeprom<'_> {
    fn read_byte(&mut self, address: u16) -> u8 {
        self.wait_ready();
        self.regs.eear.write(|w| unsafe { w.bits(address) });
        self.regs.eecr.write(|w| unsafe { w.bits(EERE) });
        self.regs.eedr.read().bits()
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        self.wait_ready();
        self.regs.eear.write(|w| unsafe { w.bits(address) });
        self.regs.eedr.write(|w| unsafe { w.bits(value) });
        // EEPE must be set within four cycles of EEMPE
        avr_device::interrupt::free(|_| {
            self.regs.eecr.write(|w| unsafe { w.bits(EEMPE) });
            self.regs.eecr.write(|w| unsafe { w.bits(EEMPE | EEPE) });
        });
    }
}
