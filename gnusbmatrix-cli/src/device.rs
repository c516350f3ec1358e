use anyhow::{bail, Context, Result};
use rusb::{Device, DeviceHandle, Direction, GlobalContext, Recipient, RequestType};
use std::time::Duration;
use tracing::{debug, warn};

use gnusbmatrix_core::protocol::{cmd, MANUFACTURER, PRODUCT, PRODUCT_ID, VENDOR_ID};
use gnusbmatrix_core::{BUTTONS, COLUMNS};

/// `POLL` runs on every timer tick, so it gets a short deadline.
const POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// An open connection to a gnusbmatrix.
pub struct Matrix {
    handle: DeviceHandle<GlobalContext>,
    timeout: Duration,
}

impl Matrix {
    /// Find and open the first gnusbmatrix on the bus.
    ///
    /// Several devices share the VOTI vendor/product id, so a match on ids
    /// is confirmed with the manufacturer and product strings. Devices whose
    /// strings cannot be read are skipped.
    pub fn open(timeout: Duration) -> Result<Option<Self>> {
        let devices = rusb::devices().context("failed to enumerate USB devices")?;
        for device in devices.iter() {
            let desc = device
                .device_descriptor()
                .context("failed to read device descriptor")?;
            if desc.vendor_id() != VENDOR_ID || desc.product_id() != PRODUCT_ID {
                continue;
            }

            match identify(&device) {
                Ok(Some(handle)) => return Ok(Some(Self { handle, timeout })),
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        "skipping device on bus {} address {}: {err:#}",
                        device.bus_number(),
                        device.address()
                    );
                    continue;
                }
            }
        }
        Ok(None)
    }

    /// Like `open`, but a missing device is an error.
    pub fn connect(timeout: Duration) -> Result<Self> {
        match Self::open(timeout)? {
            Some(matrix) => Ok(matrix),
            None => bail!("could not find USB device {MANUFACTURER}/{PRODUCT}"),
        }
    }

    /// Read the 8-byte LED state.
    pub fn poll(&self) -> Result<[u8; COLUMNS]> {
        let mut buf = [0u8; COLUMNS];
        let n = self
            .handle
            .read_control(
                request_type(Direction::In),
                cmd::POLL,
                0,
                0,
                &mut buf,
                POLL_TIMEOUT,
            )
            .context("POLL request failed")?;
        if n < buf.len() {
            bail!("only {n} bytes of status received");
        }
        Ok(buf)
    }

    pub fn clear(&self) -> Result<()> {
        self.command(cmd::CLEAR, 0, 0).context("CLEAR request failed")
    }

    /// Overwrite LED bytes from column 0. At most 8 values are sent.
    pub fn set(&self, values: &[u8]) -> Result<()> {
        let values = &values[..values.len().min(COLUMNS)];
        self.upload(cmd::SET, values).context("SET request failed")
    }

    pub fn store_preset(&self, preset: u8) -> Result<()> {
        self.command(cmd::STORE_PRESET, preset as u16, 0)
            .with_context(|| format!("STORE_PRESET {preset} failed"))
    }

    pub fn recall_preset(&self, preset: u8) -> Result<()> {
        self.command(cmd::RECALL_PRESET, preset as u16, 0)
            .with_context(|| format!("RECALL_PRESET {preset} failed"))
    }

    pub fn set_mode(&self, button: u8, mode: u8) -> Result<()> {
        self.command(cmd::SETMODE, button as u16, mode as u16)
            .with_context(|| format!("SETMODE for button {button} failed"))
    }

    /// Upload the mode table from button 0. At most 64 entries are sent.
    pub fn set_modes(&self, modes: &[u8]) -> Result<()> {
        let modes = &modes[..modes.len().min(BUTTONS)];
        self.upload(cmd::SET_ALL_MODES, modes)
            .context("SET_ALL_MODES request failed")
    }

    pub fn start_bootloader(&self) -> Result<()> {
        // The device drops off the bus immediately; a failed status stage is expected
        if let Err(err) = self.command(cmd::START_BOOTLOADER, 0, 0) {
            debug!("bootloader request ended with {err:#}");
        }
        Ok(())
    }

    /// Request without a data stage.
    fn command(&self, code: u8, value: u16, index: u16) -> Result<()> {
        self.handle.read_control(
            request_type(Direction::In),
            code,
            value,
            index,
            &mut [],
            self.timeout,
        )?;
        Ok(())
    }

    /// Request with an OUT data stage; `wValue` carries the byte count.
    fn upload(&self, code: u8, data: &[u8]) -> Result<()> {
        let n = self.handle.write_control(
            request_type(Direction::Out),
            code,
            data.len() as u16,
            0,
            data,
            self.timeout,
        )?;
        if n != data.len() {
            bail!("device accepted {n} of {} bytes", data.len());
        }
        Ok(())
    }
}

fn request_type(direction: Direction) -> u8 {
    rusb::request_type(direction, RequestType::Vendor, Recipient::Device)
}

/// Open `device` and check its strings. `Ok(None)` if it is some other
/// device sharing our ids.
fn identify(device: &Device<GlobalContext>) -> Result<Option<DeviceHandle<GlobalContext>>> {
    let desc = device
        .device_descriptor()
        .context("failed to read device descriptor")?;
    let handle = device
        .open()
        .context("cannot open USB device (may need root/sudo or udev rules)")?;

    let manufacturer = handle
        .read_manufacturer_string_ascii(&desc)
        .context("cannot query manufacturer")?;
    if manufacturer != MANUFACTURER {
        debug!("seen device from vendor {manufacturer:?}");
        return Ok(None);
    }

    let product = handle
        .read_product_string_ascii(&desc)
        .context("cannot query product")?;
    if product != PRODUCT {
        debug!("seen product {product:?}");
        return Ok(None);
    }

    Ok(Some(handle))
}
