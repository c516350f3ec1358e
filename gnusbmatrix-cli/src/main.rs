mod device;
mod events;
mod watch;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use gnusbmatrix_core::{ButtonMode, BUTTONS, COLUMNS};

use device::Matrix;

/// Highest preset number the client will send.
const MAX_PRESET: i64 = 50;

#[derive(Parser)]
#[command(name = "gnusbmatrix-cli")]
#[command(about = "Host client for the gnusbmatrix 8x8 button/LED controller")]
struct Cli {
    /// USB control transfer timeout in milliseconds
    #[arg(long, global = true, default_value_t = 1000)]
    timeout: u64,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read the LED state once and print the 8 column bytes
    Poll,
    /// Poll continuously and print every change
    Watch {
        /// Polling interval in milliseconds
        #[arg(long, default_value_t = 40)]
        interval: u64,
    },
    /// Switch off all LEDs
    Clear,
    /// Overwrite LED bytes starting at column 0
    Set {
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<i64>,
    },
    /// Save the LED state into a preset slot
    Store { preset: i64 },
    /// Load the LED state from a preset slot
    Recall { preset: i64 },
    /// Change the mode of one button
    Mode {
        #[arg(allow_negative_numbers = true)]
        button: i64,
        /// none|n, impulse|i, toggle|t or radio|r
        mode: String,
        /// Radio group, only used with `radio`
        #[arg(allow_negative_numbers = true)]
        group: Option<i64>,
    },
    /// Replace the mode table starting at button 0 (raw mode bytes)
    Modes {
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<i64>,
    },
    /// Reboot the device into its bootloader
    Bootloader,
}

fn clamp(value: i64, max: u8) -> u8 {
    value.clamp(0, max as i64) as u8
}

/// Clamp every value into a byte, keeping at most `limit` of them.
fn clamp_bytes(values: &[i64], limit: usize) -> Vec<u8> {
    values.iter().take(limit).map(|&v| clamp(v, u8::MAX)).collect()
}

fn clamp_preset(preset: i64) -> u8 {
    clamp(preset, MAX_PRESET as u8)
}

fn parse_mode(name: &str, group: Option<i64>) -> Result<ButtonMode> {
    let group = clamp(group.unwrap_or(0), gnusbmatrix_core::RadioGroup::MAX);
    match ButtonMode::parse(name, group) {
        Some(mode) => Ok(mode),
        None => bail!("unknown mode {name:?}, expected none, impulse, toggle or radio"),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let timeout = Duration::from_millis(cli.timeout);

    match cli.command {
        Command::Watch { interval } => {
            info!("polling every {interval} ms");
            watch::run(Duration::from_millis(interval), timeout)?;
        }
        Command::Poll => {
            let matrix = Matrix::connect(timeout)?;
            let snapshot = matrix.poll()?;
            let line: Vec<String> = snapshot.iter().map(|b| b.to_string()).collect();
            println!("{}", line.join(" "));
        }
        Command::Clear => {
            Matrix::connect(timeout)?.clear()?;
        }
        Command::Set { values } => {
            let bytes = clamp_bytes(&values, COLUMNS);
            debug!("SET {bytes:?}");
            Matrix::connect(timeout)?.set(&bytes)?;
        }
        Command::Store { preset } => {
            let preset = clamp_preset(preset);
            Matrix::connect(timeout)?.store_preset(preset)?;
            info!("stored preset {preset}");
        }
        Command::Recall { preset } => {
            let preset = clamp_preset(preset);
            Matrix::connect(timeout)?.recall_preset(preset)?;
            info!("recalled preset {preset}");
        }
        Command::Mode {
            button,
            mode,
            group,
        } => {
            let button = clamp(button, (BUTTONS - 1) as u8);
            let mode = parse_mode(&mode, group)?;
            debug!("button {button} -> {mode:?} (0x{:02X})", mode.to_byte());
            Matrix::connect(timeout)?.set_mode(button, mode.to_byte())?;
        }
        Command::Modes { values } => {
            let bytes = clamp_bytes(&values, BUTTONS);
            debug!("SET_ALL_MODES {} entries", bytes.len());
            Matrix::connect(timeout)?.set_modes(&bytes)?;
        }
        Command::Bootloader => {
            Matrix::connect(timeout)?.start_bootloader()?;
            println!("Device is rebooting into its bootloader.");
        }
    }

    Ok(())
}
