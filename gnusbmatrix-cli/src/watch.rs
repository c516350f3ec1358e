use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use gnusbmatrix_core::COLUMNS;

use crate::device::Matrix;
use crate::events;

/// Stop doubling once the interval reaches this.
const BACKOFF_LIMIT: Duration = Duration::from_secs(10);

/// Polling interval that slows down while the device is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            current: base,
        }
    }

    pub fn interval(&self) -> Duration {
        self.current
    }

    /// Device not found: double the interval while it is under the limit.
    pub fn miss(&mut self) {
        if self.current < BACKOFF_LIMIT {
            self.current = self.current.saturating_mul(2).max(Duration::from_millis(1));
        }
    }

    /// Device found again: back to the configured interval.
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

/// Poll the device forever, printing one line per event.
///
/// A missing or unplugged device never ends the loop; the interval backs
/// off until the device reappears.
pub fn run(interval: Duration, timeout: Duration) -> Result<()> {
    let mut backoff = Backoff::new(interval);
    let mut matrix: Option<Matrix> = None;
    let mut last = [0u8; COLUMNS];
    let mut spinner: Option<ProgressBar> = None;

    loop {
        if matrix.is_none() {
            match Matrix::open(timeout) {
                Ok(Some(found)) => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    info!("connected to gnusbmatrix");
                    backoff.reset();
                    matrix = Some(found);
                }
                Ok(None) => {
                    backoff.miss();
                    debug!("no device, next try in {:?}", backoff.interval());
                }
                Err(err) => {
                    backoff.miss();
                    warn!("device discovery failed: {err:#}");
                }
            }

            if matrix.is_none() {
                let pb = match spinner.take() {
                    Some(pb) => pb,
                    None => waiting_spinner()?,
                };
                pb.set_message(format!(
                    "waiting for gnusbmatrix (retry every {} ms)",
                    backoff.interval().as_millis()
                ));
                pb.tick();
                spinner = Some(pb);
                thread::sleep(backoff.interval());
                continue;
            }
        }

        if let Some(device) = &matrix {
            match device.poll() {
                Ok(snapshot) => {
                    for event in events::diff(&last, &snapshot) {
                        println!("{event}");
                    }
                    last = snapshot;
                }
                Err(err) => {
                    if is_disconnect(&err) {
                        warn!("gnusbmatrix disconnected");
                        matrix = None;
                        continue;
                    }
                    debug!("{err:#}");
                }
            }
        }

        thread::sleep(backoff.interval());
    }
}

fn waiting_spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    Ok(pb)
}

fn is_disconnect(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusb::Error>(),
        Some(rusb::Error::NoDevice | rusb::Error::Io | rusb::Error::NotFound)
    )
}
