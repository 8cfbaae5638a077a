//! Local input pollers
//!
//! Each configured input (e.g. a sysfs GPIO `value` file wired to the
//! acoustic sensor) is polled on its own task. Only changes reach the
//! snapshot store. Reads run on the blocking pool. Read failures back off
//! exponentially and never end the loop.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use vigil_core::config::{InputChannel, InputConfig};
use vigil_core::{parse_flag, SensorUpdate};

use crate::backoff::BackoffPolicy;
use crate::context::GatewayContext;
use crate::error::InputError;

/// A boolean input that can be sampled.
pub trait InputSource: Send {
    fn name(&self) -> &str;

    /// Current logical level. Called from the blocking pool.
    fn read(&mut self) -> Result<bool, InputError>;
}

/// Input backed by a file holding `0` or `1`.
#[derive(Debug)]
pub struct ValueFileInput {
    name: String,
    path: PathBuf,
    active_high: bool,
}

impl ValueFileInput {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            name: config.name.clone(),
            path: config.path.clone(),
            active_high: config.active_high,
        }
    }
}

impl InputSource for ValueFileInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> Result<bool, InputError> {
        let raw = std::fs::read_to_string(&self.path)?;
        let level = parse_flag(&raw)?;
        Ok(level == self.active_high)
    }
}

fn update_for(channel: InputChannel, active: bool) -> SensorUpdate {
    match channel {
        InputChannel::Sound => SensorUpdate::sound(active),
        InputChannel::Occupancy => SensorUpdate::occupancy(active),
    }
}

/// Poll `source` every `poll` until cancelled.
pub async fn run_input(
    ctx: Arc<GatewayContext>,
    source: Box<dyn InputSource>,
    channel: InputChannel,
    poll: Duration,
    backoff: BackoffPolicy,
) {
    let name = source.name().to_string();
    let source = Arc::new(Mutex::new(source));
    let mut last: Option<bool> = None;
    let mut failures: u32 = 0;
    let mut delay = Duration::ZERO;

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let reader = Arc::clone(&source);
        let result = match tokio::task::spawn_blocking(move || {
            reader.lock().unwrap_or_else(PoisonError::into_inner).read()
        })
        .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(input = %name, error = %e, "input read task failed; poller stopping");
                break;
            }
        };

        match result {
            Ok(active) => {
                if failures > 0 {
                    info!(input = %name, failures, "input recovered");
                    failures = 0;
                }
                if last != Some(active) {
                    debug!(input = %name, active, "input changed");
                    ctx.store.update(&update_for(channel, active), ctx.now());
                    last = Some(active);
                }
                delay = poll;
            }
            Err(e) => {
                delay = backoff.next(failures);
                warn!(
                    input = %name,
                    error = %e,
                    retry_ms = delay.as_millis() as u64,
                    "input read failed"
                );
                failures = failures.saturating_add(1);
            }
        }
    }
    debug!(input = %name, "input poller stopped");
}
