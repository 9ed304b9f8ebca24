// src/config/validate.rs

use crate::config::model::{RawSettings, Settings};
use crate::errors::{ExecutorError, Result};

impl TryFrom<RawSettings> for Settings {
    type Error = ExecutorError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        validate_raw_settings(&raw)?;
        Ok(Settings::new_unchecked(raw))
    }
}

fn validate_raw_settings(raw: &RawSettings) -> Result<()> {
    validate_intervals(raw)?;
    validate_supervisor(raw)?;
    Ok(())
}

fn validate_intervals(raw: &RawSettings) -> Result<()> {
    let checks = [
        ("[driver].resubscribe_interval_ms", raw.driver.resubscribe_interval_ms),
        ("[executor].inspect_interval_ms", raw.executor.inspect_interval_ms),
        ("[executor].refresh_every_ticks", raw.executor.refresh_every_ticks),
        ("[executor].shutdown_interval_ms", raw.executor.shutdown_interval_ms),
        ("[supervisor].request_timeout_ms", raw.supervisor.request_timeout_ms),
    ];

    for (key, value) in checks {
        if value == 0 {
            return Err(ExecutorError::ConfigError(format!(
                "{key} must be >= 1 (got 0)"
            )));
        }
    }

    Ok(())
}

fn validate_supervisor(raw: &RawSettings) -> Result<()> {
    if raw.supervisor.socket.as_os_str().is_empty() {
        return Err(ExecutorError::ConfigError(
            "[supervisor].socket must not be empty".to_string(),
        ));
    }
    Ok(())
}
