// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Executor settings as read from an optional TOML file.
///
/// ```toml
/// [driver]
/// resubscribe_interval_ms = 1000
/// resubscribe_policy = "forever"
///
/// [executor]
/// inspect_interval_ms = 1000
/// refresh_every_ticks = 30
/// shutdown_interval_ms = 1000
/// ack_wait_ms = 5000
/// enforce_grace_period = false
///
/// [supervisor]
/// socket = "/run/process-supervisor.sock"
/// request_timeout_ms = 10000
/// ```
///
/// Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSettings {
    #[serde(default)]
    pub driver: DriverSection,

    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub supervisor: SupervisorSection,
}

/// What the driver does when the event stream keeps failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResubscribePolicy {
    /// Retry until the lifetime token is cancelled.
    #[default]
    Forever,
    /// Give up once `MESOS_RECOVERY_TIMEOUT` has elapsed since the disconnect.
    RecoveryTimeout,
}

/// `[driver]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverSection {
    #[serde(default = "default_one_second_ms")]
    pub resubscribe_interval_ms: u64,

    #[serde(default)]
    pub resubscribe_policy: ResubscribePolicy,
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            resubscribe_interval_ms: default_one_second_ms(),
            resubscribe_policy: ResubscribePolicy::default(),
        }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    #[serde(default = "default_one_second_ms")]
    pub inspect_interval_ms: u64,

    /// Resend the current status every N inspection ticks even without a
    /// transition.
    #[serde(default = "default_refresh_every_ticks")]
    pub refresh_every_ticks: u64,

    #[serde(default = "default_one_second_ms")]
    pub shutdown_interval_ms: u64,

    /// Upper bound on waiting for the agent to acknowledge the final updates.
    #[serde(default = "default_ack_wait_ms")]
    pub ack_wait_ms: u64,

    /// Bound the shutdown loop by the agent's shutdown grace period.
    #[serde(default)]
    pub enforce_grace_period: bool,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            inspect_interval_ms: default_one_second_ms(),
            refresh_every_ticks: default_refresh_every_ticks(),
            shutdown_interval_ms: default_one_second_ms(),
            ack_wait_ms: default_ack_wait_ms(),
            enforce_grace_period: false,
        }
    }
}

/// `[supervisor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSection {
    #[serde(default = "default_socket")]
    pub socket: PathBuf,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            socket: default_socket(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_one_second_ms() -> u64 {
    1000
}

fn default_refresh_every_ticks() -> u64 {
    30
}

fn default_ack_wait_ms() -> u64 {
    5000
}

fn default_socket() -> PathBuf {
    PathBuf::from("/run/process-supervisor.sock")
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Validated settings. Construct through `TryFrom<RawSettings>` or
/// `Settings::default()`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub resubscribe_interval: Duration,
    pub resubscribe_policy: ResubscribePolicy,
    pub inspect_interval: Duration,
    pub refresh_every_ticks: u64,
    pub shutdown_interval: Duration,
    pub ack_wait: Duration,
    pub enforce_grace_period: bool,
    pub supervisor_socket: PathBuf,
    pub supervisor_timeout: Duration,
}

impl Settings {
    pub(crate) fn new_unchecked(raw: RawSettings) -> Self {
        Self {
            resubscribe_interval: Duration::from_millis(raw.driver.resubscribe_interval_ms),
            resubscribe_policy: raw.driver.resubscribe_policy,
            inspect_interval: Duration::from_millis(raw.executor.inspect_interval_ms),
            refresh_every_ticks: raw.executor.refresh_every_ticks,
            shutdown_interval: Duration::from_millis(raw.executor.shutdown_interval_ms),
            ack_wait: Duration::from_millis(raw.executor.ack_wait_ms),
            enforce_grace_period: raw.executor.enforce_grace_period,
            supervisor_socket: raw.supervisor.socket,
            supervisor_timeout: Duration::from_millis(raw.supervisor.request_timeout_ms),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new_unchecked(RawSettings::default())
    }
}
