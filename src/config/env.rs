// src/config/env.rs

//! Agent identity resolved from the environment the agent launches us with.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::errors::{ExecutorError, Result};

pub const ENV_SLAVE_PID: &str = "MESOS_SLAVE_PID";
pub const ENV_SLAVE_ID: &str = "MESOS_SLAVE_ID";
pub const ENV_AGENT_ENDPOINT: &str = "MESOS_AGENT_ENDPOINT";
pub const ENV_FRAMEWORK_ID: &str = "MESOS_FRAMEWORK_ID";
pub const ENV_EXECUTOR_ID: &str = "MESOS_EXECUTOR_ID";
pub const ENV_SANDBOX: &str = "MESOS_SANDBOX";
pub const ENV_SSL_ENABLED: &str = "MESOS_SSL_ENABLED";
pub const ENV_CHECKPOINT: &str = "MESOS_CHECKPOINT";
pub const ENV_RECOVERY_TIMEOUT: &str = "MESOS_RECOVERY_TIMEOUT";
pub const ENV_SUBSCRIPTION_BACKOFF_MAX: &str = "MESOS_SUBSCRIPTION_BACKOFF_MAX";
pub const ENV_SHUTDOWN_GRACE_PERIOD: &str = "MESOS_EXECUTOR_SHUTDOWN_GRACE_PERIOD";

/// Who we are and where the agent lives. Resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentIdentity {
    pub slave_pid: String,
    /// May be empty until the agent tells us in `SUBSCRIBED`.
    pub agent_id: String,
    pub framework_id: String,
    pub executor_id: String,
    /// `host:port` of the agent's HTTP API.
    pub agent_endpoint: String,
    pub ssl_enabled: bool,
    pub sandbox: PathBuf,
    pub checkpoint: bool,
    pub recovery_timeout: Duration,
    pub subscription_backoff_max: Duration,
    pub shutdown_grace_period: Duration,
}

impl AgentIdentity {
    /// Resolve the identity from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the identity through an arbitrary key lookup.
    ///
    /// Required values must be present and non-empty; optional values fall
    /// back to zero/false when absent or unparsable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => Err(ExecutorError::MissingEnv(key)),
            }
        };
        let optional = |key: &str| lookup(key).unwrap_or_default();

        let identity = Self {
            slave_pid: required(ENV_SLAVE_PID)?,
            framework_id: required(ENV_FRAMEWORK_ID)?,
            executor_id: required(ENV_EXECUTOR_ID)?,
            sandbox: PathBuf::from(required(ENV_SANDBOX)?),
            agent_endpoint: required(ENV_AGENT_ENDPOINT)?,
            agent_id: optional(ENV_SLAVE_ID).trim().to_string(),
            ssl_enabled: parse_bool(&optional(ENV_SSL_ENABLED)),
            checkpoint: parse_bool(&optional(ENV_CHECKPOINT)),
            recovery_timeout: parse_duration(&optional(ENV_RECOVERY_TIMEOUT)).unwrap_or_default(),
            subscription_backoff_max: parse_duration(&optional(ENV_SUBSCRIPTION_BACKOFF_MAX))
                .unwrap_or_default(),
            shutdown_grace_period: parse_duration(&optional(ENV_SHUTDOWN_GRACE_PERIOD))
                .unwrap_or_default(),
        };

        debug!(?identity, "resolved agent identity");
        Ok(identity)
    }

    /// Full URL of the agent's executor API.
    pub fn executor_api_url(&self) -> String {
        let scheme = if self.ssl_enabled { "https" } else { "http" };
        format!("{scheme}://{}/api/v1/executor", self.agent_endpoint)
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "1" | "true")
}

/// Parse a duration in the agent's textual format, e.g. `"15mins"`,
/// `"2secs"`, `"2.5hrs"`, `"100ms"`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
    let (value, unit) = s.split_at(split);
    let value: f64 = value.parse().ok()?;

    let unit_nanos: f64 = match unit.trim() {
        "ns" => 1.0,
        "us" => 1e3,
        "ms" => 1e6,
        "secs" => 1e9,
        "mins" => 60e9,
        "hrs" => 3600e9,
        "days" => 86_400e9,
        "weeks" => 604_800e9,
        _ => return None,
    };

    let nanos = (value * unit_nanos).round();
    if !nanos.is_finite() || nanos < 0.0 || nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos as u64))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn full_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (ENV_SLAVE_PID, "slave(1)@10.0.0.1:5051".to_string()),
            (ENV_SLAVE_ID, "agent-1".to_string()),
            (ENV_AGENT_ENDPOINT, "10.0.0.1:5051".to_string()),
            (ENV_FRAMEWORK_ID, "framework-1".to_string()),
            (ENV_EXECUTOR_ID, "executor-1".to_string()),
            (ENV_SANDBOX, "/var/sandbox".to_string()),
            (ENV_CHECKPOINT, "1".to_string()),
            (ENV_RECOVERY_TIMEOUT, "15mins".to_string()),
            (ENV_SUBSCRIPTION_BACKOFF_MAX, "2secs".to_string()),
            (ENV_SHUTDOWN_GRACE_PERIOD, "5secs".to_string()),
        ])
    }

    fn resolve(env: &HashMap<&'static str, String>) -> Result<AgentIdentity> {
        AgentIdentity::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn resolves_complete_environment() {
        let identity = resolve(&full_env()).unwrap();

        assert_eq!(identity.framework_id, "framework-1");
        assert_eq!(identity.executor_id, "executor-1");
        assert_eq!(identity.agent_id, "agent-1");
        assert_eq!(identity.sandbox, PathBuf::from("/var/sandbox"));
        assert!(identity.checkpoint);
        assert!(!identity.ssl_enabled);
        assert_eq!(identity.recovery_timeout, Duration::from_secs(900));
        assert_eq!(identity.subscription_backoff_max, Duration::from_secs(2));
        assert_eq!(identity.shutdown_grace_period, Duration::from_secs(5));
        assert_eq!(
            identity.executor_api_url(),
            "http://10.0.0.1:5051/api/v1/executor"
        );
    }

    #[test]
    fn missing_framework_id_is_fatal() {
        let mut env = full_env();
        env.remove(ENV_FRAMEWORK_ID);

        match resolve(&env) {
            Err(ExecutorError::MissingEnv(name)) => assert_eq!(name, ENV_FRAMEWORK_ID),
            other => panic!("expected MissingEnv, got {other:?}"),
        }
    }

    #[test]
    fn empty_required_value_counts_as_missing() {
        let mut env = full_env();
        env.insert(ENV_AGENT_ENDPOINT, "   ".to_string());
        assert!(matches!(
            resolve(&env),
            Err(ExecutorError::MissingEnv(ENV_AGENT_ENDPOINT))
        ));
    }

    #[test]
    fn optional_values_default_when_absent_or_garbage() {
        let mut env = full_env();
        env.remove(ENV_CHECKPOINT);
        env.remove(ENV_SLAVE_ID);
        env.insert(ENV_RECOVERY_TIMEOUT, "soon".to_string());
        env.insert(ENV_SSL_ENABLED, "TRUE".to_string());

        let identity = resolve(&env).unwrap();
        assert!(!identity.checkpoint);
        assert!(identity.agent_id.is_empty());
        assert_eq!(identity.recovery_timeout, Duration::ZERO);
        assert!(identity.executor_api_url().starts_with("https://"));
    }

    #[test]
    fn parses_agent_duration_format() {
        assert_eq!(parse_duration("100ms"), Some(Duration::from_millis(100)));
        assert_eq!(parse_duration("2.5hrs"), Some(Duration::from_secs(9000)));
        assert_eq!(parse_duration("1weeks"), Some(Duration::from_secs(604_800)));
        assert_eq!(parse_duration("10us"), Some(Duration::from_micros(10)));
        assert_eq!(parse_duration("15"), None);
        assert_eq!(parse_duration("mins"), None);
        assert_eq!(parse_duration("3fortnights"), None);
    }
}
