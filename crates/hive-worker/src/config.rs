use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    affinity::available_cores,
    budget::JoinPolicy,
    error::{WorkerError, WorkerResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerConfig {
    /// Manager host name or IP address.
    pub server_addr: String,
    /// Manager port.
    pub port: u16,
    /// Core count announced in the handshake; also the most tasks the manager sends per batch.
    pub cores: usize,
    /// Initial deadline budget shared by all rounds (default: 12 seconds).
    pub max_time_ms: u64,
    /// Delay between connection attempts while the manager is not listening yet (default: 1 second).
    pub connect_retry_ms: u64,
    /// Join-timeout backoff.
    pub join: JoinPolicy,
    /// Pin execution units to cores `0..count`.
    pub pin_threads: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1".to_string(),
            port: 0,
            cores: available_cores(),
            max_time_ms: 12_000,
            connect_retry_ms: 1_000,
            join: JoinPolicy::default(),
            pin_threads: true,
        }
    }
}

impl WorkerConfig {
    pub fn new(server_addr: impl Into<String>, port: u16, cores: usize) -> Self {
        Self {
            server_addr: server_addr.into(),
            port,
            cores,
            ..Self::default()
        }
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time_ms = saturating_millis(max_time);
        self
    }

    pub fn with_connect_retry(mut self, retry: Duration) -> Self {
        self.connect_retry_ms = saturating_millis(retry);
        self
    }

    pub fn with_join_policy(mut self, join: JoinPolicy) -> Self {
        self.join = join;
        self
    }

    pub fn with_pinning(mut self, pin: bool) -> Self {
        self.pin_threads = pin;
        self
    }

    #[inline]
    pub fn max_time(&self) -> Duration {
        Duration::from_millis(self.max_time_ms)
    }

    #[inline]
    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }

    /// `host:port` form accepted by the resolver; bare IPv6 literals are bracketed.
    pub fn endpoint(&self) -> String {
        if self.server_addr.contains(':') && !self.server_addr.starts_with('[') {
            format!("[{}]:{}", self.server_addr, self.port)
        } else {
            format!("{}:{}", self.server_addr, self.port)
        }
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if self.server_addr.trim().is_empty() {
            return Err(WorkerError::Config("server address is empty".into()));
        }
        if self.port == 0 {
            return Err(WorkerError::Config("server port must be non-zero".into()));
        }
        if self.cores == 0 {
            return Err(WorkerError::Config("core count must be at least 1".into()));
        }
        if self.max_time_ms == 0 {
            return Err(WorkerError::Config("max time must be non-zero".into()));
        }
        Ok(())
    }
}

/// Whole milliseconds in `d`, clamped to `u64::MAX`.
fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_and_retry() {
        let cfg = WorkerConfig::new("localhost", 7000, 2);
        assert_eq!(cfg.max_time(), Duration::from_secs(12));
        assert_eq!(cfg.connect_retry(), Duration::from_secs(1));
        assert_eq!(cfg.join.extension(), Duration::from_secs(10));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_cores_is_rejected() {
        let cfg = WorkerConfig::new("localhost", 7000, 0);
        assert!(matches!(cfg.validate(), Err(WorkerError::Config(_))));
    }

    #[test]
    fn missing_port_is_rejected() {
        let cfg = WorkerConfig::new("localhost", 0, 1);
        assert!(matches!(cfg.validate(), Err(WorkerError::Config(_))));
    }

    #[test]
    fn endpoint_brackets_ipv6() {
        assert_eq!(WorkerConfig::new("::1", 9, 1).endpoint(), "[::1]:9");
        assert_eq!(WorkerConfig::new("10.0.0.1", 9, 1).endpoint(), "10.0.0.1:9");
    }

    #[test]
    fn json_uses_camel_case_and_defaults() {
        let cfg: WorkerConfig =
            serde_json::from_str(r#"{"serverAddr":"node-1","port":5555,"cores":3,"join":{"maxExtensions":4}}"#)
                .unwrap();
        assert_eq!(cfg.endpoint(), "node-1:5555");
        assert_eq!(cfg.cores, 3);
        assert_eq!(cfg.join.max_extensions, Some(4));
        assert_eq!(cfg.join.extension_ms, JoinPolicy::DEFAULT_EXTENSION_MS);
        assert_eq!(cfg.max_time_ms, 12_000);
    }

    #[test]
    fn oversized_durations_saturate() {
        let cfg = WorkerConfig::new("localhost", 7000, 1)
            .with_max_time(Duration::MAX)
            .with_connect_retry(Duration::MAX);
        assert_eq!(cfg.max_time_ms, u64::MAX);
        assert_eq!(cfg.connect_retry_ms, u64::MAX);
    }
}
