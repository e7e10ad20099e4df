use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ManagerError, ManagerResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagerConfig {
    /// Address to listen on for worker connections.
    pub listen_addr: String,
    /// Port to listen on; `0` picks an ephemeral port (see [`crate::Manager::local_addr`]).
    pub port: u16,
    /// Wall-clock budget for dispatching every task and collecting every answer.
    pub max_time_ms: u64,
    /// Exact number of workers that must connect before any task is sent.
    pub num_nodes: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            port: 0,
            max_time_ms: 60_000,
            num_nodes: 1,
        }
    }
}

impl ManagerConfig {
    pub fn new(listen_addr: impl Into<String>, port: u16, max_seconds: u64, num_nodes: usize) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            port,
            max_time_ms: max_seconds.saturating_mul(1_000),
            num_nodes,
        }
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time_ms = saturating_millis(max_time);
        self
    }

    #[inline]
    pub fn max_time(&self) -> Duration {
        Duration::from_millis(self.max_time_ms)
    }

    /// `host:port` form accepted by the resolver; bare IPv6 literals are bracketed.
    pub fn endpoint(&self) -> String {
        if self.listen_addr.contains(':') && !self.listen_addr.starts_with('[') {
            format!("[{}]:{}", self.listen_addr, self.port)
        } else {
            format!("{}:{}", self.listen_addr, self.port)
        }
    }

    pub fn validate(&self) -> ManagerResult<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(ManagerError::Config("listen address is empty".into()));
        }
        if self.num_nodes == 0 {
            return Err(ManagerError::Config("number of nodes must be at least 1".into()));
        }
        if self.max_time_ms == 0 {
            return Err(ManagerError::Config("max time must be non-zero".into()));
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
    fn seconds_are_converted() {
        let cfg = ManagerConfig::new("127.0.0.1", 9000, 5, 2);
        assert_eq!(cfg.max_time(), Duration::from_secs(5));
        assert_eq!(cfg.endpoint(), "127.0.0.1:9000");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_nodes_is_rejected() {
        let cfg = ManagerConfig::new("127.0.0.1", 9000, 5, 0);
        assert!(matches!(cfg.validate(), Err(ManagerError::Config(_))));
    }

    #[test]
    fn zero_time_is_rejected() {
        let cfg = ManagerConfig::new("127.0.0.1", 9000, 0, 1);
        assert!(matches!(cfg.validate(), Err(ManagerError::Config(_))));
    }

    #[test]
    fn json_round_trip() {
        let cfg = ManagerConfig::new("::", 7000, 3, 4);
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains(r#""numNodes":4"#));
        assert!(json.contains(r#""maxTimeMs":3000"#));

        let back: ManagerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
        assert_eq!(back.endpoint(), "[::]:7000");
    }

    #[test]
    fn oversized_duration_saturates() {
        let cfg = ManagerConfig::default().with_max_time(Duration::MAX);
        assert_eq!(cfg.max_time_ms, u64::MAX);
        assert_eq!(ManagerConfig::default().with_max_time(Duration::from_millis(1500)).max_time_ms, 1500);
    }
}
