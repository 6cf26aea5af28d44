//! Monitoring configuration

use std::time::Duration;

/// Default maximum number of origin hops followed when forwarding
pub const DEFAULT_MAX_ORIGIN_DEPTH: usize = 8;

/// Monitoring configuration options
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Maximum origin hops a counter event is forwarded through.
    /// Chains longer than this (or cyclic chains) are cut.
    pub max_origin_depth: usize,

    /// Interval between periodic reports
    pub report_interval: Duration,

    /// Log viewer connect/disconnect at info level
    pub log_sessions: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            max_origin_depth: DEFAULT_MAX_ORIGIN_DEPTH,
            report_interval: Duration::from_secs(60),
            log_sessions: true,
        }
    }
}

impl MonitoringConfig {
    /// Set the maximum origin chain depth
    pub fn max_origin_depth(mut self, depth: usize) -> Self {
        self.max_origin_depth = depth.max(1);
        self
    }

    /// Set the periodic report interval
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Don't log individual viewer sessions
    pub fn quiet_sessions(mut self) -> Self {
        self.log_sessions = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitoringConfig::default();

        assert_eq!(config.max_origin_depth, DEFAULT_MAX_ORIGIN_DEPTH);
        assert_eq!(config.report_interval, Duration::from_secs(60));
        assert!(config.log_sessions);
    }

    #[test]
    fn test_builder_max_origin_depth_floor() {
        // At least one hop is always followed
        let config = MonitoringConfig::default().max_origin_depth(0);

        assert_eq!(config.max_origin_depth, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = MonitoringConfig::default()
            .max_origin_depth(2)
            .report_interval(Duration::from_secs(5))
            .quiet_sessions();

        assert_eq!(config.max_origin_depth, 2);
        assert_eq!(config.report_interval, Duration::from_secs(5));
        assert!(!config.log_sessions);
    }
}
