use std::time::Duration;

/// Configuration for client discovery, connection and pairing behavior.
#[derive(Debug, Clone)]
pub struct AirPlayConfig {
    /// Timeout for device discovery scan (default: 5 seconds)
    pub discovery_timeout: Duration,

    /// Timeout for connection attempts (default: 10 seconds)
    pub connection_timeout: Duration,

    /// Enable debug logging of protocol messages
    pub debug_protocol: bool,

    /// Number of reconnection attempts (default: 3)
    pub reconnect_attempts: u32,

    /// Delay between reconnection attempts (default: 1 second)
    pub reconnect_delay: Duration,

    /// Path to store persistent pairing keys (None = transient only)
    pub pairing_storage_path: Option<std::path::PathBuf>,

    /// Optional PIN for pairing (if the device requires one)
    pub pin: Option<String>,
}

impl Default for AirPlayConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(5),
            connection_timeout: Duration::from_secs(10),
            debug_protocol: false,
            reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(1),
            pairing_storage_path: None,
            pin: None,
        }
    }
}

impl AirPlayConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> AirPlayConfigBuilder {
        AirPlayConfigBuilder::default()
    }
}

/// Builder for `AirPlayConfig`
#[derive(Debug, Clone, Default)]
pub struct AirPlayConfigBuilder {
    config: AirPlayConfig,
}

impl AirPlayConfigBuilder {
    /// Set discovery timeout
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.discovery_timeout = timeout;
        self
    }

    /// Set connection timeout
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Enable protocol debug logging
    #[must_use]
    pub fn debug_protocol(mut self, enable: bool) -> Self {
        self.config.debug_protocol = enable;
        self
    }

    /// Set number of reconnection attempts
    #[must_use]
    pub fn reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.reconnect_attempts = attempts;
        self
    }

    /// Set delay between reconnection attempts
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// Set pairing storage path for persistent pairing
    #[must_use]
    pub fn pairing_storage(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config.pairing_storage_path = Some(path.into());
        self
    }

    /// Set PIN for pairing
    #[must_use]
    pub fn pin(mut self, pin: impl Into<String>) -> Self {
        self.config.pin = Some(pin.into());
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> AirPlayConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_teacher_values() {
        let config = AirPlayConfig::default();
        assert_eq!(config.discovery_timeout, Duration::from_secs(5));
        assert_eq!(config.connection_timeout, Duration::from_secs(10));
        assert!(!config.debug_protocol);
        assert_eq!(config.reconnect_attempts, 3);
        assert!(config.pairing_storage_path.is_none());
        assert!(config.pin.is_none());
    }

    #[test]
    fn builder_overrides_defaults() {
        let path = std::path::PathBuf::from("/tmp/pairing");
        let config = AirPlayConfig::builder()
            .discovery_timeout(Duration::from_secs(2))
            .pin("1234")
            .pairing_storage(path.clone())
            .build();
        assert_eq!(config.discovery_timeout, Duration::from_secs(2));
        assert_eq!(config.pin.as_deref(), Some("1234"));
        assert_eq!(config.pairing_storage_path, Some(path));
    }
}
