//! Proxy/Client configuration surfaces (§6) and their one-time validation.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("proxyPort and tunnelPort must differ, both were {0}")]
    PortsCollide(u16),

    #[error("tunnelEncryption requires cipher, key and iv to all be non-empty")]
    IncompleteEncryption,

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Symmetric cipher used to frame tunnel traffic end to end (§4.4).
///
/// The IV is fixed per configuration, not per pairing — see the open question
/// in §4.4/§9 about the confidentiality cost of that choice.
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    pub cipher: String,
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl EncryptionConfig {
    pub const DEFAULT_CIPHER: &'static str = "aes-256-ctr";

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cipher.is_empty() || self.key.is_empty() || self.iv.is_empty() {
            return Err(ConfigError::IncompleteEncryption);
        }
        Ok(())
    }
}

/// Proxy-side configuration (§6). Only `proxy_port`/`tunnel_port` are required;
/// everything else has the defaults named in the distilled spec.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub proxy_port: u16,
    pub tunnel_port: u16,
    pub bind_host: String,
    pub tls_key: Option<Vec<u8>>,
    pub tls_cert: Option<Vec<u8>>,
    pub tunnel_encryption: Option<EncryptionConfig>,
    pub secret: Option<Vec<u8>>,
    pub challenge_timeout: Duration,
    pub request_timeout: Duration,
}

impl ProxyConfig {
    pub fn new(proxy_port: u16, tunnel_port: u16) -> Self {
        Self {
            proxy_port,
            tunnel_port,
            bind_host: "0.0.0.0".to_string(),
            tls_key: None,
            tls_cert: None,
            tunnel_encryption: None,
            secret: None,
            challenge_timeout: Duration::from_millis(4000),
            request_timeout: Duration::from_millis(5000),
        }
    }

    /// Whether the public listener should terminate TLS (both key and cert present).
    pub fn tls_enabled(&self) -> bool {
        self.tls_key.is_some() && self.tls_cert.is_some()
    }

    /// Validate and return a usable config. Mirrors the teacher's
    /// builder-validates-once convention.
    pub fn build(self) -> Result<Self, ConfigError> {
        if self.proxy_port == self.tunnel_port {
            return Err(ConfigError::PortsCollide(self.proxy_port));
        }
        if let Some(enc) = &self.tunnel_encryption {
            enc.validate()?;
        }
        Ok(self)
    }
}

/// Client-side configuration (§6).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub proxy_host: String,
    pub tunnel_port: u16,
    pub app_host: String,
    pub app_port: u16,
    pub tunnel_encryption: Option<EncryptionConfig>,
    pub secret: Option<Vec<u8>>,
    pub challenge_timeout: Duration,
    pub pool_size: usize,
    pub reconnect_delay: Duration,
}

impl ClientConfig {
    pub fn new(proxy_host: impl Into<String>, tunnel_port: u16, app_port: u16) -> Self {
        Self {
            proxy_host: proxy_host.into(),
            tunnel_port,
            app_host: "localhost".to_string(),
            app_port,
            tunnel_encryption: None,
            secret: None,
            challenge_timeout: Duration::from_millis(4000),
            pool_size: 20,
            reconnect_delay: Duration::from_millis(5000),
        }
    }

    pub fn build(self) -> Result<Self, ConfigError> {
        if self.proxy_host.is_empty() {
            return Err(ConfigError::MissingField("proxyHost"));
        }
        if let Some(enc) = &self.tunnel_encryption {
            enc.validate()?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ports_are_rejected() {
        let err = ProxyConfig::new(9000, 9000).build().unwrap_err();
        assert!(matches!(err, ConfigError::PortsCollide(9000)));
    }

    #[test]
    fn distinct_ports_build_cleanly() {
        let cfg = ProxyConfig::new(8080, 8081).build().unwrap();
        assert_eq!(cfg.proxy_port, 8080);
        assert_eq!(cfg.tunnel_port, 8081);
        assert!(!cfg.tls_enabled());
    }

    #[test]
    fn tls_enabled_requires_both_key_and_cert() {
        let mut cfg = ProxyConfig::new(1, 2);
        cfg.tls_key = Some(vec![1]);
        assert!(!cfg.tls_enabled());
        cfg.tls_cert = Some(vec![2]);
        assert!(cfg.tls_enabled());
    }

    #[test]
    fn incomplete_encryption_is_rejected() {
        let mut cfg = ProxyConfig::new(1, 2);
        cfg.tunnel_encryption = Some(EncryptionConfig {
            cipher: "aes-256-ctr".to_string(),
            key: vec![],
            iv: vec![0; 16],
        });
        assert!(matches!(
            cfg.build().unwrap_err(),
            ConfigError::IncompleteEncryption
        ));
    }

    #[test]
    fn client_defaults_match_spec() {
        let cfg = ClientConfig::new("proxy.example.com", 9001, 3000)
            .build()
            .unwrap();
        assert_eq!(cfg.app_host, "localhost");
        assert_eq!(cfg.pool_size, 20);
        assert_eq!(cfg.reconnect_delay, Duration::from_millis(5000));
        assert_eq!(cfg.challenge_timeout, Duration::from_millis(4000));
    }

    #[test]
    fn empty_proxy_host_is_rejected() {
        let err = ClientConfig::new("", 1, 2).build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("proxyHost")));
    }
}
