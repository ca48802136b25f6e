use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid configuration: {0}")]
    Config(#[from] tunnel_proto::ConfigError),

    #[error("failed to parse TLS key/cert: {0}")]
    Tls(String),

    #[error("invalid bind address {0:?}:{1}")]
    InvalidBindAddress(String, u16),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
