use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid configuration: {0}")]
    Config(#[from] tunnel_proto::ConfigError),
}

/// Failure of a single tunnel's connect-and-verify phase (§4.6, connecting
/// and handshaking states). Always recoverable at the pool layer; never
/// propagates past `connect_tunnel`.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("could not reach proxy at tunnel port: {0}")]
    RemoteUnreachable(#[source] std::io::Error),

    #[error("could not reach local app: {0}")]
    LocalUnreachable(#[source] std::io::Error),

    #[error("handshake with proxy failed: {0}")]
    Handshake(#[from] tunnel_proto::handshake::HandshakeError),

    #[error("failed to frame tunnel traffic: {0}")]
    Crypto(#[from] tunnel_crypto::CryptoError),

    #[error("failed to apply long-lived socket policy: {0}")]
    Io(#[from] std::io::Error),
}
