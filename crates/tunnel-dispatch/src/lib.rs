//! Proxy side: Public Listener, Tunnel Listener, and the Dispatcher that
//! pairs them (§4.1-§4.3, §4.5).

mod dispatcher;
mod error;
mod handshake;
mod listener;
mod streams;
mod tls;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tunnel_proto::ProxyConfig;

pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use handshake::{receive_handshake, HandshakeError};
pub use streams::{wrap_tunnel, RequestStream, TunnelStream};

/// Validates `config`, then spawns the Public and Tunnel Listeners in the
/// background and returns. Lifecycle continues for the life of the process.
pub async fn start_proxy(config: ProxyConfig) -> Result<(), DispatchError> {
    let config = config.build()?;

    let tls_acceptor = if config.tls_enabled() {
        let key = config.tls_key.as_deref().expect("tls_enabled implies tls_key");
        let cert = config.tls_cert.as_deref().expect("tls_enabled implies tls_cert");
        Some(tls::build_acceptor(key, cert)?)
    } else {
        None
    };

    let dispatcher = Arc::new(Dispatcher::new());

    let public_addr: SocketAddr = format!("{}:{}", config.bind_host, config.proxy_port)
        .parse()
        .map_err(|_| DispatchError::InvalidBindAddress(config.bind_host.clone(), config.proxy_port))?;
    let tunnel_addr: SocketAddr = format!("{}:{}", config.bind_host, config.tunnel_port)
        .parse()
        .map_err(|_| DispatchError::InvalidBindAddress(config.bind_host.clone(), config.tunnel_port))?;

    info!(proxy_port = config.proxy_port, tunnel_port = config.tunnel_port, "starting proxy");

    tokio::spawn(listener::run_public_listener(
        public_addr,
        tls_acceptor,
        config.request_timeout,
        config.tunnel_encryption.clone(),
        dispatcher.clone(),
    ));

    tokio::spawn(listener::run_tunnel_listener(
        tunnel_addr,
        config.secret.clone(),
        config.challenge_timeout,
        config.tunnel_encryption.clone(),
        dispatcher,
    ));

    Ok(())
}
