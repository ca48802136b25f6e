//! Per-Tunnel lifecycle (§4.6): connect both sockets, verify if a secret is
//! configured, mark long-lived, then splice until either side ends.
//!
//! The state machine's `connecting` / `handshaking` / `local-wait` states
//! collapse into the sequence below rather than being named explicitly:
//! both connects race via `tokio::join!`, the handshake runs once the
//! remote side is up, and `piping` begins the moment both sockets and the
//! handshake (if any) have succeeded. A linear `?`-chain produces the same
//! observable transitions as the tryEmitConnect predicate without a
//! separate event bus.

use std::time::Duration;
use tokio::net::TcpStream;
use tunnel_proto::ClientConfig;

use crate::error::TunnelError;
use crate::handshake::send_handshake;
use crate::streams::{wrap_remote, RemoteStream};

/// Grace window for mutual destruction, matching the Proxy side (§4.3/§9).
pub(crate) const PAIR_GRACE: Duration = Duration::from_millis(500);

pub struct ConnectedTunnel {
    remote: RemoteStream,
    local: TcpStream,
}

/// Runs the `connecting` → `handshaking`/`local-wait` phases. Returns once
/// both sockets are open and verified, ready to enter `piping`.
pub async fn connect_tunnel(config: &ClientConfig) -> Result<ConnectedTunnel, TunnelError> {
    let (remote, local) = tokio::join!(
        TcpStream::connect((config.proxy_host.as_str(), config.tunnel_port)),
        TcpStream::connect((config.app_host.as_str(), config.app_port)),
    );
    let mut remote = remote.map_err(TunnelError::RemoteUnreachable)?;
    let local = local.map_err(TunnelError::LocalUnreachable)?;

    if let Some(secret) = &config.secret {
        send_handshake(&mut remote, secret, config.challenge_timeout).await?;
    }

    tunnel_net::set_long_lived(&remote)?;
    tunnel_net::set_long_lived(&local)?;

    let remote = wrap_remote(remote, config.tunnel_encryption.as_ref())?;

    Ok(ConnectedTunnel { remote, local })
}

/// Runs the `piping` state until either socket ends, then both are closed
/// as a unit (mutual destruction, §4.3/§9).
pub async fn run_connected(connected: ConnectedTunnel) {
    tunnel_net::splice_with_mutual_destruction(connected.local, connected.remote, PAIR_GRACE).await;
}
