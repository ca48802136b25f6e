//! Client side: the Tunnel Pool Manager and the per-Tunnel lifecycle it
//! drives (§4.6, §4.7).

mod error;
mod handshake;
mod pool;
mod streams;
mod tunnel;

use std::sync::Arc;
use tunnel_proto::ClientConfig;

pub use error::{PoolError, TunnelError};
pub use handshake::send_handshake;
pub use tunnel::{connect_tunnel, run_connected, ConnectedTunnel};

/// Validates `config`, then spawns the Tunnel Pool Manager in the
/// background and returns. Lifecycle continues for the life of the process.
pub async fn start_client(config: ClientConfig) -> Result<(), PoolError> {
    let config = config.build()?;
    tokio::spawn(pool::run_pool(Arc::new(config)));
    Ok(())
}
