//! Tunnel Pool Manager (§4.7): boot probe, debounced refill on close, and
//! full-outage backoff, all driven from one sequential loop so there is
//! never more than one outstanding retry/debounce timer to collapse.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tunnel_proto::ClientConfig;

use crate::tunnel::{connect_tunnel, run_connected};

/// Debounce window after a tunnel close before re-evaluating pool size.
const REFILL_DEBOUNCE: Duration = Duration::from_millis(300);

pub async fn run_pool(config: Arc<ClientConfig>) {
    let (closed_tx, mut closed_rx) = mpsc::channel::<()>(config.pool_size.max(1));
    let mut open_count: usize = 0;
    let mut ever_connected = false;

    loop {
        if !ever_connected {
            match connect_tunnel(&config).await {
                Ok(connected) => {
                    ever_connected = true;
                    open_count += 1;
                    spawn_tunnel(connected, closed_tx.clone());
                    fill(&config, &mut open_count, &closed_tx).await;
                }
                Err(e) => {
                    warn!("probe tunnel failed: {e}; retrying in {:?}", config.reconnect_delay);
                    tokio::time::sleep(config.reconnect_delay).await;
                    continue;
                }
            }
        }

        // Block until the pool loses at least one tunnel, then debounce the
        // burst of closes that typically follows a proxy outage.
        if closed_rx.recv().await.is_none() {
            return;
        }
        open_count = open_count.saturating_sub(1);
        tokio::time::sleep(REFILL_DEBOUNCE).await;
        while closed_rx.try_recv().is_ok() {
            open_count = open_count.saturating_sub(1);
        }

        if open_count == 0 {
            info!("all tunnels are down");
            ever_connected = false;
            tokio::time::sleep(config.reconnect_delay).await;
        } else {
            fill(&config, &mut open_count, &closed_tx).await;
        }
    }
}

async fn fill(config: &ClientConfig, open_count: &mut usize, closed_tx: &mpsc::Sender<()>) {
    while *open_count < config.pool_size {
        match connect_tunnel(config).await {
            Ok(connected) => {
                *open_count += 1;
                spawn_tunnel(connected, closed_tx.clone());
            }
            Err(e) => {
                warn!("failed to open replacement tunnel: {e}");
                break;
            }
        }
    }
}

fn spawn_tunnel(connected: crate::tunnel::ConnectedTunnel, closed_tx: mpsc::Sender<()>) {
    tokio::spawn(async move {
        run_connected(connected).await;
        let _ = closed_tx.send(()).await;
    });
}
