//! Public Listener (§4.1) and Tunnel Listener (§4.2): accept loops that
//! restart themselves on error, handing each connection off to its own task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};
use tunnel_proto::EncryptionConfig;

use crate::dispatcher::{Dispatcher, RequestOutcome, TunnelOutcome};
use crate::handshake::receive_handshake;
use crate::streams::{wrap_tunnel, RequestStream};

/// Grace window for mutual destruction once a pair is formed (§4.3/§9).
const PAIR_GRACE: Duration = Duration::from_millis(500);

/// Interval between liveness peeks on an idle, unpaired tunnel socket.
const IDLE_PEEK_INTERVAL: Duration = Duration::from_millis(200);

const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);

pub async fn run_public_listener(
    bind_addr: SocketAddr,
    tls_acceptor: Option<TlsAcceptor>,
    request_timeout: Duration,
    encryption: Option<EncryptionConfig>,
    dispatcher: Arc<Dispatcher>,
) {
    loop {
        let listener = match tunnel_net::bind_reuseaddr(bind_addr) {
            Ok(listener) => listener,
            Err(e) => {
                error!("public listener failed to bind {bind_addr}: {e}");
                tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                continue;
            }
        };
        info!("public listener on {bind_addr}");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let dispatcher = dispatcher.clone();
                    let tls_acceptor = tls_acceptor.clone();
                    let encryption = encryption.clone();
                    tokio::spawn(async move {
                        handle_request(stream, peer, tls_acceptor, request_timeout, encryption, dispatcher)
                            .await;
                    });
                }
                Err(e) => {
                    error!("public listener accept error: {e}; restarting listener");
                    break;
                }
            }
        }
    }
}

async fn handle_request(
    stream: TcpStream,
    peer: SocketAddr,
    tls_acceptor: Option<TlsAcceptor>,
    request_timeout: Duration,
    encryption: Option<EncryptionConfig>,
    dispatcher: Arc<Dispatcher>,
) {
    let stream = match tls_acceptor {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls) => RequestStream::Tls(Box::new(tls)),
            Err(e) => {
                warn!("tls handshake with request {peer} failed: {e}");
                return;
            }
        },
        None => RequestStream::Plain(stream),
    };

    let id = dispatcher.next_id();
    let my_stream = match dispatcher.offer_request(id, stream) {
        RequestOutcome::Paired => return,
        RequestOutcome::Queued(rx, my_stream) => match tokio::time::timeout(request_timeout, rx).await {
            Ok(Ok(tunnel_tcp)) => {
                match wrap_tunnel(tunnel_tcp, encryption.as_ref()) {
                    Ok(tunnel_stream) => {
                        tunnel_net::splice_with_mutual_destruction(my_stream, tunnel_stream, PAIR_GRACE).await;
                    }
                    Err(e) => error!("failed to frame tunnel for request {peer}: {e}"),
                }
                return;
            }
            Ok(Err(_)) => return,
            Err(_) => {
                dispatcher.retire_request(id);
                my_stream
            }
        },
    };
    drop(my_stream);
}

pub async fn run_tunnel_listener(
    bind_addr: SocketAddr,
    secret: Option<Vec<u8>>,
    challenge_timeout: Duration,
    encryption: Option<EncryptionConfig>,
    dispatcher: Arc<Dispatcher>,
) {
    loop {
        let listener = match tunnel_net::bind_reuseaddr(bind_addr) {
            Ok(listener) => listener,
            Err(e) => {
                error!("tunnel listener failed to bind {bind_addr}: {e}");
                tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                continue;
            }
        };
        info!("tunnel listener on {bind_addr}");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let dispatcher = dispatcher.clone();
                    let secret = secret.clone();
                    let encryption = encryption.clone();
                    tokio::spawn(async move {
                        handle_tunnel(stream, peer, secret, challenge_timeout, encryption, dispatcher).await;
                    });
                }
                Err(e) => {
                    error!("tunnel listener accept error: {e}; restarting listener");
                    break;
                }
            }
        }
    }
}

async fn handle_tunnel(
    mut stream: TcpStream,
    peer: SocketAddr,
    secret: Option<Vec<u8>>,
    challenge_timeout: Duration,
    encryption: Option<EncryptionConfig>,
    dispatcher: Arc<Dispatcher>,
) {
    if let Some(secret) = &secret {
        if let Err(e) = receive_handshake(&mut stream, secret, challenge_timeout).await {
            info!("tunnel handshake from {peer} failed: {e}");
            return;
        }
    }

    if let Err(e) = tunnel_net::set_long_lived(&stream) {
        warn!("failed to mark tunnel {peer} long-lived: {e}");
    }

    let id = dispatcher.next_id();
    match dispatcher.offer_tunnel(id, stream) {
        TunnelOutcome::Paired => {}
        TunnelOutcome::Queued(rx, my_stream) => {
            tokio::select! {
                result = rx => {
                    if let Ok(request_stream) = result {
                        match wrap_tunnel(my_stream, encryption.as_ref()) {
                            Ok(tunnel_stream) => {
                                tunnel_net::splice_with_mutual_destruction(request_stream, tunnel_stream, PAIR_GRACE).await;
                            }
                            Err(e) => error!("failed to frame tunnel {peer}: {e}"),
                        }
                    }
                }
                _ = watch_idle_close(&my_stream) => {
                    dispatcher.retire_tunnel(id);
                }
            }
        }
    }
}

/// Peeks an idle tunnel socket without consuming its read queue, so a
/// client-initiated close is noticed while the tunnel still sits unpaired.
async fn watch_idle_close(stream: &TcpStream) {
    let mut probe = [0u8; 1];
    loop {
        match stream.peek(&mut probe).await {
            Ok(0) => return,
            Ok(_) => tokio::time::sleep(IDLE_PEEK_INTERVAL).await,
            Err(_) => return,
        }
    }
}
