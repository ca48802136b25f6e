//! The matching engine (§4.3): two FIFO queues, matched atomically under one
//! lock. Queue membership is a lightweight ticket — the socket itself stays
//! owned by the task that accepted it, handed across only once a match is
//! found.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tracing::info;

use crate::streams::RequestStream;

struct RequestTicket {
    id: u64,
    tx: oneshot::Sender<TcpStream>,
}

struct TunnelTicket {
    id: u64,
    tx: oneshot::Sender<RequestStream>,
}

#[derive(Default)]
struct State {
    idle_tunnels: VecDeque<TunnelTicket>,
    waiting_requests: VecDeque<RequestTicket>,
}

/// Outcome of offering a request to the Dispatcher.
pub enum RequestOutcome {
    /// An idle tunnel was waiting; this request's stream has already been
    /// handed to that tunnel's task, which will perform the splice.
    Paired,
    /// No idle tunnel was available. The caller must wait on the receiver
    /// for a tunnel (bounded by `requestTimeout`), still owning `stream`.
    Queued(oneshot::Receiver<TcpStream>, RequestStream),
}

/// Outcome of offering a tunnel to the Dispatcher.
pub enum TunnelOutcome {
    /// A waiting request already existed; this tunnel's stream has already
    /// been handed to that request's task.
    Paired,
    /// No request was waiting. The caller waits on the receiver indefinitely
    /// (idle tunnels have no timeout; see §4.8), still owning `stream`.
    Queued(oneshot::Receiver<RequestStream>, TcpStream),
}

pub struct Dispatcher {
    state: Mutex<State>,
    next_id: AtomicU64,
    any_tunnel_seen: AtomicBool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(1),
            any_tunnel_seen: AtomicBool::new(false),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn offer_request(&self, id: u64, stream: RequestStream) -> RequestOutcome {
        let mut state = self.state.lock().unwrap();
        if let Some(ticket) = state.idle_tunnels.pop_front() {
            self.log_if_pool_emptied(&state);
            let _ = ticket.tx.send(stream);
            RequestOutcome::Paired
        } else {
            let (tx, rx) = oneshot::channel();
            state.waiting_requests.push_back(RequestTicket { id, tx });
            RequestOutcome::Queued(rx, stream)
        }
    }

    pub fn offer_tunnel(&self, id: u64, stream: TcpStream) -> TunnelOutcome {
        if !self.any_tunnel_seen.swap(true, Ordering::Relaxed) {
            info!("app connected");
        }

        let mut state = self.state.lock().unwrap();
        if let Some(ticket) = state.waiting_requests.pop_front() {
            let _ = ticket.tx.send(stream);
            TunnelOutcome::Paired
        } else {
            let (tx, rx) = oneshot::channel();
            state.idle_tunnels.push_back(TunnelTicket { id, tx });
            TunnelOutcome::Queued(rx, stream)
        }
    }

    pub fn retire_request(&self, id: u64) {
        let mut state = self.state.lock().unwrap();
        state.waiting_requests.retain(|t| t.id != id);
    }

    pub fn retire_tunnel(&self, id: u64) {
        let mut state = self.state.lock().unwrap();
        state.idle_tunnels.retain(|t| t.id != id);
        self.log_if_pool_emptied(&state);
    }

    /// Must be called with `state` already locked, after a removal. Logs
    /// "app disconnected" once, the moment the idle pool empties out.
    fn log_if_pool_emptied(&self, state: &State) {
        if state.idle_tunnels.is_empty() {
            info!("app disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (a, (b, _)) =
            tokio::join!(TcpStream::connect(addr), async { listener.accept().await.unwrap() });
        (a.unwrap(), b)
    }

    #[tokio::test]
    async fn a_tunnel_arriving_first_is_queued_then_consumed_by_a_request() {
        let dispatcher = Dispatcher::new();
        let (_t_keep, t_stream) = tcp_pair().await;

        let tunnel_id = dispatcher.next_id();
        let outcome = dispatcher.offer_tunnel(tunnel_id, t_stream);
        let mut tunnel_rx = match outcome {
            TunnelOutcome::Paired => panic!("no request was waiting"),
            TunnelOutcome::Queued(rx, _stream) => rx,
        };

        let (_r_keep, r_stream) = tcp_pair().await;
        let request_id = dispatcher.next_id();
        match dispatcher.offer_request(request_id, RequestStream::Plain(r_stream)) {
            RequestOutcome::Paired => {}
            RequestOutcome::Queued(..) => panic!("the idle tunnel should have matched"),
        }

        tokio::time::timeout(std::time::Duration::from_millis(200), &mut tunnel_rx)
            .await
            .expect("tunnel should receive the request's stream")
            .unwrap();
    }

    #[tokio::test]
    async fn a_request_arriving_first_is_queued_then_consumed_by_a_tunnel() {
        let dispatcher = Dispatcher::new();
        let (_r_keep, r_stream) = tcp_pair().await;

        let request_id = dispatcher.next_id();
        let outcome = dispatcher.offer_request(request_id, RequestStream::Plain(r_stream));
        let mut request_rx = match outcome {
            RequestOutcome::Paired => panic!("no tunnel was waiting"),
            RequestOutcome::Queued(rx, _stream) => rx,
        };

        let (_t_keep, t_stream) = tcp_pair().await;
        let tunnel_id = dispatcher.next_id();
        match dispatcher.offer_tunnel(tunnel_id, t_stream) {
            TunnelOutcome::Paired => {}
            TunnelOutcome::Queued(..) => panic!("the waiting request should have matched"),
        }

        tokio::time::timeout(std::time::Duration::from_millis(200), &mut request_rx)
            .await
            .expect("request should receive the tunnel's stream")
            .unwrap();
    }

    #[tokio::test]
    async fn at_most_one_queue_is_non_empty_at_a_time() {
        let dispatcher = Dispatcher::new();
        let (_t_keep, t_stream) = tcp_pair().await;
        let tunnel_id = dispatcher.next_id();
        let _ = dispatcher.offer_tunnel(tunnel_id, t_stream);

        let state = dispatcher.state.lock().unwrap();
        assert_eq!(state.idle_tunnels.len(), 1);
        assert_eq!(state.waiting_requests.len(), 0);
    }

    #[tokio::test]
    async fn retiring_a_request_removes_it_and_is_benign_if_absent() {
        let dispatcher = Dispatcher::new();
        let (_r_keep, r_stream) = tcp_pair().await;
        let request_id = dispatcher.next_id();
        let _ = dispatcher.offer_request(request_id, RequestStream::Plain(r_stream));

        dispatcher.retire_request(request_id);
        dispatcher.retire_request(request_id);

        let state = dispatcher.state.lock().unwrap();
        assert_eq!(state.waiting_requests.len(), 0);
    }
}
