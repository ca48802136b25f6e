//! Long-lived socket policy (§4.8): disable the idle timeout and enable TCP
//! keep-alive with a ~10s interval. Applied to tunnel sockets once they are
//! accepted/verified; request sockets retain `requestTimeout` instead.

use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

pub fn set_long_lived(stream: &TcpStream) -> io::Result<()> {
    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(KEEPALIVE_INTERVAL)
        .with_interval(KEEPALIVE_INTERVAL);
    sock.set_tcp_keepalive(&keepalive)
}
