//! Bidirectional byte splicing with mutual destruction (§4.3, §4.4 raw mode).
//!
//! Each direction of the pair copies independently. When either direction's
//! copy loop ends — its reader hit EOF, or its writer errored — the pair is
//! given a short grace window to wind down on its own (the still-running
//! direction usually notices its own peer went away almost immediately,
//! since half of the same sockets are shared across both copy tasks) before
//! being hard-aborted. This mirrors the source's paired `end`/`close`
//! listeners plus a force-destroy timer (§9).

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{copy, split, AsyncRead, AsyncWrite};
use tokio::sync::Notify;

/// Splice `a` and `b` together until either direction ends, then destroy
/// both sides within `grace` of that first ending.
pub async fn splice_with_mutual_destruction<A, B>(a: A, b: B, grace: Duration)
where
    A: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    B: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut a_read, mut a_write) = split(a);
    let (mut b_read, mut b_write) = split(b);

    let done = Arc::new(Notify::new());

    let done_a = done.clone();
    let a_to_b = tokio::spawn(async move {
        let _ = copy(&mut a_read, &mut b_write).await;
        done_a.notify_one();
    });

    let done_b = done.clone();
    let b_to_a = tokio::spawn(async move {
        let _ = copy(&mut b_read, &mut a_write).await;
        done_b.notify_one();
    });

    done.notified().await;
    tokio::time::sleep(grace).await;

    a_to_b.abort();
    b_to_a.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn relays_bytes_in_both_directions() {
        let (mut public_near, public_far) = duplex(64);
        let (tunnel_near, mut tunnel_far) = duplex(64);

        tokio::spawn(splice_with_mutual_destruction(
            public_far,
            tunnel_near,
            Duration::from_millis(50),
        ));

        public_near.write_all(b"PING\n").await.unwrap();
        let mut buf = [0u8; 5];
        tunnel_far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PING\n");

        tunnel_far.write_all(b"PONG\n").await.unwrap();
        let mut buf = [0u8; 5];
        public_near.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PONG\n");
    }

    #[tokio::test]
    async fn closing_one_side_tears_down_the_pair_within_the_grace_window() {
        let (public_near, public_far) = duplex(64);
        let (tunnel_near, tunnel_far) = duplex(64);

        let handle = tokio::spawn(splice_with_mutual_destruction(
            public_far,
            tunnel_near,
            Duration::from_millis(50),
        ));

        drop(public_near);

        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("mutual destruction should complete within the grace window")
            .unwrap();

        drop(tunnel_far);
    }
}
