//! Receiver side of the challenge-response handshake (§4.5). Runs on a
//! freshly accepted tunnel socket before it is ever offered to the
//! Dispatcher.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tunnel_proto::HandshakeStatus;

pub use tunnel_proto::handshake::HandshakeError;

/// Reads exactly `secret.len()` bytes within `timeout` and writes back the
/// matching status byte. Returns `Ok(())` only on `Verified`.
pub async fn receive_handshake(
    stream: &mut TcpStream,
    secret: &[u8],
    timeout: Duration,
) -> Result<(), HandshakeError> {
    let mut received = vec![0u8; secret.len()];
    let status = match tokio::time::timeout(timeout, stream.read_exact(&mut received)).await {
        Ok(Ok(_)) if received == secret => HandshakeStatus::Verified,
        Ok(Ok(_)) => HandshakeStatus::Incorrect,
        Ok(Err(_)) | Err(_) => HandshakeStatus::Empty,
    };

    stream.write_all(&[status.to_byte()]).await?;

    match status {
        HandshakeStatus::Verified => Ok(()),
        HandshakeStatus::Incorrect => Err(HandshakeError::Incorrect),
        HandshakeStatus::Empty => Err(HandshakeError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, (server, _)) =
            tokio::join!(TcpStream::connect(addr), async { listener.accept().await.unwrap() });
        (client.unwrap(), server)
    }

    #[tokio::test]
    async fn verifies_a_matching_secret() {
        let (mut client, mut server) = pair().await;
        let send = tokio::spawn(async move {
            client.write_all(b"hunter2").await.unwrap();
            let mut status = [0u8; 1];
            client.read_exact(&mut status).await.unwrap();
            status[0]
        });

        receive_handshake(&mut server, b"hunter2", Duration::from_millis(500))
            .await
            .unwrap();

        assert_eq!(send.await.unwrap(), HandshakeStatus::Verified.to_byte());
    }

    #[tokio::test]
    async fn rejects_a_wrong_secret_and_does_not_close_the_listener() {
        let (mut client, mut server) = pair().await;
        let send = tokio::spawn(async move {
            client.write_all(b"wrongpw").await.unwrap();
            let mut status = [0u8; 1];
            client.read_exact(&mut status).await.unwrap();
            status[0]
        });

        let result = receive_handshake(&mut server, b"hunter2", Duration::from_millis(500)).await;

        assert!(matches!(result, Err(HandshakeError::Incorrect)));
        assert_eq!(send.await.unwrap(), HandshakeStatus::Incorrect.to_byte());
    }

    #[tokio::test]
    async fn empty_handshake_times_out_and_reports_empty() {
        let (client, mut server) = pair().await;

        let result = receive_handshake(&mut server, b"hunter2", Duration::from_millis(50)).await;

        assert!(matches!(result, Err(HandshakeError::Timeout)));
        drop(client);
    }
}
