//! Sender side of the challenge-response handshake (§4.5): write the secret,
//! read exactly one status byte, close on anything but VERIFIED.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tunnel_proto::handshake::HandshakeError;
use tunnel_proto::HandshakeStatus;

pub async fn send_handshake(
    stream: &mut TcpStream,
    secret: &[u8],
    timeout: Duration,
) -> Result<(), HandshakeError> {
    stream.write_all(secret).await?;

    let mut status = [0u8; 1];
    match tokio::time::timeout(timeout, stream.read_exact(&mut status)).await {
        Ok(Ok(_)) => match HandshakeStatus::from_byte(status[0]) {
            Some(HandshakeStatus::Verified) => Ok(()),
            Some(HandshakeStatus::Incorrect) => Err(HandshakeError::Incorrect),
            Some(HandshakeStatus::Empty) => Err(HandshakeError::Rejected(status[0])),
            None => Err(HandshakeError::Rejected(status[0])),
        },
        Ok(Err(e)) => Err(HandshakeError::Io(e)),
        Err(_) => Err(HandshakeError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (a, (b, _)) =
            tokio::join!(TcpStream::connect(addr), async { listener.accept().await.unwrap() });
        (a.unwrap(), b)
    }

    #[tokio::test]
    async fn succeeds_on_verified() {
        let (mut client, mut server) = pair().await;
        let respond = tokio::spawn(async move {
            let mut buf = [0u8; 7];
            server.read_exact(&mut buf).await.unwrap();
            server.write_all(&[HandshakeStatus::Verified.to_byte()]).await.unwrap();
        });

        send_handshake(&mut client, b"hunter2", Duration::from_millis(500))
            .await
            .unwrap();
        respond.await.unwrap();
    }

    #[tokio::test]
    async fn closes_on_incorrect() {
        let (mut client, mut server) = pair().await;
        let respond = tokio::spawn(async move {
            let mut buf = [0u8; 7];
            server.read_exact(&mut buf).await.unwrap();
            server.write_all(&[HandshakeStatus::Incorrect.to_byte()]).await.unwrap();
        });

        let result = send_handshake(&mut client, b"wrongpw", Duration::from_millis(500)).await;
        assert!(matches!(result, Err(HandshakeError::Incorrect)));
        respond.await.unwrap();
    }

    #[tokio::test]
    async fn rejects_on_timeout() {
        let (mut client, server) = pair().await;
        let result = send_handshake(&mut client, b"hunter2", Duration::from_millis(50)).await;
        assert!(matches!(result, Err(HandshakeError::Timeout)));
        drop(server);
    }
}
