//! Optional symmetric-cipher framing of tunnel traffic (§4.4).
//!
//! Splicing itself never parses bytes; this module only XORs them through a
//! stream cipher keystream. Two independent cipher instances are created per
//! pairing — one for the encrypt direction, one for the decrypt direction —
//! so each direction advances its own keystream counter independently, the
//! way the distilled spec describes "encryptor + decryptor" as a pair rather
//! than a single duplex cipher.

use aes::Aes256;
use cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr64BE;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tunnel_proto::EncryptionConfig;

type Aes256Ctr = Ctr64BE<Aes256>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unsupported cipher {0:?}; only aes-256-ctr is implemented")]
    UnsupportedCipher(String),

    #[error("aes-256-ctr requires a 32-byte key, got {0}")]
    InvalidKeyLength(usize),

    #[error("aes-256-ctr requires a 16-byte iv, got {0}")]
    InvalidIvLength(usize),
}

fn new_cipher(config: &EncryptionConfig) -> Result<Aes256Ctr, CryptoError> {
    if config.cipher != EncryptionConfig::DEFAULT_CIPHER {
        return Err(CryptoError::UnsupportedCipher(config.cipher.clone()));
    }
    if config.key.len() != 32 {
        return Err(CryptoError::InvalidKeyLength(config.key.len()));
    }
    if config.iv.len() != 16 {
        return Err(CryptoError::InvalidIvLength(config.iv.len()));
    }
    Ok(Aes256Ctr::new(config.key.as_slice().into(), config.iv.as_slice().into()))
}

/// Wraps a byte stream so every read is decrypted and every write is
/// encrypted with an independent keystream, per §4.4.
pub struct CipherStream<S> {
    inner: S,
    encryptor: Aes256Ctr,
    decryptor: Aes256Ctr,
}

impl<S> CipherStream<S> {
    pub fn new(inner: S, config: &EncryptionConfig) -> Result<Self, CryptoError> {
        Ok(Self {
            inner,
            encryptor: new_cipher(config)?,
            decryptor: new_cipher(config)?,
        })
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for CipherStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let filled_before = buf.filled().len();
        let this = self.as_mut().get_mut();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.decryptor
                    .apply_keystream(&mut buf.filled_mut()[filled_before..]);
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for CipherStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.as_mut().get_mut();
        let mut scratch = data.to_vec();
        this.encryptor.apply_keystream(&mut scratch);
        Pin::new(&mut this.inner).poll_write(cx, &scratch)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn test_config() -> EncryptionConfig {
        EncryptionConfig {
            cipher: EncryptionConfig::DEFAULT_CIPHER.to_string(),
            key: vec![7u8; 32],
            iv: vec![9u8; 16],
        }
    }

    #[test]
    fn rejects_wrong_key_length() {
        let mut cfg = test_config();
        cfg.key = vec![0u8; 16];
        assert!(matches!(
            new_cipher(&cfg),
            Err(CryptoError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn rejects_unknown_cipher() {
        let mut cfg = test_config();
        cfg.cipher = "chacha20".to_string();
        assert!(matches!(new_cipher(&cfg), Err(CryptoError::UnsupportedCipher(_))));
    }

    #[tokio::test]
    async fn round_trips_through_a_pair_of_cipher_streams() {
        let config = test_config();
        let (client_raw, server_raw) = duplex(4096);

        let mut client = CipherStream::new(client_raw, &config).unwrap();
        let mut server = CipherStream::new(server_raw, &config).unwrap();

        let payload = b"GET / HTTP/1.1\r\n\r\n";
        client.write_all(payload).await.unwrap();
        client.flush().await.unwrap();

        let mut received = vec![0u8; payload.len()];
        server.read_exact(&mut received).await.unwrap();

        assert_eq!(&received, payload);
    }
}
