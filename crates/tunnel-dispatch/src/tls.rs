//! Builds the public listener's TLS acceptor from already-loaded key/cert
//! bytes. Reading those bytes off disk is the CLI binary's job, not ours.

use std::sync::Arc;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::error::DispatchError;

pub fn build_acceptor(key: &[u8], cert: &[u8]) -> Result<TlsAcceptor, DispatchError> {
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut &cert[..])
        .collect::<Result<_, _>>()
        .map_err(|e| DispatchError::Tls(e.to_string()))?;
    if certs.is_empty() {
        return Err(DispatchError::Tls("no certificates found in tlsCert".into()));
    }

    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut &key[..])
        .map_err(|e| DispatchError::Tls(e.to_string()))?
        .ok_or_else(|| DispatchError::Tls("no private key found in tlsKey".into()))?;

    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| DispatchError::Tls(e.to_string()))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
