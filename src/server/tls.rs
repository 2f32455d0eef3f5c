//! TLS listener support.

use crate::error::{Error, Result};
use rustls::pki_types::CertificateDer;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Load a certificate chain and private key into a TLS acceptor. Any failure
/// here is fatal at startup.
pub fn create_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor> {
    let cert_file = std::fs::File::open(cert_path).map_err(|e| {
        Error::Config(format!(
            "cannot open certificate file {}: {e}",
            cert_path.display()
        ))
    })?;
    let mut cert_reader = std::io::BufReader::new(cert_file);
    let certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| {
            Error::Config(format!(
                "cannot parse certificate file {}: {e}",
                cert_path.display()
            ))
        })?;
    if certs.is_empty() {
        return Err(Error::Config(format!(
            "no certificates found in {}",
            cert_path.display()
        )));
    }

    let key_file = std::fs::File::open(key_path).map_err(|e| {
        Error::Config(format!(
            "cannot open certificate key file {}: {e}",
            key_path.display()
        ))
    })?;
    let mut key_reader = std::io::BufReader::new(key_file);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| {
            Error::Config(format!(
                "cannot parse certificate key file {}: {e}",
                key_path.display()
            ))
        })?
        .ok_or_else(|| {
            Error::Config(format!("no private key found in {}", key_path.display()))
        })?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::Config(format!("cannot build TLS configuration: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
