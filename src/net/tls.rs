//! TLS configuration and certificate loading for the HTTPS listener.

use std::fs;
use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::schema::TlsConfig;

/// Check that `cert_path` holds at least one certificate and `key_path` a
/// private key, so a bad PEM fails at startup instead of on first handshake.
pub fn check_pem_files(cert_path: &Path, key_path: &Path) -> io::Result<usize> {
    let certs = rustls_pemfile::certs(&mut fs::read(cert_path)?.as_slice())
        .collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no certificates in {}", cert_path.display()),
        ));
    }

    if rustls_pemfile::private_key(&mut fs::read(key_path)?.as_slice())?.is_none() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no private key in {}", key_path.display()),
        ));
    }
    Ok(certs.len())
}

/// Load the listener TLS configuration.
pub async fn load_tls_config(tls: &TlsConfig) -> io::Result<RustlsConfig> {
    let cert_path = Path::new(&tls.cert_path);
    let key_path = Path::new(&tls.key_path);
    let certs = check_pem_files(cert_path, key_path)?;
    tracing::debug!(cert = %cert_path.display(), certificates = certs, "Loaded listener TLS material");
    RustlsConfig::from_pem_file(cert_path, key_path).await
}
