//! TLS material for HTTPS mode.
//!
//! Either loads a PEM certificate chain and key from disk or generates a
//! self-signed certificate for `localhost` and `127.0.0.1`. The leaf
//! certificate is kept so clients can trust it.

use anyhow::Context;
use rcgen::CertifiedKey;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Subject names of the generated certificate.
pub const SELF_SIGNED_NAMES: &[&str] = &["localhost", "127.0.0.1"];

pub(crate) struct TlsIdentity {
    pub(crate) acceptor: TlsAcceptor,
    pub(crate) certificate_der: Vec<u8>,
    pub(crate) certificate_pem: String,
}

impl TlsIdentity {
    /// Load the certificate chain and private key from PEM files.
    pub(crate) fn from_pem_files(cert_path: &str, key_path: &str) -> anyhow::Result<Self> {
        let cert_pem = std::fs::read_to_string(cert_path)
            .with_context(|| format!("Failed to open certificate file '{cert_path}'"))?;
        let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_pem.as_bytes())
            .collect::<Result<_, _>>()
            .context("Failed to parse certificate file")?;
        let Some(leaf) = certs.first() else {
            anyhow::bail!("No certificates found in certificate file: {cert_path}");
        };
        let certificate_der = leaf.as_ref().to_vec();

        let key_pem = std::fs::read(key_path)
            .with_context(|| format!("Failed to open private key file '{key_path}'"))?;
        // PKCS8, RSA or SEC1 keys
        let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
            .context("Failed to parse private key file")?
            .ok_or_else(|| anyhow::anyhow!("No private key found in key file: {key_path}"))?;

        Ok(Self {
            acceptor: create_tls_acceptor(certs, key)?,
            certificate_der,
            certificate_pem: cert_pem,
        })
    }

    /// Generate a fresh self-signed certificate.
    pub(crate) fn self_signed() -> anyhow::Result<Self> {
        let names: Vec<String> = SELF_SIGNED_NAMES.iter().map(|n| n.to_string()).collect();
        let CertifiedKey { cert, key_pair } = rcgen::generate_simple_self_signed(names)
            .context("Failed to generate self-signed certificate")?;

        let certificate_der = cert.der().to_vec();
        let certificate_pem = cert.pem();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

        Ok(Self {
            acceptor: create_tls_acceptor(vec![cert.der().clone()], key)?,
            certificate_der,
            certificate_pem,
        })
    }
}

/// Build a TLS acceptor for `certs` and `key`.
///
/// The ring provider is selected explicitly, so no process-wide default
/// provider needs to be installed.
fn create_tls_acceptor(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> anyhow::Result<TlsAcceptor> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("Failed to select TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("Failed to build TLS configuration")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_self_signed_identity() {
        let identity = TlsIdentity::self_signed().unwrap();
        assert!(!identity.certificate_der.is_empty());
        assert!(identity
            .certificate_pem
            .starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn test_load_generated_pem_files() {
        let CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::File::create(&cert_path)
            .unwrap()
            .write_all(cert.pem().as_bytes())
            .unwrap();
        std::fs::File::create(&key_path)
            .unwrap()
            .write_all(key_pair.serialize_pem().as_bytes())
            .unwrap();

        let identity = TlsIdentity::from_pem_files(
            cert_path.to_str().unwrap(),
            key_path.to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(identity.certificate_der, cert.der().to_vec());
    }

    #[test]
    fn test_missing_certificate_file() {
        let err = TlsIdentity::from_pem_files("/nonexistent/cert.pem", "/nonexistent/key.pem")
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/cert.pem"));
    }

    #[test]
    fn test_empty_certificate_file() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("empty.pem");
        std::fs::File::create(&cert_path).unwrap();
        let err = TlsIdentity::from_pem_files(cert_path.to_str().unwrap(), "unused")
            .err()
            .unwrap();
        assert!(err.to_string().contains("No certificates found"));
    }
}
