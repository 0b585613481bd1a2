//! HTTPS mode: self-signed and file-based certificates.

use reqwest::{Certificate, Client};
use rift_mock::matcher::path_ends_with;
use rift_mock::{MockServer, ServerOptions, RESPONSE_NOT_MOCKED};
use std::time::Duration;

fn trusting_client(server: &MockServer) -> Client {
    let der = server.certificate_der().expect("https server has a certificate");
    Client::builder()
        .no_proxy()
        .use_rustls_tls()
        .add_root_certificate(Certificate::from_der(der).unwrap())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_self_signed_https() {
    let server = MockServer::builder().https().start().await.unwrap();
    assert!(server.is_https());
    assert!(server.url().starts_with("https://127.0.0.1:"));
    assert!(server
        .certificate_pem()
        .unwrap()
        .starts_with("-----BEGIN CERTIFICATE-----"));
    assert!(server.root_cert_store().is_some());

    let client = trusting_client(&server);
    let sample_url = format!("{}sample", server.url());

    let response = client.get(&sample_url).send().await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), RESPONSE_NOT_MOCKED);

    server.when_get(path_ends_with("sample")).then_return_string("secure");
    let response = client.get(&sample_url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "secure");

    assert!(server.verify_get(path_ends_with("sample")).exactly(2).is_ok());
}

#[tokio::test]
async fn test_untrusted_client_is_rejected() {
    let server = MockServer::builder().https().start().await.unwrap();
    let client = Client::builder()
        .no_proxy()
        .use_rustls_tls()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    assert!(client.get(server.url()).send().await.is_err());
    // The failed handshake never reaches the dispatcher
    assert!(server.request_history().is_empty());
}

#[tokio::test]
async fn test_certificate_from_pem_files() {
    let rcgen::CertifiedKey { cert, key_pair } = rcgen::generate_simple_self_signed(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cert_path = dir.path().join("cert.pem");
    let key_path = dir.path().join("key.pem");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

    let options = ServerOptions::https().with_tls(
        cert_path.to_str().unwrap(),
        key_path.to_str().unwrap(),
    );
    let server = MockServer::builder().options(options).start().await.unwrap();
    assert_eq!(server.certificate_der().unwrap(), cert.der().as_ref());

    server.when_get(path_ends_with("sample")).then_return_string("from files");
    let response = trusting_client(&server)
        .get(format!("{}sample", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "from files");
}

#[tokio::test]
async fn test_invalid_tls_files_fail_startup() {
    let options = ServerOptions::https().with_tls("/nonexistent/cert.pem", "/nonexistent/key.pem");
    let err = MockServer::builder().options(options).start().await.unwrap_err();
    assert!(matches!(err, rift_mock::ServerError::Tls(_)));
    assert!(err.to_string().contains("/nonexistent/cert.pem"));
}
