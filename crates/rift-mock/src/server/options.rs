use serde::{Deserialize, Serialize};
use std::time::Duration;

/// PEM certificate chain and private key presented in HTTPS mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

/// Listener options.
///
/// In HTTPS mode without a [`TlsConfig`] a self-signed certificate for
/// `localhost` and `127.0.0.1` is generated at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerOptions {
    pub use_https: bool,
    pub host: String,
    /// 0 lets the OS assign an ephemeral port
    pub port: u16,
    pub tls: Option<TlsConfig>,
    /// How long `start_blocking` waits for the listener
    pub start_timeout_ms: u64,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            use_https: false,
            host: "127.0.0.1".to_string(),
            port: 0,
            tls: None,
            start_timeout_ms: 60_000,
        }
    }
}

impl ServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn https() -> Self {
        Self::default().with_https(true)
    }

    pub fn with_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_tls(mut self, cert_path: impl Into<String>, key_path: impl Into<String>) -> Self {
        self.tls = Some(TlsConfig {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_https {
            "https"
        } else {
            "http"
        }
    }
}
