//! Mock server lifecycle.
//!
//! A [`MockServer`] owns the listener, the dispatcher and the base URL. Each
//! instance is independent, so tests can run their own servers in parallel.
//!
//! ```no_run
//! # async fn demo() -> Result<(), rift_mock::ServerError> {
//! use rift_mock::matcher::path_ends_with;
//! use rift_mock::MockServer;
//!
//! let server = MockServer::builder().start().await?;
//! server.when_get(path_ends_with("users")).then_return_string("[]");
//! // ... drive the code under test against server.url() ...
//! server.verify_get(path_ends_with("users")).invoked().ok();
//! server.shutdown();
//! # Ok(())
//! # }
//! ```

mod handler;
mod options;
mod tls;

pub use options::{ServerOptions, TlsConfig};
pub use tls::SELF_SIGNED_NAMES;

use crate::call::MatchableCall;
use crate::dispatcher::Dispatcher;
use crate::history::HistoryError;
use crate::loader::{FileLoader, FsFileLoader};
use crate::logger::{MockLogger, TracingLogger};
use crate::matcher::{is_delete, is_get, is_head, is_patch, is_post, is_put, Matcher};
use crate::request::RecordedRequest;
use crate::verifier::RequestVerification;
use handler::handle_request;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use rustls::pki_types::CertificateDer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tls::TlsIdentity;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind mock server to {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TLS setup failed: {0}")]
    Tls(String),
    #[error("failed to create server runtime")]
    Runtime(#[source] std::io::Error),
    #[error("mock server did not start within {0:?}")]
    StartTimeout(Duration),
    #[error("mock server worker exited before the listener was ready")]
    WorkerExited,
}

/// Everything produced by binding, before it is wrapped in a [`MockServer`].
struct Listening {
    dispatcher: Arc<Dispatcher>,
    local_addr: SocketAddr,
    scheme: &'static str,
    certificate: Option<(Vec<u8>, String)>,
    shutdown_tx: broadcast::Sender<()>,
}

/// Collects the collaborators and options for a [`MockServer`].
pub struct MockServerBuilder {
    loader: Arc<dyn FileLoader>,
    logger: Arc<dyn MockLogger>,
    options: ServerOptions,
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        Self {
            loader: Arc::new(FsFileLoader::default()),
            logger: Arc::new(TracingLogger),
            options: ServerOptions::default(),
        }
    }
}

impl MockServerBuilder {
    pub fn file_loader(mut self, loader: impl FileLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    pub fn logger(mut self, logger: impl MockLogger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn https(mut self) -> Self {
        self.options.use_https = true;
        self
    }

    pub async fn start(self) -> Result<MockServer, ServerError> {
        MockServer::start(self.loader, self.logger, self.options).await
    }

    pub fn start_blocking(self) -> Result<MockServer, ServerError> {
        MockServer::start_blocking(self.loader, self.logger, self.options)
    }
}

pub struct MockServer {
    dispatcher: Arc<Dispatcher>,
    loader: Arc<dyn FileLoader>,
    local_addr: SocketAddr,
    url: String,
    certificate: Option<(Vec<u8>, String)>,
    shutdown_tx: Mutex<Option<broadcast::Sender<()>>>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl MockServer {
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::default()
    }

    /// Bind the listener and start serving on the current tokio runtime.
    /// Returns once the listener is ready.
    pub async fn start(
        loader: Arc<dyn FileLoader>,
        logger: Arc<dyn MockLogger>,
        options: ServerOptions,
    ) -> Result<Self, ServerError> {
        let listening = listen(logger, &options).await?;
        Ok(Self::from_listening(listening, loader, None))
    }

    /// Start the server on a dedicated worker thread with its own runtime,
    /// blocking the caller until the listener is ready or the start timeout
    /// elapses.
    pub fn start_blocking(
        loader: Arc<dyn FileLoader>,
        logger: Arc<dyn MockLogger>,
        options: ServerOptions,
    ) -> Result<Self, ServerError> {
        let timeout = options.start_timeout();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let worker = std::thread::Builder::new()
            .name("rift-mock-server".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(ServerError::Runtime(e)));
                        return;
                    }
                };
                runtime.block_on(async move {
                    match listen(logger, &options).await {
                        Ok(listening) => {
                            let mut shutdown_rx = listening.shutdown_tx.subscribe();
                            // If the caller gave up waiting the listener is dropped here
                            if ready_tx.send(Ok(listening)).is_ok() {
                                let _ = shutdown_rx.recv().await;
                            }
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                        }
                    }
                });
            })
            .map_err(ServerError::Runtime)?;

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(listening)) => Ok(Self::from_listening(listening, loader, Some(worker))),
            Ok(Err(e)) => Err(e),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => Err(ServerError::StartTimeout(timeout)),
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => Err(ServerError::WorkerExited),
        }
    }

    fn from_listening(
        listening: Listening,
        loader: Arc<dyn FileLoader>,
        worker: Option<std::thread::JoinHandle<()>>,
    ) -> Self {
        let mut url_addr = listening.local_addr;
        if url_addr.ip().is_unspecified() {
            url_addr.set_ip(std::net::Ipv4Addr::LOCALHOST.into());
        }
        let url = format!("{}://{}/", listening.scheme, url_addr);
        info!("Mock server started at {}", url);

        Self {
            dispatcher: listening.dispatcher,
            loader,
            local_addr: listening.local_addr,
            url,
            certificate: listening.certificate,
            shutdown_tx: Mutex::new(Some(listening.shutdown_tx)),
            worker: Mutex::new(worker),
        }
    }

    /// Base URL, `scheme://host:port/`.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_https(&self) -> bool {
        self.certificate.is_some()
    }

    /// DER of the certificate presented in HTTPS mode.
    pub fn certificate_der(&self) -> Option<&[u8]> {
        self.certificate.as_ref().map(|(der, _)| der.as_slice())
    }

    /// PEM of the certificate presented in HTTPS mode.
    pub fn certificate_pem(&self) -> Option<&str> {
        self.certificate.as_ref().map(|(_, pem)| pem.as_str())
    }

    /// Root store trusting the server certificate, for rustls clients.
    pub fn root_cert_store(&self) -> Option<rustls::RootCertStore> {
        let der = self.certificate_der()?;
        let mut store = rustls::RootCertStore::empty();
        store.add(CertificateDer::from(der.to_vec())).ok()?;
        Some(store)
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn file_loader(&self) -> &Arc<dyn FileLoader> {
        &self.loader
    }

    /// Start declaring a response for requests accepted by `matcher`.
    pub fn when_requested(&self, matcher: impl Into<Matcher>) -> MatchableCall {
        MatchableCall::new(matcher, self.loader.clone(), &self.dispatcher)
    }

    pub fn when_get(&self, matcher: impl Into<Matcher>) -> MatchableCall {
        self.when_requested(is_get().and(matcher))
    }

    pub fn when_post(&self, matcher: impl Into<Matcher>) -> MatchableCall {
        self.when_requested(is_post().and(matcher))
    }

    pub fn when_put(&self, matcher: impl Into<Matcher>) -> MatchableCall {
        self.when_requested(is_put().and(matcher))
    }

    pub fn when_patch(&self, matcher: impl Into<Matcher>) -> MatchableCall {
        self.when_requested(is_patch().and(matcher))
    }

    pub fn when_delete(&self, matcher: impl Into<Matcher>) -> MatchableCall {
        self.when_requested(is_delete().and(matcher))
    }

    pub fn when_head(&self, matcher: impl Into<Matcher>) -> MatchableCall {
        self.when_requested(is_head().and(matcher))
    }

    pub fn verify_request(&self, matcher: impl Into<Matcher>) -> RequestVerification {
        RequestVerification::new(matcher, self.dispatcher.clone())
    }

    pub fn verify_get(&self, matcher: impl Into<Matcher>) -> RequestVerification {
        self.verify_request(is_get().and(matcher))
    }

    pub fn verify_post(&self, matcher: impl Into<Matcher>) -> RequestVerification {
        self.verify_request(is_post().and(matcher))
    }

    pub fn verify_put(&self, matcher: impl Into<Matcher>) -> RequestVerification {
        self.verify_request(is_put().and(matcher))
    }

    pub fn verify_patch(&self, matcher: impl Into<Matcher>) -> RequestVerification {
        self.verify_request(is_patch().and(matcher))
    }

    pub fn verify_delete(&self, matcher: impl Into<Matcher>) -> RequestVerification {
        self.verify_request(is_delete().and(matcher))
    }

    pub fn verify_head(&self, matcher: impl Into<Matcher>) -> RequestVerification {
        self.verify_request(is_head().and(matcher))
    }

    pub fn request_history(&self) -> Vec<RecordedRequest> {
        self.dispatcher.with_history(|h| h.requests().to_vec())
    }

    pub fn take_last(&self, n: usize) -> Vec<RecordedRequest> {
        self.dispatcher.with_history(|h| h.take_last(n))
    }

    pub fn take_first(&self, n: usize) -> Vec<RecordedRequest> {
        self.dispatcher.with_history(|h| h.take_first(n))
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.dispatcher.with_history(|h| h.last())
    }

    pub fn first_request(&self) -> Option<RecordedRequest> {
        self.dispatcher.with_history(|h| h.first())
    }

    pub fn take(&self, from: usize, to: usize) -> Result<Vec<RecordedRequest>, HistoryError> {
        self.dispatcher.with_history(|h| h.take(from, to))
    }

    pub fn take_all_matching(&self, matcher: &Matcher) -> Vec<RecordedRequest> {
        self.dispatcher.with_history(|h| h.take_all_matching(matcher))
    }

    pub fn add_matchable_call(&self, call: &MatchableCall) -> bool {
        self.dispatcher.add_matchable_call(call)
    }

    pub fn remove_matchable_call(&self, call: &MatchableCall) -> bool {
        self.dispatcher.remove_matchable_call(call)
    }

    pub fn replace_matchable_call(&self, old: &MatchableCall, new: &MatchableCall) -> bool {
        self.dispatcher.replace_matchable_call(old, new)
    }

    pub fn remove_all_matchable_calls(&self) {
        self.dispatcher.remove_all_matchable_calls();
    }

    pub fn matchable_calls(&self) -> Vec<MatchableCall> {
        self.dispatcher.matchable_calls()
    }

    /// Drop all declarations and the request history. The listener keeps running.
    pub fn reset(&self) {
        self.dispatcher.reset();
    }

    /// Stop accepting connections. Open connections finish their in-flight
    /// request and are closed. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        let Some(shutdown_tx) = self.shutdown_tx.lock().take() else {
            return;
        };
        let _ = shutdown_tx.send(());
        drop(shutdown_tx);

        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("Mock server worker thread panicked");
            }
        }
        info!("Mock server at {} shut down", self.url);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_tx.lock().is_none()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("url", &self.url)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

async fn listen(
    logger: Arc<dyn MockLogger>,
    options: &ServerOptions,
) -> Result<Listening, ServerError> {
    let identity = if options.use_https {
        let identity = match &options.tls {
            Some(tls) => TlsIdentity::from_pem_files(&tls.cert_path, &tls.key_path),
            None => TlsIdentity::self_signed(),
        };
        Some(identity.map_err(|e| ServerError::Tls(format!("{e:#}")))?)
    } else {
        None
    };

    let listener = TcpListener::bind((options.host.as_str(), options.port))
        .await
        .map_err(|source| ServerError::Bind {
            addr: format!("{}:{}", options.host, options.port),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
        addr: format!("{}:{}", options.host, options.port),
        source,
    })?;
    info!("Mock server bound to {}", local_addr);

    let dispatcher = Arc::new(Dispatcher::new(logger));
    let (shutdown_tx, _) = broadcast::channel(1);
    let (acceptor, certificate) = match identity {
        Some(identity) => (
            Some(identity.acceptor),
            Some((identity.certificate_der, identity.certificate_pem)),
        ),
        None => (None, None),
    };

    tokio::spawn(accept_loop(
        listener,
        acceptor,
        dispatcher.clone(),
        shutdown_tx.subscribe(),
    ));

    Ok(Listening {
        dispatcher,
        local_addr,
        scheme: options.scheme(),
        certificate,
        shutdown_tx,
    })
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    dispatcher: Arc<Dispatcher>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let port = listener.local_addr().map(|a| a.port()).unwrap_or_default();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let dispatcher = Arc::clone(&dispatcher);
                        let acceptor = acceptor.clone();
                        let shutdown_rx = shutdown_rx.resubscribe();
                        tokio::spawn(async move {
                            match acceptor {
                                Some(acceptor) => match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        serve_connection(tls_stream, dispatcher, addr, shutdown_rx).await
                                    }
                                    Err(e) => debug!("TLS handshake failed for {}: {}", addr, e),
                                },
                                None => serve_connection(stream, dispatcher, addr, shutdown_rx).await,
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error on port {}: {}", port, e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Mock server on port {} shutting down", port);
                break;
            }
        }
    }
}

async fn serve_connection<S>(
    stream: S,
    dispatcher: Arc<Dispatcher>,
    addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |req| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { handle_request(req, dispatcher, addr).await }
    });
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!("Connection error from {}: {}", addr, e);
            }
        }
        _ = shutdown_rx.recv() => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.await {
                debug!("Connection error from {} during shutdown: {}", addr, e);
            }
        }
    }
}
