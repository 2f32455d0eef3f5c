//! HTTP listener lifecycle and shared server state.

pub mod dispatcher;
pub mod management;
pub mod proxy;
pub mod responder;
pub mod tls;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::expectation::ExpectationStore;
use crate::journal::RequestJournal;
use crate::scenario::ScenarioStore;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

/// Process-wide mutable state shared by every connection.
pub struct AppState {
    pub expectations: ExpectationStore,
    pub scenarios: ScenarioStore,
    pub journal: RequestJournal,
    pub proxy_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        Ok(Self {
            expectations: ExpectationStore::new(),
            scenarios: ScenarioStore::new(),
            journal: RequestJournal::new(config.journal_capacity),
            proxy_client: proxy::build_client(config.proxy_timeout)?,
        })
    }
}

/// Handle for signalling shutdown from another task. Repeated calls are
/// harmless.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

pub struct MockServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    tls: Option<TlsAcceptor>,
    state: Arc<AppState>,
    shutdown_tx: broadcast::Sender<()>,
    grace: Duration,
}

impl MockServer {
    /// Bind the listener and prepare shared state. Bind or TLS failures are
    /// fatal; the caller maps them to a non-zero exit code.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let addr = SocketAddr::new(config.ip, config.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Internal(format!("cannot read local address: {e}")))?;
        let tls = match &config.tls {
            Some(settings) => Some(tls::create_acceptor(
                &settings.certificate,
                &settings.certificate_key,
            )?),
            None => None,
        };
        let state = Arc::new(AppState::new(&config)?);
        let (shutdown_tx, _) = broadcast::channel(1);
        info!(
            "mock server listening on {}{}",
            local_addr,
            if tls.is_some() { " (TLS)" } else { "" }
        );
        Ok(Self {
            listener,
            local_addr,
            tls,
            state,
            shutdown_tx,
            grace: config.shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Accept connections until shutdown is signalled, then wait for
    /// in-flight connections up to the grace period.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let in_flight = Arc::new(AtomicUsize::new(0));

        loop {
            tokio::select! {
                result = self.listener.accept() => match result {
                    Ok((stream, peer)) => {
                        debug!("accepted connection from {peer}");
                        let state = Arc::clone(&self.state);
                        let tls = self.tls.clone();
                        let counter = Arc::clone(&in_flight);
                        counter.fetch_add(1, Ordering::AcqRel);
                        tokio::spawn(async move {
                            serve_connection(stream, tls, state).await;
                            counter.fetch_sub(1, Ordering::AcqRel);
                        });
                    }
                    Err(e) => error!("accept error: {e}"),
                },
                _ = shutdown_rx.recv() => {
                    info!("shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        let deadline = tokio::time::Instant::now() + self.grace;
        while in_flight.load(Ordering::Acquire) > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        let remaining = in_flight.load(Ordering::Acquire);
        if remaining > 0 {
            info!("grace period elapsed with {remaining} connection(s) still open");
        }
        info!("mock server stopped");
        Ok(())
    }
}

async fn serve_connection(stream: TcpStream, tls: Option<TlsAcceptor>, state: Arc<AppState>) {
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(dispatcher::dispatch(req, state).await) }
    });
    match tls {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => {
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(tls_stream), service)
                    .await
                {
                    debug!("connection error: {e}");
                }
            }
            Err(e) => debug!("TLS handshake failed: {e}"),
        },
        None => {
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("connection error: {e}");
            }
        }
    }
}
