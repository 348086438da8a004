//! The transport adapter: HTTP server and graceful shutdown.
//!
//! Each decoded request becomes one [`Request`], runs through the
//! [`Pipeline`], and the single [`Response`] it produces is encoded back
//! onto the connection. Request bodies are read lazily, and response bodies
//! are streamed as the handler produces them.
//!
//! # Shutdown
//!
//! On shutdown (a signal for [`Server::serve`], or [`RunningServer::close`])
//! the server:
//! 1. Stops accepting and releases the listening socket.
//! 2. Asks every open connection to finish its in-flight exchange and close.
//! 3. Aborts whatever is still running once
//!    [`ServerConfig::shutdown_timeout`] has elapsed.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::body::Body;
use crate::config::ServerConfig;
use crate::error::Error;
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
///
/// ```rust,no_run
/// use ferrule::{Request, Router, Server, ServerConfig};
///
/// # async fn run() -> Result<(), ferrule::Error> {
/// let app = Router::new().get("/", |_req: Request| async { "hello" });
/// Server::new(ServerConfig::new("0.0.0.0", 3000)).serve(app).await
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Binds the listener and starts accepting connections in the
    /// background.
    ///
    /// Fails if the address does not resolve or cannot be bound. The returned
    /// handle reports the bound address and stops the server when closed or
    /// dropped.
    pub async fn bind(self, pipeline: impl Into<Pipeline>) -> Result<RunningServer, Error> {
        let addr = self.config.socket_addr().await?;
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        // Shared read-only by every connection task.
        let pipeline = Arc::new(pipeline.into());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(accept_loop(
            listener,
            pipeline,
            shutdown_rx,
            self.config.shutdown_timeout(),
        ));

        info!(addr = %local_addr, "ferrule listening");
        Ok(RunningServer { local_addr, shutdown, task: Some(task) })
    }

    /// Serves `pipeline` until the process receives a shutdown signal.
    ///
    /// Returns after a full graceful shutdown (SIGTERM or Ctrl-C, then every
    /// in-flight exchange completing or timing out).
    pub async fn serve(self, pipeline: impl Into<Pipeline>) -> Result<(), Error> {
        let running = self.bind(pipeline).await?;
        shutdown_signal().await;
        info!("shutdown signal received");
        running.close().await;
        Ok(())
    }
}

/// Handle to a server started with [`Server::bind`].
///
/// Dropping the handle stops the server without waiting for it.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl RunningServer {
    /// The bound address, with the OS-assigned port when port `0` was
    /// requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting, drains open connections and waits until the listening
    /// socket has been released.
    pub async fn close(mut self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("accept loop failed: {e}");
            }
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn accept_loop(
    listener: TcpListener,
    pipeline: Arc<Pipeline>,
    mut shutdown: watch::Receiver<bool>,
    grace: Duration,
) {
    // Tracks every connection task so shutdown can wait for them.
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            // Checked first so a shutdown request stops accepting even while
            // more connections are queued.
            biased;

            _ = shutdown.changed() => {
                info!(in_flight = tasks.len(), "shutting down, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };
                tasks.spawn(serve_connection(
                    stream,
                    remote_addr,
                    Arc::clone(&pipeline),
                    shutdown.clone(),
                ));
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    drop(listener);

    let drained = tokio::time::timeout(grace, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(remaining = tasks.len(), "shutdown timeout elapsed, aborting connections");
        tasks.shutdown().await;
    }

    info!("ferrule stopped");
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    pipeline: Arc<Pipeline>,
    mut shutdown: watch::Receiver<bool>,
) {
    // `service_fn` is called once per request on the connection, not once per
    // connection.
    let svc = service_fn(move |req| {
        let pipeline = Arc::clone(&pipeline);
        async move { dispatch(&pipeline, req, remote_addr).await }
    });

    // `auto::Builder` serves HTTP/1.1 and HTTP/2, whichever the client speaks.
    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(e) = res {
                    debug!(peer = %remote_addr, "connection error: {e}");
                }
                break;
            }
            _ = shutdown.changed(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Adapts one decoded request, runs it through the pipeline and adapts the
/// response back.
///
/// The error type is [`Infallible`]: the pipeline maps every failure to a
/// response, so hyper never sees an error. A method outside
/// [`Method`](crate::Method) is answered with `405` before the pipeline runs.
async fn dispatch(
    pipeline: &Pipeline,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Body>, Infallible> {
    let response = match Request::from_http(req, Some(remote_addr)) {
        Ok(req) => pipeline.handle(req).await,
        Err(err) => {
            debug!(peer = %remote_addr, error = %err, "rejecting request");
            Response::status(err.status())
        }
    };
    Ok(response.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// Listens for SIGTERM and Ctrl-C on Unix, Ctrl-C only elsewhere. A handler
/// that cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves: the SIGTERM arm is disabled off Unix.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
