//! HTTP server lifecycle
//!
//! [`Server`] owns the router and at most one running listener. State moves
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`; a bind failure
//! leaves it `Failed` until the next `start`.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::{ServerConfig, DEFAULT_SHUTDOWN_GRACE_SECS};
use crate::routes::health::PING_BODY;

/// Upper bound for each step of the self-test
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long cancelled requests get to drop their futures
const CANCEL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Self-test failed: {0}")]
    Probe(String),
}

/// In-flight requests of one running listener
#[derive(Clone, Default)]
struct RequestScope {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// Race each request against the stop signal; a cancelled request's future is dropped
async fn cancel_on_stop(State(scope): State<RequestScope>, request: Request, next: Next) -> Response {
    let response = scope.tracker.track_future(next.run(request));
    tokio::select! {
        response = response => response,
        _ = scope.cancel.cancelled() => {
            tracing::debug!("Request cancelled by server stop");
            (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down").into_response()
        }
    }
}

struct Serving {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
    requests: RequestScope,
}

struct Lifecycle {
    state: ServerState,
    local_addr: Option<SocketAddr>,
    grace: Duration,
    serving: Option<Serving>,
}

/// The server; owned by the composition root
pub struct Server {
    router: Router,
    /// Serializes `start` and `stop`; `lifecycle` is only locked briefly
    transition: Mutex<()>,
    lifecycle: Mutex<Lifecycle>,
}

impl Server {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            transition: Mutex::new(()),
            lifecycle: Mutex::new(Lifecycle {
                state: ServerState::Stopped,
                local_addr: None,
                grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
                serving: None,
            }),
        }
    }

    pub async fn state(&self) -> ServerState {
        self.lifecycle.lock().await.state
    }

    /// Address of the running listener
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.lock().await.local_addr
    }

    /// Bind and start serving; a no-op returning the bound address when running
    pub async fn start(&self, config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let _transition = self.transition.lock().await;
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.state == ServerState::Running {
            if let Some(addr) = lifecycle.local_addr {
                tracing::debug!("Server already running on {}", addr);
                return Ok(addr);
            }
        }

        lifecycle.state = ServerState::Starting;
        let addr = format!("{}:{}", config.host, config.port);

        if config.port == 0 {
            lifecycle.state = ServerState::Failed;
            return Err(ServerError::Bind {
                addr,
                reason: "port must be between 1 and 65535".to_string(),
            });
        }

        let bound = match TcpListener::bind(&addr).await {
            Ok(listener) => listener.local_addr().map(|local| (listener, local)),
            Err(e) => Err(e),
        };
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                tracing::error!("Failed to bind {}: {}", addr, e);
                lifecycle.state = ServerState::Failed;
                return Err(ServerError::Bind {
                    addr,
                    reason: e.to_string(),
                });
            }
        };

        let requests = RequestScope::default();
        let router = self
            .router
            .clone()
            .layer(middleware::from_fn_with_state(requests.clone(), cancel_on_stop));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        lifecycle.state = ServerState::Running;
        lifecycle.local_addr = Some(local_addr);
        lifecycle.grace = config.shutdown_grace();
        lifecycle.serving = Some(Serving {
            shutdown: shutdown_tx,
            task,
            requests,
        });

        tracing::info!("Zotero MCP server listening on http://{}", local_addr);
        Ok(local_addr)
    }

    /// Stop accepting, drain in-flight requests for the grace period, then
    /// cancel the rest
    ///
    /// Cancelled request futures are dropped before this returns, which tears
    /// down their extraction workers. Safe to call in any state.
    pub async fn stop(&self) {
        let _transition = self.transition.lock().await;
        let (serving, grace) = {
            let mut lifecycle = self.lifecycle.lock().await;
            let Some(serving) = lifecycle.serving.take() else {
                lifecycle.state = ServerState::Stopped;
                return;
            };
            lifecycle.state = ServerState::Stopping;
            (serving, lifecycle.grace)
        };

        let Serving {
            shutdown,
            task,
            requests,
        } = serving;
        let _ = shutdown.send(());

        let abort = task.abort_handle();
        match timeout(grace, task).await {
            Ok(Ok(Ok(()))) => tracing::info!("Server shutdown complete"),
            Ok(Ok(Err(e))) => tracing::warn!("Server exited with error: {}", e),
            Ok(Err(e)) => tracing::warn!("Server task failed: {}", e),
            Err(_) => {
                tracing::warn!(
                    "{} requests still in flight after {:?}, cancelling",
                    requests.tracker.len(),
                    grace
                );
                abort.abort();
                requests.cancel.cancel();
            }
        }

        requests.tracker.close();
        if timeout(CANCEL_TIMEOUT, requests.tracker.wait()).await.is_err() {
            tracing::warn!(
                "{} cancelled requests did not finish within {:?}",
                requests.tracker.len(),
                CANCEL_TIMEOUT
            );
        }

        let mut lifecycle = self.lifecycle.lock().await;
        lifecycle.state = ServerState::Stopped;
        lifecycle.local_addr = None;
    }

    /// Serve the router on a throwaway loopback port and check `GET /ping`
    ///
    /// Leaves the running instance untouched.
    pub async fn test_server(&self) -> bool {
        match self.probe().await {
            Ok(addr) => {
                tracing::info!("Self-test passed on {}", addr);
                true
            }
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }

    async fn probe(&self) -> Result<SocketAddr, ServerError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| ServerError::Bind {
                addr: "127.0.0.1:0".to_string(),
                reason: e.to_string(),
            })?;
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Probe(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = self.router.clone();
        let probe = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let result = ping(addr).await;

        let _ = shutdown_tx.send(());
        let abort = probe.abort_handle();
        if timeout(PROBE_TIMEOUT, probe).await.is_err() {
            tracing::warn!("Probe listener on {} did not shut down, aborting", addr);
            abort.abort();
        }

        result.map(|()| addr)
    }
}

async fn ping(addr: SocketAddr) -> Result<(), ServerError> {
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(PROBE_TIMEOUT)
        .build()
        .map_err(|e| ServerError::Probe(e.to_string()))?;

    let response = client
        .get(format!("http://{}/ping", addr))
        .send()
        .await
        .map_err(|e| ServerError::Probe(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ServerError::Probe(format!(
            "unexpected status {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| ServerError::Probe(e.to_string()))?;
    if body != PING_BODY {
        return Err(ServerError::Probe(format!("unexpected body '{}'", body)));
    }
    Ok(())
}
