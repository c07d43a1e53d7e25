//! Gatekeeper HTTP server

use crate::audit::{AuditSink, FileAuditSink, TracingAuditSink};
use crate::config::GatekeeperConfig;
use crate::error::{Error, Result};
use crate::middleware::{ChainOutcome, GateChain, RateLimitStore};
use crate::proxy::{RequestHandler, StaticHandler, UpstreamHandler};
use crate::utils::{build_error_response, build_json_response, format_timestamp, gate_request_from, Clock, SystemClock};
use crate::{log_debug, log_info};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Shared per-process state handed to every request
pub struct AppState {
    pub chain: GateChain,
    pub handler: Arc<dyn RequestHandler>,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<RateLimitStore>,
}

impl AppState {
    pub fn new(
        chain: GateChain,
        handler: Arc<dyn RequestHandler>,
        clock: Arc<dyn Clock>,
        store: Arc<RateLimitStore>,
    ) -> Self {
        Self {
            chain,
            handler,
            clock,
            store,
        }
    }

    /// Wire the standard chain, audit sink and handler from configuration
    pub fn from_config(config: &GatekeeperConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let sink: Arc<dyn AuditSink> = match &config.audit.file {
            Some(path) => {
                let sink = FileAuditSink::open(path)?;
                info!("Audit log: {}", sink.path().display());
                Arc::new(sink)
            }
            None => {
                info!("Audit log: tracing target 'audit'");
                Arc::new(TracingAuditSink)
            }
        };

        let handler: Arc<dyn RequestHandler> = match &config.upstream {
            Some(upstream) => Arc::new(UpstreamHandler::from_config(upstream)?),
            None => {
                warn!("No upstream configured, admitted requests get a static 200");
                Arc::new(StaticHandler::default())
            }
        };

        let store = Arc::new(RateLimitStore::new());
        let chain = GateChain::from_config(config, sink, Arc::clone(&store));
        info!("Gate chain: {}", chain.gate_names().join(" -> "));

        Ok(Self::new(chain, handler, clock, store))
    }
}

/// Evaluate the gate chain for one request and produce the response
pub async fn handle_request(
    state: Arc<AppState>,
    req: Request<Body>,
    remote_addr: Option<SocketAddr>,
) -> Response<Body> {
    if req.method() == Method::GET && req.uri().path() == "/health" {
        return handle_health_check(&state);
    }

    let gate_request = gate_request_from(&req, remote_addr, state.clock.now());

    match state.chain.evaluate(&gate_request) {
        ChainOutcome::Rejected { gate, rejection, .. } => {
            info!(
                "🚫 {} {} from {} rejected by {}",
                gate_request.method,
                gate_request.path,
                gate_request.client_identity().unwrap_or("unknown"),
                gate
            );
            build_error_response(StatusCode::FORBIDDEN, &rejection.message)
        }
        ChainOutcome::Admitted { .. } => match state.handler.handle(req).await {
            Ok(response) => {
                log_debug!(
                    "{} {} handled by {} → {}",
                    gate_request.method,
                    gate_request.path,
                    state.handler.name(),
                    response.status()
                );
                response
            }
            Err(Error::Timeout(_)) => {
                error!("Upstream timed out for {} {}", gate_request.method, gate_request.path);
                build_error_response(StatusCode::GATEWAY_TIMEOUT, "Upstream timed out")
            }
            Err(e) => {
                error!("Handler failed for {} {}: {}", gate_request.method, gate_request.path, e);
                build_error_response(StatusCode::BAD_GATEWAY, "Upstream unavailable")
            }
        },
    }
}

/// Handle health check endpoint locally
fn handle_health_check(state: &AppState) -> Response<Body> {
    let health = json!({
        "status": "healthy",
        "service": "chat-gatekeeper",
        "timestamp": format_timestamp(state.clock.now()),
        "tracked_clients": state.store.tracked_clients(),
    });
    build_json_response(StatusCode::OK, health.to_string())
}

/// Periodically drop clients whose rate-limit window has fully expired
pub fn spawn_sweeper(
    store: Arc<RateLimitStore>,
    clock: Arc<dyn Clock>,
    every: Duration,
    window: Duration,
) -> JoinHandle<()> {
    let window = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::days(365 * 100));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep(clock.now(), window);
            if removed > 0 {
                log_debug!("Rate limiter sweep removed {} idle clients", removed);
            }
        }
    })
}

pub struct GatekeeperServer {
    listen_addr: SocketAddr,
    state: Arc<AppState>,
}

impl GatekeeperServer {
    pub fn new(listen_addr: SocketAddr, state: AppState) -> Self {
        Self {
            listen_addr,
            state: Arc::new(state),
        }
    }

    /// Build the server, its state and the idle-client sweeper from configuration
    pub fn from_config(config: &GatekeeperConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let state = AppState::from_config(config, Arc::clone(&clock))?;

        if config.rate_limit.enabled && config.rate_limit.sweep_interval_secs > 0 {
            spawn_sweeper(
                Arc::clone(&state.store),
                clock,
                Duration::from_secs(config.rate_limit.sweep_interval_secs),
                Duration::from_secs(config.rate_limit.window_seconds),
            );
        }

        Ok(Self::new(config.listen_addr, state))
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> Result<()> {
        let listener = std::net::TcpListener::bind(self.listen_addr)?;
        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: std::net::TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        let state = Arc::clone(&self.state);

        let make_svc = make_service_fn(move |conn: &hyper::server::conn::AddrStream| {
            let remote_addr = conn.remote_addr();
            let state = Arc::clone(&state);
            log_debug!("New connection from: {}", remote_addr);

            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { Ok::<_, Infallible>(handle_request(state, req, Some(remote_addr)).await) }
                }))
            }
        });

        let server = Server::from_tcp(listener)?.serve(make_svc);
        log_info!("Gatekeeper listening on {}", local_addr);

        server.with_graceful_shutdown(shutdown).await?;
        log_info!("Gatekeeper on {} stopped", local_addr);
        Ok(())
    }
}
