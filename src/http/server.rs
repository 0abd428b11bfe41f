//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: health, static files, collaborators, terminal 404
//! - Wire up the middleware pipeline in its fixed order
//! - Bind to a listener and drain on shutdown
//! - Run the rate-limit sweeper alongside the server
//!
//! # Design Decisions
//! - Layers are listed innermost first; the last `.layer` runs first
//! - Short-circuit responses, timeouts included, still pass through security headers
//! - Peer addresses come from `ConnectInfo` for rate limiting

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    handler::HandlerWithoutStateExt,
    http::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::health::{self, HealthState};
use crate::http::fault::{fault_boundary, panic_response, FaultPolicy};
use crate::http::request::{make_request_span, X_REQUEST_ID};
use crate::http::response::not_found;
use crate::observability::metrics;
use crate::routing::{Dispatch, RoutingError};
use crate::security::{
    body_limit_middleware, cors_middleware, rate_limit_middleware, security_headers_middleware,
    CorsPolicy, RateLimitState,
};
use crate::store::StoreHandle;

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    config: Arc<ServerConfig>,
    rate_limit: Option<RateLimitState>,
}

impl HttpServer {
    /// Build the server. Fails when a collaborator collides with a built-in route.
    pub fn new(
        config: Arc<ServerConfig>,
        store: StoreHandle,
        mut dispatch: Dispatch,
    ) -> Result<Self, RoutingError> {
        dispatch.reserve(&config.static_files.mount_path)?;

        let rate_limit = config
            .rate_limit
            .enabled
            .then(|| RateLimitState::new(&config.rate_limit));
        let router = Self::build_router(&config, store, dispatch, rate_limit.clone());

        Ok(Self {
            router,
            config,
            rate_limit,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ServerConfig,
        store: StoreHandle,
        dispatch: Dispatch,
        rate_limit: Option<RateLimitState>,
    ) -> Router {
        let health_state = HealthState::new(config.environment, config.version.clone(), store.clone());
        let static_files = ServeDir::new(&config.static_files.directory)
            .call_fallback_on_method_not_allowed(true)
            .fallback(not_found.into_service());

        let body_limit = config.security.max_body_size;
        let mut app = dispatch
            .into_router(&store)
            .merge(health::routes(health_state))
            .nest_service(&config.static_files.mount_path, static_files)
            .fallback(not_found)
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(middleware::from_fn_with_state(body_limit, body_limit_middleware));

        if let Some(state) = rate_limit {
            app = app.layer(middleware::from_fn_with_state(state, rate_limit_middleware));
        }

        let cors = Arc::new(CorsPolicy::from_config(&config.cors));
        let fault_policy = FaultPolicy {
            expose_detail: config.expose_error_detail(),
        };
        app = app
            .layer(middleware::from_fn_with_state(cors, cors_middleware))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn_with_state(fault_policy, fault_boundary))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        if config.security.enable_headers {
            app = app.layer(middleware::from_fn(security_headers_middleware));
        }

        app.layer(middleware::from_fn(track_metrics))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The fully layered router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain open requests.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = %self.config.environment,
            "HTTP server starting"
        );

        if let Some(state) = &self.rate_limit {
            tokio::spawn(Arc::clone(&state.limiter).run_sweeper(shutdown.child_token()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let response = next.run(request).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
