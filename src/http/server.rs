//! HTTP server setup and pipeline assembly.
//!
//! # Responsibilities
//! - Build the Axum router from the stage plan, in plan order
//! - Mount the five resource groups and the static-file fallback
//! - Bind the pipeline to a listener and serve until shutdown
//! - Start the rate limiter's background sweep
//!
//! # Design Decisions
//! - The `ServiceBuilder` chain below reads top-to-bottom in request order;
//!   keep it aligned with `PipelinePlan`
//! - The error boundary is the outermost layer so it is the last to touch
//!   every response, including ones short-circuited mid-chain
//! - Shutdown is observed through the coordinator handed in by the caller;
//!   the server never owns its own exit policy

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer};

use crate::config::AppConfig;
use crate::http::error::{error_boundary, ErrorHandler};
use crate::lifecycle::{spawn_supervised, FatalHandle, Shutdown};
use crate::pipeline::{
    access_log, body, cookies, headers, param_pollution,
    rate_limit::{self, KeyPolicy, PeerIpPolicy, RateLimiter},
    request_id, sanitize, uploads, xss, PipelinePlan, Stage,
};
use crate::routes::RouteSet;

/// HTTP server for the API service.
pub struct ApiServer {
    router: Router,
    config: AppConfig,
    limiter: Arc<RateLimiter>,
    plan: PipelinePlan,
}

impl ApiServer {
    /// Create a server with the default client-key policy (peer IP).
    pub fn new(config: AppConfig, routes: RouteSet, errors: Arc<dyn ErrorHandler>) -> Self {
        Self::with_key_policy(config, routes, errors, Box::new(PeerIpPolicy))
    }

    /// Create a server with an explicit rate-limit key policy.
    pub fn with_key_policy(
        config: AppConfig,
        routes: RouteSet,
        errors: Arc<dyn ErrorHandler>,
        policy: Box<dyn KeyPolicy>,
    ) -> Self {
        let plan = PipelinePlan::new(&config);
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit, policy));
        let router = Self::build_router(&config, &plan, routes, errors, limiter.clone());
        Self {
            router,
            config,
            limiter,
            plan,
        }
    }

    /// Build the Axum router with all pipeline stages in plan order.
    fn build_router(
        config: &AppConfig,
        plan: &PipelinePlan,
        routes: RouteSet,
        errors: Arc<dyn ErrorHandler>,
        limiter: Arc<RateLimiter>,
    ) -> Router {
        let app = routes
            .mount(Router::new())
            .fallback_service(ServeDir::new(&config.static_files.dir));

        let dev_log = plan
            .is_active(Stage::AccessLog)
            .then(|| middleware::from_fn(access_log::log));

        app.layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(errors, error_boundary))
                .layer(request_id::set_layer())
                .layer(request_id::propagate_layer())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.listener.request_timeout_secs,
                )))
                .layer(middleware::from_fn_with_state(
                    config.body.clone(),
                    body::decode,
                ))
                .layer(middleware::from_fn(cookies::parse))
                .option_layer(dev_log)
                .layer(middleware::from_fn_with_state(
                    config.uploads.clone(),
                    uploads::decode,
                ))
                .layer(middleware::from_fn(sanitize::strip))
                .layer(middleware::from_fn(headers::apply))
                .layer(middleware::from_fn(xss::escape))
                .layer(middleware::from_fn_with_state(limiter, rate_limit::admit))
                .layer(middleware::from_fn(param_pollution::collapse))
                .layer(CorsLayer::permissive()),
        )
    }

    /// The assembled router; clones share all pipeline state.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve on the given listener until the coordinator signals shutdown.
    ///
    /// Stops accepting immediately on the signal; in-flight requests drain
    /// before this returns.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: Arc<Shutdown>,
        fatal: FatalHandle,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = self.config.env.as_str(),
            pipeline = %self.plan.describe(),
            "API server started"
        );

        // Background sweep keeps the limiter map from holding idle keys.
        let limiter = self.limiter.clone();
        let mut sweep_shutdown = shutdown.subscribe();
        let sweep_every = Duration::from_millis(self.config.rate_limit.window_ms.max(1_000));
        spawn_supervised("rate-limit-sweeper", &fatal, async move {
            let mut ticker = tokio::time::interval(sweep_every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => limiter.evict_expired(),
                    _ = sweep_shutdown.recv() => return Ok(()),
                }
            }
        });

        let mut signal = shutdown.subscribe();
        let latch = shutdown.clone();
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            // The trigger may predate the first poll of this future; the
            // latched flag covers that gap.
            if !latch.is_triggered() {
                let _ = signal.recv().await;
            }
        })
        .await?;

        tracing::info!("API server stopped");
        Ok(())
    }
}
