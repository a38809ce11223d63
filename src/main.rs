//! Process entry: configuration, collaborators, pipeline, supervision.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;

use devcamp_api::config;
use devcamp_api::db;
use devcamp_api::lifecycle::Supervisor;
use devcamp_api::observability;
use devcamp_api::{ApiServer, JsonErrorHandler, RouteSet, Shutdown};

#[tokio::main]
async fn main() -> ExitCode {
    // Env file first: logging setup already depends on APP_ENV.
    let config = match config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    observability::logging::init(config.env);
    tracing::info!(
        environment = config.env.as_str(),
        port = config.listener.port,
        "devcamp-api starting"
    );

    // Database before traffic; failure mode is configured policy.
    if let Err(err) = db::establish_from_config(&config.database).await {
        tracing::error!(error = %err, "Database startup failed");
        return ExitCode::FAILURE;
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = match TcpListener::bind(config.listener.bind_address()).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(
                address = %config.listener.bind_address(),
                error = %err,
                "Failed to bind listener"
            );
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Arc::new(Shutdown::new());
    let (supervisor, fatal) = Supervisor::new(shutdown.clone());

    // Resource handlers are registered by the embedding application.
    let server = ApiServer::new(config, RouteSet::default(), Arc::new(JsonErrorHandler));
    let server_task = tokio::spawn(server.run(listener, shutdown, fatal));

    ExitCode::from(supervisor.run(server_task).await)
}
