//! Structured logging initialization.
//!
//! Pretty output in development, JSON in production. The filter comes from
//! `RUST_LOG` when set, with a service-scoped default otherwise.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppEnv;

pub fn init(env: AppEnv) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "devcamp_api=debug,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if env.is_development() {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}
