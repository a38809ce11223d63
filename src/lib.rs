//! Bootcamp directory REST API service.
//!
//! A hardened request pipeline over Axum. The service owns middleware
//! composition, rate-limit policy, and failure handling; resource handlers,
//! the database driver, and error response shaping are collaborators
//! plugged in at the seams.
//!
//! # Architecture Overview
//!
//! ```text
//!  Client ──▶ listener ──▶ ordered stage chain ──▶ /api/v1/* routers
//!                             │                        │
//!                             │ (short-circuit:        ▼
//!                             │  429, 413, 400)   static fallback
//!                             ▼                        │
//!                        error boundary ◀──────────────┘
//!                             │
//!  Client ◀───────────────────┘
//!
//!  Cross-cutting: config (env), db probe, shutdown supervisor,
//!  logging/metrics
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod pipeline;
pub mod routes;

// Collaborator seams
pub mod db;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use http::{ApiError, ApiServer, ErrorHandler, JsonErrorHandler};
pub use lifecycle::{Shutdown, Supervisor};
pub use routes::RouteSet;
