//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env file (optional, loaded first)
//!     → process environment
//!     → loader.rs (typed parsing, fail fast on bad values)
//!     → AppConfig (immutable for the process lifetime)
//! ```
//!
//! # Design Decisions
//! - Config is built once at startup; there is no reload path
//! - All fields have defaults so an empty environment still boots
//! - Only syntactic validation; semantics belong to the consuming stage

pub mod loader;
pub mod schema;

pub use loader::{from_env, ConfigError};
pub use schema::{
    AppConfig, AppEnv, BodyConfig, DatabaseConfig, ListenerConfig, ObservabilityConfig,
    RateLimitConfig, StartupPolicy, StaticFilesConfig, UploadConfig,
};
