//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (router assembly, stage wiring, serve loop)
//!     → pipeline stages in plan order
//!     → mounted resource routers / static fallback
//!     → error.rs (terminal shaping of anything that failed)
//!     → response to client
//! ```

pub mod error;
pub mod server;

pub use error::{ApiError, ErrorHandler, JsonErrorHandler};
pub use server::ApiServer;
