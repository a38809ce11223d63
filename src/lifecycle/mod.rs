//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load env file → config → logging → database → bind → serve
//!
//! Supervision (supervisor.rs):
//!     Background task fails → fatal report → one log line
//!     → shutdown.rs trigger → listener stops accepting
//!     → in-flight requests drain → process exits 1
//!
//! Ctrl-C follows the same path with exit code 0.
//! ```
//!
//! # Design Decisions
//! - Startup is ordered and fail fast; the listener binds last
//! - Shutdown is stop-accepting-then-drain, with no drain deadline

pub mod shutdown;
pub mod supervisor;

pub use shutdown::Shutdown;
pub use supervisor::{spawn_supervised, FatalError, FatalHandle, Supervisor, TaskResult};
