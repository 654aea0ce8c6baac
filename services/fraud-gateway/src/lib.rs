pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod protocol;
pub mod session;

// Re-exports for convenience
pub use session::{SessionHandle, SessionManager};
