//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → request.rs (rewrite onto target, strip hop-by-hop, X-Forwarded-For)
//!     → transport (observing round trip to target.rs's upstream)
//!     → response.rs (strip hop-by-hop, map errors to 502)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod target;

pub use server::{AppState, HttpServer};
pub use target::{TargetError, UpstreamTarget};
