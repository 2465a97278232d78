//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID, host and cookie extraction)
//!     → middleware/admission.rs (admission gate: continue or block)
//!     → server.rs proxy_handler (forward to origin)
//!     → response.rs (merge gate headers, strip hop-by-hop)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
