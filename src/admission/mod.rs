//! Admission subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (host, cookies)
//!     → trigger.rs (check or open a waiting room?)
//!     → types.rs (AdmissionQueryTarget: /queues/{host}[/enable])
//!     → client.rs (sub-request to the admission service)
//!     → gate.rs (classify: 200 / 429 / other / error)
//!     → Disposition: Continue | Block(503)
//! ```
//!
//! # Design Decisions
//! - One suspension point per evaluation: the sub-request
//! - Errors are values (`GateError`), folded into a 503 at the gate boundary
//! - Throttling is reported as 503 to clients, not as the internal 429

pub mod client;
pub mod error;
pub mod gate;
pub mod trigger;
pub mod types;

pub use client::{AdmissionClient, HttpAdmissionClient};
pub use error::GateError;
pub use gate::AdmissionGate;
pub use trigger::EnableTrigger;
pub use types::{AdmissionQueryTarget, AdmissionResponse, Disposition, InboundRequest, Outcome, ThrottleInfo};
