//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic against the storage backends:
//! - Submission store (persistence and retrieval)
//! - Rate limiter (fixed-window decisions)
//! - Intake pipeline (verify, rate-limit, persist, notify)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod intake;
pub mod limiter;
pub mod metrics;
pub mod ports;
pub mod store;
