//! Request gates applied before a request reaches the messaging app
//!
//! Each gate inspects a [`GateRequest`] and either lets it continue or
//! rejects it with a user-visible message. [`GateChain`] runs them in a
//! fixed order.

pub mod chain;
pub mod rate_limit;
pub mod request_logger;
pub mod role_permission;
pub mod time_window;

pub use chain::{ChainOutcome, ChainState, GateChain};
pub use rate_limit::{RateLimitStore, RateLimiter};
pub use request_logger::RequestLogger;
pub use role_permission::RolePermissionGate;
pub use time_window::TimeWindowGate;

use crate::models::{Decision, GateRequest};

/// A single policy-evaluation stage
pub trait Gate: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// State the chain reaches once this gate lets a request through
    fn stage(&self) -> ChainState;

    /// Decide whether the request may continue. Must not block on I/O
    /// other than the audit append.
    fn evaluate(&self, request: &GateRequest) -> Decision;
}
