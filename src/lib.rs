//! Chat Gatekeeper - request gates in front of a messaging app
//!
//! Every inbound request passes through an ordered chain of policy gates
//! (audit logging, allowed hours, per-client POST rate limiting, role
//! checks) before it is forwarded to the messaging app.

pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod proxy;
pub mod utils;

// Re-export commonly used items
pub use config::GatekeeperConfig;
pub use error::{Error, Result};
pub use logging::{init_logger, init_logger_with_config};
pub use middleware::{ChainOutcome, ChainState, Gate, GateChain};
pub use models::{AuthenticatedUser, Decision, GateRequest, Rejection, RejectionKind, Role};
pub use proxy::{AppState, GatekeeperServer};
