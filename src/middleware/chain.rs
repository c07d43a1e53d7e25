//! Fixed-order gate dispatcher

use super::{Gate, RateLimitStore, RateLimiter, RequestLogger, RolePermissionGate, TimeWindowGate};
use crate::audit::AuditSink;
use crate::config::GatekeeperConfig;
use crate::models::{Decision, GateRequest, Rejection};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Per-request progress through the chain.
///
/// `Handled` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChainState {
    Start,
    Logged,
    TimeChecked,
    RateChecked,
    RoleChecked,
    Handled,
    Rejected,
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainState::Start => "start",
            ChainState::Logged => "logged",
            ChainState::TimeChecked => "time_checked",
            ChainState::RateChecked => "rate_checked",
            ChainState::RoleChecked => "role_checked",
            ChainState::Handled => "handled",
            ChainState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Every gate passed; the request may go to the handler
    Admitted { reached: ChainState },
    /// A gate stopped the request
    Rejected {
        gate: &'static str,
        after: ChainState,
        rejection: Rejection,
    },
}

impl ChainOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, ChainOutcome::Admitted { .. })
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ChainOutcome::Rejected { rejection, .. } => Some(rejection),
            ChainOutcome::Admitted { .. } => None,
        }
    }
}

/// Ordered list of gates evaluated for every request
#[derive(Default)]
pub struct GateChain {
    gates: Vec<Box<dyn Gate>>,
}

impl GateChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a gate; gates run in insertion order
    pub fn with_gate<G: Gate + 'static>(mut self, gate: G) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    /// Build the standard chain: logger, time window, rate limit, roles.
    /// Disabled gates are left out; the logger is always present.
    pub fn from_config(
        config: &GatekeeperConfig,
        sink: Arc<dyn AuditSink>,
        store: Arc<RateLimitStore>,
    ) -> Self {
        let mut chain = Self::new().with_gate(RequestLogger::new(sink));

        if config.time_window.enabled {
            chain = chain.with_gate(TimeWindowGate::from_config(&config.time_window));
        }
        if config.rate_limit.enabled {
            chain = chain.with_gate(RateLimiter::from_config(store, &config.rate_limit));
        }
        if config.roles.enabled {
            chain = chain.with_gate(RolePermissionGate::from_config(&config.roles));
        }

        chain
    }

    pub fn gate_names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|gate| gate.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Run every gate in order, stopping at the first rejection
    pub fn evaluate(&self, request: &GateRequest) -> ChainOutcome {
        let mut state = ChainState::Start;

        for gate in &self.gates {
            match gate.evaluate(request) {
                Decision::Pass => state = gate.stage(),
                Decision::Reject(rejection) => {
                    debug!(
                        "{} {} rejected by {} after {}: {:?}",
                        request.method, request.path, gate.name(), state, rejection.kind
                    );
                    return ChainOutcome::Rejected {
                        gate: gate.name(),
                        after: state,
                        rejection,
                    };
                }
            }
        }

        ChainOutcome::Admitted { reached: state }
    }
}
