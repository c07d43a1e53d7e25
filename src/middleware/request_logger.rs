//! Audit logging gate

use super::{ChainState, Gate};
use crate::audit::AuditSink;
use crate::models::{Decision, GateRequest};
use std::sync::Arc;
use tracing::error;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Writes one audit line per request and never rejects
pub struct RequestLogger {
    sink: Arc<dyn AuditSink>,
}

impl RequestLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// `{timestamp} - User: {username} - Path: {path}`
    pub fn format_line(request: &GateRequest) -> String {
        format!(
            "{} - User: {} - Path: {}",
            request.arrival.format(TIMESTAMP_FORMAT),
            request.display_user(),
            request.path
        )
    }
}

impl Gate for RequestLogger {
    fn name(&self) -> &'static str {
        "request_logger"
    }

    fn stage(&self) -> ChainState {
        ChainState::Logged
    }

    fn evaluate(&self, request: &GateRequest) -> Decision {
        let line = Self::format_line(request);
        if let Err(e) = self.sink.append(&line) {
            // Audit failures must never fail the request
            error!("Failed to write audit line for {}: {}", request.path, e);
        }
        Decision::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::error::{Error, Result};
    use crate::models::{AuthenticatedUser, Role};
    use chrono::{Local, TimeZone};
    use hyper::Method;

    struct BrokenSink;

    impl AuditSink for BrokenSink {
        fn append(&self, _line: &str) -> Result<()> {
            Err(Error::Audit("disk full".to_string()))
        }
    }

    fn request() -> GateRequest {
        let arrival = Local.with_ymd_and_hms(2024, 5, 17, 19, 5, 3).unwrap();
        GateRequest::new(Method::GET, "/api/conversations/", arrival)
    }

    #[test]
    fn test_anonymous_line() {
        let sink = MemoryAuditSink::new();
        let logger = RequestLogger::new(Arc::new(sink.clone()));

        assert_eq!(logger.evaluate(&request()), Decision::Pass);
        assert_eq!(
            sink.lines(),
            vec!["2024-05-17 19:05:03.000000 - User: Anonymous - Path: /api/conversations/".to_string()]
        );
    }

    #[test]
    fn test_authenticated_line() {
        let user = AuthenticatedUser {
            id: "7".to_string(),
            username: "alice".to_string(),
            role: Role::Guest,
        };
        let line = RequestLogger::format_line(&request().with_user(user));
        assert_eq!(line, "2024-05-17 19:05:03.000000 - User: alice - Path: /api/conversations/");
    }

    #[test]
    fn test_sink_failure_still_passes() {
        let logger = RequestLogger::new(Arc::new(BrokenSink));
        assert!(logger.evaluate(&request()).is_pass());
    }
}
