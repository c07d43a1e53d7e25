use chrono::{DateTime, Local};
use hyper::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Role attached to an authenticated user of the messaging app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Host,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Host => "host",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "host" => Ok(Role::Host),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

// User populated by the upstream authentication layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    pub username: String,
    pub role: Role,
}

// Everything a gate may look at, extracted once per inbound request
#[derive(Debug, Clone)]
pub struct GateRequest {
    pub method: Method,
    pub path: String,

    // Client address candidates
    pub forwarded_for: Option<String>,
    pub remote_addr: Option<String>,

    pub user: Option<AuthenticatedUser>,

    // Wall-clock arrival time, local timezone
    pub arrival: DateTime<Local>,
}

impl GateRequest {
    // Create a new anonymous request with no address information
    pub fn new(method: Method, path: impl Into<String>, arrival: DateTime<Local>) -> Self {
        Self {
            method,
            path: path.into(),
            forwarded_for: None,
            remote_addr: None,
            user: None,
            arrival,
        }
    }

    pub fn with_forwarded_for(mut self, value: impl Into<String>) -> Self {
        self.forwarded_for = Some(value.into());
        self
    }

    pub fn with_remote_addr(mut self, value: impl Into<String>) -> Self {
        self.remote_addr = Some(value.into());
        self
    }

    pub fn with_user(mut self, user: AuthenticatedUser) -> Self {
        self.user = Some(user);
        self
    }

    /// Username for audit purposes, `Anonymous` when nobody is authenticated.
    pub fn display_user(&self) -> &str {
        self.user
            .as_ref()
            .map(|u| u.username.as_str())
            .unwrap_or("Anonymous")
    }

    /// Resolve the client identity used for rate limiting.
    ///
    /// The first token of the forwarded-for header wins over the direct
    /// connection address. Empty values count as absent.
    pub fn client_identity(&self) -> Option<&str> {
        let forwarded = self
            .forwarded_for
            .as_deref()
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|token| !token.is_empty());

        forwarded.or_else(|| {
            self.remote_addr
                .as_deref()
                .map(str::trim)
                .filter(|addr| !addr.is_empty())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectionKind {
    Unauthenticated,
    ForbiddenRole,
    ForbiddenTimeWindow,
    ForbiddenRateLimit,
}

// Terminal, user-visible outcome of a gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub message: String,
}

impl Rejection {
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Pass,
    Reject(Rejection),
}

impl Decision {
    pub fn reject(kind: RejectionKind, message: impl Into<String>) -> Self {
        Decision::Reject(Rejection::new(kind, message))
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Decision::Pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GateRequest {
        GateRequest::new(Method::POST, "/api/messages/", Local::now())
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" Host ".parse::<Role>().unwrap(), Role::Host);
        assert_eq!("GUEST".parse::<Role>().unwrap(), Role::Guest);
        assert!("moderator".parse::<Role>().is_err());
        assert_eq!(Role::Host.to_string(), "host");
    }

    #[test]
    fn test_forwarded_for_takes_precedence() {
        let req = request()
            .with_forwarded_for(" 1.2.3.4 , 10.0.0.1")
            .with_remote_addr("127.0.0.1");
        assert_eq!(req.client_identity(), Some("1.2.3.4"));
    }

    #[test]
    fn test_falls_back_to_remote_addr() {
        let req = request().with_remote_addr("127.0.0.1");
        assert_eq!(req.client_identity(), Some("127.0.0.1"));

        let req = request().with_forwarded_for(" , 10.0.0.1").with_remote_addr("127.0.0.1");
        assert_eq!(req.client_identity(), Some("127.0.0.1"));
    }

    #[test]
    fn test_unresolvable_identity() {
        assert_eq!(request().client_identity(), None);
        assert_eq!(request().with_remote_addr("").client_identity(), None);
    }

    #[test]
    fn test_display_user() {
        assert_eq!(request().display_user(), "Anonymous");
        let user = AuthenticatedUser {
            id: "42".to_string(),
            username: "alice".to_string(),
            role: Role::Admin,
        };
        assert_eq!(request().with_user(user).display_user(), "alice");
    }
}
