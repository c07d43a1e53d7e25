//! Utility functions for the gatekeeper

pub mod http;
pub mod time;

pub use http::*;
pub use time::*;
