//! Command-line interface for running and checking the gatekeeper

pub mod server;

pub use server::*;
