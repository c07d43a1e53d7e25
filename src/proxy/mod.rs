//! Gatekeeper server and the handlers behind the gate chain

pub mod handler;
pub mod server;
pub mod upstream;

pub use handler::{RequestHandler, StaticHandler};
pub use server::{handle_request, spawn_sweeper, AppState, GatekeeperServer};
pub use upstream::UpstreamHandler;
