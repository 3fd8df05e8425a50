//! HTTP API module.
//!
//! This module provides the local HTTP server and API types for the rosterload backend.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::start_server;
pub use types::*;
