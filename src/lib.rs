//! Smartcar connect client
//!
//! OAuth2 token lifecycle management and an authenticated client for the
//! Smartcar vehicle API: connect URLs, code exchange, transparent refresh,
//! vehicle listing, lock status, and lock/unlock commands.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod session;

pub use api::VehicleClient;
pub use error::{Error, ErrorKind, Result};
