//! Data models for Smartcar vehicle resources

mod vehicle;

pub use vehicle::*;
