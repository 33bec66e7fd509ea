//! API client module for Smartcar vehicles

pub mod client;
mod vehicles;

pub use client::{http_client, ApiResponse, VehicleClient, DEFAULT_VEHICLES_URL};
