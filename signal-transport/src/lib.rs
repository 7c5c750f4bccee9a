//! SAFE Signals Transport
//!
//! Submits resolved signals to the SAFE API:
//! - Connection settings for the API endpoints
//! - A bearer-token cache shared by concurrent submissions
//! - The [`Transport`] seam and its HTTP implementation

pub mod config;
pub mod credentials;
pub mod client;

pub use config::*;
pub use credentials::*;
pub use client::*;
