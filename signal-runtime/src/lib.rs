//! SAFE Signals Runtime
//!
//! Drives documents from disk to the SAFE API:
//! - Sample discovery in a signals directory
//! - A two-phase ingestion pipeline (validate and store, then resolve and submit)

pub mod samples;
pub mod pipeline;

pub use samples::*;
pub use pipeline::*;
