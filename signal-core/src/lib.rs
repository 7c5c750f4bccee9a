//! SAFE Signals Core - document model, validation and reference resolution
//!
//! This crate provides the foundational primitives:
//! - Enumerations and value types shared by every signal
//! - The signal document model with its `signalurl://` indirection values
//! - A structural validator producing [`ValidSignal`]s
//! - A reference resolver producing [`ResolvedSignal`]s
//! - An in-memory signal store and the quality-of-signal score

pub mod types;
pub mod reference;
pub mod signals;
pub mod validate;
pub mod resolve;
pub mod store;
pub mod quality;

pub use types::*;
pub use reference::*;
pub use signals::*;
pub use validate::*;
pub use resolve::*;
pub use store::*;
pub use quality::*;

/// Version stamped on signals built with [`Signal::builder`]
pub const SIGNAL_SCHEMA_VERSION: &str = "1.0";

/// Default maximum number of hops followed while resolving one field
pub const DEFAULT_MAX_CHAIN_LENGTH: usize = 32;

/// Minimum confidence a submitter may assert
pub const MIN_CONFIDENCE: i64 = 0;

/// Maximum confidence a submitter may assert
pub const MAX_CONFIDENCE: i64 = 100;

/// Bounds of the degree-of-impact scale
pub const MIN_DEGREE_OF_IMPACT: i64 = -10;
pub const MAX_DEGREE_OF_IMPACT: i64 = 10;
