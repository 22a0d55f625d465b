//! # keysmith-core
//!
//! Core types, traits, and constants for the keysmith key-material codec.
//!
//! This crate holds everything the codec layer agrees on but that needs no
//! cryptography: the key data model, the algorithm catalog, the provider
//! capability traits, the error type, defaults, and logging field names.

pub mod catalog;
pub mod defaults;
pub mod error;
pub mod jwk;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use catalog::{AlgorithmSpec, DisplayForm};
pub use error::{Error, Result};
pub use jwk::Jwk;
pub use models::*;
pub use traits::*;
