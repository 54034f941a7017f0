//! # ccpeed Testkit
//!
//! Test utilities for ccpeed.
//!
//! This crate provides:
//! - Temporary script directories with a manifest
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ccpeed_testkit::prelude::*;
//!
//! #[test]
//! fn syncs_standard_layout() {
//!     let scripts = ScriptDir::standard();
//!     // ... point a SessionConfig at scripts.path()
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
