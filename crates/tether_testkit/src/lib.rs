//! # Tether Testkit
//!
//! Test utilities for tether.
//!
//! This crate provides:
//! - Test fixtures: a sample `User` entity and store/factory helpers
//! - Property-based test generators using proptest
//! - A lifecycle harness that replays full save/update/merge/lock
//!   rounds against any store implementation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tether_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_factory() {
//!     with_memory_factory(|factory| {
//!         let mut session = factory.open_session();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
