//! # DDH Testkit
//!
//! Test utilities for the DDH client crates.
//!
//! This crate provides:
//! - An in-memory fake of the node API ([`FakeNodeServer`])
//! - Fixtures: a sample taxonomy, dataset and resource records, clients
//!   wired to the fake server, temporary upload files
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddh_testkit::prelude::*;
//!
//! #[test]
//! fn creates_dataset() {
//!     let client = test_client(FakeNodeServer::new());
//!     let created = client
//!         .create_dataset_with_resources(&sample_dataset("WB-1", 2), None)
//!         .unwrap();
//!     assert_eq!(created.resources.len(), 2);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::server::*;
}

pub use fixtures::*;
pub use generators::*;
pub use server::*;
