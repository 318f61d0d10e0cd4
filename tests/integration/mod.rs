//! Integration test suite for selfswap
//!
//! End-to-end tests against real files in temporary directories.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **self_update**: full pipeline from a local feed to the replaced file
//! - **replace**: the replacement protocol and staging fix-ups on disk
//! - **cli**: the `selfswap` binary

mod cli;
mod replace;
mod self_update;
