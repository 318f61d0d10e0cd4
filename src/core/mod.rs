//! Core types shared across selfswap.
//!
//! - [`UpdateError`] - the typed failure of a self-update attempt
//! - [`ErrorContext`] and [`user_friendly_error`] - operator-facing error output

pub mod error;

pub use error::{ErrorContext, UpdateError, user_friendly_error};
