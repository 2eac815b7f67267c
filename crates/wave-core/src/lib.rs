//! # wave-core
//!
//! Core crate for the Wave host. Contains the unified error system,
//! the result alias, and the configuration schemas shared by every
//! other crate.
//!
//! This crate has **no** internal dependencies on other Wave crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
