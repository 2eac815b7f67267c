//! # wave-runtime
//!
//! Composition of the Wave host:
//!
//! - `Core`, owning every subsystem and implementing `CoreAccess`
//! - Built-in `help` and `module` commands
//! - The line-oriented interactive session

pub mod commands;
pub mod core;
pub mod output;
pub mod session;

pub use crate::core::Core;
pub use session::run_session;
