//! Host API exposed to modules.

pub mod context;
