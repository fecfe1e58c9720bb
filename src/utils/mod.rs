//! Utility modules.
//!
//! Provides:
//! - [`console`] - Browser console diagnostics

pub mod console;
