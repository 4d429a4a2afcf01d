//! Utilities for dbvc
//!
//! Index and identifier naming, plus logging setup.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use logging::init_logging;
pub use naming::{
    format_name, index_name, parse_index_name, quote_escaped_literal, quote_ident, quote_literal,
};
