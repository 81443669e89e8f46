//! Host signal schema
//!
//! The serializable input format: one JSON object per UI-framework callback.

mod host_signal;
mod parser;

pub use host_signal::*;
pub use parser::*;
