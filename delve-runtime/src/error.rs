//! Runtime error types
//!
//! Re-exports delve-error so runtime modules and downstream crates share one
//! error type.

pub use delve_error::{Error, ErrorKind, ErrorStatus, Result};
