//! # delve-error
//!
//! Unified error handling for delve, following OpenDAL's error handling practices.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., ParseFailed, ToolCrashed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use delve_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::ToolFailed, "page returned 404")
//!         .with_operation("agent::invoke_tool")
//!         .with_context("tool", "visit_page")
//!         .with_context("step", "3"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All fallible functions return `Result<T, delve_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using delve Error
pub type Result<T> = std::result::Result<T, Error>;
