//! Error interface shared by every failure domain of this crate.
//!
//! Each module defines its own error enum
//! (e.g. [`SimErr`], [`LoadErr`], [`LexErr`], [`CommandErr`]).
//! All of them implement [`Error`], which extends [`std::error::Error`]
//! with an optional hint that frontends can show under the error message.
//!
//! [`SimErr`]: crate::sim::SimErr
//! [`LoadErr`]: crate::obj::LoadErr
//! [`LexErr`]: crate::debugger::lex::LexErr
//! [`CommandErr`]: crate::debugger::command::CommandErr
use std::borrow::Cow;

pub use crate::debugger::command::CommandErr;
pub use crate::debugger::lex::LexErr;
pub use crate::obj::LoadErr;
pub use crate::sim::SimErr;

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// A hint describing how the error could be resolved, if one exists.
    fn help(&self) -> Option<Cow<str>> {
        None
    }
}
