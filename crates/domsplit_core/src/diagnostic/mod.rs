//! Structured, non-fatal reports surfaced to the bundler that drives the partitioner.
mod diagnostic;
mod diagnostics;

pub use self::diagnostic::*;
pub use self::diagnostics::*;
