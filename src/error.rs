//! Error taxonomy for the journal store.
//!
//! Corruption is handled entirely inside [`crate::journal::JournalStore::recover`]
//! and never surfaces as a `JournalError`.

use std::fmt;
use std::io;

/// Errors returned at the journal API boundary.
#[derive(Debug)]
pub enum JournalError
{
    /// A read/write/seek/fsync/open syscall failed.
    Io(io::Error),
    /// An argument was invalid, or a record failed self-validation at
    /// write time (the latter is a defensive assertion: it indicates
    /// an implementation bug, not a runtime condition).
    Invalid(String),
    /// Allocation failure during `init`. Kept for wire-contract parity
    /// with the external NOMEM status code; unreachable under Rust's
    /// allocator-aborts-by-default model in a `std` build.
    NoMem,
}

impl fmt::Display for JournalError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            JournalError::Io(e) => write!(f, "journal: io error: {e}"),
            JournalError::Invalid(msg) => write!(f, "journal: invalid: {msg}"),
            JournalError::NoMem => write!(f, "journal: allocation failed"),
        }
    }
}

impl std::error::Error for JournalError
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)>
    {
        match self {
            JournalError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for JournalError
{
    fn from(e: io::Error) -> Self
    {
        JournalError::Io(e)
    }
}

/// Signals that [`crate::record::decrement_tries`] was called with a
/// tier outside `{2, 3}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTierError(pub u8);

impl fmt::Display for InvalidTierError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "invalid tier for try-counter decrement: {}", self.0)
    }
}

impl std::error::Error for InvalidTierError {}

/// The one case where a health probe cannot produce even a best-effort
/// result: its sole data source exists but is unreadable in a way that
/// makes "not available" the wrong answer.
#[derive(Debug)]
pub struct HealthError(pub String);

impl fmt::Display for HealthError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "health: {}", self.0)
    }
}

impl std::error::Error for HealthError {}
