//! Storage is organized through [session_storage::SessionStorageImpl].
//! The basic idea is:
//!   - There is a directory with all the sessions.
//!   - Every finished session is a separate json document named after its start time.
//!   - Documents store finalized intervals, the open interval of a running session is never
//!     written.

pub mod entities;
pub mod session_storage;
