//! Atomic file placement for refetch.
//!
//! A destination is only ever mutated by a single rename of a fully written
//! sibling staging file, so readers observe either the previous content or
//! the new content, never a partial write.

mod commit;
mod error;

pub use commit::{CommitOptions, atomic_commit, modified, remove_file, sibling_path};
pub use error::{Error, Result};
