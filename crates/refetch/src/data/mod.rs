//! Immutable data types shared by the codec, the storage bindings and the
//! download engine.

mod metadata;
mod options;
mod outcome;

pub use metadata::Metadata;
pub use options::LocalOptions;
pub use outcome::Outcome;
