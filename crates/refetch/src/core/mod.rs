//! Pure transformations: the record header codec, HTTP date and header
//! handling, and retry backoff. Nothing here performs I/O beyond the reader
//! handed to [`codec::decode`].

pub mod codec;
pub mod headers;
mod http_date;
mod retry;

pub use http_date::{fmt_http_date, parse_http_date};
pub use retry::retry_delay;
