//! Crash-safe resumable HTTP downloads with conditional refresh and atomic
//! placement.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - `data` - Immutable configuration and types
//! - `core` - Pure transformations: record header [`codec`], HTTP dates, backoff
//! - `effects` - I/O operations with trait abstraction
//!
//! # Key Features
//!
//! - **Resumable**: Partial bodies live in a side-car transfer record and are
//!   continued with `If-Range` + `Range` on the next [`Downloader::serve`]
//! - **Conditional**: Existing targets are revalidated with `If-Modified-Since`
//! - **Atomic Placement**: The target only ever changes by a single rename
//!   through `refetch-fs`
//! - **Mechanism-Only**: No internal retries; [`Error::is_retryable`] and
//!   [`retry_delay`] are there for the caller's policy
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> refetch::Result<()> {
//! use refetch::{Downloader, LocalFile, ReqwestClient};
//!
//! let client = ReqwestClient::new()?;
//! let outcome = Downloader::new(client, "https://example.com/data.bin", LocalFile::new("data.bin"))
//!     .serve()
//!     .await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

mod core;
mod data;
mod effects;
mod error;

pub use crate::core::codec;
pub use crate::core::{fmt_http_date, parse_http_date, retry_delay};
pub use data::{LocalOptions, Metadata, Outcome};
pub use effects::{
    BodyStream, BoxStream, Cancellation, Downloader, FsRecord, HttpClient, LocalFile,
    Request, Response, Target, TransferRecord, fetch_to,
};
#[cfg(feature = "reqwest")]
pub use effects::{ClientSetting, ReqwestClient};
pub use error::{Error, ErrorKind, Result};
