//! Storage seams the engine writes through.
//!
//! A [`Target`] is the committed resource a download keeps current. A
//! [`TransferRecord`] is the in-progress side-car holding the metadata that
//! was announced with the first response plus the payload bytes received so
//! far. [`crate::LocalFile`] binds both to the local filesystem.

use std::future::Future;
use std::time::SystemTime;

use tracing::warn;

use crate::core::headers::check_length;
use crate::data::Metadata;
use crate::effects::http::BodyStream;
use crate::error::Result;

/// An in-progress transfer owned by exactly one download.
pub trait TransferRecord: Send {
    /// Metadata decoded when the record was created or loaded.
    fn metadata(&self) -> &Metadata;

    /// Payload bytes currently held, excluding the header.
    fn size(&mut self) -> impl Future<Output = Result<u64>> + Send;

    /// Appends every chunk of `body` after the current payload.
    ///
    /// Chunks written before a failing item stay in the record. Returns the
    /// number of bytes appended.
    fn append(&mut self, body: BodyStream) -> impl Future<Output = Result<u64>> + Send;

    /// Atomically replaces the target with the payload, stamps it with the
    /// recorded modification time, then deletes the record. Returns the
    /// number of payload bytes committed.
    fn promote(self) -> impl Future<Output = Result<u64>> + Send;

    /// Deletes the record without touching the target.
    fn discard(self) -> impl Future<Output = Result<()>> + Send;

    /// Releases the record's handle and keeps it for a later resume.
    /// Calling it twice is harmless.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// The resource a download keeps in sync with a URL.
pub trait Target: Send + Sync {
    type Record: TransferRecord;

    /// Modification time of the committed resource, `None` if absent.
    fn modified(&self) -> impl Future<Output = Result<Option<SystemTime>>> + Send;

    /// Loads the transfer record, `None` when there is none.
    fn record(&self) -> impl Future<Output = Result<Option<Self::Record>>> + Send;

    /// Streams `body` into a fresh record announcing `len` and `modified`,
    /// then promotes it.
    ///
    /// A short body leaves the record in place for a later resume; a body
    /// longer than a non-zero `len` discards it. Both fail with
    /// [`crate::Error::LengthMismatch`]. Returns the bytes committed.
    fn replace(
        &self,
        body: BodyStream,
        len: u64,
        modified: Option<SystemTime>,
    ) -> impl Future<Output = Result<u64>> + Send;
}

/// Closes `record` on a failure path, logging instead of masking the
/// original error.
pub(crate) async fn close_quietly<R: TransferRecord>(record: &mut R) {
    if let Err(e) = record.close().await {
        warn!(error = %e, "failed to close transfer record");
    }
}

pub(crate) async fn discard_quietly<R: TransferRecord>(record: R) {
    if let Err(e) = record.discard().await {
        warn!(error = %e, "failed to discard transfer record");
    }
}

/// Promotes `record` if its payload matches the declared length.
///
/// A short payload keeps the record for a later resume. An oversized one can
/// never become valid and is discarded.
pub(crate) async fn promote_checked<R: TransferRecord>(mut record: R) -> Result<u64> {
    let written = match record.size().await {
        Ok(written) => written,
        Err(e) => {
            close_quietly(&mut record).await;
            return Err(e);
        }
    };

    let declared = record.metadata().len;
    if let Err(e) = check_length(declared, written) {
        if written > declared {
            warn!(declared, written, "received more than declared, discarding transfer record");
            discard_quietly(record).await;
        } else {
            close_quietly(&mut record).await;
        }
        return Err(e);
    }

    record.promote().await
}
