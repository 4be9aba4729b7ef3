use std::fmt;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use futures_util::StreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::core::codec::{self, CodecError};
use crate::data::{LocalOptions, Metadata};
use crate::effects::http::BodyStream;
use crate::effects::storage::{Target, TransferRecord, close_quietly, promote_checked};
use crate::error::{Error, Result};

/// Side-car transfer record on the local filesystem.
///
/// The file starts with the encoded [`Metadata`] header; every byte after it
/// is payload. The handle stays open until the record is closed, promoted
/// or discarded.
#[derive(Debug)]
pub struct FsRecord {
    path:       PathBuf,
    target:     PathBuf,
    metadata:   Metadata,
    header_len: u64,
    file:       Option<File>,
    options:    LocalOptions,
}

fn open_file<'a>(file: &'a mut Option<File>, path: &Path) -> Result<&'a mut File> {
    file.as_mut().ok_or_else(|| Error::RecordClosed(path.to_path_buf()))
}

impl FsRecord {
    /// Creates (or truncates) the record at `path` and writes its header.
    pub async fn create(
        path: PathBuf,
        target: PathBuf,
        metadata: Metadata,
        options: LocalOptions,
    ) -> Result<Self> {
        let mut open = OpenOptions::new();
        open.read(true).write(true).create(true).truncate(true);
        #[cfg(unix)]
        open.mode(options.get_permissions());

        let mut file = open.open(&path).await.map_err(Error::io(&path))?;
        let header = codec::encode(&metadata);
        file.write_all(&header).await.map_err(Error::io(&path))?;
        file.flush().await.map_err(Error::io(&path))?;

        debug!(path = %path.display(), len = metadata.len, "created transfer record");

        Ok(Self {
            path,
            target,
            metadata,
            header_len: header.len() as u64,
            file: Some(file),
            options,
        })
    }

    /// Opens the record at `path` and decodes its header.
    ///
    /// Returns `None` when no record exists. A header that cannot be decoded
    /// is an error; the record is left untouched.
    pub async fn load(path: PathBuf, target: PathBuf, options: LocalOptions) -> Result<Option<Self>> {
        let mut file = match OpenOptions::new().read(true).append(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(&path)(e)),
        };

        let (metadata, header_len) = match codec::decode(&mut file).await {
            Ok(decoded) => decoded,
            Err(CodecError::Io(source)) => return Err(Error::Io { path, source }),
            Err(e) => {
                return Err(Error::MalformedRecord {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        Ok(Some(Self {
            path,
            target,
            metadata,
            header_len,
            file: Some(file),
            options,
        }))
    }

    pub fn is_closed(&self) -> bool { self.file.is_none() }
}

impl TransferRecord for FsRecord {
    fn metadata(&self) -> &Metadata { &self.metadata }

    async fn size(&mut self) -> Result<u64> {
        let file = open_file(&mut self.file, &self.path)?;
        file.flush().await.map_err(Error::io(&self.path))?;
        let len = file.metadata().await.map_err(Error::io(&self.path))?.len();

        Ok(len.saturating_sub(self.header_len))
    }

    async fn append(&mut self, mut body: BodyStream) -> Result<u64> {
        let path = &self.path;
        let file = open_file(&mut self.file, path)?;
        file.seek(SeekFrom::End(0)).await.map_err(Error::io(path))?;

        let mut appended = 0u64;
        let streamed: Result<()> = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await.map_err(Error::io(path))?;
                appended += chunk.len() as u64;
            }
            Ok(())
        }
        .await;

        // Whatever reached the handle must be on disk before a retry reads
        // the size back.
        let flushed = file.flush().await.map_err(Error::io(path));
        streamed?;
        flushed?;

        Ok(appended)
    }

    async fn promote(mut self) -> Result<u64> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| Error::RecordClosed(self.path.clone()))?;
        file.flush().await.map_err(Error::io(&self.path))?;
        file.seek(SeekFrom::Start(self.header_len))
            .await
            .map_err(Error::io(&self.path))?;

        let options = self.options.commit_options().modified(self.metadata.modified);
        let committed = refetch_fs::atomic_commit(&mut file, &self.target, options).await?;
        drop(file);

        if let Err(e) = refetch_fs::remove_file(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "failed to remove promoted transfer record");
        }

        debug!(dest = %self.target.display(), bytes = committed, "promoted transfer record");
        Ok(committed)
    }

    async fn discard(mut self) -> Result<()> {
        drop(self.file.take());
        refetch_fs::remove_file(&self.path).await?;

        debug!(path = %self.path.display(), "discarded transfer record");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await.map_err(Error::io(&self.path))?;
        }
        Ok(())
    }
}

/// A file on the local filesystem kept in sync with a URL.
///
/// The transfer record lives next to it under the same name plus
/// [`LocalOptions::record_suffix`].
///
/// # Examples
///
/// ```
/// use refetch::{LocalFile, LocalOptions};
///
/// let target = LocalFile::with_options("/tmp/data.bin", LocalOptions::new().record_suffix(".part"));
/// assert_eq!(target.record_path().unwrap().to_str(), Some("/tmp/data.bin.part"));
/// ```
#[derive(Clone, Debug)]
pub struct LocalFile {
    path:    PathBuf,
    options: LocalOptions,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self::with_options(path, LocalOptions::new()) }

    pub fn with_options(path: impl Into<PathBuf>, options: LocalOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn options(&self) -> &LocalOptions { &self.options }

    pub fn record_path(&self) -> Result<PathBuf> {
        Ok(refetch_fs::sibling_path(&self.path, self.options.record_suffix_str())?)
    }

    /// Deletes a leftover transfer record, including one whose header can
    /// no longer be decoded. Returns `false` if there was none.
    pub async fn discard_record(&self) -> Result<bool> {
        Ok(refetch_fs::remove_file(self.record_path()?).await?)
    }
}

impl fmt::Display for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local file {}", self.path.display())
    }
}

impl Target for LocalFile {
    type Record = FsRecord;

    async fn modified(&self) -> Result<Option<SystemTime>> { Ok(refetch_fs::modified(&self.path).await?) }

    async fn record(&self) -> Result<Option<FsRecord>> {
        FsRecord::load(self.record_path()?, self.path.clone(), self.options).await
    }

    async fn replace(&self, body: BodyStream, len: u64, modified: Option<SystemTime>) -> Result<u64> {
        let metadata = Metadata::new(len, modified);
        let mut record = FsRecord::create(self.record_path()?, self.path.clone(), metadata, self.options).await?;

        if let Err(e) = record.append(body).await {
            close_quietly(&mut record).await;
            return Err(e);
        }

        promote_checked(record).await
    }
}
