use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::{Error, Result};

#[cfg(unix)]
const DEFAULT_PERMISSIONS: u32 = 0o664;

#[cfg(not(unix))]
const DEFAULT_PERMISSIONS: u32 = 0;

#[derive(Clone, Copy, Debug)]
pub struct CommitOptions {
    suffix:      &'static str,
    permissions: u32,
    modified:    Option<SystemTime>,
    sync:        bool,
}

impl Default for CommitOptions {
    fn default() -> Self { Self::new() }
}

impl CommitOptions {
    pub fn new() -> Self {
        Self {
            suffix:      ".ok",
            permissions: DEFAULT_PERMISSIONS,
            modified:    None,
            sync:        false,
        }
    }

    /// Suffix appended to the destination file name to form the staging path.
    pub fn suffix(mut self, suffix: &'static str) -> Self {
        self.suffix = suffix;
        self
    }

    /// Mode of the staged file. Ignored outside unix.
    pub fn permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Modification time stamped on the staged file before the rename.
    pub fn modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn suffix_str(&self) -> &'static str { self.suffix }

    pub fn get_permissions(&self) -> u32 { self.permissions }
}

/// `path` with `suffix` appended to its file name, in the same directory.
pub fn sibling_path(path: impl AsRef<Path>, suffix: &str) -> Result<PathBuf> {
    let path = path.as_ref();
    let name = path.file_name().ok_or_else(|| Error::NoFileName {
        path: path.to_path_buf(),
    })?;

    let mut name: OsString = name.to_os_string();
    name.push(suffix);
    Ok(path.with_file_name(name))
}

/// Streams `source` into a staging file next to `dest`, then renames it over `dest`.
///
/// The rename is the only operation that touches `dest`. If anything fails
/// before it, the staging file is removed (best effort) and `dest` keeps its
/// previous state. Returns the number of bytes committed.
pub async fn atomic_commit<R>(
    source: &mut R,
    dest: impl AsRef<Path>,
    options: CommitOptions,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let dest = dest.as_ref();
    let staged = sibling_path(dest, options.suffix_str())?;

    let written = match write_staged(source, &staged, &options).await {
        Ok(written) => written,
        Err(e) => {
            discard_staged(&staged).await;
            return Err(e);
        }
    };

    if let Err(source) = fs::rename(&staged, dest).await {
        discard_staged(&staged).await;
        return Err(Error::Rename {
            from: staged,
            to: dest.to_path_buf(),
            source,
        });
    }

    Ok(written)
}

async fn write_staged<R>(source: &mut R, staged: &Path, options: &CommitOptions) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let write_err = |source: std::io::Error| Error::Write {
        path: staged.to_path_buf(),
        source,
    };

    let mut open = OpenOptions::new();
    open.write(true).create(true).truncate(true);
    #[cfg(unix)]
    open.mode(options.permissions);

    let mut file = open.open(staged).await.map_err(write_err)?;
    let written = tokio::io::copy(source, &mut file).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;

    if options.sync {
        file.sync_all().await.map_err(write_err)?;
    }

    if let Some(modified) = options.modified {
        let file = file.into_std().await;
        tokio::task::spawn_blocking(move || file.set_modified(modified))
            .await
            .map_err(|e| write_err(std::io::Error::other(e)))?
            .map_err(write_err)?;
    }

    Ok(written)
}

async fn discard_staged(staged: &Path) {
    if let Err(e) = remove_file(staged).await {
        tracing::warn!(path = %staged.display(), error = %e, "failed to clean up staged file");
    }
}

/// Modification time of `path`, or `None` when it does not exist.
pub async fn modified(path: impl AsRef<Path>) -> Result<Option<SystemTime>> {
    let path = path.as_ref();
    let read_err = |source| Error::Read {
        path: path.to_path_buf(),
        source,
    };

    match fs::metadata(path).await {
        Ok(metadata) => metadata.modified().map(Some).map_err(read_err),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(read_err(e)),
    }
}

/// Removes `path`. Returns `false` if there was nothing to remove.
pub async fn remove_file(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(Error::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, ReadBuf};

    struct Broken;

    impl AsyncRead for Broken {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::other("connection reset")))
        }
    }

    #[test]
    fn test_sibling_path() {
        let path = sibling_path("/data/file.bin", ".ok").unwrap();
        assert_eq!(path, PathBuf::from("/data/file.bin.ok"));

        assert!(matches!(
            sibling_path("/", ".ok"),
            Err(Error::NoFileName { .. })
        ));
    }

    #[tokio::test]
    async fn test_atomic_commit() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("file.txt");

        let mut source: &[u8] = b"hello world";
        let written = atomic_commit(&mut source, &dest, CommitOptions::new())
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");
        assert!(!dir.path().join("file.txt.ok").exists());
    }

    #[tokio::test]
    async fn test_atomic_commit_sets_modified() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("file.txt");
        let mtime = UNIX_EPOCH + Duration::from_secs(1_445_412_480);

        let mut source: &[u8] = b"data";
        atomic_commit(&mut source, &dest, CommitOptions::new().modified(Some(mtime)))
            .await
            .unwrap();

        assert_eq!(modified(&dest).await.unwrap(), Some(mtime));
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_destination() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("file.txt");
        std::fs::write(&dest, "original").unwrap();

        let mut source = (&b"partial"[..]).chain(Broken);
        let result = atomic_commit(&mut source, &dest, CommitOptions::new()).await;

        assert!(matches!(result, Err(Error::Write { .. })));
        assert_eq!(std::fs::read(&dest).unwrap(), b"original");
        assert!(!dir.path().join("file.txt.ok").exists());
    }

    #[tokio::test]
    async fn test_stale_staging_file_is_overwritten() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("file.txt");
        std::fs::write(dir.path().join("file.txt.part"), "leftover from a crash, longer").unwrap();

        let mut source: &[u8] = b"fresh";
        atomic_commit(&mut source, &dest, CommitOptions::new().suffix(".part"))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
        assert!(!dir.path().join("file.txt.part").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_atomic_commit_with_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("file.txt");

        let mut source: &[u8] = b"data";
        atomic_commit(&mut source, &dest, CommitOptions::new().permissions(0o600))
            .await
            .unwrap();

        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_modified_missing() {
        let dir = tempdir().unwrap();
        assert_eq!(modified(dir.path().join("absent")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");
        std::fs::write(&path, "data").unwrap();

        assert!(remove_file(&path).await.unwrap());
        assert!(!remove_file(&path).await.unwrap());
    }
}
