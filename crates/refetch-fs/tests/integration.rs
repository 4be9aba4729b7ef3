use std::time::{Duration, UNIX_EPOCH};

use refetch_fs::{CommitOptions, atomic_commit, modified, sibling_path};
use tempfile::tempdir;

#[tokio::test]
async fn test_commit_replaces_existing_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("existing.txt");

    std::fs::write(&path, "original").unwrap();

    let mut source: &[u8] = b"new content";
    let result = atomic_commit(&mut source, &path, CommitOptions::new()).await;

    assert!(result.is_ok());
    assert_eq!(std::fs::read(&path).unwrap(), b"new content");
}

#[tokio::test]
async fn test_commit_from_file_offset() {
    use tokio::io::AsyncSeekExt;

    let dir = tempdir().unwrap();
    let src = dir.path().join("source.bin");
    let dest = dir.path().join("dest.bin");
    std::fs::write(&src, b"HEADERpayload").unwrap();

    let mut file = tokio::fs::File::open(&src).await.unwrap();
    file.seek(std::io::SeekFrom::Start(6)).await.unwrap();

    let mtime = UNIX_EPOCH + Duration::from_millis(1_700_000_000_000);
    let written = atomic_commit(&mut file, &dest, CommitOptions::new().modified(Some(mtime)))
        .await
        .unwrap();

    assert_eq!(written, 7);
    assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    assert_eq!(modified(&dest).await.unwrap(), Some(mtime));
    assert!(!sibling_path(&dest, ".ok").unwrap().exists());
}

#[tokio::test]
async fn test_commit_into_missing_directory_fails_cleanly() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("missing").join("file.txt");

    let mut source: &[u8] = b"data";
    let result = atomic_commit(&mut source, &dest, CommitOptions::new()).await;

    assert!(matches!(result, Err(refetch_fs::Error::Write { .. })));
    assert!(!dest.exists());
}
