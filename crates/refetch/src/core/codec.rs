//! Transfer record header codec.
//!
//! Layout: a big-endian `u16` N, then N bytes of UTF-8 JSON
//! `{"len": <payload bytes>, "mtime": <epoch milliseconds, 0 if unknown>}`.
//! The payload follows immediately.

use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::data::Metadata;

/// Largest integer a JSON number carries without loss (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Size of the length prefix in front of the JSON segment.
pub const PREFIX_LEN: u64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("header is truncated")]
    Truncated,

    #[error("header is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{field} is not a safe integer: {value}")]
    UnsafeInteger { field: &'static str, value: i128 },

    #[error(transparent)]
    Io(io::Error),
}

#[derive(Deserialize)]
struct Header {
    len:   u64,
    mtime: i64,
}

pub fn encode(metadata: &Metadata) -> Vec<u8> {
    let mtime = metadata.modified.map(to_millis).unwrap_or(0);
    let json = serde_json::json!({ "len": metadata.len, "mtime": mtime }).to_string();

    // Two integers of at most 16 digits each; always far below u16::MAX.
    let prefix = (json.len() as u16).to_be_bytes();

    let mut out = Vec::with_capacity(prefix.len() + json.len());
    out.extend_from_slice(&prefix);
    out.extend_from_slice(json.as_bytes());
    out
}

/// Decodes a header from the front of `bytes`.
///
/// Returns the metadata and the number of bytes the header occupies.
pub fn decode_slice(bytes: &[u8]) -> Result<(Metadata, u64), CodecError> {
    let [hi, lo, rest @ ..] = bytes else {
        return Err(CodecError::Truncated);
    };
    let n = u16::from_be_bytes([*hi, *lo]) as usize;
    let json = rest.get(..n).ok_or(CodecError::Truncated)?;

    Ok((parse(json)?, PREFIX_LEN + n as u64))
}

/// Reads a header from the current position of `reader`.
///
/// Leaves `reader` positioned at the first payload byte.
pub async fn decode<R>(reader: &mut R) -> Result<(Metadata, u64), CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; PREFIX_LEN as usize];
    read_exact(reader, &mut prefix).await?;

    let n = u16::from_be_bytes(prefix) as usize;
    let mut json = vec![0u8; n];
    read_exact(reader, &mut json).await?;

    Ok((parse(&json)?, PREFIX_LEN + n as u64))
}

async fn read_exact<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(CodecError::Truncated),
        Err(e) => Err(CodecError::Io(e)),
    }
}

fn parse(json: &[u8]) -> Result<Metadata, CodecError> {
    let header: Header = serde_json::from_slice(json)?;

    if header.len > MAX_SAFE_INTEGER {
        return Err(CodecError::UnsafeInteger {
            field: "len",
            value: header.len as i128,
        });
    }
    if header.mtime.unsigned_abs() > MAX_SAFE_INTEGER {
        return Err(CodecError::UnsafeInteger {
            field: "mtime",
            value: header.mtime as i128,
        });
    }

    Ok(Metadata::new(header.len, from_millis(header.mtime)))
}

/// Milliseconds since the epoch; times before the epoch map to `0` (unknown).
pub fn to_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(MAX_SAFE_INTEGER as u128) as i64)
        .unwrap_or(0)
}

pub fn from_millis(millis: i64) -> Option<SystemTime> {
    (millis > 0).then(|| UNIX_EPOCH + Duration::from_millis(millis as u64))
}
