use std::time::SystemTime;

/// What a transfer record promised when it was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Metadata {
    /// Expected payload length from `Content-Length`; `0` when unknown.
    pub len:      u64,
    /// Remote `Last-Modified` captured with the first response.
    pub modified: Option<SystemTime>,
}

impl Metadata {
    pub fn new(len: u64, modified: Option<SystemTime>) -> Self { Self { len, modified } }
}
