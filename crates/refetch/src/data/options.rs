use refetch_fs::CommitOptions;

/// Configuration of the local filesystem binding.
///
/// # Examples
///
/// ```
/// use refetch::LocalOptions;
///
/// let options = LocalOptions::new()
///     .record_suffix(".part")
///     .sync(true);
/// assert_eq!(options.record_suffix_str(), ".part");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct LocalOptions {
    /// Suffix of the side-car transfer record next to the target.
    ///
    /// Default: `.download`
    record_suffix: &'static str,

    /// Suffix of the staging file used by the atomic commit.
    ///
    /// Default: `.ok`
    commit_suffix: &'static str,

    /// Unix mode of the side-car and staging files.
    ///
    /// Default: `0o664`
    permissions: u32,

    /// Whether to fsync the staging file before it is renamed into place.
    ///
    /// Default: `false`
    sync: bool,
}

impl Default for LocalOptions {
    fn default() -> Self { Self::new() }
}

impl LocalOptions {
    pub fn new() -> Self {
        Self {
            record_suffix: ".download",
            commit_suffix: ".ok",
            permissions:   0o664,
            sync:          false,
        }
    }

    pub fn record_suffix(mut self, suffix: &'static str) -> Self {
        self.record_suffix = suffix;
        self
    }

    pub fn commit_suffix(mut self, suffix: &'static str) -> Self {
        self.commit_suffix = suffix;
        self
    }

    pub fn permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn record_suffix_str(&self) -> &'static str { self.record_suffix }

    pub fn get_permissions(&self) -> u32 { self.permissions }

    pub(crate) fn commit_options(&self) -> CommitOptions {
        CommitOptions::new()
            .suffix(self.commit_suffix)
            .permissions(self.permissions)
            .sync(self.sync)
    }
}
