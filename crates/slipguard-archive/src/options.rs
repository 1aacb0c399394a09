/// Upper bound on cumulative uncompressed bytes when the caller sets none.
pub const DEFAULT_MAX_SIZE: u64 = 100_000_000;

/// Options for one extraction call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Maximum cumulative declared size of all entries, in bytes.
    pub max_size: u64,
    /// Materialize symlink entries whose target stays inside the root.
    pub allow_symlinks: bool,
    /// Run every check without touching the filesystem.
    pub validate: bool,
    /// Re-check every symlink on disk once a real extraction finishes.
    pub audit_symlinks: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            allow_symlinks: false,
            validate: false,
            audit_symlinks: false,
        }
    }
}

impl ExtractOptions {
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    pub fn allow_symlinks(mut self, allow: bool) -> Self {
        self.allow_symlinks = allow;
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn audit_symlinks(mut self, audit: bool) -> Self {
        self.audit_symlinks = audit;
        self
    }
}
