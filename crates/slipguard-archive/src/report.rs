use std::fmt;
use std::path::PathBuf;

use crate::containment::EscapingSymlink;
use crate::entry::EntryKind;
use crate::error::{Error, Result};
use crate::format::ArchiveFormat;

/// Why an entry was skipped.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("destination outside root: '{resolved}'")]
    OutsideRoot { resolved: PathBuf },

    #[error("path passes through symlink '{link}'")]
    ThroughSymlink { link: PathBuf },

    #[error("symlinks not allowed")]
    SymlinksNotAllowed,

    #[error("symlink target outside root: '{target}'")]
    SymlinkEscape { target: PathBuf },

    #[error("unsupported entry type: {kind}")]
    UnsupportedType { kind: String },
}

/// A recoverable problem with one entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub entry: PathBuf,
    pub reason: Rejection,
}

impl Warning {
    pub fn new(entry: impl Into<PathBuf>, reason: Rejection) -> Self {
        Self {
            entry: entry.into(),
            reason,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entry.display(), self.reason)
    }
}

/// An entry that passed every check.
///
/// In validate mode it was only checked, never written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub original_path: PathBuf,
    pub target_path: PathBuf,
    pub kind: EntryKind,
    pub size: u64,
}

/// Everything one extraction call produced.
///
/// A fatal error and the warnings gathered before it travel together, so a
/// caller can report both.
#[derive(Debug)]
pub struct ExtractionReport {
    pub format: Option<ArchiveFormat>,
    /// Resolved destination root, once it has been prepared.
    pub root: Option<PathBuf>,
    pub entry_count: usize,
    pub total_bytes: u64,
    pub entries: Vec<ExtractedEntry>,
    /// Per-entry rejections, in archive order.
    pub warnings: Vec<Warning>,
    /// Symlinks under the root found escaping by the post-extraction audit.
    ///
    /// Covers the whole destination tree, not just this archive, and stays
    /// empty in validate mode.
    pub audit: Vec<EscapingSymlink>,
    pub fatal: Option<Error>,
    pub validated_only: bool,
}

impl ExtractionReport {
    pub(crate) fn new(format: Option<ArchiveFormat>, validated_only: bool) -> Self {
        Self {
            format,
            root: None,
            entry_count: 0,
            total_bytes: 0,
            entries: Vec::new(),
            warnings: Vec::new(),
            audit: Vec::new(),
            fatal: None,
            validated_only,
        }
    }

    pub(crate) fn failed(
        format: Option<ArchiveFormat>,
        validated_only: bool,
        error: Error,
    ) -> Self {
        let mut report = Self::new(format, validated_only);
        report.fatal = Some(error);
        report
    }

    /// No fatal error and nothing rejected.
    pub fn is_clean(&self) -> bool {
        self.fatal.is_none() && self.warnings.is_empty()
    }

    /// Completed, but some entries were refused.
    pub fn is_partially_rejected(&self) -> bool {
        self.fatal.is_none() && !self.warnings.is_empty()
    }

    /// Split into the fatal outcome and the warnings.
    pub fn into_result(self) -> Result<Vec<Warning>> {
        match self.fatal {
            Some(error) => Err(error),
            None => Ok(self.warnings),
        }
    }
}
