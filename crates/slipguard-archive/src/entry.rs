use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::Result;
use crate::format::ArchiveFormat;

/// What an archive entry declares itself to be.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink { target: PathBuf },
    /// Anything else the format can carry: hard links, devices, fifos.
    Other { description: String },
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => f.write_str("directory"),
            Self::File => f.write_str("file"),
            Self::Symlink { .. } => f.write_str("symlink"),
            Self::Other { description } => f.write_str(description),
        }
    }
}

/// One entry pulled from an archive, in archive order.
///
/// `reader` yields the entry content and is only meaningful for files. It
/// borrows the source, so the entry must be dropped before the next one is
/// requested.
pub struct ArchiveEntry<'a> {
    pub name: PathBuf,
    pub kind: EntryKind,
    /// Declared uncompressed size.
    pub size: u64,
    pub reader: Box<dyn Read + 'a>,
}

impl<'a> ArchiveEntry<'a> {
    pub fn new(name: PathBuf, kind: EntryKind, size: u64, reader: Box<dyn Read + 'a>) -> Self {
        Self {
            name,
            kind,
            size,
            reader,
        }
    }

    pub fn symlink_target(&self) -> Option<&Path> {
        match &self.kind {
            EntryKind::Symlink { target } => Some(target),
            _ => None,
        }
    }
}

impl fmt::Debug for ArchiveEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Sequential reader over the entries of one archive.
///
/// Implemented once per format; the extraction driver only sees this trait.
pub trait EntrySource {
    /// Next entry, `None` at the end of the archive.
    ///
    /// An `Err` means the archive itself is unreadable from here on.
    fn next_entry(&mut self) -> Option<Result<ArchiveEntry<'_>>>;

    fn format(&self) -> ArchiveFormat;
}
