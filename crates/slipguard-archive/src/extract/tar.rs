use std::io::Read;

use flate2::read::GzDecoder;
use tar::EntryType;

use crate::entry::{ArchiveEntry, EntryKind, EntrySource};
use crate::error::{Error, Result};
use crate::format::ArchiveFormat;

/// A gzip-compressed tar stream.
///
/// Entries borrow the archive, so iteration goes through [`TarArchive::entries`].
pub struct TarArchive<R: Read> {
    archive: tar::Archive<GzDecoder<R>>,
}

impl<R: Read> TarArchive<R> {
    pub fn new(reader: R) -> Self {
        Self {
            archive: tar::Archive::new(GzDecoder::new(reader)),
        }
    }

    pub fn entries(&mut self) -> Result<TarSource<'_, R>> {
        let entries = self
            .archive
            .entries()
            .map_err(|source| Error::Header { source })?;
        Ok(TarSource { entries })
    }
}

pub struct TarSource<'a, R: Read + 'a> {
    entries: tar::Entries<'a, GzDecoder<R>>,
}

impl<'a, R: Read + 'a> EntrySource for TarSource<'a, R> {
    fn next_entry(&mut self) -> Option<Result<ArchiveEntry<'_>>> {
        let entry = match self.entries.next()? {
            Ok(entry) => entry,
            Err(source) => return Some(Err(Error::Header { source })),
        };

        let name = match entry.path() {
            Ok(path) => path.into_owned(),
            Err(source) => return Some(Err(Error::Header { source })),
        };
        let size = entry.size();
        let entry_type = entry.header().entry_type();

        let kind = if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_file() || entry_type.is_contiguous() || entry_type.is_gnu_sparse() {
            EntryKind::File
        } else if entry_type.is_symlink() {
            match entry.link_name() {
                Ok(Some(target)) => EntryKind::Symlink {
                    target: target.into_owned(),
                },
                Ok(None) => {
                    return Some(Err(Error::MalformedEntry {
                        entry: name,
                        reason: "symlink without a target".into(),
                    }));
                }
                Err(source) => return Some(Err(Error::Header { source })),
            }
        } else {
            EntryKind::Other {
                description: describe(entry_type),
            }
        };

        Some(Ok(ArchiveEntry::new(name, kind, size, Box::new(entry))))
    }

    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::TarGz
    }
}

fn describe(entry_type: EntryType) -> String {
    if entry_type.is_hard_link() {
        "hard link".into()
    } else if entry_type.is_character_special() {
        "character device".into()
    } else if entry_type.is_block_special() {
        "block device".into()
    } else if entry_type.is_fifo() {
        "fifo".into()
    } else {
        format!("tar type '{}'", char::from(entry_type.as_byte()))
    }
}
