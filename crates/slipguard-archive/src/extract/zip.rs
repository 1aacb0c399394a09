use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::entry::{ArchiveEntry, EntryKind, EntrySource};
use crate::error::{Error, Result};
use crate::format::ArchiveFormat;

const S_IFMT: u32 = 0o170_000;
const S_IFREG: u32 = 0o100_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFLNK: u32 = 0o120_000;

/// Longest symlink target read out of a zip entry.
const MAX_LINK_TARGET: u64 = 4096;

pub struct ZipSource<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
    index: usize,
}

impl<R: Read + Seek> ZipSource<R> {
    /// Parse the central directory. Fails on anything that is not a zip.
    pub fn new(reader: R) -> Result<Self> {
        let archive = zip::ZipArchive::new(reader)?;
        Ok(Self { archive, index: 0 })
    }
}

impl<R: Read + Seek> EntrySource for ZipSource<R> {
    fn next_entry(&mut self) -> Option<Result<ArchiveEntry<'_>>> {
        if self.index >= self.archive.len() {
            return None;
        }
        let index = self.index;
        self.index += 1;

        let mut file = match self.archive.by_index(index) {
            Ok(file) => file,
            Err(e) => return Some(Err(e.into())),
        };

        let name = PathBuf::from(file.name());
        let size = file.size();
        let file_type = file.unix_mode().map(|mode| mode & S_IFMT);

        let kind = if file.is_dir() || file_type == Some(S_IFDIR) {
            EntryKind::Directory
        } else {
            match file_type {
                None | Some(0) | Some(S_IFREG) => EntryKind::File,
                Some(S_IFLNK) => match read_link_target(&mut file, &name) {
                    Ok(target) => EntryKind::Symlink { target },
                    Err(e) => return Some(Err(e)),
                },
                Some(other) => EntryKind::Other {
                    description: format!("unix file type {other:o}"),
                },
            }
        };

        Some(Ok(ArchiveEntry::new(name, kind, size, Box::new(file))))
    }

    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }
}

/// Zip stores a symlink target as the entry content.
fn read_link_target(reader: &mut impl Read, name: &Path) -> Result<PathBuf> {
    let mut content = Vec::new();
    reader
        .take(MAX_LINK_TARGET + 1)
        .read_to_end(&mut content)
        .map_err(|source| Error::Header { source })?;

    if content.len() as u64 > MAX_LINK_TARGET {
        return Err(Error::MalformedEntry {
            entry: name.to_path_buf(),
            reason: format!("symlink target longer than {MAX_LINK_TARGET} bytes"),
        });
    }

    match String::from_utf8(content) {
        Ok(target) => Ok(PathBuf::from(target)),
        Err(_) => Err(Error::MalformedEntry {
            entry: name.to_path_buf(),
            reason: "symlink target is not valid UTF-8".into(),
        }),
    }
}
