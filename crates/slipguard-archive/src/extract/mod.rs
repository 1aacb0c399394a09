//! Extraction driver shared by every archive format.
//!
//! Each entry goes through the same steps in archive order: size accounting,
//! containment of the output path (and of the symlink target), the decision
//! table, then the filesystem effect. Validate mode runs the identical steps
//! and stops short of the filesystem.
//!
//! Symlinks accepted earlier in a run are remembered. A later path that
//! continues through one of them is skipped, since the filesystem would
//! follow the link where lexical containment cannot see it.
//!
//! # Platform Behavior
//!
//! **Unix**: symlinks are created with the target exactly as declared.
//!
//! **Windows**: a symlink is created as a directory link when its target
//! names an existing directory or ends in `/`, otherwise as a file link.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::accounting::SizeAccountant;
use crate::action::{Action, Containment, Disposition, EntryClass, SkipReason, decide};
use crate::containment::{
    absolutize, audit_symlinks, contains, contains_symlink_target, crossed_link,
    mentions_parent_dir, normalize_path, resolve_symlink_target,
};
use crate::entry::{ArchiveEntry, EntryKind, EntrySource};
use crate::error::{Error, Result};
use crate::format::ArchiveFormat;
use crate::options::ExtractOptions;
use crate::report::{ExtractedEntry, ExtractionReport, Rejection, Warning};

#[cfg(feature = "tar")]
mod tar;
#[cfg(feature = "zip")]
mod zip;

#[cfg(feature = "tar")]
pub use tar::{TarArchive, TarSource};
#[cfg(feature = "zip")]
pub use zip::ZipSource;

/// Extract the archive at `source` into `destination`.
///
/// The format is picked from the file-name suffix. Nothing is opened or
/// created for an unsupported suffix.
pub fn extract_archive(
    source: &Path,
    destination: &Path,
    options: &ExtractOptions,
) -> ExtractionReport {
    let Some(format) = ArchiveFormat::from_path(source) else {
        return ExtractionReport::failed(
            None,
            options.validate,
            Error::UnsupportedFormat {
                path: source.to_path_buf(),
            },
        );
    };

    let file = match File::open(source) {
        Ok(file) => file,
        Err(e) => {
            return ExtractionReport::failed(
                Some(format),
                options.validate,
                Error::Open {
                    path: source.to_path_buf(),
                    source: e,
                },
            );
        }
    };

    debug!(source = %source.display(), %format, "opened archive");
    extract_from_reader(BufReader::new(file), format, destination, options)
}

/// Extract an already opened archive of a known format.
pub fn extract_from_reader<R: Read + Seek>(
    reader: R,
    format: ArchiveFormat,
    destination: &Path,
    options: &ExtractOptions,
) -> ExtractionReport {
    match format {
        #[cfg(feature = "tar")]
        ArchiveFormat::TarGz => {
            let mut archive = TarArchive::new(reader);
            match archive.entries() {
                Ok(mut source) => extract(&mut source, destination, options),
                Err(e) => ExtractionReport::failed(Some(format), options.validate, e),
            }
        }
        #[cfg(feature = "zip")]
        ArchiveFormat::Zip => match ZipSource::new(reader) {
            Ok(mut source) => extract(&mut source, destination, options),
            Err(e) => ExtractionReport::failed(Some(format), options.validate, e),
        },
        #[allow(unreachable_patterns)]
        _ => ExtractionReport::failed(
            Some(format),
            options.validate,
            Error::UnsupportedFormat {
                path: PathBuf::from(format!("*.{format}")),
            },
        ),
    }
}

/// Run every entry of `source` through the checks and into `destination`.
///
/// Stops at the first fatal error. Entries written before it stay on disk.
/// An archive whose first entry cannot be read fails before the destination
/// is created.
pub fn extract<S: EntrySource + ?Sized>(
    source: &mut S,
    destination: &Path,
    options: &ExtractOptions,
) -> ExtractionReport {
    let mut report = ExtractionReport::new(Some(source.format()), options.validate);

    let first = match source.next_entry() {
        Some(Ok(entry)) => Some(entry),
        Some(Err(e)) => {
            report.fatal = Some(e);
            return report;
        }
        None => None,
    };

    let root = match prepare_root(destination, options.validate) {
        Ok(root) => root,
        Err(e) => {
            report.fatal = Some(e);
            return report;
        }
    };
    report.root = Some(root.clone());

    let mut extraction = Extraction {
        accountant: SizeAccountant::new(options.max_size),
        links: HashSet::new(),
        root,
        options,
        report,
    };

    let processed = first.map(|entry| extraction.process(entry));
    let outcome = match processed {
        Some(Ok(())) => extraction.run(source),
        Some(Err(e)) => Err(e),
        None => Ok(()),
    };

    if let Err(e) = outcome {
        extraction.report.fatal = Some(e);
    } else if options.audit_symlinks
        && !options.validate
        && let Err(e) = extraction.audit()
    {
        extraction.report.fatal = Some(e);
    }

    extraction.finish()
}

/// Resolve the destination root once, creating it unless validating.
///
/// The longest existing ancestor is canonicalized and the missing remainder
/// appended, so validate mode and a real run agree on the root.
pub fn prepare_root(destination: &Path, validate: bool) -> Result<PathBuf> {
    let root = absolutize(destination).ok_or_else(|| Error::Root {
        path: destination.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "cannot resolve destination"),
    })?;

    if !validate {
        fs::create_dir_all(&root).map_err(|source| Error::Root {
            path: root.clone(),
            source,
        })?;
    }

    canonicalize_existing(&root).map_err(|source| Error::Root { path: root, source })
}

fn canonicalize_existing(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();

    loop {
        match fs::canonicalize(existing) {
            Ok(canonical) => {
                return Ok(missing
                    .iter()
                    .rev()
                    .fold(canonical, |acc: PathBuf, part| acc.join(part)));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Ok(path.to_path_buf());
                };
                missing.push(name);
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}

struct Extraction<'o> {
    root: PathBuf,
    options: &'o ExtractOptions,
    accountant: SizeAccountant,
    /// Output paths of symlinks accepted so far, whether or not written.
    links: HashSet<PathBuf>,
    report: ExtractionReport,
}

impl Extraction<'_> {
    fn run<S: EntrySource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        while let Some(next) = source.next_entry() {
            self.process(next?)?;
        }
        Ok(())
    }

    fn process(&mut self, mut entry: ArchiveEntry<'_>) -> Result<()> {
        self.report.entry_count += 1;
        let joined = self.root.join(&entry.name);
        let target_path = normalize_path(&joined);

        let disposition = self.evaluate(&entry, &joined, &target_path);
        debug!(entry = %entry.name.display(), ?disposition, "evaluated entry");

        match disposition {
            Disposition::Abort(overflow) => Err(Error::SizeLimitExceeded {
                entry: entry.name,
                limit: overflow.limit,
                would_be: overflow.would_be,
            }),
            Disposition::Skip(reason) => {
                let warning = Warning::new(
                    entry.name.clone(),
                    self.rejection(reason, &entry, &joined, &target_path),
                );
                warn!(%warning, "entry rejected");
                self.report.warnings.push(warning);
                Ok(())
            }
            Disposition::Proceed(action) => {
                apply(action, &mut entry, &target_path)?;
                match entry.kind {
                    EntryKind::Symlink { .. } => {
                        self.links.insert(target_path.clone());
                    }
                    // A file write replaces any link at its path.
                    EntryKind::File => {
                        self.links.remove(&target_path);
                    }
                    _ => {}
                }
                self.report.entries.push(ExtractedEntry {
                    original_path: entry.name,
                    target_path,
                    kind: entry.kind,
                    size: entry.size,
                });
                Ok(())
            }
        }
    }

    /// Decide an entry without touching the filesystem.
    ///
    /// `joined` is the root joined with the raw entry name, `target_path` its
    /// normalized form.
    fn evaluate(
        &mut self,
        entry: &ArchiveEntry<'_>,
        joined: &Path,
        target_path: &Path,
    ) -> Disposition {
        match self.accountant.accumulate(entry.size) {
            Ok(total) => self.report.total_bytes = total,
            Err(overflow) => return Disposition::Abort(overflow),
        }

        if mentions_parent_dir(&entry.name) {
            debug!(entry = %entry.name.display(), "entry name mentions '..'");
        }

        if !contains(&self.root, target_path) {
            return decide(
                EntryClass::from(&entry.kind),
                Containment::path(false),
                self.options,
            );
        }

        let containment = match entry.symlink_target() {
            Some(target) => {
                let resolved = resolve_symlink_target(target, target_path);
                let contained = contains_symlink_target(&self.root, target, target_path)
                    && crossed_link(&resolved, &self.links).is_none();
                Containment::symlink(true, contained)
            }
            None => Containment::path(true),
        };
        let containment = if crossed_link(joined, &self.links).is_some() {
            containment.through_link()
        } else {
            containment
        };

        decide(EntryClass::from(&entry.kind), containment, self.options)
    }

    fn audit(&mut self) -> Result<()> {
        for escaping in audit_symlinks(&self.root)? {
            warn!(
                link = %escaping.link.display(),
                target = ?escaping.target,
                "symlink failed audit"
            );
            self.report.audit.push(escaping);
        }
        Ok(())
    }

    fn rejection(
        &self,
        reason: SkipReason,
        entry: &ArchiveEntry<'_>,
        joined: &Path,
        target_path: &Path,
    ) -> Rejection {
        match reason {
            SkipReason::OutsideRoot => Rejection::OutsideRoot {
                resolved: target_path.to_path_buf(),
            },
            SkipReason::ThroughSymlink => {
                let link = crossed_link(joined, &self.links).unwrap_or_default();
                Rejection::ThroughSymlink {
                    link: link
                        .strip_prefix(&self.root)
                        .map(Path::to_path_buf)
                        .unwrap_or(link),
                }
            }
            SkipReason::SymlinksNotAllowed => Rejection::SymlinksNotAllowed,
            SkipReason::SymlinkEscape => Rejection::SymlinkEscape {
                target: entry
                    .symlink_target()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
            },
            SkipReason::UnsupportedType => Rejection::UnsupportedType {
                kind: entry.kind.to_string(),
            },
        }
    }

    fn finish(self) -> ExtractionReport {
        let report = self.report;
        info!(
            root = %self.root.display(),
            entries = report.entry_count,
            bytes = report.total_bytes,
            warnings = report.warnings.len(),
            fatal = report.fatal.is_some(),
            validate = report.validated_only,
            "extraction finished"
        );
        report
    }
}

fn apply(action: Action, entry: &mut ArchiveEntry<'_>, target_path: &Path) -> Result<()> {
    match action {
        Action::Nothing => Ok(()),
        Action::CreateDirectory => ensure_directory(target_path),
        Action::WriteFile => write_file(entry, target_path),
        Action::CreateSymlink => match &entry.kind {
            EntryKind::Symlink { target } => write_symlink(target, target_path),
            _ => Ok(()),
        },
    }
}

fn write_file(entry: &mut ArchiveEntry<'_>, target_path: &Path) -> Result<()> {
    if let Some(parent) = target_path.parent() {
        ensure_directory(parent)?;
    }

    // Never write through a link left behind at the output path.
    if let Ok(meta) = fs::symlink_metadata(target_path)
        && meta.file_type().is_symlink()
    {
        fs::remove_file(target_path).map_err(|e| Error::ExtractionFailed {
            path: target_path.to_path_buf(),
            source: e,
        })?;
    }

    let mut file = File::create(target_path).map_err(|e| Error::ExtractionFailed {
        path: target_path.to_path_buf(),
        source: e,
    })?;

    let within = copy_limited(&mut entry.reader, &mut file, entry.size).map_err(|e| {
        Error::ExtractionFailed {
            path: target_path.to_path_buf(),
            source: e,
        }
    })?;
    if !within {
        return Err(Error::SizeMismatch {
            entry: entry.name.clone(),
            declared: entry.size,
        });
    }

    Ok(())
}

/// Copy at most `limit` bytes. `Ok(false)` when the reader holds more.
fn copy_limited<R: Read + ?Sized, W: Write>(
    reader: &mut R,
    writer: &mut W,
    limit: u64,
) -> io::Result<bool> {
    io::copy(&mut (&mut *reader).take(limit), writer)?;

    let mut probe = [0u8; 1];
    loop {
        match reader.read(&mut probe) {
            Ok(n) => return Ok(n == 0),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    if !path.is_dir() {
        fs::create_dir_all(path).map_err(|e| Error::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(unix)]
fn write_symlink(target: &Path, link: &Path) -> Result<()> {
    use std::os::unix::fs::symlink;

    if let Some(parent) = link.parent() {
        ensure_directory(parent)?;
    }
    symlink(target, link).map_err(|e| Error::SymlinkCreationFailed {
        target: target.to_path_buf(),
        link: link.to_path_buf(),
        source: e,
    })
}

#[cfg(windows)]
fn write_symlink(target: &Path, link: &Path) -> Result<()> {
    use std::os::windows::fs;

    if let Some(parent) = link.parent() {
        ensure_directory(parent)?;
    }
    let resolved = link
        .parent()
        .map(|p| p.join(target))
        .unwrap_or_else(|| target.to_path_buf());
    let is_dir_target = resolved.is_dir() || target.to_string_lossy().ends_with('/');
    let created = if is_dir_target {
        fs::symlink_dir(target, link)
    } else {
        fs::symlink_file(target, link)
    };
    created.map_err(|e| Error::SymlinkCreationFailed {
        target: target.to_path_buf(),
        link: link.to_path_buf(),
        source: e,
    })
}
