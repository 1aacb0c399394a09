//! Archive extraction guarded against zip-slip, symlink escape and
//! decompression bombs.
//!
//! # Architecture
//!
//! - `containment.rs` - Output path and symlink target containment
//! - `accounting.rs` - Cumulative size budget
//! - `action.rs` - Per-entry decision table
//! - `extract/` - Shared driver and per-format entry sources
//! - `report.rs` - Warnings and the extraction outcome

pub use accounting::{Overflow, SizeAccountant, accumulate};
pub use action::{Action, Containment, Disposition, EntryClass, SkipReason, decide};
pub use containment::{
    EscapingSymlink, audit_symlink, audit_symlinks, contains, contains_symlink_target,
    crossed_link, resolve_symlink_target,
};
pub use entry::{ArchiveEntry, EntryKind, EntrySource};
pub use error::{Error, Result};
pub use extract::{extract, extract_archive, extract_from_reader, prepare_root};
pub use format::ArchiveFormat;
pub use options::{DEFAULT_MAX_SIZE, ExtractOptions};
pub use report::{ExtractedEntry, ExtractionReport, Rejection, Warning};

pub mod accounting;
pub mod action;
pub mod containment;
pub mod entry;
mod error;
pub mod extract;
mod format;
pub mod options;
mod report;
