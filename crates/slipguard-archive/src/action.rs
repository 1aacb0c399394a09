//! Per-entry decision table.
//!
//! [`decide`] is pure: it sees the entry class, the containment results and
//! the options, and nothing else. Validate mode and a real run therefore
//! reach the same disposition for the same entry.

use crate::accounting::Overflow;
use crate::entry::EntryKind;
use crate::options::ExtractOptions;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryClass {
    Directory,
    File,
    Symlink,
    Other,
}

impl From<&EntryKind> for EntryClass {
    fn from(kind: &EntryKind) -> Self {
        match kind {
            EntryKind::Directory => Self::Directory,
            EntryKind::File => Self::File,
            EntryKind::Symlink { .. } => Self::Symlink,
            EntryKind::Other { .. } => Self::Other,
        }
    }
}

/// Containment results for one entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Containment {
    /// Output path stays under the root.
    pub path: bool,
    /// Output path continues through a symlink accepted earlier in the run.
    pub through_link: bool,
    /// Symlink target stays under the root; `None` when not evaluated.
    pub target: Option<bool>,
}

impl Containment {
    pub fn path(contained: bool) -> Self {
        Self {
            path: contained,
            through_link: false,
            target: None,
        }
    }

    pub fn symlink(path: bool, target: bool) -> Self {
        Self {
            path,
            through_link: false,
            target: Some(target),
        }
    }

    pub fn through_link(self) -> Self {
        Self {
            through_link: true,
            ..self
        }
    }
}

/// Filesystem effect of an entry that proceeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    CreateDirectory,
    WriteFile,
    CreateSymlink,
    /// Validate mode: checked, not written.
    Nothing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    OutsideRoot,
    ThroughSymlink,
    SymlinksNotAllowed,
    SymlinkEscape,
    UnsupportedType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Proceed(Action),
    Skip(SkipReason),
    Abort(Overflow),
}

impl Disposition {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed(_))
    }
}

/// Map an entry onto its disposition.
///
/// Output-path containment is checked first for every class, then the
/// symlink policy, then the symlink target. Never returns `Abort`; size
/// overflow is decided before this table is consulted.
pub fn decide(
    class: EntryClass,
    containment: Containment,
    options: &ExtractOptions,
) -> Disposition {
    if !containment.path {
        return Disposition::Skip(SkipReason::OutsideRoot);
    }
    if containment.through_link {
        return Disposition::Skip(SkipReason::ThroughSymlink);
    }

    let action = match class {
        EntryClass::Directory => Action::CreateDirectory,
        EntryClass::File => Action::WriteFile,
        EntryClass::Symlink => {
            if !options.allow_symlinks {
                return Disposition::Skip(SkipReason::SymlinksNotAllowed);
            }
            if containment.target != Some(true) {
                return Disposition::Skip(SkipReason::SymlinkEscape);
            }
            Action::CreateSymlink
        }
        EntryClass::Other => return Disposition::Skip(SkipReason::UnsupportedType),
    };

    if options.validate {
        Disposition::Proceed(Action::Nothing)
    } else {
        Disposition::Proceed(action)
    }
}
