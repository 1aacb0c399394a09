//! Containment checks for output paths and symlink targets.
//!
//! A path is contained in a root when its normalized absolute form equals the
//! root or continues it after a path separator. Normalization is lexical: `.`
//! and `..` segments are folded before any comparison, and the filesystem is
//! only consulted to make a relative path absolute.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf, is_separator};

/// Fold `.` and `..` segments and collapse repeated separators.
///
/// `..` at the root stays at the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(part) => result.push(part),
            Component::RootDir => result.push(Component::RootDir.as_os_str()),
            Component::Prefix(prefix) => result.push(prefix.as_os_str()),
            Component::CurDir => {}
        }
    }

    result
}

/// Make `path` absolute against the working directory and normalize it.
///
/// Returns `None` when the path cannot be resolved (empty path, missing
/// working directory).
pub fn absolutize(path: &Path) -> Option<PathBuf> {
    let absolute = std::path::absolute(path).ok()?;
    Some(normalize_path(&absolute))
}

/// Whether `candidate` lies within `root`, component aligned.
///
/// `/home/user2/x` is not inside `/home/user`.
pub fn contains(root: &Path, candidate: &Path) -> bool {
    let (Some(root), Some(candidate)) = (absolutize(root), absolutize(candidate)) else {
        return false;
    };

    has_component_prefix(
        root.as_os_str().as_encoded_bytes(),
        candidate.as_os_str().as_encoded_bytes(),
    )
}

fn has_component_prefix(root: &[u8], candidate: &[u8]) -> bool {
    if !candidate.starts_with(root) {
        return false;
    }
    if candidate.len() == root.len() {
        return true;
    }

    // A filesystem root such as `/` already ends in a separator.
    let boundary = if root.last().is_some_and(|&b| is_separator(char::from(b))) {
        root.len() - 1
    } else {
        root.len()
    };
    is_separator(char::from(candidate[boundary]))
}

/// Whether a symlink placed at `link_location` and pointing at `link_target`
/// resolves inside `root`.
///
/// Relative targets are resolved against the directory holding the link,
/// absolute targets are taken as is. An empty target never resolves.
pub fn contains_symlink_target(root: &Path, link_target: &Path, link_location: &Path) -> bool {
    if link_target.as_os_str().is_empty() {
        return false;
    }

    contains(root, &resolve_symlink_target(link_target, link_location))
}

/// Where a symlink at `link_location` pointing at `link_target` leads,
/// before any normalization.
pub fn resolve_symlink_target(link_target: &Path, link_location: &Path) -> PathBuf {
    match link_location.parent() {
        Some(parent) => parent.join(link_target),
        None => link_target.to_path_buf(),
    }
}

/// First of `links` that `path` continues through.
///
/// `path` is walked one component at a time with `..` folded as it comes,
/// so `l1/..` crosses `l1` even though it normalizes away. A path ending
/// exactly at a link does not cross it.
pub fn crossed_link(path: &Path, links: &HashSet<PathBuf>) -> Option<PathBuf> {
    if links.is_empty() {
        return None;
    }

    let mut walked = PathBuf::new();
    let mut components = path.components().peekable();
    while let Some(component) = components.next() {
        match component {
            Component::ParentDir => {
                walked.pop();
            }
            Component::Normal(part) => walked.push(part),
            Component::RootDir => walked.push(Component::RootDir.as_os_str()),
            Component::Prefix(prefix) => walked.push(prefix.as_os_str()),
            Component::CurDir => {}
        }
        if components.peek().is_some() && links.contains(&walked) {
            return Some(walked);
        }
    }

    None
}

/// Audit a symlink that already exists on disk.
///
/// The recorded target is read back from the filesystem. Anything that is
/// not a readable symlink fails the audit.
pub fn audit_symlink(root: &Path, link: &Path) -> bool {
    match fs::read_link(link) {
        Ok(target) => contains_symlink_target(root, &target, link),
        Err(_) => false,
    }
}

/// An on-disk symlink whose target leaves the audited root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscapingSymlink {
    pub link: PathBuf,
    pub target: Option<PathBuf>,
}

/// Walk `root` and report every symlink failing [`audit_symlink`].
///
/// Symlinked directories are not descended into.
pub fn audit_symlinks(root: &Path) -> io::Result<Vec<EscapingSymlink>> {
    let mut escaping = Vec::new();
    walk_symlinks(root, root, &mut escaping)?;
    Ok(escaping)
}

fn walk_symlinks(root: &Path, dir: &Path, escaping: &mut Vec<EscapingSymlink>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let ty = entry.file_type()?;

        if ty.is_symlink() {
            if !audit_symlink(root, &path) {
                escaping.push(EscapingSymlink {
                    target: fs::read_link(&path).ok(),
                    link: path,
                });
            }
        } else if ty.is_dir() {
            walk_symlinks(root, &path, escaping)?;
        }
    }

    Ok(())
}

/// Cheap textual screen for `..` anywhere in a name.
///
/// Over-rejects names like `foo..bar`; [`contains`] is the authoritative check.
pub fn mentions_parent_dir(path: &Path) -> bool {
    path.as_os_str()
        .as_encoded_bytes()
        .windows(2)
        .any(|pair| pair == b"..")
}
