//! Conflict-free destination naming
//!
//! When a transfer or move would land on a name that is already taken, a
//! numbered alternative is probed: `photo.jpg`, `photo 1.jpg`,
//! `photo 2.jpg`, ... The probe gives up after 999 attempts; callers must
//! surface that as an error rather than retry.

use std::path::Path;

use crate::errors::{Error, Result};

const MAX_PROBES: u32 = 999;

/// Resolve `candidate` against a predicate reporting taken names.
pub fn resolve_with(candidate: &str, is_taken: impl Fn(&str) -> bool) -> Result<String> {
    if !is_taken(candidate) {
        return Ok(candidate.to_string());
    }

    let (stem, ext) = split_name(candidate);
    for n in 1..=MAX_PROBES {
        let probe = match ext {
            Some(ext) => format!("{stem} {n}.{ext}"),
            None => format!("{stem} {n}"),
        };
        if !is_taken(&probe) {
            return Ok(probe);
        }
    }
    Err(Error::NameSpaceExhausted(candidate.to_string()))
}

/// Resolve `candidate` against a sibling name list.
pub fn resolve(candidate: &str, existing: &[String]) -> Result<String> {
    resolve_with(candidate, |name| existing.iter().any(|e| e == name))
}

/// Resolve `candidate` against the contents of a local directory,
/// probing the filesystem itself (used for download targets).
pub fn resolve_local(dir: &Path, candidate: &str) -> Result<String> {
    resolve_with(candidate, |name| dir.join(name).exists())
}

/// Split a file name into stem and extension. A leading dot is part of the
/// stem, so dotfiles don't lose their name to the extension.
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}
