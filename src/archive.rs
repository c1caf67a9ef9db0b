//! Zip extraction with a path-traversal guard.
//!
//! Every entry must resolve to a path below the destination directory;
//! entries using `..`, absolute paths or drive prefixes to escape it abort
//! the extraction.

use crate::error::FetchError;
use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};
use zip::ZipArchive;

/// Resolves an archive entry name to a path below `destination`.
///
/// The check is lexical: `.` components are dropped and `..` pops the
/// previous component, failing if it would climb above `destination`.
pub fn resolve_entry_path(destination: &Path, entry_name: &str) -> Result<PathBuf, FetchError> {
    let traversal = || FetchError::PathTraversal {
        entry: entry_name.to_string(),
    };

    if entry_name.contains('\0') {
        return Err(traversal());
    }

    let mut relative = PathBuf::new();
    for component in Path::new(entry_name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(traversal());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(traversal());
    }

    Ok(destination.join(relative))
}

/// Extracts the zip file at `archive_path` into `destination`.
///
/// Returns the paths of the extracted files.
pub fn extract_file(archive_path: &Path, destination: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let file = File::open(archive_path)?;
    extract(file, destination)
}

/// Extracts a zip archive read from `reader` into `destination`.
///
/// All entry names are checked before anything is written, so a rejected
/// archive leaves `destination` untouched.
pub fn extract<R: Read + Seek>(reader: R, destination: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let mut archive = ZipArchive::new(reader)?;

    fs::create_dir_all(destination)?;

    let mut targets = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        targets.push(resolve_entry_path(destination, entry.name())?);
    }

    let mut extracted = Vec::new();
    for (index, target) in targets.into_iter().enumerate() {
        let mut entry = archive.by_index(index)?;

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&target)?;
        let written = io::copy(&mut entry, &mut out)?;
        debug!("Extracted {} ({} bytes)", target.display(), written);
        extracted.push(target);
    }

    info!(
        "Unpacked {} file(s) into {}",
        extracted.len(),
        destination.display()
    );
    Ok(extracted)
}
