use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use time::{OffsetDateTime, PrimitiveDateTime};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DirStats {
    pub size: u64,
    pub file_count: u64,
    pub last_modified: Option<SystemTime>,
}

impl DirStats {
    pub fn last_modified_local(&self) -> Option<PrimitiveDateTime> {
        self.last_modified
            .map(|modified| crate::timestamp::to_local(OffsetDateTime::from(modified)))
    }
}

/// Relative file and directory paths of a tree, sorted so that siblings stay
/// contiguous. Symlinks are never followed: links that resolve to a file are
/// listed with `files`, dangling links and links to directories in `links`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TreeListing {
    pub dirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
    pub links: Vec<PathBuf>,
}

/// Recursive size/count/mtime scan. Blocking and O(file count).
pub fn scan_directory(root: &Path) -> io::Result<DirStats> {
    let mut stats = DirStats::default();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
                continue;
            }
            let metadata = if file_type.is_symlink() {
                match fs::metadata(entry.path()) {
                    Ok(metadata) if metadata.is_file() => metadata,
                    _ => continue,
                }
            } else {
                entry.metadata()?
            };
            stats.size += metadata.len();
            stats.file_count += 1;
            if let Ok(modified) = metadata.modified()
                && stats.last_modified.is_none_or(|latest| modified > latest)
            {
                stats.last_modified = Some(modified);
            }
        }
    }
    Ok(stats)
}

pub fn list_tree(root: &Path) -> io::Result<TreeListing> {
    let mut listing = TreeListing::default();
    let mut pending = vec![PathBuf::new()];
    while let Some(relative) = pending.pop() {
        for entry in fs::read_dir(root.join(&relative))? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let child = relative.join(entry.file_name());
            if file_type.is_symlink() {
                match fs::metadata(entry.path()) {
                    Ok(target) if target.is_file() => listing.files.push(child),
                    _ => listing.links.push(child),
                }
            } else if file_type.is_dir() {
                listing.dirs.push(child.clone());
                pending.push(child);
            } else if file_type.is_file() {
                listing.files.push(child);
            }
        }
    }
    listing.dirs.sort();
    listing.files.sort();
    listing.links.sort();
    Ok(listing)
}

/// Counts `*.dll` files directly inside `dir`; a missing directory counts zero.
pub fn count_mod_dlls(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };
    let mut count = 0;
    for entry in entries {
        let entry = entry?;
        let is_dll = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("dll"));
        if is_dll && entry.file_type()?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
