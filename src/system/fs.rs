//! File system utilities

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::system::{self, Error};

/// Convenience wrapper for std::fs::create_dir_all
pub fn ensure_directory<P>(path: P) -> Result<(), Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }
    system::verboseln!("Creating", "{}", path.display());
    std::fs::create_dir_all(path).map_err(|e| Error::CreateDirectory(path.display().to_string(), e))
}

/// Convenience wrapper for std::fs::remove_file
pub fn remove_file<P>(path: P) -> Result<(), Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }
    system::verboseln!("Removing", "{}", path.display());
    std::fs::remove_file(path).map_err(|e| Error::RemoveFile(path.display().to_string(), e))
}

/// Convenience wrapper for std::fs::rename
pub fn rename_file<P, Q>(from: P, to: Q) -> Result<(), Error>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let from = from.as_ref();
    let to = to.as_ref();
    system::verboseln!("Renaming", "{} --> {}", from.display(), to.display());
    std::fs::rename(from, to)
        .map_err(|e| Error::RenameFile(from.display().to_string(), to.display().to_string(), e))
}

/// Convenience wrapper for std::fs::read_to_string
pub fn read_file<P>(path: P) -> Result<String, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| Error::ReadFile(path.display().to_string(), e))
}

/// Convenience wrapper for std::fs::read
pub fn read_bytes<P>(path: P) -> Result<Vec<u8>, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| Error::ReadFile(path.display().to_string(), e))
}

/// Wrapper for File::open
pub fn open<P>(path: P) -> Result<File, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    File::open(path).map_err(|e| Error::ReadFile(path.display().to_string(), e))
}

/// Convenience wrapper for std::fs::write
pub fn write_file<P, S>(path: P, content: S) -> Result<(), Error>
where
    P: AsRef<Path>,
    S: AsRef<[u8]>,
{
    let path = path.as_ref();
    std::fs::write(path, content).map_err(|e| Error::WriteFile(path.display().to_string(), e))
}

pub fn create<P>(path: P) -> Result<File, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    File::create(path).map_err(|e| Error::WriteFile(path.display().to_string(), e))
}

pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_file()
}

pub fn directory_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_dir()
}

pub fn anything_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists()
}

/// Search an ordered list of directories for a file.
///
/// An absolute path is only checked for existence.  Returns None if the file
/// is not found anywhere.
pub fn find_file<P: AsRef<Path>>(file_path: &str, search_dirs: &[P]) -> Option<PathBuf> {
    let path = Path::new(file_path);
    if path.is_absolute() {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        return None;
    }
    for dir in search_dirs {
        let candidate = dir.as_ref().join(path);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Search an ordered list of directories for a component directory
/// (a directory containing a Component.cdef).
pub fn find_component<P: AsRef<Path>>(dir_path: &str, search_dirs: &[P]) -> Option<PathBuf> {
    let path = Path::new(dir_path);
    if path.is_absolute() {
        if path.join("Component.cdef").is_file() {
            return Some(path.to_path_buf());
        }
        return None;
    }
    for dir in search_dirs {
        let candidate = dir.as_ref().join(path);
        if candidate.join("Component.cdef").is_file() {
            return Some(candidate);
        }
    }
    None
}

pub trait PathExt {
    /// Wrapper for std::path::canonicalize, but maps the error to our own
    fn canonicalize2(&self) -> Result<PathBuf, Error>;
}

impl<P> PathExt for P
where
    P: AsRef<Path>,
{
    fn canonicalize2(&self) -> Result<PathBuf, Error> {
        dunce::canonicalize(self)
            .map_err(|x| Error::InvalidPath(self.as_ref().display().to_string(), x))
    }
}
