//! Atomic replacement of the output files.
//!
//! Every output is first staged into a temporary file next to its destination, so the
//! final rename never crosses file systems. Only once all outputs are staged are they moved
//! into place, symbols first and the image last. If a move fails, the files replaced so
//! far are put back from backups taken right before the first move, and files that did not
//! exist before are removed again.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use memmap2::MmapOptions;
use tempfile::{Builder, NamedTempFile};

use crate::{Error, Result};

const STAGING_PREFIX: &str = ".modinit-";

/// One file to write.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target<'a> {
    pub path: &'a Path,
    pub data: &'a [u8],
}

impl<'a> Target<'a> {
    pub(crate) fn new(path: &'a Path, data: &'a [u8]) -> Self {
        Target { path, data }
    }
}

fn write_error(path: &Path, source: io::Error) -> Error {
    Error::WriteError {
        path: path.to_path_buf(),
        source,
    }
}

fn directory_of(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Fill a staging file through a writable memory map.
fn write_mapped(file: &mut fs::File, data: &[u8]) -> io::Result<()> {
    if data.is_empty() {
        return file.set_len(0);
    }

    file.set_len(data.len() as u64)?;

    // The staging file is private to this process until it is persisted
    let mut mmap = unsafe { MmapOptions::new().map_mut(&*file)? };
    mmap.copy_from_slice(data);
    mmap.flush()
}

/// Replace all `targets` or none of them.
///
/// # Errors
/// [`Error::WriteError`] naming the file that could not be written; every destination is
/// left as it was.
pub(crate) fn commit(targets: &[Target<'_>]) -> Result<()> {
    commit_with(targets, write_mapped)
}

/// [`commit`] with a custom function filling the staging files.
pub(crate) fn commit_with<F>(targets: &[Target<'_>], mut sink: F) -> Result<()>
where
    F: FnMut(&mut fs::File, &[u8]) -> io::Result<()>,
{
    let mut staged = Vec::with_capacity(targets.len());
    for target in targets {
        let mut file = Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".tmp")
            .tempfile_in(directory_of(target.path))
            .map_err(|error| write_error(target.path, error))?;
        sink(file.as_file_mut(), target.data).map_err(|error| write_error(target.path, error))?;
        if let Some(permissions) = permissions_for(target.path) {
            file.as_file()
                .set_permissions(permissions)
                .map_err(|error| write_error(target.path, error))?;
        }
        file.as_file()
            .sync_all()
            .map_err(|error| write_error(target.path, error))?;
        debug!(
            "Staged {} bytes for {} at {}",
            target.data.len(),
            target.path.display(),
            file.path().display()
        );
        staged.push(file);
    }

    let mut backups = Vec::with_capacity(targets.len());
    for target in targets {
        backups.push(backup(target.path)?);
    }

    let mut replaced: Vec<(PathBuf, Option<NamedTempFile>)> = Vec::with_capacity(targets.len());
    for ((target, file), backup) in targets.iter().zip(staged).zip(backups) {
        if let Err(error) = file.persist(target.path) {
            rollback(replaced);
            return Err(write_error(target.path, error.error));
        }
        replaced.push((target.path.to_path_buf(), backup));
    }

    Ok(())
}

/// Mode a staged file takes over: the destination's own, or a regular file's default
/// when the destination is new. Staging files start out private to the owner.
fn permissions_for(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Some(metadata.permissions()),
        _ => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;

    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Copy of an existing destination, `None` if there is nothing to preserve.
fn backup(path: &Path) -> Result<Option<NamedTempFile>> {
    if !path.is_file() {
        return Ok(None);
    }

    let copy = Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(".bak")
        .tempfile_in(directory_of(path))
        .map_err(|error| write_error(path, error))?;
    fs::copy(path, copy.path()).map_err(|error| write_error(path, error))?;

    Ok(Some(copy))
}

/// Undo the files moved into place so far, newest first.
fn rollback(replaced: Vec<(PathBuf, Option<NamedTempFile>)>) {
    for (path, backup) in replaced.into_iter().rev() {
        let restored = match backup {
            Some(backup) => backup.persist(&path).map(|_| ()).map_err(|error| error.error),
            None => fs::remove_file(&path),
        };

        match restored {
            Ok(()) => debug!("Restored {}", path.display()),
            Err(error) => warn!("Could not restore {}: {}", path.display(), error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with(STAGING_PREFIX))
            .collect()
    }

    #[test]
    fn writes_all() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.dll");
        let pdb = dir.path().join("a.pdb");
        fs::write(&image, b"old image").unwrap();

        commit(&[
            Target::new(&pdb, b"new pdb"),
            Target::new(&image, b"new image"),
        ])
        .unwrap();

        assert_eq!(fs::read(&image).unwrap(), b"new image");
        assert_eq!(fs::read(&pdb).unwrap(), b"new pdb");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn staging_failure_keeps_targets() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.dll");
        let pdb = dir.path().join("a.pdb");
        fs::write(&image, b"old image").unwrap();
        fs::write(&pdb, b"old pdb").unwrap();

        let mut calls = 0;
        let result = commit_with(
            &[Target::new(&pdb, b"new pdb"), Target::new(&image, b"new image")],
            |file, data| {
                calls += 1;
                if calls == 2 {
                    return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
                }
                write_mapped(file, data)
            },
        );

        assert!(matches!(result, Err(Error::WriteError { path, .. }) if path == image));
        assert_eq!(fs::read(&image).unwrap(), b"old image");
        assert_eq!(fs::read(&pdb).unwrap(), b"old pdb");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn failed_move_restores_earlier_targets() {
        let dir = tempfile::tempdir().unwrap();
        let pdb = dir.path().join("a.pdb");
        let new_pdb = dir.path().join("b.pdb");
        let blocked = dir.path().join("a.dll");
        fs::write(&pdb, b"old pdb").unwrap();
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), b"x").unwrap();

        let result = commit(&[
            Target::new(&pdb, b"new pdb"),
            Target::new(&new_pdb, b"created"),
            Target::new(&blocked, b"new image"),
        ]);

        assert!(matches!(result, Err(Error::WriteError { path, .. }) if path == blocked));
        assert_eq!(fs::read(&pdb).unwrap(), b"old pdb");
        assert!(!new_pdb.exists());
        assert!(blocked.is_dir());
        assert!(leftovers(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.dll");
        let pdb = dir.path().join("a.pdb");
        fs::write(&image, b"old image").unwrap();
        fs::set_permissions(&image, fs::Permissions::from_mode(0o755)).unwrap();

        commit(&[
            Target::new(&pdb, b"new pdb"),
            Target::new(&image, b"new image"),
        ])
        .unwrap();

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&image), 0o755);
        assert_eq!(mode(&pdb), 0o644);
    }

    #[test]
    fn relative_paths() {
        assert_eq!(directory_of(Path::new("a.dll")), Path::new("."));
        assert_eq!(directory_of(Path::new("out/a.dll")), Path::new("out"));
    }
}
