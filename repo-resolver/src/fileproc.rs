// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Filesystem primitives used by the installer/deployer: copy, move,
//! mkdirs, write, all preserving `lastModified` where it matters.

use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Reports bytes copied so far out of an optional known total.
pub trait CopyProgressListener: Send + Sync {
    fn on_progress(&self, bytes_copied: u64, total: Option<u64>);
}

pub trait FileProcessor: Send + Sync {
    fn copy(&self, src: &Path, dst: &Path, progress: Option<&dyn CopyProgressListener>) -> io::Result<u64>;
    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()>;
    fn mkdirs(&self, dir: &Path) -> io::Result<()>;
    fn write(&self, file: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Plain `std::fs`-backed implementation; mirrors the reference
/// `DefaultFileProcessor`'s semantics of skip-if-same-file and
/// preserve-lastModified, without the chunked-copy progress plumbing a real
/// transfer engine would need.
pub struct DefaultFileProcessor;

impl FileProcessor for DefaultFileProcessor {
    fn copy(&self, src: &Path, dst: &Path, progress: Option<&dyn CopyProgressListener>) -> io::Result<u64> {
        if same_file(src, dst)? {
            return Ok(fs::metadata(src)?.len());
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = fs::copy(src, dst)?;
        if let Some(progress) = progress {
            progress.on_progress(bytes, Some(bytes));
        }
        preserve_last_modified(src, dst)?;
        Ok(bytes)
    }

    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()> {
        if same_file(src, dst)? {
            return Ok(());
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::rename(src, dst) {
            Ok(()) => Ok(()),
            // Cross-filesystem rename fails with EXDEV; fall back to copy+remove.
            Err(_) => {
                fs::copy(src, dst)?;
                preserve_last_modified(src, dst)?;
                fs::remove_file(src)
            }
        }
    }

    fn mkdirs(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn write(&self, file: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file, bytes)
    }
}

/// Whether two paths already name the same on-disk file, so the installer
/// can skip a redundant copy.
fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    if !a.exists() || !b.exists() {
        return Ok(false);
    }
    let (a, b) = (a.canonicalize()?, b.canonicalize()?);
    Ok(a == b)
}

fn preserve_last_modified(src: &Path, dst: &Path) -> io::Result<()> {
    let modified = fs::metadata(src)?.modified()?;
    File::open(dst)?.set_modified(modified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_preserves_last_modified() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.jar");
        let dst = dir.path().join("dst.jar");
        fs::write(&src, b"payload").unwrap();

        DefaultFileProcessor.copy(&src, &dst, None).unwrap();
        let (src_mtime, dst_mtime) = (fs::metadata(&src).unwrap().modified().unwrap(), fs::metadata(&dst).unwrap().modified().unwrap());
        assert_eq!(src_mtime, dst_mtime);
    }

    #[test]
    fn copy_is_a_no_op_when_source_and_destination_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("same.jar");
        fs::write(&path, b"payload").unwrap();

        let bytes = DefaultFileProcessor.copy(&path, &path, None).unwrap();
        assert_eq!(bytes, 7);
    }

    #[test]
    fn mkdirs_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        DefaultFileProcessor.mkdirs(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
