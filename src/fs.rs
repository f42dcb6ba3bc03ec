// File-system collaborator
//
// The renderer only ever reads whole files (the two SPIR-V binaries), so the
// interface is a single call. A trait keeps it swappable for tests.

use crate::error::{Error, Result};
use std::path::Path;

pub trait FileSystem {
    /// Read the whole file at `path`.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Reads from the real disk, relative to the working directory.
#[derive(Debug, Default)]
pub struct DiskFileSystem;

impl FileSystem for DiskFileSystem {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let bytes = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Read {} bytes from {:?}", bytes.len(), path);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shader.spv");
        std::fs::write(&path, [0x03, 0x02, 0x23, 0x07, 0xaa]).unwrap();

        let bytes = DiskFileSystem.read_file(&path).unwrap();
        assert_eq!(bytes, vec![0x03, 0x02, 0x23, 0x07, 0xaa]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.spv");

        match DiskFileSystem.read_file(&path) {
            Err(Error::Io { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
