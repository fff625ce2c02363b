use crate::error::{RecoveryError, Result};
use crate::types::Size;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read-only memory-mapped disk image with shared ownership
#[derive(Clone)]
pub struct DiskImage {
    // zero-length files cannot be mapped, so they carry no map at all
    mmap: Option<Arc<Mmap>>,
    size: Size,
    path: PathBuf,
}

impl DiskImage {
    /// Open a disk image file with memory mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let file = File::open(path_ref).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RecoveryError::FileNotFound(path_ref.display().to_string())
            } else {
                RecoveryError::Io(e)
            }
        })?;

        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(RecoveryError::InvalidArgument(format!(
                "{} is a directory",
                path_ref.display()
            )));
        }
        let size = Size::new(metadata.len());

        let mmap = if size.as_u64() == 0 {
            None
        } else {
            // Safety: the map is only ever read; the image must not be
            // truncated by another process while it is mapped
            let map = unsafe {
                Mmap::map(&file)
                    .map_err(|e| RecoveryError::Mmap(format!("Failed to mmap file: {}", e)))?
            };
            Some(Arc::new(map))
        };

        Ok(Self {
            mmap,
            size,
            path: path_ref.to_path_buf(),
        })
    }

    /// Get the total size of the disk image
    pub fn size(&self) -> Size {
        self.size
    }

    /// Get the path to the disk image
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole image as one byte slice
    pub fn as_bytes(&self) -> &[u8] {
        match self.mmap {
            Some(ref mmap) => &mmap[..],
            None => &[],
        }
    }
}

impl AsRef<[u8]> for DiskImage {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn image_with(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_open_maps_whole_file() {
        let file = image_with(b"0123456789");
        let disk = DiskImage::open(file.path()).unwrap();

        assert_eq!(disk.size(), Size::new(10));
        assert_eq!(disk.as_bytes(), b"0123456789");
        let bytes: &[u8] = disk.as_ref();
        assert_eq!(bytes, b"0123456789");
    }

    #[test]
    fn test_empty_image() {
        let file = image_with(b"");
        let disk = DiskImage::open(file.path()).unwrap();
        assert_eq!(disk.size(), Size::new(0));
        assert!(disk.as_bytes().is_empty());
    }

    #[test]
    fn test_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let result = DiskImage::open(dir.path().join("missing.dd"));
        assert!(matches!(result, Err(RecoveryError::FileNotFound(_))));
    }
}
