//! Output sinks: where carved files go once the scan has delimited them.

use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::digest::{digest_hex, DigestAlgorithm};
use crate::error::{RecoveryError, SinkError};
use crate::types::CarvedFile;

/// What a sink hands back for each file it accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub file_name: String,
    pub algorithm: DigestAlgorithm,
    pub digest_hex: String,
    /// Where the bytes were written, `None` when nothing was persisted
    pub path: Option<PathBuf>,
}

/// Receives carved files, digests them and optionally persists them.
///
/// Sinks are shared across worker threads when dispatch is parallel.
pub trait OutputSink: Sync {
    fn emit(&self, file: &CarvedFile<'_>) -> Result<Receipt, SinkError>;
}

/// Writes each file as `File<n>.<ext>` into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    algorithm: DigestAlgorithm,
}

impl DirectorySink {
    /// Create the output directory if needed
    pub fn create<P: AsRef<Path>>(dir: P, algorithm: DigestAlgorithm) -> Result<Self, RecoveryError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, algorithm })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl OutputSink for DirectorySink {
    fn emit(&self, file: &CarvedFile<'_>) -> Result<Receipt, SinkError> {
        let file_name = file.file_name();
        let path = self.dir.join(&file_name);

        fs::write(&path, file.data).map_err(|source| SinkError::Io {
            name: file_name.clone(),
            source,
        })?;
        debug!("Wrote {} ({} bytes)", path.display(), file.data.len());

        Ok(Receipt {
            digest_hex: digest_hex(self.algorithm, file.data),
            algorithm: self.algorithm,
            file_name,
            path: Some(path),
        })
    }
}

/// Digests files without writing anything
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestOnlySink {
    pub algorithm: DigestAlgorithm,
}

impl OutputSink for DigestOnlySink {
    fn emit(&self, file: &CarvedFile<'_>) -> Result<Receipt, SinkError> {
        Ok(Receipt {
            file_name: file.file_name(),
            algorithm: self.algorithm,
            digest_hex: digest_hex(self.algorithm, file.data),
            path: None,
        })
    }
}

/// Hand every file to `sink` exactly once.
///
/// Results line up with `files`. With `parallel` the calls run on the rayon
/// pool and are joined before returning. A failed file never stops the
/// others.
pub fn dispatch(
    files: &[CarvedFile<'_>],
    sink: &dyn OutputSink,
    parallel: bool,
) -> Vec<Result<Receipt, SinkError>> {
    let emit = |file: &CarvedFile<'_>| {
        let result = sink.emit(file);
        if let Err(ref e) = result {
            warn!("{}: {}", file.file_name(), e);
        }
        result
    };

    if parallel {
        files.par_iter().map(emit).collect()
    } else {
        files.iter().map(emit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatId;
    use crate::types::Offset;

    fn file(sequence: u64, data: &[u8]) -> CarvedFile<'_> {
        CarvedFile {
            format: FormatId::Jpg.descriptor(),
            sequence,
            start: Offset::new(0),
            end: Offset::new(data.len() as u64),
            clamped: false,
            data,
        }
    }

    struct FailOn(u64);

    impl OutputSink for FailOn {
        fn emit(&self, file: &CarvedFile<'_>) -> Result<Receipt, SinkError> {
            if file.sequence == self.0 {
                return Err(SinkError::Persist {
                    name: file.file_name(),
                    reason: "disk full".to_string(),
                });
            }
            DigestOnlySink::default().emit(file)
        }
    }

    #[test]
    fn test_directory_sink_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::create(dir.path().join("out"), DigestAlgorithm::Sha256).unwrap();
        let data = b"\xff\xd8\xff\xe0 jpeg bytes \xff\xd9";

        let receipt = sink.emit(&file(7, data)).unwrap();
        assert_eq!(receipt.file_name, "File7.jpg");

        let written = fs::read(sink.dir().join("File7.jpg")).unwrap();
        assert_eq!(written, data);
        assert_eq!(receipt.digest_hex, digest_hex(DigestAlgorithm::Sha256, &written));
    }

    #[test]
    fn test_directory_sink_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("gone");
        let sink = DirectorySink::create(&out, DigestAlgorithm::Sha256).unwrap();
        fs::remove_dir(&out).unwrap();

        let err = sink.emit(&file(1, b"data")).unwrap_err();
        assert!(matches!(err, SinkError::Io { ref name, .. } if name == "File1.jpg"));
    }

    #[test]
    fn test_dispatch_keeps_going_after_failure() {
        let payloads: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i; 10]).collect();
        let files: Vec<CarvedFile> = payloads
            .iter()
            .enumerate()
            .map(|(i, p)| file(i as u64 + 1, p))
            .collect();

        for parallel in [false, true] {
            let results = dispatch(&files, &FailOn(2), parallel);
            assert_eq!(results.len(), 4);
            assert!(results[1].is_err());
            let names: Vec<String> = results
                .iter()
                .filter_map(|r| r.as_ref().ok())
                .map(|r| r.file_name.clone())
                .collect();
            assert_eq!(names, vec!["File1.jpg", "File3.jpg", "File4.jpg"]);
        }
    }
}
