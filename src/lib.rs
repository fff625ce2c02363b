//! Signature-based file carving for raw disk images
//!
//! This library recovers whole files embedded in an unstructured byte blob:
//! - Static format registry (header, alignment, structural check, end strategy)
//! - SIMD-accelerated pattern search (AVX2/SSE4.2 with scalar fallback)
//! - Sector-alignment and structural validation of header matches
//! - Trailer-search and embedded-length extent resolution with clamping
//! - Per-format cursors with guaranteed forward progress, optionally scanned
//!   in parallel with rayon, numbered deterministically afterwards
//! - Output sinks for in-process digesting and persistence
//! - Progress streaming via tokio::sync::mpsc

pub mod carver;
pub mod cli;
pub mod digest;
pub mod disk;
pub mod error;
pub mod extent;
pub mod formats;
pub mod report;
pub mod simd_search;
pub mod sink;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use types::{Offset, Size};
pub use types::{CarveCandidate, CarveReport, CarvedFile, Extent, Rejection};
pub use types::{FormatStats, ScanConfig, ScanProgress, ScanStats, SequenceOrder};
pub use carver::{carve, Carver, FormatOutcome, FormatScan, Step};
pub use digest::{digest_hex, DigestAlgorithm};
pub use disk::DiskImage;
pub use extent::resolve;
pub use formats::{registry, EndStrategy, FormatDescriptor, FormatId, REGISTRY};
pub use simd_search::{find, find_pattern_simd};
pub use sink::{dispatch, DigestOnlySink, DirectorySink, OutputSink, Receipt};
pub use validator::validate;
pub use error::{ExtentError, RecoveryError, Result, SinkError};
