use serde::Serialize;

use crate::error::ExtentError;
use crate::formats::{FormatDescriptor, FormatId};

/// Newtype wrapper for byte offsets in disk images
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Offset(pub u64);

impl Offset {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Newtype wrapper for sizes in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Size(pub u64);

impl Size {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

/// A header match that has not been validated yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarveCandidate {
    pub format: FormatId,
    pub offset: Offset,
}

/// End of a validated file, as computed by the extent resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start: Offset,
    pub end: Offset,
    /// The declared end ran past the image and was cut back to its length
    pub clamped: bool,
}

impl Extent {
    pub fn len(&self) -> Size {
        Size::new(self.end.as_u64() - self.start.as_u64())
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A file carved out of the image.
///
/// `data` borrows the image, so a `CarvedFile` never outlives the blob it
/// was cut from.
#[derive(Debug, Clone)]
pub struct CarvedFile<'a> {
    pub format: &'static FormatDescriptor,
    pub sequence: u64,
    pub start: Offset,
    pub end: Offset,
    pub clamped: bool,
    pub data: &'a [u8],
}

impl<'a> CarvedFile<'a> {
    pub fn format_id(&self) -> FormatId {
        self.format.id
    }

    pub fn byte_length(&self) -> Size {
        Size::new(self.data.len() as u64)
    }

    /// `File<sequence>.<extension>`
    pub fn file_name(&self) -> String {
        self.format.file_name(self.sequence)
    }
}

/// How global sequence numbers are assigned to carved files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SequenceOrder {
    /// Format by format in registry order, files of one format by offset
    #[default]
    Registry,
    /// All files by start offset, ties broken by registry position
    Offset,
}

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Number of threads (0 = rayon default, 1 = sequential)
    pub num_threads: usize,

    /// Formats to carve; empty means every registered format
    pub formats: Vec<FormatId>,

    /// Numbering policy for carved files
    pub sequence_order: SequenceOrder,

    /// Dispatch sink calls on the rayon pool
    pub parallel_sink: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            formats: Vec::new(),
            sequence_order: SequenceOrder::Registry,
            parallel_sink: false,
        }
    }
}

impl ScanConfig {
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }

    pub fn with_formats(mut self, formats: Vec<FormatId>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_sequence_order(mut self, order: SequenceOrder) -> Self {
        self.sequence_order = order;
        self
    }

    pub fn with_parallel_sink(mut self, parallel: bool) -> Self {
        self.parallel_sink = parallel;
        self
    }

    /// Whether `id` takes part in this scan
    pub fn includes(&self, id: FormatId) -> bool {
        self.formats.is_empty() || self.formats.contains(&id)
    }
}

/// Why a header match was not a genuine file start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rejection {
    Misaligned,
    ExtraCheckMismatch,
    /// The structural check bytes lie past the end of the image
    CheckOutOfBounds,
}

/// Progress update sent via tokio channel
#[derive(Debug, Clone)]
pub enum ScanProgress {
    FormatStarted(FormatId),
    CandidateRejected(CarveCandidate, Rejection),
    /// Validated header whose extent could not be resolved
    CandidateDiscarded(CarveCandidate, ExtentError),
    /// Extent resolved; sequence numbers are assigned after the scan
    FileCarved {
        format: FormatId,
        start: Offset,
        end: Offset,
    },
    FormatFinished(FormatId, FormatStats),
}

/// Per-format counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FormatStats {
    pub headers_seen: usize,
    pub rejected: usize,
    pub discarded: usize,
    pub carved: usize,
    pub clamped: usize,
}

/// Scan statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub bytes_scanned: u64,
    pub formats_scanned: usize,
    pub headers_seen: usize,
    pub rejected: usize,
    pub discarded: usize,
    pub carved: usize,
    pub clamped: usize,
    /// Formats whose scan panicked and were abandoned
    pub failed_formats: Vec<FormatId>,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, stats: &FormatStats) {
        self.formats_scanned += 1;
        self.headers_seen += stats.headers_seen;
        self.rejected += stats.rejected;
        self.discarded += stats.discarded;
        self.carved += stats.carved;
        self.clamped += stats.clamped;
    }
}

/// Result of a carving pass
#[derive(Debug, Default)]
pub struct CarveReport<'a> {
    pub files: Vec<CarvedFile<'a>>,
    pub stats: ScanStats,
    pub duration_secs: f64,
}

impl<'a> CarveReport<'a> {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_display_is_hex() {
        assert_eq!(Offset::new(512).to_string(), "0x200");
        assert_eq!(Offset::new(0).to_string(), "0x0");
    }

    #[test]
    fn test_extent_len() {
        let extent = Extent {
            start: Offset::new(512),
            end: Offset::new(608),
            clamped: false,
        };
        assert_eq!(extent.len(), Size::new(96));
        assert!(!extent.is_empty());
    }

    #[test]
    fn test_config_format_filter() {
        let all = ScanConfig::default();
        assert!(all.includes(FormatId::Png));

        let png_only = ScanConfig::default().with_formats(vec![FormatId::Png]);
        assert!(png_only.includes(FormatId::Png));
        assert!(!png_only.includes(FormatId::Pdf));
    }

    #[test]
    fn test_stats_absorb() {
        let mut stats = ScanStats::new();
        stats.absorb(&FormatStats {
            headers_seen: 3,
            rejected: 1,
            discarded: 1,
            carved: 1,
            clamped: 0,
        });
        stats.absorb(&FormatStats {
            headers_seen: 2,
            carved: 2,
            clamped: 1,
            ..Default::default()
        });
        assert_eq!(stats.formats_scanned, 2);
        assert_eq!(stats.headers_seen, 5);
        assert_eq!(stats.carved, 3);
        assert_eq!(stats.clamped, 1);
    }
}
