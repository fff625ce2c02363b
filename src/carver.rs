//! Carve orchestrator.
//!
//! Every format is scanned independently with its own cursor. A format's
//! cursor only ever moves forward: past a rejected or discarded header by the
//! format's skip distance, and to the end of every carved file. Per-format
//! results are merged in registry order and only then numbered, so the
//! output does not depend on how the format scans were scheduled.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{ExtentError, RecoveryError, Result};
use crate::extent::resolve;
use crate::formats::{registry, FormatDescriptor, FormatId};
use crate::simd_search::find;
use crate::types::{
    CarveCandidate, CarveReport, CarvedFile, Extent, FormatStats, Offset, Rejection,
    ScanConfig, ScanProgress, ScanStats, SequenceOrder,
};
use crate::validator::check;

/// Outcome of one step of a format scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Carved(Extent),
    Rejected(CarveCandidate, Rejection),
    Discarded(CarveCandidate, ExtentError),
    /// No further header at or after the cursor
    Exhausted,
}

/// Search state of a single format over one image
#[derive(Debug)]
pub struct FormatScan<'b> {
    blob: &'b [u8],
    desc: &'static FormatDescriptor,
    cursor: usize,
    stats: FormatStats,
}

impl<'b> FormatScan<'b> {
    pub fn new(blob: &'b [u8], desc: &'static FormatDescriptor) -> Self {
        Self {
            blob,
            desc,
            cursor: 0,
            stats: FormatStats::default(),
        }
    }

    /// Offset the next header search starts from
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn stats(&self) -> &FormatStats {
        &self.stats
    }

    /// Find the next header and carry it through validation and resolution
    pub fn step(&mut self) -> Step {
        let Some(offset) = find(self.blob, self.desc.header, self.cursor) else {
            return Step::Exhausted;
        };

        self.stats.headers_seen += 1;
        let candidate = CarveCandidate {
            format: self.desc.id,
            offset: Offset::new(offset as u64),
        };

        if let Err(rejection) = check(self.blob, self.desc, offset) {
            self.stats.rejected += 1;
            self.cursor = self.skip_from(offset);
            return Step::Rejected(candidate, rejection);
        }

        match resolve(self.blob, self.desc, offset) {
            Ok(extent) => {
                self.stats.carved += 1;
                if extent.clamped {
                    self.stats.clamped += 1;
                }
                // the end always lies past the header, so this moves forward
                self.cursor = (extent.end.as_u64() as usize).max(offset + 1);
                Step::Carved(extent)
            }
            Err(err) => {
                self.stats.discarded += 1;
                self.cursor = self.skip_from(offset);
                Step::Discarded(candidate, err)
            }
        }
    }

    /// Cursor after giving up on the header at `offset`: the skip distance,
    /// but never past the next aligned offset, which has not been examined
    fn skip_from(&self, offset: usize) -> usize {
        let skipped = offset + self.desc.skip_distance();
        match self.desc.alignment.filter(|&a| a > 0) {
            Some(align) => {
                let align = align as usize;
                skipped.min((offset / align + 1) * align)
            }
            None => skipped,
        }
    }
}

/// Extents found for one format, in ascending offset order
#[derive(Debug)]
pub struct FormatOutcome {
    pub format: &'static FormatDescriptor,
    pub extents: Vec<Extent>,
    pub stats: FormatStats,
}

/// Drives the per-format scans and assembles numbered results
pub struct Carver {
    config: ScanConfig,
    progress: Option<UnboundedSender<ScanProgress>>,
}

impl Carver {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Stream progress events to `sender`; a closed receiver is ignored
    pub fn with_progress(mut self, sender: UnboundedSender<ScanProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Formats taking part in a scan, in registry order
    pub fn formats(&self) -> Vec<&'static FormatDescriptor> {
        registry()
            .iter()
            .filter(|d| self.config.includes(d.id))
            .collect()
    }

    /// Carve every enabled format out of `blob`.
    ///
    /// An empty blob yields an empty report, not an error.
    pub fn scan<'b>(&self, blob: &'b [u8]) -> Result<CarveReport<'b>> {
        let start_time = Instant::now();
        let formats = self.formats();

        if blob.is_empty() {
            info!("Image is empty, no files can be carved");
            return Ok(CarveReport::default());
        }

        let outcomes: Vec<std::result::Result<FormatOutcome, FormatId>> =
            match self.config.num_threads {
                1 => formats.iter().map(|&d| self.scan_isolated(blob, d)).collect(),
                0 => formats.par_iter().map(|&d| self.scan_isolated(blob, d)).collect(),
                n => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(n)
                        .build()
                        .map_err(|e| RecoveryError::Config(format!("thread pool: {}", e)))?;
                    pool.install(|| {
                        formats
                            .par_iter()
                            .map(|&d| self.scan_isolated(blob, d))
                            .collect::<Vec<_>>()
                    })
                }
            };

        let mut stats = ScanStats::new();
        stats.bytes_scanned = blob.len() as u64;

        let mut found: Vec<(&'static FormatDescriptor, Extent)> = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(outcome) => {
                    stats.absorb(&outcome.stats);
                    found.extend(outcome.extents.into_iter().map(|e| (outcome.format, e)));
                }
                Err(id) => stats.failed_formats.push(id),
            }
        }

        let files = number_files(blob, found, self.config.sequence_order);
        info!(
            "Carved {} file(s) from {} bytes ({} header(s) seen, {} rejected, {} discarded)",
            files.len(),
            stats.bytes_scanned,
            stats.headers_seen,
            stats.rejected,
            stats.discarded
        );

        Ok(CarveReport {
            files,
            stats,
            duration_secs: start_time.elapsed().as_secs_f64(),
        })
    }

    /// Run one format's scan to exhaustion
    pub fn scan_format(&self, blob: &[u8], desc: &'static FormatDescriptor) -> FormatOutcome {
        self.notify(ScanProgress::FormatStarted(desc.id));

        let mut scan = FormatScan::new(blob, desc);
        let mut extents = Vec::new();

        loop {
            match scan.step() {
                Step::Carved(extent) => {
                    debug!("{}: carved {}..{}", desc.id, extent.start, extent.end);
                    if extent.clamped {
                        warn!(
                            "{}: file at {} runs past the end of the image, clamped to {}",
                            desc.id, extent.start, extent.end
                        );
                    }
                    self.notify(ScanProgress::FileCarved {
                        format: desc.id,
                        start: extent.start,
                        end: extent.end,
                    });
                    extents.push(extent);
                }
                Step::Rejected(candidate, rejection) => {
                    debug!("{}: rejected header at {} ({:?})", desc.id, candidate.offset, rejection);
                    self.notify(ScanProgress::CandidateRejected(candidate, rejection));
                }
                Step::Discarded(candidate, err) => {
                    warn!("{}: skipped header at {}: {}", desc.id, candidate.offset, err);
                    self.notify(ScanProgress::CandidateDiscarded(candidate, err));
                }
                Step::Exhausted => break,
            }
        }

        let stats = *scan.stats();
        debug!("{}: finished with {:?}", desc.id, stats);
        self.notify(ScanProgress::FormatFinished(desc.id, stats));

        FormatOutcome {
            format: desc,
            extents,
            stats,
        }
    }

    /// Isolate panics so one format cannot take the whole scan down
    fn scan_isolated(
        &self,
        blob: &[u8],
        desc: &'static FormatDescriptor,
    ) -> std::result::Result<FormatOutcome, FormatId> {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.scan_format(blob, desc)))
            .map_err(|_| {
                warn!("{}: scan aborted by a panic, format skipped", desc.id);
                desc.id
            })
    }

    fn notify(&self, event: ScanProgress) {
        if let Some(ref sender) = self.progress {
            if !sender.is_closed() {
                let _ = sender.send(event);
            }
        }
    }
}

/// Assign global sequence numbers starting at 1 and slice the image
fn number_files<'b>(
    blob: &'b [u8],
    mut found: Vec<(&'static FormatDescriptor, Extent)>,
    order: SequenceOrder,
) -> Vec<CarvedFile<'b>> {
    if order == SequenceOrder::Offset {
        found.sort_by_key(|(desc, extent)| (extent.start, desc.id));
    }

    found
        .into_iter()
        .zip(1u64..)
        .map(|((desc, extent), sequence)| {
            let start = extent.start.as_u64() as usize;
            let end = extent.end.as_u64() as usize;
            let file = CarvedFile {
                format: desc,
                sequence,
                start: extent.start,
                end: extent.end,
                clamped: extent.clamped,
                data: &blob[start..end],
            };
            info!("{}, Start Offset: {}, End Offset: {}", file.file_name(), file.start, file.end);
            file
        })
        .collect()
}

/// Carve `blob` with the default configuration
pub fn carve(blob: &[u8]) -> Result<CarveReport<'_>> {
    Carver::new(ScanConfig::default()).scan(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const IEND: [u8; 8] = [0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82];

    fn put(blob: &mut [u8], at: usize, bytes: &[u8]) {
        blob[at..at + bytes.len()].copy_from_slice(bytes);
    }

    #[test]
    fn test_step_advances_past_rejected_header() {
        let mut blob = vec![0u8; 2048];
        put(&mut blob, 100, &PNG_HEADER);

        let mut scan = FormatScan::new(&blob, FormatId::Png.descriptor());
        match scan.step() {
            Step::Rejected(candidate, Rejection::Misaligned) => {
                assert_eq!(candidate.offset, Offset::new(100));
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(scan.cursor(), 108);
        assert_eq!(scan.step(), Step::Exhausted);
    }

    #[test]
    fn test_skip_stops_at_next_sector() {
        let mut blob = vec![0u8; 2048];
        put(&mut blob, 500, b"RIFF");

        let mut scan = FormatScan::new(&blob, FormatId::Avi.descriptor());
        assert!(matches!(scan.step(), Step::Rejected(_, Rejection::Misaligned)));
        assert_eq!(scan.cursor(), 512);
    }

    #[test]
    fn test_step_moves_cursor_to_file_end() {
        let mut blob = vec![0u8; 2048];
        put(&mut blob, 512, &PNG_HEADER);
        put(&mut blob, 700, &IEND);

        let mut scan = FormatScan::new(&blob, FormatId::Png.descriptor());
        assert!(matches!(scan.step(), Step::Carved(_)));
        assert_eq!(scan.cursor(), 708);
        assert_eq!(scan.stats().carved, 1);
    }

    #[test]
    fn test_discarded_candidate_skips_header() {
        let mut blob = vec![0u8; 2048];
        put(&mut blob, 0, b"%PDF-1.5");

        let mut scan = FormatScan::new(&blob, FormatId::Pdf.descriptor());
        assert!(matches!(
            scan.step(),
            Step::Discarded(_, ExtentError::TrailerNotFound { header: 0 })
        ));
        assert_eq!(scan.cursor(), 4);
        assert_eq!(scan.step(), Step::Exhausted);
    }

    #[test]
    fn test_sequence_shared_across_formats() {
        let mut blob = vec![0u8; 4096];
        // PNG first in the image, PDF later
        put(&mut blob, 512, &PNG_HEADER);
        put(&mut blob, 600, &IEND);
        put(&mut blob, 1024, b"%PDF-1.4");
        put(&mut blob, 1500, b"\n%%EOF\n\x00\x00\x00");

        let report = carve(&blob).unwrap();
        let names: Vec<String> = report.files.iter().map(|f| f.file_name()).collect();
        // registry order visits PDF before PNG
        assert_eq!(names, vec!["File1.pdf", "File2.png"]);

        let by_offset = Carver::new(ScanConfig::default().with_sequence_order(SequenceOrder::Offset))
            .scan(&blob)
            .unwrap();
        let names: Vec<String> = by_offset.files.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["File1.png", "File2.pdf"]);
    }

    #[test]
    fn test_format_filter() {
        let mut blob = vec![0u8; 4096];
        put(&mut blob, 512, &PNG_HEADER);
        put(&mut blob, 600, &IEND);
        put(&mut blob, 1024, b"%PDF-1.4");
        put(&mut blob, 1500, b"\n%%EOF\n\x00\x00\x00");

        let config = ScanConfig::default().with_formats(vec![FormatId::Png]);
        let report = Carver::new(config).scan(&blob).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.files[0].format_id(), FormatId::Png);
        assert_eq!(report.stats.formats_scanned, 1);
    }

    #[test]
    fn test_empty_blob() {
        let report = carve(&[]).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.stats.bytes_scanned, 0);
    }

    #[test]
    fn test_progress_events() {
        let mut blob = vec![0u8; 2048];
        put(&mut blob, 3, &PNG_HEADER);
        put(&mut blob, 512, &PNG_HEADER);
        put(&mut blob, 700, &IEND);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = ScanConfig::default().with_formats(vec![FormatId::Png]);
        Carver::new(config).with_progress(tx).scan(&blob).unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert!(matches!(events[0], ScanProgress::FormatStarted(FormatId::Png)));
        assert!(matches!(
            events[1],
            ScanProgress::CandidateRejected(_, Rejection::Misaligned)
        ));
        assert!(matches!(events[2], ScanProgress::FileCarved { .. }));
        match events.last() {
            Some(ScanProgress::FormatFinished(FormatId::Png, stats)) => {
                assert_eq!(stats.headers_seen, 2);
                assert_eq!(stats.carved, 1);
            }
            other => panic!("unexpected last event {:?}", other),
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut blob = vec![0u8; 8192];
        put(&mut blob, 512, &PNG_HEADER);
        put(&mut blob, 600, &IEND);
        put(&mut blob, 1024, b"GIF89a");
        put(&mut blob, 1100, &[0x00, 0x3B, 0, 0, 0]);
        put(&mut blob, 2048, &[0xFF, 0xD8, 0xFF, 0xE0]);
        put(&mut blob, 2300, &[0xFF, 0xD9, 0, 0, 0]);

        let sequential = carve(&blob).unwrap();
        let parallel = Carver::new(ScanConfig::new(4)).scan(&blob).unwrap();

        let key = |r: &CarveReport| -> Vec<(u64, FormatId, Offset, Offset)> {
            r.files
                .iter()
                .map(|f| (f.sequence, f.format_id(), f.start, f.end))
                .collect()
        };
        assert_eq!(key(&sequential), key(&parallel));
        assert_eq!(sequential.len(), 3);
    }
}
