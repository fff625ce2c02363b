use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::digest::DigestAlgorithm;
use crate::error::{RecoveryError, Result};
use crate::formats::{parse_format_list, FormatId};
use crate::types::{ScanConfig, SequenceOrder};

/// Sector Carver
/// Recovers files embedded in a raw disk image by their signatures
#[derive(Parser, Debug, Clone)]
#[command(name = "sector-carver")]
#[command(version)]
#[command(about = "Signature-based file carving for raw disk images", long_about = None)]
pub struct Args {
    /// Disk image file to scan
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Output directory for recovered files
    #[arg(short = 'o', long = "output", default_value = "recovered")]
    pub output: PathBuf,

    /// Comma separated formats to carve (MPG,PDF,BMP,GIF87a,GIF89a,JPG,DOCX,AVI,PNG)
    #[arg(long = "formats", value_name = "LIST")]
    pub formats: Option<String>,

    /// How carved files are numbered
    #[arg(long = "order", value_enum, default_value_t = OrderArg::Registry)]
    pub order: OrderArg,

    /// Worker threads for the per-format scans (0 = one per core, 1 = sequential)
    #[arg(long = "threads", default_value = "1")]
    pub threads: usize,

    /// Digest algorithm for carved files
    #[arg(long = "digest", default_value = "sha256")]
    pub digest: String,

    /// Digest carved files without writing them
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Write a JSON report to this path
    #[arg(long = "json", value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Write an HTML report to this path
    #[arg(long = "html", value_name = "PATH")]
    pub html: Option<PathBuf>,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write log messages to this file
    #[arg(long = "log", value_name = "PATH")]
    pub log: Option<PathBuf>,
}

/// Numbering policy as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    /// Format by format, in registry order
    Registry,
    /// By start offset across all formats
    Offset,
}

impl From<OrderArg> for SequenceOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Registry => SequenceOrder::Registry,
            OrderArg::Offset => SequenceOrder::Offset,
        }
    }
}

impl Args {
    /// Validate the arguments
    pub fn validate(&self) -> Result<()> {
        if self.image.as_os_str().is_empty() {
            return Err(RecoveryError::InvalidArgument(
                "Image path cannot be empty".to_string(),
            ));
        }

        self.format_ids()?;
        self.digest_algorithm()?;

        for report in [&self.json, &self.html].into_iter().flatten() {
            if *report == self.image {
                return Err(RecoveryError::InvalidArgument(format!(
                    "report path {} would overwrite the image",
                    report.display()
                )));
            }
        }

        Ok(())
    }

    /// Selected formats; empty means all
    pub fn format_ids(&self) -> Result<Vec<FormatId>> {
        match self.formats {
            Some(ref list) => {
                let ids = parse_format_list(list)?;
                if ids.is_empty() {
                    return Err(RecoveryError::InvalidArgument(
                        "--formats needs at least one format".to_string(),
                    ));
                }
                Ok(ids)
            }
            None => Ok(Vec::new()),
        }
    }

    pub fn digest_algorithm(&self) -> Result<DigestAlgorithm> {
        self.digest.parse()
    }

    /// Build the scan configuration from the arguments
    pub fn scan_config(&self) -> Result<ScanConfig> {
        Ok(ScanConfig::new(self.threads)
            .with_formats(self.format_ids()?)
            .with_sequence_order(self.order.into())
            .with_parallel_sink(self.threads != 1))
    }

    /// Log level for the given -v count
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
