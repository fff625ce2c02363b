use thiserror::Error;

/// Main error type for the carving tool
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Memory mapping error: {0}")]
    Mmap(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Report error: {0}")]
    Report(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Reasons a validated header could not be turned into a file extent.
///
/// Every variant discards the candidate; none of them stop the scan.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentError {
    #[error("no trailer found after header at offset 0x{header:X}")]
    TrailerNotFound { header: u64 },

    #[error("length field at offset 0x{field:X} ({width} bytes) runs past the end of the image")]
    TruncatedHeader { field: u64, width: usize },

    #[error("embedded length at offset 0x{header:X} describes an empty file")]
    EmptyExtent { header: u64 },
}

/// Failure inside an output sink, reported against a single file.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error writing {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist {name}: {reason}")]
    Persist { name: String, reason: String },
}

/// Result type alias for recovery operations
pub type Result<T> = std::result::Result<T, RecoveryError>;
