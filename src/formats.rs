//! Static registry of the file formats the carver recognises.
//!
//! Each [`FormatDescriptor`] bundles everything the generic validator and
//! extent resolver need: the header signature, the sector alignment a genuine
//! header sits on, an optional extra structural check, and how the end of the
//! file is found. Adding a format means adding a row to [`REGISTRY`].

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::RecoveryError;

/// Sector size every registered format is aligned to.
pub const SECTOR_SIZE: u64 = 512;

/// Format tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FormatId {
    Mpg,
    Pdf,
    Bmp,
    Gif87a,
    Gif89a,
    Jpg,
    Docx,
    Avi,
    Png,
}

impl FormatId {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatId::Mpg => "MPG",
            FormatId::Pdf => "PDF",
            FormatId::Bmp => "BMP",
            FormatId::Gif87a => "GIF87a",
            FormatId::Gif89a => "GIF89a",
            FormatId::Jpg => "JPG",
            FormatId::Docx => "DOCX",
            FormatId::Avi => "AVI",
            FormatId::Png => "PNG",
        }
    }

    /// Registry entry for this format
    pub fn descriptor(&self) -> &'static FormatDescriptor {
        // REGISTRY is declared in enum order
        &REGISTRY[*self as usize]
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatId {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        REGISTRY
            .iter()
            .find(|d| d.id.as_str().eq_ignore_ascii_case(s.trim()))
            .map(|d| d.id)
            .ok_or_else(|| RecoveryError::UnknownFormat(s.to_string()))
    }
}

/// Bytes that must appear at a fixed distance from the header
#[derive(Debug, Clone, Copy)]
pub struct ExtraCheck {
    pub offset: usize,
    pub expected: &'static [u8],
}

/// One acceptable trailer encoding.
///
/// `pattern` may carry guard bytes after the real trailer so that an early
/// coincidental end marker is not taken as the end of the file.
/// `trailing_adjustment` is the index of the last hexadecimal character of
/// the real trailer counted from the match, so the file keeps
/// `ceil(trailing_adjustment / 2)` bytes from the match onwards.
#[derive(Debug, Clone, Copy)]
pub struct TrailerVariant {
    pub pattern: &'static [u8],
    pub trailing_adjustment: usize,
}

impl TrailerVariant {
    /// Number of bytes, counted from the match offset, that belong to the file
    pub const fn span(&self) -> usize {
        (self.trailing_adjustment + 1) / 2
    }
}

/// Little-endian length field embedded in the header
#[derive(Debug, Clone, Copy)]
pub struct LengthField {
    /// Distance of the field from the header offset
    pub offset: usize,
    /// Field width in bytes (1..=8)
    pub width: usize,
    /// Added to the stored value to get the full file length
    pub bias: u64,
}

/// How the end of a file is determined
#[derive(Debug, Clone, Copy)]
pub enum EndStrategy {
    /// Variants are tried in order; the first that occurs anywhere after the
    /// header wins, even if a later variant occurs earlier.
    TrailerSearch(&'static [TrailerVariant]),
    EmbeddedLength(LengthField),
}

#[derive(Debug)]
pub struct FormatDescriptor {
    pub id: FormatId,
    pub extension: &'static str,
    pub header: &'static [u8],
    /// Required alignment of the header offset, `None` for unconstrained formats
    pub alignment: Option<u64>,
    pub extra_check: Option<ExtraCheck>,
    /// Distance the cursor moves past a rejected or discarded candidate
    pub skip: usize,
    pub end: EndStrategy,
}

impl FormatDescriptor {
    /// Cursor advance after a rejected candidate; never shorter than the header
    pub fn skip_distance(&self) -> usize {
        self.skip.max(self.header.len()).max(1)
    }

    /// Generated output name for the `sequence`-th carved file
    pub fn file_name(&self, sequence: u64) -> String {
        format!("File{}.{}", sequence, self.extension)
    }
}

const MPG_TRAILERS: [TrailerVariant; 2] = [
    TrailerVariant {
        pattern: &[0x00, 0x00, 0x01, 0xB7],
        trailing_adjustment: 7,
    },
    TrailerVariant {
        pattern: &[0x00, 0x00, 0x01, 0xB9],
        trailing_adjustment: 7,
    },
];

// %%EOF with the line endings seen in the wild, each followed by zero padding
const PDF_TRAILERS: [TrailerVariant; 4] = [
    TrailerVariant {
        pattern: b"\r%%EOF\r\x00\x00\x00",
        trailing_adjustment: 13,
    },
    TrailerVariant {
        pattern: b"\r\n%%EOF\r\n\x00\x00\x00",
        trailing_adjustment: 17,
    },
    TrailerVariant {
        pattern: b"\n%%EOF\n\x00\x00\x00",
        trailing_adjustment: 13,
    },
    TrailerVariant {
        pattern: b"\n%%EOF\x00\x00\x00",
        trailing_adjustment: 11,
    },
];

const GIF_TRAILERS: [TrailerVariant; 1] = [TrailerVariant {
    pattern: &[0x00, 0x3B, 0x00, 0x00, 0x00],
    trailing_adjustment: 3,
}];

const JPG_TRAILERS: [TrailerVariant; 1] = [TrailerVariant {
    pattern: &[0xFF, 0xD9, 0x00, 0x00, 0x00],
    trailing_adjustment: 3,
}];

// End of central directory record, 22 bytes when there is no archive comment
const DOCX_TRAILERS: [TrailerVariant; 1] = [TrailerVariant {
    pattern: &[0x50, 0x4B, 0x05, 0x06],
    trailing_adjustment: 43,
}];

// IEND chunk type followed by its CRC
const PNG_TRAILERS: [TrailerVariant; 1] = [TrailerVariant {
    pattern: &[0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82],
    trailing_adjustment: 15,
}];

/// Every known format, in the order the carver visits them.
pub static REGISTRY: [FormatDescriptor; 9] = [
    FormatDescriptor {
        id: FormatId::Mpg,
        extension: "mpg",
        header: &[0x00, 0x00, 0x01, 0xB3],
        alignment: Some(SECTOR_SIZE),
        extra_check: None,
        skip: 4,
        end: EndStrategy::TrailerSearch(&MPG_TRAILERS),
    },
    FormatDescriptor {
        id: FormatId::Pdf,
        extension: "pdf",
        header: b"%PDF",
        alignment: Some(SECTOR_SIZE),
        extra_check: None,
        skip: 4,
        end: EndStrategy::TrailerSearch(&PDF_TRAILERS),
    },
    FormatDescriptor {
        id: FormatId::Bmp,
        extension: "bmp",
        header: b"BM",
        alignment: Some(SECTOR_SIZE),
        // bfReserved1 and bfReserved2
        extra_check: Some(ExtraCheck {
            offset: 6,
            expected: &[0x00, 0x00, 0x00, 0x00],
        }),
        skip: 2,
        // bfSize covers the whole file
        end: EndStrategy::EmbeddedLength(LengthField {
            offset: 2,
            width: 4,
            bias: 0,
        }),
    },
    FormatDescriptor {
        id: FormatId::Gif87a,
        extension: "gif",
        header: b"GIF87a",
        alignment: Some(SECTOR_SIZE),
        extra_check: None,
        skip: 6,
        end: EndStrategy::TrailerSearch(&GIF_TRAILERS),
    },
    FormatDescriptor {
        id: FormatId::Gif89a,
        extension: "gif",
        header: b"GIF89a",
        alignment: Some(SECTOR_SIZE),
        extra_check: None,
        skip: 6,
        end: EndStrategy::TrailerSearch(&GIF_TRAILERS),
    },
    FormatDescriptor {
        id: FormatId::Jpg,
        extension: "jpg",
        header: &[0xFF, 0xD8, 0xFF],
        alignment: Some(SECTOR_SIZE),
        extra_check: None,
        skip: 3,
        end: EndStrategy::TrailerSearch(&JPG_TRAILERS),
    },
    FormatDescriptor {
        id: FormatId::Docx,
        extension: "docx",
        header: &[0x50, 0x4B, 0x03, 0x04, 0x14, 0x00, 0x06, 0x00],
        alignment: Some(SECTOR_SIZE),
        extra_check: None,
        skip: 8,
        end: EndStrategy::TrailerSearch(&DOCX_TRAILERS),
    },
    FormatDescriptor {
        id: FormatId::Avi,
        extension: "avi",
        header: b"RIFF",
        alignment: Some(SECTOR_SIZE),
        extra_check: Some(ExtraCheck {
            offset: 8,
            expected: b"AVI LIST",
        }),
        skip: 16,
        // RIFF size excludes the 8-byte chunk id and size
        end: EndStrategy::EmbeddedLength(LengthField {
            offset: 4,
            width: 4,
            bias: 8,
        }),
    },
    FormatDescriptor {
        id: FormatId::Png,
        extension: "png",
        header: &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        alignment: Some(SECTOR_SIZE),
        extra_check: None,
        skip: 8,
        end: EndStrategy::TrailerSearch(&PNG_TRAILERS),
    },
];

/// All registered formats in visiting order
pub fn registry() -> &'static [FormatDescriptor] {
    &REGISTRY
}

/// Parse a comma separated list of format ids such as `"png,PDF"`
pub fn parse_format_list(list: &str) -> Result<Vec<FormatId>, RecoveryError> {
    let mut ids = Vec::new();
    for part in list.split(',').filter(|p| !p.trim().is_empty()) {
        let id: FormatId = part.parse()?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}
