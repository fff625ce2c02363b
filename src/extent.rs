//! Finds where a validated file ends.

use crate::error::ExtentError;
use crate::formats::{EndStrategy, FormatDescriptor, LengthField, TrailerVariant};
use crate::simd_search::find;
use crate::types::{Extent, Offset};

/// Resolve the extent of the file whose header sits at `header`.
///
/// An end past the image is clamped to the image length and flagged rather
/// than reported as an error.
pub fn resolve(
    blob: &[u8],
    desc: &FormatDescriptor,
    header: usize,
) -> Result<Extent, ExtentError> {
    let raw_end = match desc.end {
        EndStrategy::TrailerSearch(variants) => trailer_end(blob, variants, header)?,
        EndStrategy::EmbeddedLength(field) => length_end(blob, &field, header)?,
    };

    let limit = blob.len() as u64;
    Ok(Extent {
        start: Offset::new(header as u64),
        end: Offset::new(raw_end.min(limit)),
        clamped: raw_end > limit,
    })
}

/// First variant, in priority order, that occurs at or after the header
fn trailer_end(blob: &[u8], variants: &[TrailerVariant], header: usize) -> Result<u64, ExtentError> {
    variants
        .iter()
        .find_map(|variant| {
            find(blob, variant.pattern, header).map(|pos| pos as u64 + variant.span() as u64)
        })
        .ok_or(ExtentError::TrailerNotFound {
            header: header as u64,
        })
}

fn length_end(blob: &[u8], field: &LengthField, header: usize) -> Result<u64, ExtentError> {
    let value = read_length_field(blob, field, header)?;
    let length = value.saturating_add(field.bias);

    if length == 0 {
        return Err(ExtentError::EmptyExtent {
            header: header as u64,
        });
    }

    Ok((header as u64).saturating_add(length))
}

/// Little-endian integer stored `field.offset` bytes after the header
pub fn read_length_field(
    blob: &[u8],
    field: &LengthField,
    header: usize,
) -> Result<u64, ExtentError> {
    let width = field.width.clamp(1, 8);
    let start = header.saturating_add(field.offset);
    let truncated = ExtentError::TruncatedHeader {
        field: start as u64,
        width,
    };

    let bytes = start
        .checked_add(width)
        .and_then(|end| blob.get(start..end))
        .ok_or(truncated)?;

    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}
