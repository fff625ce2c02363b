//! Decides whether a header match is a genuine file start.

use crate::formats::FormatDescriptor;
use crate::types::Rejection;

/// Checks alignment and the format's structural bytes
pub fn check(blob: &[u8], desc: &FormatDescriptor, offset: usize) -> Result<(), Rejection> {
    if let Some(alignment) = desc.alignment {
        if alignment > 0 && (offset as u64) % alignment != 0 {
            return Err(Rejection::Misaligned);
        }
    }

    if let Some(extra) = desc.extra_check {
        let start = offset
            .checked_add(extra.offset)
            .ok_or(Rejection::CheckOutOfBounds)?;
        let window = start
            .checked_add(extra.expected.len())
            .and_then(|end| blob.get(start..end))
            .ok_or(Rejection::CheckOutOfBounds)?;

        if window != extra.expected {
            return Err(Rejection::ExtraCheckMismatch);
        }
    }

    Ok(())
}

/// `true` when the match at `offset` should be carved
#[inline]
pub fn validate(blob: &[u8], desc: &FormatDescriptor, offset: usize) -> bool {
    check(blob, desc, offset).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatId;

    fn bmp_at(offset: usize, reserved: [u8; 4]) -> Vec<u8> {
        let mut blob = vec![0xAAu8; offset + 64];
        blob[offset..offset + 2].copy_from_slice(b"BM");
        blob[offset + 6..offset + 10].copy_from_slice(&reserved);
        blob
    }

    #[test]
    fn test_alignment() {
        let png = FormatId::Png.descriptor();
        let blob = vec![0u8; 2048];
        assert!(validate(&blob, png, 0));
        assert!(validate(&blob, png, 512));
        assert_eq!(check(&blob, png, 511), Err(Rejection::Misaligned));
        assert_eq!(check(&blob, png, 513), Err(Rejection::Misaligned));
    }

    #[test]
    fn test_bmp_reserved_fields() {
        let bmp = FormatId::Bmp.descriptor();
        assert!(validate(&bmp_at(1024, [0; 4]), bmp, 1024));
        assert_eq!(
            check(&bmp_at(1024, [0, 0, 1, 0]), bmp, 1024),
            Err(Rejection::ExtraCheckMismatch)
        );
    }

    #[test]
    fn test_avi_list_marker() {
        let avi = FormatId::Avi.descriptor();
        let mut blob = vec![0u8; 1024];
        blob[512..516].copy_from_slice(b"RIFF");
        blob[520..528].copy_from_slice(b"AVI LIST");
        assert!(validate(&blob, avi, 512));

        blob[520..528].copy_from_slice(b"WAVEfmt ");
        assert_eq!(check(&blob, avi, 512), Err(Rejection::ExtraCheckMismatch));
    }

    #[test]
    fn test_check_bytes_past_end() {
        let avi = FormatId::Avi.descriptor();
        let mut blob = vec![0u8; 520];
        blob[512..516].copy_from_slice(b"RIFF");
        assert_eq!(check(&blob, avi, 512), Err(Rejection::CheckOutOfBounds));
    }
}
