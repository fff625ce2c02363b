// SIMD-Optimized Pattern Search
// AVX2/SSE4.2 first-byte scan with runtime dispatch and a scalar fallback

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Haystacks shorter than this go straight to the scalar path
const SIMD_MIN_HAYSTACK: usize = 64;

/// Lowest offset `>= from` at which `pattern` occurs in `blob`.
///
/// Returns `None` for an empty pattern, a start past the end of the blob, or
/// when the pattern does not occur.
#[inline]
pub fn find(blob: &[u8], pattern: &[u8], from: usize) -> Option<usize> {
    if from >= blob.len() {
        return None;
    }
    find_pattern_simd(&blob[from..], pattern).map(|pos| from + pos)
}

/// SIMD-accelerated pattern search with runtime dispatch
/// Returns offset of first match, or None
#[inline]
pub fn find_pattern_simd(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }

    if haystack.len() < SIMD_MIN_HAYSTACK {
        return find_pattern_scalar(haystack, needle);
    }

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            // Safety: AVX2 support checked at runtime
            return unsafe { find_pattern_avx2(haystack, needle) };
        } else if is_x86_feature_detected!("sse4.2") {
            // Safety: SSE4.2 support checked at runtime
            return unsafe { find_pattern_sse42(haystack, needle) };
        }
    }

    find_pattern_scalar(haystack, needle)
}

/// Scalar pattern search (fallback)
#[inline]
fn find_pattern_scalar(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// AVX2-accelerated search (32 bytes at a time)
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn find_pattern_avx2(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let first_byte = needle[0];
    let needle_len = needle.len();

    let first_byte_vec = _mm256_set1_epi8(first_byte as i8);

    let mut i = 0;
    let end = haystack.len() - needle_len;

    while i + 32 <= end {
        let chunk = _mm256_loadu_si256(haystack.as_ptr().add(i) as *const __m256i);
        let cmp = _mm256_cmpeq_epi8(chunk, first_byte_vec);
        let mut mask = _mm256_movemask_epi8(cmp) as u32;

        // candidates in ascending order so the first hit is the lowest offset
        while mask != 0 {
            let pos = i + mask.trailing_zeros() as usize;
            if &haystack[pos..pos + needle_len] == needle {
                return Some(pos);
            }
            mask &= mask - 1;
        }

        i += 32;
    }

    find_pattern_scalar(&haystack[i..], needle).map(|pos| i + pos)
}

/// SSE4.2-accelerated search (16 bytes at a time)
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.2")]
unsafe fn find_pattern_sse42(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let first_byte = needle[0];
    let needle_len = needle.len();

    let first_byte_vec = _mm_set1_epi8(first_byte as i8);

    let mut i = 0;
    let end = haystack.len() - needle_len;

    while i + 16 <= end {
        let chunk = _mm_loadu_si128(haystack.as_ptr().add(i) as *const __m128i);
        let cmp = _mm_cmpeq_epi8(chunk, first_byte_vec);
        let mut mask = _mm_movemask_epi8(cmp) as u32;

        while mask != 0 {
            let pos = i + mask.trailing_zeros() as usize;
            if &haystack[pos..pos + needle_len] == needle {
                return Some(pos);
            }
            mask &= mask - 1;
        }

        i += 16;
    }

    find_pattern_scalar(&haystack[i..], needle).map(|pos| i + pos)
}
