//! ASCII case folding for the scan path
//!
//! The scan kernel walks the automaton over a lowercase view of the input,
//! folded once per search call into a reusable per-thread buffer. SIMD
//! paths process 16 bytes per iteration:
//! - x86_64: SSE2
//! - aarch64: NEON
//! - elsewhere: scalar fallback
//!
//! Short inputs skip the SIMD setup entirely.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

/// Inputs below this length fold through the scalar path.
const SIMD_CUTOVER: usize = 64;

/// Fold `text` to ASCII lowercase into `output`, picking the fastest
/// implementation for the input length and CPU.
#[inline]
pub fn ascii_lowercase(text: &[u8], output: &mut Vec<u8>) {
    if text.len() < SIMD_CUTOVER {
        ascii_lowercase_scalar(text, output);
    } else {
        ascii_lowercase_simd(text, output);
    }
}

/// Fold `text` to ASCII lowercase using SIMD when the platform has it.
pub fn ascii_lowercase_simd(text: &[u8], output: &mut Vec<u8>) {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: SSE2 is part of the x86_64 baseline; the runtime check
        // guards exotic configurations.
        if is_x86_feature_detected!("sse2") {
            unsafe { ascii_lowercase_sse2(text, output) };
            return;
        }
        ascii_lowercase_scalar(text, output);
    }

    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: NEON is part of the aarch64 baseline.
        unsafe { ascii_lowercase_neon(text, output) };
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        ascii_lowercase_scalar(text, output);
    }
}

/// Scalar fallback.
#[inline(always)]
pub fn ascii_lowercase_scalar(text: &[u8], output: &mut Vec<u8>) {
    output.clear();
    output.reserve(text.len());
    for &byte in text {
        output.push(byte.to_ascii_lowercase());
    }
}

/// 16 bytes per iteration with SSE2.
///
/// # Safety
///
/// Requires SSE2. Uses `Vec::set_len` after each store; the reserve above
/// the loop guarantees the capacity, and the store initializes the bytes
/// before the length claims them.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn ascii_lowercase_sse2(text: &[u8], output: &mut Vec<u8>) {
    output.clear();
    output.reserve(text.len());

    let len = text.len();
    let simd_end = len - (len % 16);

    let upper_a = _mm_set1_epi8(b'A' as i8 - 1);
    let upper_z = _mm_set1_epi8(b'Z' as i8 + 1);
    let to_lower = _mm_set1_epi8(32);

    let mut i = 0;
    while i < simd_end {
        let chunk = _mm_loadu_si128(text.as_ptr().add(i) as *const __m128i);

        let gt_a = _mm_cmpgt_epi8(chunk, upper_a);
        let lt_z = _mm_cmplt_epi8(chunk, upper_z);
        let is_upper = _mm_and_si128(gt_a, lt_z);

        let offset = _mm_and_si128(to_lower, is_upper);
        let lowercased = _mm_add_epi8(chunk, offset);

        let old_len = output.len();
        _mm_storeu_si128(output.as_mut_ptr().add(old_len) as *mut __m128i, lowercased);
        output.set_len(old_len + 16);

        i += 16;
    }

    for &byte in &text[i..] {
        output.push(byte.to_ascii_lowercase());
    }
}

/// 16 bytes per iteration with NEON.
///
/// # Safety
///
/// Same `set_len` contract as the SSE2 path; NEON is always available on
/// aarch64.
#[cfg(target_arch = "aarch64")]
unsafe fn ascii_lowercase_neon(text: &[u8], output: &mut Vec<u8>) {
    output.clear();
    output.reserve(text.len());

    let len = text.len();
    let simd_end = len - (len % 16);

    let upper_a = vdupq_n_u8(b'A' - 1);
    let upper_z = vdupq_n_u8(b'Z' + 1);
    let to_lower = vdupq_n_u8(32);

    let mut i = 0;
    while i < simd_end {
        let chunk = vld1q_u8(text.as_ptr().add(i));

        let gt_a = vcgtq_u8(chunk, upper_a);
        let lt_z = vcltq_u8(chunk, upper_z);
        let is_upper = vandq_u8(gt_a, lt_z);

        let offset = vandq_u8(to_lower, is_upper);
        let lowercased = vaddq_u8(chunk, offset);

        let old_len = output.len();
        vst1q_u8(output.as_mut_ptr().add(old_len), lowercased);
        output.set_len(old_len + 16);

        i += 16;
    }

    for &byte in &text[i..] {
        output.push(byte.to_ascii_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_basic() {
        let mut out = Vec::new();
        ascii_lowercase_scalar(b"Hello WORLD!", &mut out);
        assert_eq!(&out, b"hello world!");
    }

    #[test]
    fn test_simd_all_upper() {
        let mut out = Vec::new();
        ascii_lowercase_simd(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ", &mut out);
        assert_eq!(&out, b"abcdefghijklmnopqrstuvwxyz");
    }

    #[test]
    fn test_simd_matches_scalar_across_boundaries() {
        // Lengths around the 16-byte lanes and the scalar tail.
        for len in [0, 1, 15, 16, 17, 31, 32, 63, 64, 65, 130] {
            let text: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
            let mut simd = Vec::new();
            let mut scalar = Vec::new();
            ascii_lowercase_simd(&text, &mut simd);
            ascii_lowercase_scalar(&text, &mut scalar);
            assert_eq!(simd, scalar, "length {}", len);
        }
    }

    #[test]
    fn test_non_ascii_passthrough() {
        let mut out = Vec::new();
        ascii_lowercase_simd(b"\xC3\xA9 caf\xC3\xA9 HELLO \xFF\x80 MORE TEXT HERE PADDING..", &mut out);
        assert_eq!(
            &out,
            b"\xc3\xa9 caf\xc3\xa9 hello \xff\x80 more text here padding..".as_ref()
        );
    }

    #[test]
    fn test_adaptive_reuses_buffer() {
        let mut out = Vec::new();
        ascii_lowercase(b"First CALL", &mut out);
        assert_eq!(&out, b"first call");
        ascii_lowercase(b"X", &mut out);
        assert_eq!(&out, b"x");
    }
}
