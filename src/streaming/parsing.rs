//! Zero-allocation scanning of match-record output.
//!
//! Program output is handled as raw bytes: lines are located with memchr and
//! fields are sliced out of the original buffer without copying.

use memchr::{memchr, memchr_iter};

/// Fast u64 parsing - no allocation, no error formatting.
///
/// Returns None if the input is empty, contains non-digit characters,
/// or does not fit in a u64.
#[inline(always)]
pub fn parse_u64_fast(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n.checked_mul(10)?.checked_add(d as u64)?;
    }
    Some(n)
}

/// Locate every line body in `data`.
///
/// Returns `(start, end)` offsets that exclude the `\n` terminator. A final
/// line without a terminator is still reported; an empty buffer has no lines.
/// Blank lines are reported as empty spans so callers can reject them.
pub fn line_spans(data: &[u8]) -> Vec<(usize, usize)> {
    let mut spans = Vec::with_capacity(data.len() / 64 + 1);
    let mut start = 0;

    for nl in memchr_iter(b'\n', data) {
        spans.push((start, nl));
        start = nl + 1;
    }
    if start < data.len() {
        spans.push((start, data.len()));
    }

    spans
}

/// Drop a trailing carriage return left over from a `\r\n` terminator.
#[inline(always)]
pub fn strip_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// Split the first `N` tab-separated fields out of `line`.
///
/// Returns the fields and how many were actually present (at most `N`).
/// Anything after the `N`th field is ignored.
#[inline]
pub fn split_tabs<const N: usize>(line: &[u8]) -> ([&[u8]; N], usize) {
    let mut fields: [&[u8]; N] = [&[]; N];
    let mut rest = line;
    let mut found = 0;

    for slot in fields.iter_mut() {
        found += 1;
        match memchr(b'\t', rest) {
            Some(tab) => {
                *slot = &rest[..tab];
                rest = &rest[tab + 1..];
            }
            None => {
                *slot = rest;
                break;
            }
        }
    }

    (fields, found)
}
