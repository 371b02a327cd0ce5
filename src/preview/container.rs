//! Preview cache container layout.
//!
//! A text prologue lists `height = N,` / `width = N,` pairs, one per level, smallest first as
//! written; the JPEG levels follow as raw byte runs. There is no index, so levels are found by
//! scanning for start (`FF D8`) and end (`FF D9`) markers and matched to dimensions by position.

/// One embedded JPEG and the dimensions declared for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviewLevel {
    pub height: u32,
    pub width: u32,
    pub offset: usize,
    pub len: usize,
}

impl PreviewLevel {
    pub fn area(&self) -> u64 {
        u64::from(self.height) * u64::from(self.width)
    }

    pub fn bytes<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        data.get(self.offset..self.offset.checked_add(self.len)?)
    }
}

const JPEG_START: [u8; 2] = [0xFF, 0xD8];
const JPEG_END: [u8; 2] = [0xFF, 0xD9];

/// Longest number accepted after a dimension token.
const MAX_DIGITS: usize = 9;

/// Parse the number that follows a `height`/`width` token at `at`.
/// Skips separators, reads digits, then requires a comma after optional whitespace.
fn number_after(data: &[u8], mut at: usize) -> Option<u32> {
    while at < data.len() && matches!(data[at], b' ' | b'\t' | b'=' | b':' | b'"') {
        at += 1;
    }
    let start = at;
    while at < data.len() && data[at].is_ascii_digit() && at - start < MAX_DIGITS {
        at += 1;
    }
    if at == start {
        return None;
    }
    let digits = std::str::from_utf8(&data[start..at]).ok()?;
    while at < data.len() && data[at].is_ascii_whitespace() {
        at += 1;
    }
    if data.get(at) != Some(&b',') {
        return None;
    }
    digits.parse().ok()
}

/// Scan once, left to right. Returns levels pairing the Nth declared size with the Nth JPEG span.
/// Extra sizes or extra spans are dropped.
pub fn scan_levels(data: &[u8]) -> Vec<PreviewLevel> {
    let mut sizes: Vec<(u32, u32)> = Vec::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut seen_start = false;
    let mut pending_start: Option<usize> = None;
    let mut height: Option<u32> = None;
    let mut width: Option<u32> = None;

    for i in 0..data.len().saturating_sub(1) {
        if !seen_start {
            let rest = &data[i..];
            if rest.starts_with(b"height") {
                height = number_after(data, i + 6).or(height);
            } else if rest.starts_with(b"width") {
                width = number_after(data, i + 5).or(width);
            }
            if let (Some(h), Some(w)) = (height, width)
                && h > 0
                && w > 0
            {
                sizes.push((h, w));
                height = None;
                width = None;
            }
        }
        let pair = [data[i], data[i + 1]];
        if pair == JPEG_START {
            seen_start = true;
            pending_start = Some(i);
        } else if pair == JPEG_END
            && let Some(start) = pending_start.take()
        {
            spans.push((start, i - start + 2));
        }
    }

    sizes
        .into_iter()
        .zip(spans)
        .map(|((height, width), (offset, len))| PreviewLevel {
            height,
            width,
            offset,
            len,
        })
        .collect()
}

/// Smallest level whose geometric mean edge reaches `target`, else the largest.
/// Ties keep container order.
pub fn select_level(mut levels: Vec<PreviewLevel>, target: u32) -> Option<PreviewLevel> {
    levels.sort_by_key(PreviewLevel::area);
    let target = f64::from(target);
    levels
        .iter()
        .find(|l| (l.area() as f64).sqrt() >= target)
        .or(levels.last())
        .copied()
}
