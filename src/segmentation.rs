/**
Splits long texts into spans before tagging them. Spans are `(start, end)` byte offsets into the
text, with `end` excluded, so `&text[start..end]` is always valid.
*/
use regex::Regex;
use std::iter::once;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, Error)]
pub enum SegmentationError {
    #[error(transparent)]
    InvalidPattern(#[from] regex::Error),
    #[error("Cannot segment a text into spans of size 0 or into 0 spans")]
    ZeroSpans,
}

/// How many spans `segment_text_uniformly` should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformSpans {
    /// Exactly this number of spans.
    Count(usize),
    /// As few spans as possible, each holding at most this number of characters.
    MaxSize(usize),
}

/// Segments the text after each match of one of the separators. Consecutive pieces are merged as
/// long as the span stays within `length` bytes. A span exceeds `length` only when two successive
/// separators are further apart than `length`.
///
/// * `text`: Text to segment
/// * `seps`: Regex patterns of the separators. A separator stays at the end of its span.
/// * `length`: Maximum length of a merged span, in bytes. With `0`, every piece is its own span.
pub fn segment_text_with_seps<S: AsRef<str>>(
    text: &str,
    seps: &[S],
    length: usize,
) -> Result<Vec<(usize, usize)>, SegmentationError> {
    let pattern = seps
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<&str>>()
        .join("|");
    let separators = Regex::new(&pattern)?;
    Ok(merge_pieces(text, &separators, length))
}

fn merge_pieces(text: &str, separators: &Regex, length: usize) -> Vec<(usize, usize)> {
    let mut spans = vec![];
    let mut start = 0;
    // End of the last cut that fits in the current span
    let mut end: Option<usize> = None;
    for cut in separators.find_iter(text).map(|m| m.end()) {
        if cut - start <= length {
            end = Some(cut);
            continue;
        }
        match end {
            None => {
                spans.push((start, cut));
                start = cut;
            }
            Some(last) => {
                spans.push((start, last));
                if cut - last <= length {
                    start = last;
                    end = Some(cut);
                } else {
                    spans.push((last, cut));
                    start = cut;
                    end = None;
                }
            }
        }
    }
    if text.len() > start {
        match end {
            Some(last) if text.len() - start > length => {
                spans.push((start, last));
                spans.push((last, text.len()));
            }
            _ => spans.push((start, text.len())),
        }
    }
    spans
}

/// Segments the text with the separators of the first level, then segments again every span
/// longer than `length` with the separators of the next level, and so on. Without any level, the
/// whole text is a single span.
pub fn segment_text_with_hierarchical_seps<S: AsRef<str>>(
    text: &str,
    hie_seps: &[Vec<S>],
    length: usize,
) -> Result<Vec<(usize, usize)>, SegmentationError> {
    let Some((seps, deeper)) = hie_seps.split_first() else {
        return Ok(vec![(0, text.len())]);
    };
    let mut spans = vec![];
    for (start, end) in segment_text_with_seps(text, seps, length)? {
        if end - start <= length {
            spans.push((start, end));
            continue;
        }
        trace!(start, end, levels = deeper.len(), "span too long, segmenting it again");
        let sub_spans = segment_text_with_hierarchical_seps(&text[start..end], deeper, length)?;
        spans.extend(
            sub_spans
                .into_iter()
                .map(|(sub_start, sub_end)| (start + sub_start, start + sub_end)),
        );
    }
    Ok(spans)
}

/// Segments the text into spans holding (almost) the same number of characters. Span boundaries
/// are rounded half up. An empty text gives `n` empty spans with `Count(n)` and none with
/// `MaxSize`.
pub fn segment_text_uniformly(
    text: &str,
    spans: UniformSpans,
) -> Result<Vec<(usize, usize)>, SegmentationError> {
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(once(text.len()))
        .collect();
    let num_chars = offsets.len() - 1;
    let num_spans = match spans {
        UniformSpans::Count(0) | UniformSpans::MaxSize(0) => {
            return Err(SegmentationError::ZeroSpans)
        }
        UniformSpans::Count(n) => n,
        UniformSpans::MaxSize(m) => num_chars.div_ceil(m),
    };
    if num_spans == 0 {
        return Ok(vec![]);
    }
    let span_size = num_chars as f64 / num_spans as f64;
    let boundary = |i: usize| {
        let char_idx = ((span_size * i as f64 + 0.5) as usize).min(num_chars);
        offsets[char_idx]
    };
    Ok((0..num_spans).map(|i| (boundary(i), boundary(i + 1))).collect())
}
