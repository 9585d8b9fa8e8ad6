//! Export formatters: render the typed EDB entities back out to the
//! plain-text interchange formats Outlook and every other mail client
//! already understand. These are the inverse of `eml`'s parse direction and
//! are independent of the PST writer — a caller can export straight from
//! `edb::entity` without ever touching `ndb`/`ltp`.

pub mod eml;
pub mod ics;
pub mod vcf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::fmt::Error),
    #[error("attachment fetch failed: {0}")]
    AttachmentFetch(#[from] crate::edb::entity::EntityError),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Folds a line at `limit` octets, inserting the continuation prefix
/// (`\r\n ` for iCalendar/vCard, per RFC 5545 §3.1's "line folding") before
/// each subsequent segment. Folding counts UTF-8 bytes, matching the RFCs'
/// "octet" wording, and only splits on byte boundaries that are also char
/// boundaries so multi-byte sequences are never cut in half.
pub(crate) fn fold_line(line: &str, limit: usize) -> String {
    if line.len() <= limit {
        return line.to_string();
    }
    let mut out = String::new();
    let mut remaining = line;
    let mut first = true;
    while !remaining.is_empty() {
        let budget = if first { limit } else { limit - 1 };
        let mut split_at = remaining.len().min(budget);
        while split_at > 0 && !remaining.is_char_boundary(split_at) {
            split_at -= 1;
        }
        if split_at == 0 {
            split_at = remaining.len().min(budget.max(1));
        }
        out.push_str(&remaining[..split_at]);
        remaining = &remaining[split_at..];
        if !remaining.is_empty() {
            out.push_str("\r\n ");
        }
        first = false;
    }
    out
}

/// Wraps base64 text at `width` columns with `\r\n`.
pub(crate) fn wrap_base64(encoded: &str, width: usize) -> String {
    let mut out = String::with_capacity(encoded.len() + encoded.len() / width * 2);
    for (i, chunk) in encoded.as_bytes().chunks(width).enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        out.push_str(std::str::from_utf8(chunk).expect("base64 alphabet is ASCII"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_line_short_untouched() {
        assert_eq!(fold_line("short", 75), "short");
    }

    #[test]
    fn test_fold_line_wraps_long_lines() {
        let line = "a".repeat(100);
        let folded = fold_line(&line, 75);
        assert!(folded.contains("\r\n "));
        let rejoined: String = folded.split("\r\n ").collect();
        assert_eq!(rejoined, line);
    }

    #[test]
    fn test_wrap_base64_at_width() {
        let encoded = "A".repeat(200);
        let wrapped = wrap_base64(&encoded, 76);
        for line in wrapped.split("\r\n") {
            assert!(line.len() <= 76);
        }
    }
}
