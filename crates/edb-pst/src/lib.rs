//! Exchange EDB extraction and PST synthesis engines.
//!
//! Two independent pipelines live in this crate:
//!
//! - `edb`/`lzxpress`: read an Exchange EDB (via any [`edb::source::EseSource`]
//!   backend), decompress its columns, and assemble typed entities
//!   (`EmailMessage`/`CalendarEvent`/`Contact`).
//! - `ndb`/`ltp`/`messaging`: build a byte-valid Unicode PST from a stream of
//!   such entities, from scratch.
//!
//! `eml` bridges the two: it parses an RFC 5322 message into the same tagged
//! MAPI property shape the PST writer consumes, independent of any EDB
//! source. `export` runs the opposite direction, rendering entities back out
//! to EML/ICS/VCF.

pub mod block_sig;
pub mod edb;
pub mod eml;
pub mod export;
pub mod ltp;
pub mod lzxpress;
pub mod messaging;
pub mod ndb;
pub mod util;

use std::fmt;

use thiserror::Error;

/// A table/row/column locator attached to a recoverable per-record error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub table: Option<String>,
    pub row: Option<usize>,
    pub column: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(table) = &self.table {
            parts.push(format!("table={table}"));
        }
        if let Some(row) = &self.row {
            parts.push(format!("row={row}"));
        }
        if let Some(column) = &self.column {
            parts.push(format!("column={column}"));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Crate-level error taxonomy. Subsystem errors (`NdbError`, `LtpError`,
/// `MessagingError`, `LzxpressError`, `EseSourceError`) wrap in via
/// `#[from]`; variants tied to a specific row/column carry an
/// [`ErrorContext`].
#[derive(Debug, Error)]
pub enum EdbPstError {
    #[error("input not found: {0}")]
    InputNotFound(String),
    #[error("malformed database ({context}): {source}")]
    MalformedDatabase {
        context: ErrorContext,
        #[source]
        source: edb::source::EseSourceError,
    },
    #[error("unsupported column type ({context}): {variant:#04X}")]
    UnsupportedColumnType { context: ErrorContext, variant: u8 },
    #[error("decompression failed ({context}): {source}")]
    DecompressionFailed {
        context: ErrorContext,
        #[source]
        source: lzxpress::LzxpressError,
    },
    #[error("unexpected PropertyBlob shape ({context}): {reason}")]
    UnexpectedPropertyBlobShape { context: ErrorContext, reason: String },
    #[error("long value missing ({context})")]
    LongValueMissing { context: ErrorContext },
    #[error("PST space exhausted: output exceeded the 50 GiB ceiling")]
    PstSpaceExhausted,
    #[error("operation cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Ndb(ndb::NdbError),
    #[error(transparent)]
    Ltp(#[from] ltp::LtpError),
    #[error(transparent)]
    Messaging(#[from] messaging::MessagingError),
}

/// `ndb::NdbError::SpaceExhausted` maps onto the dedicated top-level variant
/// so callers can match on it without reaching into the subsystem error;
/// every other `NdbError` wraps through unchanged.
impl From<ndb::NdbError> for EdbPstError {
    fn from(err: ndb::NdbError) -> Self {
        match err {
            ndb::NdbError::SpaceExhausted(_) => EdbPstError::PstSpaceExhausted,
            other => EdbPstError::Ndb(other),
        }
    }
}

pub type EdbPstResult<T> = Result<T, EdbPstError>;

/// PST writer output ceiling.
pub const PST_SPACE_CEILING_BYTES: u64 = 50 * 1024 * 1024 * 1024;

/// AMap page span: each Allocation Map page bitmap-tracks this many bytes
/// of file space (1 bit per 64-byte slot).
pub const AMAP_PAGE_SPAN_BYTES: u64 = 253_952;

/// Per-job diagnostic aggregate, summarized at job end with counts by kind.
/// Recoverable per-row/per-message/per-folder failures are recorded here
/// rather than aborting the surrounding iteration.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    counts: std::collections::BTreeMap<&'static str, u64>,
    entries: Vec<(String, ErrorContext)>,
}

impl DiagnosticReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a recoverable diagnostic. `kind` should be a short, stable
    /// label (e.g. `"decompression_failed"`) used to bucket the end-of-job
    /// summary; `message` is the human-readable detail.
    pub fn record(&mut self, kind: &'static str, message: impl Into<String>, context: ErrorContext) {
        *self.counts.entry(kind).or_insert(0) += 1;
        tracing::warn!(kind, %context, "recoverable diagnostic");
        self.entries.push((message.into(), context));
    }

    pub fn count(&self, kind: &str) -> u64 {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(String, ErrorContext)] {
        &self.entries
    }

    pub fn counts_by_kind(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.counts.iter().map(|(k, v)| (*k, *v))
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counts.is_empty() {
            return write!(f, "no diagnostics");
        }
        let parts: Vec<String> = self
            .counts
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_report_aggregates_counts() {
        let mut report = DiagnosticReport::new();
        report.record(
            "decompression_failed",
            "bad column",
            ErrorContext::new().with_table("Message_1").with_row(3),
        );
        report.record(
            "decompression_failed",
            "bad column 2",
            ErrorContext::new().with_table("Message_1").with_row(9),
        );
        assert_eq!(report.count("decompression_failed"), 2);
        assert_eq!(report.total(), 2);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_error_context_display() {
        let context = ErrorContext::new()
            .with_table("Message_1")
            .with_row(2)
            .with_column("PropertyBlob");
        assert_eq!(
            context.to_string(),
            "table=Message_1, row=2, column=PropertyBlob"
        );
    }
}
