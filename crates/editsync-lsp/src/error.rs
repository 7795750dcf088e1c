use editsync_core::BufferError;
use thiserror::Error;

use crate::lsp_sync::LspPosition;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors produced while converting, diffing or applying protocol edits.
///
/// None of these are fatal to the host: each one aborts a single conversion, edit or batch and
/// leaves the buffer exactly as it was.
pub enum SyncError {
    #[error("position {position} is outside the document ({line_count} lines)")]
    /// A protocol position names a line past the end of the document.
    PositionOutOfRange {
        /// The offending position.
        position: LspPosition,
        /// Number of lines in the document.
        line_count: usize,
    },

    #[error("offset {offset} is outside the document (length {len})")]
    /// A character offset points past the end of the document.
    OffsetOutOfRange {
        /// The offending offset.
        offset: usize,
        /// Document length in characters.
        len: usize,
    },

    #[error("bad edit range {start}..{end}: {reason}")]
    /// An edit range is still unusable after normalization and clipping.
    BadRange {
        /// Start character offset.
        start: usize,
        /// End character offset.
        end: usize,
        /// Why the range was rejected.
        reason: &'static str,
    },

    #[error("document changed since the edits were computed (stamp {captured} -> {current})")]
    /// The buffer was modified after the edit batch captured its stamp.
    ConcurrentModification {
        /// Stamp captured when the request was issued.
        captured: u64,
        /// Stamp observed at apply time.
        current: u64,
    },

    #[error("completion item has no text edit, insert text or label")]
    /// A completion item carries nothing to insert.
    NothingToApply,

    #[error("buffer error: {0}")]
    /// The buffer rejected an access.
    Buffer(#[from] BufferError),
}

impl SyncError {
    /// Returns `true` for the out-of-range conversion failures.
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            SyncError::PositionOutOfRange { .. } | SyncError::OffsetOutOfRange { .. }
        )
    }
}
