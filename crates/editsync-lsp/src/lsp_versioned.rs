//! Edit batches guarded by the buffer's modification stamp.
//!
//! Server responses such as formatting are computed against the document as it was when the
//! request went out. Capture a [`ModificationStamp`] at that moment, attach the response's edits
//! with [`ModificationStamp::with_edits`], and apply the result later: if anything touched the
//! buffer in between, the batch is refused instead of corrupting the text.

use crate::error::SyncError;
use crate::lsp_text_edits::{LspTextEdit, ReplaceEdit, apply_batch};
use editsync_core::{TextBuffer, TextDeltaEdit};
use tracing::warn;

/// A buffer's modification stamp at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModificationStamp(u64);

impl ModificationStamp {
    /// Record the current stamp of `buffer`.
    pub fn capture<B: TextBuffer + ?Sized>(buffer: &B) -> Self {
        Self(buffer.modification_stamp())
    }

    /// The raw stamp value.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Returns `true` if `buffer` was mutated after this stamp was captured.
    pub fn is_stale<B: TextBuffer + ?Sized>(self, buffer: &B) -> bool {
        buffer.modification_stamp() != self.0
    }

    /// Bind `edits` (computed against the captured document) to this stamp.
    pub fn with_edits(self, edits: Vec<LspTextEdit>) -> VersionedEdits {
        VersionedEdits { stamp: self, edits }
    }
}

/// Edits that may only be applied to the document version they were computed against.
///
/// Applying consumes the batch, so it cannot be applied twice.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a versioned batch does nothing until it is applied"]
pub struct VersionedEdits {
    stamp: ModificationStamp,
    edits: Vec<LspTextEdit>,
}

impl VersionedEdits {
    /// Stamp the edits were computed against.
    pub fn stamp(&self) -> ModificationStamp {
        self.stamp
    }

    /// The edits, in protocol order.
    pub fn edits(&self) -> &[LspTextEdit] {
        &self.edits
    }

    /// Apply the batch to `buffer`.
    ///
    /// Fails with [`SyncError::ConcurrentModification`] and leaves `buffer` untouched if its stamp
    /// moved since capture. Otherwise behaves like [`crate::apply_text_edits`]: all edits are
    /// validated first and applied in descending start order, with ties kept in protocol order.
    pub fn apply<B: TextBuffer + ?Sized>(
        self,
        buffer: &mut B,
    ) -> Result<Vec<TextDeltaEdit>, SyncError> {
        let current = buffer.modification_stamp();
        if current != self.stamp.0 {
            let err = SyncError::ConcurrentModification {
                captured: self.stamp.0,
                current,
            };
            warn!(%err, "discarding stale edit batch");
            return Err(err);
        }

        let resolved = self
            .edits
            .iter()
            .map(|edit| ReplaceEdit::resolve(edit, &*buffer))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|err| warn!(%err, "rejecting versioned edit batch"))?;

        let batch = apply_batch(buffer, resolved)
            .inspect_err(|err| warn!(%err, "rejecting versioned edit batch"))?;
        Ok(batch.records)
    }
}
