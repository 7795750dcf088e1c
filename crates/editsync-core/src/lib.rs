#![warn(missing_docs)]
//! `editsync-core` - the buffer side of protocol-driven text synchronization.
//!
//! # Overview
//!
//! This crate defines the narrow contract the sync engine needs from an editor buffer and ships a
//! rope-backed reference implementation of it. It does not know anything about the protocol;
//! UTF-16 positions, diffs and snippets live in `editsync-lsp`.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  TextBuffer (replace + modification stamp)  │  ← mutated by the edit applier
//! ├─────────────────────────────────────────────┤
//! │  TextSource (read-only, line aware)         │  ← read by converters and diffing
//! ├─────────────────────────────────────────────┤
//! │  LineIndex (Rope-based snapshot)            │  ← line access
//! └─────────────────────────────────────────────┘
//! ```
//!
//! All offsets are **character offsets** (Unicode scalar values). Lines are terminated by `\n`,
//! `\r\n` or `\r`.
//!
//! # Quick Start
//!
//! ```rust
//! use editsync_core::{RopeBuffer, TextBuffer, TextSource};
//!
//! let mut buffer = RopeBuffer::from_text("Hello");
//! let stamp = buffer.modification_stamp();
//!
//! let record = buffer.replace(5..5, " World").unwrap();
//! assert_eq!(record.inserted_text, " World");
//! assert_eq!(buffer.text(), "Hello World");
//! assert_eq!(buffer.modification_stamp(), stamp + 1);
//! ```

pub mod buffer;
pub mod delta;
pub mod line_index;

pub use buffer::{BufferError, RopeBuffer, TextBuffer, TextSource};
pub use delta::TextDeltaEdit;
pub use line_index::LineIndex;
