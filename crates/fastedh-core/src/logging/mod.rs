//! Per-context JSONL logging.
//!
//! Each browsing context writes its own append-only file, so several tabs
//! (or CLI invocations) on one origin can log at once:
//!
//! ```text
//! logs/
//! └── raw/
//!     ├── 2026-10-17_tab-1.jsonl
//!     └── 2026-10-17_cli.jsonl
//! ```
//!
//! ```bash
//! # Everything one context did
//! jq 'select(.context == "tab-1")' logs/raw/*.jsonl
//! ```

pub mod entry;
pub mod layer;
pub mod writer;

pub use entry::JsonLogEntry;
pub use layer::{JsonlLayer, LoggingBuilder};
pub use writer::{read_all_entries, read_entries_for_context, ContextLogWriter};
