//! Clipboard History Tracker Library
//!
//! This library provides a modular system for capturing, deduplicating and
//! persisting the text clipboard history of a desktop session.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod core;
pub mod export;
pub mod platform;
pub mod session;
pub mod storage;

pub use crate::core::history::{HistoryStore, DEFAULT_CAPACITY};
pub use crate::core::item::HistoryItem;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::core::history::{HistoryStore, DEFAULT_CAPACITY};
    pub use crate::core::item::HistoryItem;
    pub use crate::core::pipeline::{
        Debouncer, IngestOutcome, IngestionPipeline, DEFAULT_DEBOUNCE, DEFAULT_MAX_PAYLOAD_BYTES,
    };
    pub use crate::core::sources::{
        AutostartRegistrar, CaptureListener, ChangeCallback, ClipboardSource, HotkeySource,
        RegistrationError,
    };
    pub use crate::export::{export_to_text, format_time_ago, preview_line};
    pub use crate::platform::{SignalHotkey, SystemClipboard, XdgAutostart};
    pub use crate::session::{Session, SessionConfig, SessionHandle};
    pub use crate::storage::PersistenceLayer;
}
