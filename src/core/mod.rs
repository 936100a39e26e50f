// src/core/mod.rs
pub mod history;
pub mod item;
pub mod pipeline;
pub mod sources;

pub use history::{HistoryStore, DEFAULT_CAPACITY};
pub use item::HistoryItem;
pub use pipeline::{Debouncer, IngestOutcome, IngestionPipeline};
pub use sources::{
    AutostartRegistrar, CaptureListener, ChangeCallback, ClipboardSource, HotkeySource,
    RegistrationError,
};
