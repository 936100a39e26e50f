// src/core/sources.rs
//! Capability traits for the OS-facing collaborators
//!
//! The core never touches clipboard, hotkey or login-item APIs directly; the
//! surrounding layer injects implementations of these narrow traits. Tests
//! inject fakes the same way.

use thiserror::Error;

use crate::core::item::HistoryItem;

/// Notification hook invoked from whatever context the OS delivers events on.
pub type ChangeCallback = Box<dyn Fn() + Send + 'static>;

/// Access to the shared OS clipboard.
pub trait ClipboardSource: Send {
    /// Current clipboard text, if any.
    fn read(&mut self) -> Option<String>;

    /// Register the change notification; may fire from any thread, and may
    /// fire several times for one logical change.
    fn on_change(&mut self, callback: ChangeCallback);

    /// Programmatically place text on the clipboard. Best-effort; callers
    /// arm echo suppression before invoking this.
    fn write(&mut self, text: &str);
}

/// Global shortcut registration.
pub trait HotkeySource {
    fn register_toggle(&mut self, callback: ChangeCallback) -> Result<(), RegistrationError>;

    fn shutdown(&mut self);
}

/// Launch-on-login registration.
pub trait AutostartRegistrar {
    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool) -> Result<(), RegistrationError>;
}

/// Observer for session-level capture events.
pub trait CaptureListener: Send {
    /// Called after the store accepted a new or refreshed entry.
    fn on_capture(&mut self, item: &HistoryItem);

    /// Called when the session starts watching.
    fn on_started(&mut self) {}

    /// Called when the session shuts down.
    fn on_stopped(&mut self) {}
}

/// Why a collaborator could not be registered. Non-fatal: the capability is
/// simply unavailable for the session.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The capability has no implementation for the current platform.
    #[error("not supported on this platform")]
    Unsupported,
    /// The OS refused or failed the registration call.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
