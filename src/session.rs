// src/session.rs
//! Single-writer capture session
//!
//! One task owns the history store for the whole session; every trigger is
//! marshalled onto it. Clipboard notifications only re-arm the debounce
//! deadline, the deadline is polled by the same `select!` loop, and user
//! commands arrive over a channel and run in arrival order. Nothing else
//! ever touches the store, so no lock guards it.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::core::history::{HistoryStore, DEFAULT_CAPACITY};
use crate::core::item::HistoryItem;
use crate::core::pipeline::{
    Debouncer, IngestOutcome, IngestionPipeline, DEFAULT_DEBOUNCE, DEFAULT_MAX_PAYLOAD_BYTES,
};
use crate::core::sources::{CaptureListener, ClipboardSource};
use crate::export::export_to_text;
use crate::storage::PersistenceLayer;

/// Tunables for a capture session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum number of retained entries (pinned ones may exceed it).
    pub capacity: usize,
    /// Quiet interval a notification burst must respect before one read.
    pub debounce: Duration,
    /// Payloads above this UTF-8 byte length are dropped unseen.
    pub max_payload_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            debounce: DEFAULT_DEBOUNCE,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Work marshalled onto the session task.
#[derive(Debug)]
pub enum SessionCommand {
    TogglePin {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    Clear,
    /// Place an entry's text back on the clipboard with echo suppression armed.
    Copy {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    Export {
        reply: oneshot::Sender<String>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<HistoryItem>>,
    },
    Shutdown,
}

/// Cheap cloneable handle for talking to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub async fn toggle_pin(&self, id: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        let command = SessionCommand::TogglePin {
            id: id.to_string(),
            reply,
        };
        if self.commands.send(command).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn remove(&self, id: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        let command = SessionCommand::Remove {
            id: id.to_string(),
            reply,
        };
        if self.commands.send(command).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub fn clear(&self) {
        let _ = self.commands.send(SessionCommand::Clear);
    }

    pub async fn copy(&self, id: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        let command = SessionCommand::Copy {
            id: id.to_string(),
            reply,
        };
        if self.commands.send(command).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn export(&self) -> String {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(SessionCommand::Export { reply }).is_err() {
            return String::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn snapshot(&self) -> Vec<HistoryItem> {
        let (reply, rx) = oneshot::channel();
        if self
            .commands
            .send(SessionCommand::Snapshot { reply })
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Ask the session to save and stop.
    pub fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
    }
}

/// The capture session; owns the store, the guards and the collaborators.
pub struct Session<S: ClipboardSource> {
    store: HistoryStore,
    pipeline: IngestionPipeline,
    debounce: Debouncer,
    source: S,
    persistence: PersistenceLayer,
    listeners: Vec<Box<dyn CaptureListener>>,
    changes: mpsc::UnboundedReceiver<()>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
}

impl<S: ClipboardSource> Session<S> {
    /// Restore persisted history, wire the change notification and hand back
    /// the session plus a command handle.
    pub fn new(
        config: SessionConfig,
        mut source: S,
        persistence: PersistenceLayer,
    ) -> (Self, SessionHandle) {
        let mut store = HistoryStore::new(config.capacity);
        let restored = persistence.load();
        if !restored.is_empty() {
            info!(
                "📋 Restored {} history entries from {}",
                restored.len(),
                persistence.path().display()
            );
        }
        store.replace_all(restored);

        let (change_tx, changes) = mpsc::unbounded_channel();
        source.on_change(Box::new(move || {
            let _ = change_tx.send(());
        }));
        let (command_tx, commands) = mpsc::unbounded_channel();

        let session = Self {
            store,
            pipeline: IngestionPipeline::new(config.max_payload_bytes),
            debounce: Debouncer::new(config.debounce),
            source,
            persistence,
            listeners: Vec::new(),
            changes,
            commands,
        };
        (
            session,
            SessionHandle {
                commands: command_tx,
            },
        )
    }

    /// Register an observer for accepted captures.
    pub fn add_listener<T: CaptureListener + 'static>(&mut self, listener: T) {
        self.listeners.push(Box::new(listener));
    }

    /// Run until shutdown, then persist unconditionally.
    pub async fn run(mut self) {
        for listener in &mut self.listeners {
            listener.on_started();
        }

        let mut changes_open = true;
        let mut commands_open = true;
        loop {
            if !changes_open && !commands_open && !self.debounce.is_armed() {
                break;
            }
            tokio::select! {
                maybe = self.changes.recv(), if changes_open => match maybe {
                    Some(()) => self.debounce.signal(),
                    None => changes_open = false,
                },
                _ = sleep_until(self.debounce.deadline().unwrap_or_else(Instant::now)),
                    if self.debounce.is_armed() =>
                {
                    self.debounce.disarm();
                    self.ingest_current();
                },
                maybe = self.commands.recv(), if commands_open => match maybe {
                    Some(SessionCommand::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                    None => commands_open = false,
                },
            }
        }

        self.persistence.save(self.store.snapshot());
        for listener in &mut self.listeners {
            listener.on_stopped();
        }
        debug!("session loop finished; history persisted");
    }

    /// Read the payload once, now that the burst has gone quiet.
    fn ingest_current(&mut self) {
        let Some(payload) = self.source.read() else {
            debug!("clipboard held no text when the debounce fired");
            return;
        };
        match self.pipeline.ingest(&mut self.store, &payload) {
            IngestOutcome::Added => {
                let needle = payload.trim_end_matches(['\r', '\n']);
                let captured = self
                    .store
                    .snapshot()
                    .iter()
                    .find(|it| it.text == needle)
                    .cloned();
                if let Some(item) = captured {
                    debug!("captured entry {} ({} bytes)", item.id, item.text.len());
                    for listener in &mut self.listeners {
                        listener.on_capture(&item);
                    }
                }
                self.persistence.save(self.store.snapshot());
            }
            IngestOutcome::Oversized(bytes) => {
                debug!("dropped oversized clipboard payload ({bytes} bytes)");
            }
            IngestOutcome::UnchangedPayload => {
                debug!("clipboard payload unchanged; skipped");
            }
            IngestOutcome::RejectedByStore => {
                debug!("payload declined by the store (blank or suppressed echo)");
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::TogglePin { id, reply } => {
                let changed = self.store.toggle_pin(&id);
                self.persistence.save(self.store.snapshot());
                let _ = reply.send(changed);
            }
            SessionCommand::Remove { id, reply } => {
                let changed = self.store.remove(&id);
                self.persistence.save(self.store.snapshot());
                let _ = reply.send(changed);
            }
            SessionCommand::Clear => {
                self.store.clear();
                self.persistence.save(self.store.snapshot());
            }
            SessionCommand::Copy { id, reply } => {
                let text = self
                    .store
                    .snapshot()
                    .iter()
                    .find(|it| it.id == id)
                    .map(|it| it.text.clone());
                let found = match text {
                    Some(text) => {
                        self.store.set_ignore_next(text.clone());
                        self.source.write(&text);
                        true
                    }
                    None => false,
                };
                let _ = reply.send(found);
            }
            SessionCommand::Export { reply } => {
                let _ = reply.send(export_to_text(self.store.snapshot()));
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.store.snapshot().to_vec());
            }
            // Handled by the run loop before it gets here.
            SessionCommand::Shutdown => {}
        }
    }
}
