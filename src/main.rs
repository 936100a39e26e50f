// src/main.rs
//! Clipboard History Tracker
//!
//! Command line front end for the clipboard capture system. `watch` runs the
//! long-lived capture session; the remaining subcommands inspect or edit the
//! persisted history file directly.

#![deny(unsafe_op_in_unsafe_fn)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use clipboard_history_tracker::core::history::{HistoryStore, DEFAULT_CAPACITY};
use clipboard_history_tracker::core::item::{now_unix, HistoryItem};
use clipboard_history_tracker::core::pipeline::{DEFAULT_DEBOUNCE, DEFAULT_MAX_PAYLOAD_BYTES};
use clipboard_history_tracker::core::sources::{
    AutostartRegistrar, CaptureListener, HotkeySource,
};
use clipboard_history_tracker::export::{
    export_to_text, format_time_ago, preview_line, PIN_MARKER,
};
use clipboard_history_tracker::platform::{
    SignalHotkey, SystemClipboard, XdgAutostart, DEFAULT_POLL_INTERVAL,
};
use clipboard_history_tracker::session::{Session, SessionConfig};
use clipboard_history_tracker::storage::PersistenceLayer;

/// Command line interface for the clipboard history tracker
#[derive(Debug, Parser)]
#[command(
    name = "clip-tracker",
    about = "Clipboard history tracker for the desktop",
    long_about = "Watches the system clipboard, keeps a bounded deduplicated history with pinned favorites, and persists it across sessions. Subcommands inspect and edit the stored history."
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level for logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Override the history file location
    #[arg(long, global = true, value_name = "FILE")]
    storage: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Watch the clipboard and record every copy
    Watch {
        /// Maximum number of entries to keep (pinned ones may exceed it)
        #[arg(long, default_value_t = DEFAULT_CAPACITY)]
        capacity: usize,

        /// Quiet period in milliseconds before a change burst is read
        #[arg(long, default_value_t = DEFAULT_DEBOUNCE.as_millis() as u64)]
        debounce_ms: u64,

        /// Ignore clipboard payloads larger than this many bytes
        #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD_BYTES)]
        max_bytes: usize,

        /// Clipboard polling interval in milliseconds
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
        poll_ms: u64,

        /// Output format for capture events
        #[arg(long, default_value = "human", value_enum)]
        format: EventFormat,

        /// Write structured events to file
        #[arg(long)]
        output_file: Option<PathBuf>,
    },
    /// Print the stored history, newest first
    List {
        /// Only show entries containing this substring
        #[arg(long)]
        filter: Option<String>,
    },
    /// Render the history as plain text
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Pin or unpin an entry by id (prefixes accepted)
    Pin { id: String },
    /// Delete an entry by id (prefixes accepted)
    Remove { id: String },
    /// Delete the entire history, pinned entries included
    Clear,
    /// Manage launch-on-login registration
    Autostart {
        #[arg(value_enum)]
        action: AutostartAction,
    },
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum EventFormat {
    /// Human-readable output with emoji markers
    Human,
    /// JSON lines for programmatic processing
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum AutostartAction {
    /// Install the launch-on-login entry
    On,
    /// Remove the launch-on-login entry
    Off,
    /// Report whether the entry is installed
    Status,
}

/// The main application state
///
/// Dispatches one subcommand per invocation; `watch` owns the live capture
/// session, everything else loads the persisted history, works on it and
/// saves it back.
struct TrackerApp {
    args: Args,
    start_time: Instant,
}

impl TrackerApp {
    fn new(config: Args) -> Result<Self> {
        let start_time = Instant::now();

        Self::setup_logging(&config)?;

        info!(
            "🚀 Starting Clipboard History Tracker v{}",
            env!("CARGO_PKG_VERSION")
        );
        info!("Configuration: {:#?}", config);

        Ok(Self {
            args: config,
            start_time,
        })
    }

    async fn run(self) -> Result<()> {
        match &self.args.command {
            Command::Watch {
                capacity,
                debounce_ms,
                max_bytes,
                poll_ms,
                format,
                output_file,
            } => {
                self.run_watch(
                    *capacity,
                    *debounce_ms,
                    *max_bytes,
                    *poll_ms,
                    format.clone(),
                    output_file.clone(),
                )
                .await?
            }
            Command::List { filter } => self.run_list(filter.as_deref())?,
            Command::Export { output } => self.run_export(output.as_deref())?,
            Command::Pin { id } => self.run_pin(id)?,
            Command::Remove { id } => self.run_remove(id)?,
            Command::Clear => self.run_clear()?,
            Command::Autostart { action } => self.run_autostart(*action)?,
        }

        let elapsed = self.start_time.elapsed();
        info!(
            "📊 Session completed. Runtime: {:.2}s",
            elapsed.as_secs_f64()
        );

        Ok(())
    }

    /// Run the live capture session until interrupted.
    async fn run_watch(
        &self,
        capacity: usize,
        debounce_ms: u64,
        max_bytes: usize,
        poll_ms: u64,
        format: EventFormat,
        output_file: Option<PathBuf>,
    ) -> Result<()> {
        let config = SessionConfig {
            capacity,
            debounce: Duration::from_millis(debounce_ms),
            max_payload_bytes: max_bytes,
        };
        let persistence = self.persistence_layer();
        info!("💾 History file: {}", persistence.path().display());

        let source = SystemClipboard::new(Duration::from_millis(poll_ms));
        let (mut session, handle) = Session::new(config, source, persistence);

        session.add_listener(BasicEventLogger::new(format));
        if let Some(path) = output_file {
            session.add_listener(FileEventLogger::new(path.clone())?);
            info!("📁 File output enabled: {}", path.display());
        }

        // SIGUSR1 dumps the current history to stdout, standing in for the
        // popup a desktop build would raise.
        let mut hotkey = SignalHotkey::new();
        let toggle_handle = handle.clone();
        let registration = hotkey.register_toggle(Box::new(move || {
            let handle = toggle_handle.clone();
            tokio::spawn(async move {
                print!("{}", handle.export().await);
            });
        }));
        match registration {
            Ok(()) => info!("🔔 Send SIGUSR1 to print the current history"),
            Err(e) => warn!("⚠️  Toggle trigger unavailable: {e}"),
        }

        info!("👀 Watching clipboard. Press Ctrl+C to stop gracefully.");
        let session_task = tokio::spawn(session.run());

        shutdown_signal().await;

        info!("🛑 Initiating graceful shutdown...");
        hotkey.shutdown();
        handle.shutdown();
        session_task.await.context("capture session task failed")?;
        info!("✅ Shutdown complete");

        Ok(())
    }

    fn run_list(&self, filter: Option<&str>) -> Result<()> {
        let (store, _) = self.open_store();
        if store.is_empty() {
            println!("History is empty");
            return Ok(());
        }

        let needle = filter.map(str::to_lowercase);
        let now = now_unix();
        let mut shown = 0usize;
        for (index, item) in store.snapshot().iter().enumerate() {
            if let Some(needle) = &needle {
                if !item.text.to_lowercase().contains(needle) {
                    continue;
                }
            }
            shown += 1;
            let marker = if item.pinned { PIN_MARKER } else { "" };
            println!("{:>3}. {}{}", index + 1, marker, preview_line(&item.text));
            let when = format_time_ago(item.ts, now);
            if when.is_empty() {
                println!("     {}", short_id(&item.id));
            } else {
                println!("     {} · {}", short_id(&item.id), when);
            }
        }
        if shown == 0 {
            println!("No entries match the filter");
        }
        Ok(())
    }

    fn run_export(&self, output: Option<&Path>) -> Result<()> {
        let (store, _) = self.open_store();
        let exported = export_to_text(store.snapshot());
        match output {
            Some(path) => {
                std::fs::write(path, &exported)
                    .with_context(|| format!("Failed to write export to {}", path.display()))?;
                info!("📁 Exported {} entries to {}", store.len(), path.display());
            }
            None => print!("{exported}"),
        }
        Ok(())
    }

    fn run_pin(&self, id: &str) -> Result<()> {
        let (mut store, persistence) = self.open_store();
        let full_id = resolve_id(store.snapshot(), id)?.to_string();
        store.toggle_pin(&full_id);
        persistence.save(store.snapshot());

        let now_pinned = store
            .snapshot()
            .iter()
            .find(|it| it.id == full_id)
            .map(|it| it.pinned)
            .unwrap_or(false);
        if now_pinned {
            println!("⭐ Pinned {}", short_id(&full_id));
        } else {
            println!("Unpinned {}", short_id(&full_id));
        }
        Ok(())
    }

    fn run_remove(&self, id: &str) -> Result<()> {
        let (mut store, persistence) = self.open_store();
        let full_id = resolve_id(store.snapshot(), id)?.to_string();
        store.remove(&full_id);
        persistence.save(store.snapshot());
        println!("Removed {}", short_id(&full_id));
        Ok(())
    }

    fn run_clear(&self) -> Result<()> {
        let (mut store, persistence) = self.open_store();
        let removed = store.len();
        store.clear();
        persistence.save(store.snapshot());
        println!("Cleared {removed} entries");
        Ok(())
    }

    fn run_autostart(&self, action: AutostartAction) -> Result<()> {
        let mut registrar = XdgAutostart::new();
        match action {
            AutostartAction::On => {
                registrar
                    .set_enabled(true)
                    .context("Failed to enable autostart")?;
                println!("✅ Autostart enabled: {}", registrar.entry_path().display());
            }
            AutostartAction::Off => {
                registrar
                    .set_enabled(false)
                    .context("Failed to disable autostart")?;
                println!("✅ Autostart disabled");
            }
            AutostartAction::Status => {
                if registrar.is_enabled() {
                    println!(
                        "✅ Autostart is enabled: {}",
                        registrar.entry_path().display()
                    );
                } else {
                    println!("❌ Autostart is disabled");
                }
            }
        }
        Ok(())
    }

    /// Load the persisted history for offline inspection or editing.
    fn open_store(&self) -> (HistoryStore, PersistenceLayer) {
        let persistence = self.persistence_layer();
        // Offline edits must not re-trim a file written with a larger capacity.
        let mut store = HistoryStore::new(usize::MAX);
        store.replace_all(persistence.load());
        (store, persistence)
    }

    fn persistence_layer(&self) -> PersistenceLayer {
        match &self.args.storage {
            Some(path) => PersistenceLayer::new(path.clone()),
            None => PersistenceLayer::new(PersistenceLayer::default_path()),
        }
    }

    /// Set up logging based on verbosity level
    ///
    /// Logs go to stderr so `export` and `list` output stays pipeable.
    fn setup_logging(config: &Args) -> Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let level = match config.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(config.verbose > 1)
            .with_thread_ids(config.verbose > 2)
            .init();

        Ok(())
    }
}

/// Expand an id prefix typed by the user to a full entry id.
fn resolve_id<'a>(items: &'a [HistoryItem], prefix: &str) -> Result<&'a str> {
    let matches: Vec<&HistoryItem> = items
        .iter()
        .filter(|it| it.id.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [] => bail!("no history entry matches id '{prefix}'"),
        [only] => Ok(&only.id),
        _ => bail!(
            "id '{prefix}' is ambiguous ({} matches); `list` shows longer prefixes",
            matches.len()
        ),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                warn!("⚠️  SIGTERM handler unavailable: {e}");
                if let Err(e) = ctrl_c.await {
                    error!("❌ Ctrl+C handler failed: {e}");
                }
                return;
            }
        };
        tokio::select! {
            outcome = ctrl_c => {
                if let Err(e) = outcome {
                    error!("❌ Ctrl+C handler failed: {e}");
                }
            }
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            error!("❌ Ctrl+C handler failed: {e}");
        }
    }
}

/// Basic event logger that prints to stdout
///
/// Implements the capture listener trait for the two output formats.
struct BasicEventLogger {
    format: EventFormat,
    event_count: usize,
}

impl BasicEventLogger {
    fn new(format: EventFormat) -> Self {
        Self {
            format,
            event_count: 0,
        }
    }
}

impl CaptureListener for BasicEventLogger {
    fn on_capture(&mut self, item: &HistoryItem) {
        self.event_count += 1;

        match self.format {
            EventFormat::Human => {
                println!("\n📋 #{} {}", self.event_count, preview_line(&item.text));
                println!(
                    "   id: {}  size: {} bytes",
                    short_id(&item.id),
                    item.text.len()
                );
                if item.pinned {
                    println!("   pinned: yes");
                }
            }
            EventFormat::Json => {
                let json_event = serde_json::json!({
                    "event_number": self.event_count,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "id": item.id,
                    "preview": preview_line(&item.text),
                    "pinned": item.pinned,
                    "ts": item.ts,
                });
                println!("{json_event}");
            }
        }
    }

    fn on_started(&mut self) {
        match self.format {
            EventFormat::Human => {
                println!("🚀 Clipboard capture started");
            }
            EventFormat::Json => {
                let start_event = serde_json::json!({
                    "event_type": "capture_started",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                });
                println!("{start_event}");
            }
        }
    }
}

/// File-based event logger for persistent structured output
struct FileEventLogger {
    file: std::fs::File,
}

impl FileEventLogger {
    fn new(path: PathBuf) -> Result<Self> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context("Failed to open output file")?;

        Ok(Self { file })
    }
}

impl CaptureListener for FileEventLogger {
    fn on_capture(&mut self, item: &HistoryItem) {
        use std::io::Write;

        let json_event = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "id": item.id,
            "text": item.text,
            "pinned": item.pinned,
            "ts": item.ts,
        });

        if let Err(e) = writeln!(self.file, "{json_event}") {
            error!("Failed to write to output file: {e}");
        }
    }
}

/// Application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let app = TrackerApp::new(args).context("Failed to initialize clipboard tracker")?;

    app.run().await.context("Application runtime error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with_id(id: &str) -> HistoryItem {
        HistoryItem {
            id: id.to_string(),
            text: "text".to_string(),
            pinned: false,
            ts: 1.0,
        }
    }

    #[test]
    fn test_resolve_id_accepts_unique_prefix() {
        let items = vec![item_with_id("abcd1234"), item_with_id("efgh5678")];
        assert_eq!(resolve_id(&items, "ab").unwrap(), "abcd1234");
        assert_eq!(resolve_id(&items, "efgh5678").unwrap(), "efgh5678");
    }

    #[test]
    fn test_resolve_id_rejects_missing_and_ambiguous() {
        let items = vec![item_with_id("abcd1234"), item_with_id("abff5678")];
        assert!(resolve_id(&items, "zz").is_err());
        assert!(resolve_id(&items, "ab").is_err());
    }

    #[test]
    fn test_short_id_truncates_safely() {
        assert_eq!(short_id("abcdefgh1234"), "abcdefgh");
        assert_eq!(short_id("abc"), "abc");
    }
}
