use std::fs::File;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, LevelFilter, WriteLogger};

use dropmark::document::DocumentLoader;
use dropmark::event_source::TerminalEventSource;
use dropmark::export::resolve_export_path;
use dropmark::panic_handler::initialize_panic_handler;
use dropmark::settings;
use dropmark::storage::{JsonFileStore, KeyValueStore, MemoryStore};
use dropmark::{App, MarkerId, Session, run_app_with_event_source};

const DEFAULT_LOG_FILE: &str = "dropmark.log";
const FALLBACK_STORAGE_FILE: &str = "dropmark-storage.json";

#[derive(Parser)]
#[command(name = "dropmark")]
#[command(about = "Place labeled cable-drop markers on PDF floor plans")]
#[command(version)]
struct Cli {
    /// PDF floor plan to open on startup
    file: Option<PathBuf>,

    /// Marker storage file (overrides the configured one)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Settings file (default: <config dir>/dropmark/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep markers in memory only; nothing is written to storage
    #[arg(long)]
    ephemeral: bool,

    /// Log level: off, error, warn, info, debug, trace
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print stored markers
    List {
        /// Only markers on this page (1-based)
        #[arg(short, long)]
        page: Option<usize>,
    },

    /// Write every marker to a CSV file
    Export {
        /// Output file or directory (default: configured export location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a marker by id
    Remove {
        /// Marker id as shown by `list`
        id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.config {
        Some(path) => settings::load_settings_from(path),
        None => settings::load_settings(),
    }
    init_logging(cli.log_level.as_deref())?;

    let storage_path = cli
        .storage
        .clone()
        .or_else(settings::get_storage_path)
        .or_else(JsonFileStore::default_path)
        .unwrap_or_else(|| PathBuf::from(FALLBACK_STORAGE_FILE));
    info!("Using marker storage at {}", storage_path.display());

    match cli.command {
        Some(Commands::List { page }) => list_markers(&storage_path, page),
        Some(Commands::Export { output }) => export_markers(&storage_path, output.as_deref()),
        Some(Commands::Remove { id }) => remove_marker(&storage_path, &id),
        None if cli.ephemeral => run_tui(MemoryStore::new(), cli.file.as_deref()),
        None => run_tui(
            JsonFileStore::open_or_empty(&storage_path),
            cli.file.as_deref(),
        ),
    }
}

fn init_logging(cli_level: Option<&str>) -> Result<()> {
    let level_name = cli_level
        .map(str::to_string)
        .unwrap_or_else(settings::get_log_level);
    let level = LevelFilter::from_str(&level_name)
        .ok()
        .with_context(|| format!("Invalid log level: {level_name}"))?;
    let log_path = settings::get_log_file().unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

    WriteLogger::init(
        level,
        Config::default(),
        File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?,
    )?;
    info!("Starting dropmark {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

fn open_session(storage_path: &Path) -> Result<Session<JsonFileStore>> {
    let store = JsonFileStore::open(storage_path)
        .with_context(|| format!("Failed to open marker storage {}", storage_path.display()))?;
    Ok(Session::new(store).with_default_purpose(settings::get_default_purpose()))
}

fn export_path(output: Option<&Path>) -> PathBuf {
    resolve_export_path(
        &settings::get_export_dir(),
        &settings::get_export_filename(),
        output,
    )
}

fn list_markers(storage_path: &Path, page: Option<usize>) -> Result<()> {
    let session = open_session(storage_path)?;
    let page_index = page.map(|p| p.saturating_sub(1));

    let mut shown = 0;
    for marker in session.store().markers() {
        if page_index.is_some_and(|p| marker.page_index != p) {
            continue;
        }
        println!(
            "{}  p.{:<3} ({:.2}, {:.2})  {}",
            marker.id,
            marker.page_index + 1,
            marker.x,
            marker.y,
            marker.summary()
        );
        shown += 1;
    }
    if shown == 0 {
        println!("No markers");
    }
    Ok(())
}

fn export_markers(storage_path: &Path, output: Option<&Path>) -> Result<()> {
    let session = open_session(storage_path)?;
    let path = export_path(output);
    let written = session
        .export_csv(&path)
        .with_context(|| format!("Failed to export markers to {}", path.display()))?;
    println!(
        "Exported {} markers to {}",
        session.store().len(),
        written.display()
    );
    Ok(())
}

fn remove_marker(storage_path: &Path, id: &str) -> Result<()> {
    let mut session = open_session(storage_path)?;
    match session.remove(&MarkerId::from(id)) {
        Some(marker) => println!("Removed {}", marker.label),
        None => println!("No marker with id {id}"),
    }
    Ok(())
}

fn run_tui<S: KeyValueStore + 'static>(store: S, file: Option<&Path>) -> Result<()> {
    initialize_panic_handler();

    let session = Session::new(store)
        .with_default_purpose(settings::get_default_purpose())
        .with_zoom(settings::get_zoom());
    let mut app = App::new(
        session,
        Some(DocumentLoader::with_default_backend()),
        export_path(None),
    );
    if let Some(file) = file {
        app.open_file(file);
    }

    // Terminal initialization
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_with_event_source(&mut terminal, &mut app, &mut TerminalEventSource);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    let zoom = app.session.view().zoom;
    if (zoom - settings::get_zoom()).abs() > f32::EPSILON {
        settings::set_zoom(zoom);
    }

    if let Err(err) = res {
        error!("Application error: {err:?}");
        println!("{err:?}");
    }

    info!("Shutting down dropmark");
    Ok(())
}
