//! Handset CLI - browse, import and play handset games from a terminal.
//!
//! Usage:
//!   handset list                     # Built-in and imported games
//!   handset import racer.jar         # Import a JAR into the catalog
//!   handset delete <ID>              # Remove an imported game
//!   handset play snake               # Play in the terminal
//!
//! Imported games run on the bytecode runtime staged from
//! `runtime.module_dir`; without an embedded runtime they report a boot
//! failure.

mod terminal;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use handset_core::{
    import_file, DirStore, GameCatalog, HandsetConfig, HandsetError, KvStore, RuntimeBootstrap,
    ScriptDirHost, SessionManager,
};

use terminal::{translate_key, Action, TerminalSink};

/// Handset game shell
#[derive(Parser, Debug)]
#[command(name = "handset")]
#[command(about = "Browse, import and play handset games")]
struct Args {
    /// Config file (defaults to $HANDSET_CONFIG, then ./handset.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the catalog and save data
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List built-in and imported games
    List,
    /// Import a .jar archive
    Import { path: PathBuf },
    /// Delete an imported game
    Delete { id: String },
    /// Play a game in the terminal
    Play { id: String },
}

fn init_tracing(trace: bool) {
    let default = if trace { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.trace);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => HandsetConfig::from_path(path)
            .map_err(|e| failure(format!("load config {}", path.display()), e))?,
        None => HandsetConfig::load(),
    };
    let data_dir = args
        .data_dir
        .clone()
        .or_else(|| config.resolved_data_dir())
        .ok_or("No data directory; pass --data-dir")?;
    let store: Arc<dyn KvStore> = Arc::new(DirStore::open(&data_dir)?);
    let catalog = GameCatalog::new(Arc::clone(&store));
    info!(data_dir = %data_dir.display(), "catalog opened");

    match args.command {
        Command::List => {
            for game in catalog.list() {
                println!(
                    "{:<36} {:<24} {:<16} {:<8} {:>6}",
                    game.id, game.name, game.vendor, game.version, game.size_label
                );
            }
        }
        Command::Import { path } => {
            let imported = import_file(&path).and_then(|game| {
                let (id, name) = (game.id.clone(), game.name.clone());
                catalog.save(game)?;
                Ok((id, name))
            });
            let (id, name) = imported.map_err(|e| failure(format!("import {}", path.display()), e))?;
            println!("Imported {} as {}", name, id);
        }
        Command::Delete { id } => match catalog.delete(&id) {
            Ok(true) => println!("Deleted {}", id),
            Ok(false) => eprintln!("No imported game with id {}", id),
            Err(e) => return Err(failure(format!("delete {}", id), e).into()),
        },
        Command::Play { id } => {
            play(&id, &catalog, store, config).await?;
        }
    }

    Ok(())
}

/// One-line message for a failed action, e.g. "Failed to import x.jar: ...".
fn failure(action: String, e: HandsetError) -> String {
    format!("Failed to {}: {}", action, e)
}

async fn play(
    id: &str,
    catalog: &GameCatalog,
    store: Arc<dyn KvStore>,
    config: HandsetConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let game = catalog.get(id).ok_or_else(|| format!("Unknown game: {}", id))?;

    let host = Arc::new(ScriptDirHost::new(config.runtime.module_dir.clone()));
    let bootstrap = RuntimeBootstrap::new(host, config.runtime.modules.clone());
    let sink = Arc::new(TerminalSink::new(&config.snake));
    let mut manager = SessionManager::new(bootstrap, store, config);

    manager
        .activate(&game, sink.clone())
        .await
        .map_err(|e| failure(format!("start {}", game.name), e))?;
    eprintln!("Playing {} ({} {})", game.name, game.vendor, game.version);

    // Enable raw mode (gracefully handle non-TTY)
    let raw_mode_enabled = enable_raw_mode().is_ok();

    loop {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if !event::poll(Duration::from_millis(0)).unwrap_or(false) {
            continue;
        }
        let Ok(Event::Key(key_event)) = event::read() else {
            continue;
        };
        if key_event.kind != KeyEventKind::Press {
            continue;
        }

        match translate_key(key_event.code, key_event.modifiers) {
            Some(Action::Key(key)) => {
                manager.send_key(&game.id, &key);
            }
            Some(Action::Save) => match manager.save_state(&game.id) {
                Ok(()) => sink.set_status("Saved"),
                Err(e) => sink.set_status(format!("Save failed: {}", e)),
            },
            Some(Action::Load) => match manager.load_state(&game.id) {
                Ok(()) => sink.set_status("Loaded"),
                Err(e) => sink.set_status(format!("Load failed: {}", e)),
            },
            Some(Action::Quit) => break,
            None => {}
        }
    }

    manager.stop_all();

    // Disable raw mode if we enabled it
    if raw_mode_enabled {
        let _ = disable_raw_mode();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(data_dir: &std::path::Path, command: Command) -> Args {
        Args {
            config: None,
            data_dir: Some(data_dir.to_path_buf()),
            trace: false,
            command,
        }
    }

    #[tokio::test]
    async fn test_import_failure_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");

        let err = run(args(dir.path(), Command::Import { path: path.clone() }))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Failed to import {}: Not a .jar file: notes.txt", path.display())
        );
    }

    #[tokio::test]
    async fn test_delete_builtin_is_readable() {
        let dir = tempfile::tempdir().unwrap();

        let err = run(args(dir.path(), Command::Delete { id: "snake".into() }))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to delete snake: Built-in game cannot be modified: snake"
        );
    }

    #[tokio::test]
    async fn test_invalid_config_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("handset.toml");
        std::fs::write(&config, "[snake]\ntick_ms = 0\n").unwrap();
        let mut args = args(dir.path(), Command::List);
        args.config = Some(config.clone());

        let err = run(args).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with(&format!("Failed to load config {}: Invalid config:", config.display())));
    }
}
