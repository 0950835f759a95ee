mod audio_backend;
mod config;
mod library;
mod metadata_tags;
mod playlist;
mod protocol;
mod session_manager;
mod session_store;
mod shell;

use std::io::BufRead;
use std::path::PathBuf;
use std::thread;

use audio_backend::RodioBackend;
use config::Config;
use log::{debug, error, info};
use playlist::Playlist;
use session_manager::SessionManager;
use session_store::SessionStore;
use shell::{ShellCommand, ShellManager};
use tokio::sync::broadcast;

fn resolve_start_directory(config: &Config) -> PathBuf {
    if !config.library.start_directory.is_empty() {
        return PathBuf::from(&config.library.start_directory);
    }
    dirs::audio_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Debug);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_dir = dirs::config_dir().ok_or("could not resolve config directory")?;
    let config_file = config_dir.join("tunedeck.toml");

    if !config_file.exists() {
        let default_config = Config::default();

        info!(
            "Config file not found. Creating default config. path={}",
            config_file.display()
        );
        std::fs::write(&config_file, toml::to_string(&default_config)?)?;
    }

    let config_content = std::fs::read_to_string(&config_file)?;
    let config = toml::from_str::<Config>(&config_content)
        .unwrap_or_default()
        .sanitized();
    let start_directory = resolve_start_directory(&config);
    info!("Browsing starts at {}", start_directory.display());

    // Bus for communication between components
    let (bus_sender, _) = broadcast::channel(1024);

    // Session manager thread; the rodio backend is created on it and its
    // poll thread reports back over the bus.
    let manager_bus_sender = bus_sender.clone();
    let manager_receiver = bus_sender.subscribe();
    let poll_interval_ms = config.backend.progress_poll_interval_ms;
    let manager_handle = thread::Builder::new()
        .name("session-manager".to_string())
        .spawn(move || {
            let backend = match RodioBackend::new(manager_bus_sender.clone(), poll_interval_ms) {
                Ok(backend) => backend,
                Err(message) => {
                    error!("Failed to initialize audio backend: {}", message);
                    return;
                }
            };
            let mut manager = SessionManager::new(
                Playlist::new(),
                manager_receiver,
                manager_bus_sender,
                Box::new(backend),
                SessionStore::new(),
                start_directory,
            );
            manager.run();
        })?;

    // Shell renderer thread. Detached: the backend poll thread keeps a bus
    // sender alive, so the renderer ends with the process, not the bus.
    let shell_receiver = bus_sender.subscribe();
    let _shell_handle = thread::Builder::new()
        .name("shell-renderer".to_string())
        .spawn(move || {
            let mut renderer = ShellManager::new(shell_receiver);
            renderer.run();
        })?;

    println!("{}", shell::HELP_TEXT);

    // Input loop on the main thread. EOF behaves like quit.
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                error!("Failed to read input: {}", err);
                break;
            }
        };
        match shell::parse_line(&line) {
            Ok(Some(ShellCommand::Send(message))) => {
                debug!("Shell command: {:?}", message);
                let _ = bus_sender.send(message);
            }
            Ok(Some(ShellCommand::Help)) => println!("{}", shell::HELP_TEXT),
            Ok(Some(ShellCommand::Quit)) => break,
            Ok(None) => {}
            Err(message) => println!("{}", message),
        }
    }

    info!("Shutting down");
    let _ = bus_sender.send(protocol::Message::Session(
        protocol::SessionMessage::Exit,
    ));
    if manager_handle.join().is_err() {
        error!("Session manager thread panicked during shutdown");
    }

    Ok(())
}
