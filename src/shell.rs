//! Line-oriented shell standing in for a real UI.
//!
//! The parser turns stdin lines into bus commands; the renderer consumes
//! notifications and prints them. No session logic lives here, and the
//! rendered format is not a compatibility surface.

use std::io::Write;

use log::debug;
use tokio::sync::broadcast::{error::RecvError, Receiver};

use crate::protocol::{self, AdvanceMode, PlaybackState};

/// One parsed input line.
#[derive(Debug)]
pub enum ShellCommand {
    /// Forward a command onto the bus.
    Send(protocol::Message),
    Help,
    /// Save the session and shut down.
    Quit,
}

/// Parses one input line. `Ok(None)` for blank lines; `Err` carries a
/// message to show the user.
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, String> {
    let mut parts = line.split_whitespace();
    let verb = match parts.next() {
        Some(verb) => verb,
        None => return Ok(None),
    };
    let rest = line[line.find(verb).unwrap_or(0) + verb.len()..].trim();

    let command = match verb {
        "cd" => {
            if rest.is_empty() {
                return Err("usage: cd <directory>".to_string());
            }
            ShellCommand::Send(protocol::Message::Library(
                protocol::LibraryMessage::Navigate(rest.into()),
            ))
        }
        "up" => ShellCommand::Send(protocol::Message::Library(
            protocol::LibraryMessage::NavigateUp,
        )),
        "add" => ShellCommand::Send(protocol::Message::Playlist(
            protocol::PlaylistMessage::AddAllListed,
        )),
        "radio" => {
            if rest.is_empty() {
                return Err("usage: radio <uri>".to_string());
            }
            ShellCommand::Send(protocol::Message::Playlist(
                protocol::PlaylistMessage::AddRemoteTrack(rest.to_string()),
            ))
        }
        "clear" => ShellCommand::Send(protocol::Message::Playlist(
            protocol::PlaylistMessage::Clear,
        )),
        "play" => {
            if rest.is_empty() {
                ShellCommand::Send(protocol::Message::Playback(
                    protocol::PlaybackMessage::PlayCurrent,
                ))
            } else {
                let index: usize = rest
                    .parse()
                    .map_err(|_| format!("not a track number: {}", rest))?;
                ShellCommand::Send(protocol::Message::Playback(
                    protocol::PlaybackMessage::PlayAt(index),
                ))
            }
        }
        "pause" => ShellCommand::Send(protocol::Message::Playback(
            protocol::PlaybackMessage::TogglePause,
        )),
        "skip" => ShellCommand::Send(protocol::Message::Playback(
            protocol::PlaybackMessage::Skip,
        )),
        "mode" => match rest {
            "continuous" => ShellCommand::Send(protocol::Message::Playback(
                protocol::PlaybackMessage::SetMode(AdvanceMode::Continuous),
            )),
            "shuffle" => ShellCommand::Send(protocol::Message::Playback(
                protocol::PlaybackMessage::SetMode(AdvanceMode::Shuffle),
            )),
            _ => return Err("usage: mode continuous|shuffle".to_string()),
        },
        "bookmark" => ShellCommand::Send(protocol::Message::Session(
            protocol::SessionMessage::Bookmark,
        )),
        "help" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        unknown => return Err(format!("unknown command: {} (try 'help')", unknown)),
    };
    Ok(Some(command))
}

pub const HELP_TEXT: &str = "\
commands:
  cd <directory>            browse a directory
  up                        browse the parent directory
  add                       add every listed file to the playlist
  radio <uri>               add a remote stream to the playlist
  clear                     clear the playlist
  play [n]                  play the current track, or track n
  pause                     toggle pause
  skip                      next track
  mode continuous|shuffle   set the advance mode
  bookmark                  save the session
  quit                      save the session and exit";

// Renders bus notifications to stdout.
pub struct ShellManager {
    bus_consumer: Receiver<protocol::Message>,
}

impl ShellManager {
    pub fn new(bus_consumer: Receiver<protocol::Message>) -> Self {
        Self { bus_consumer }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => match message {
                    protocol::Message::Library(protocol::LibraryMessage::ListingChanged(
                        listing,
                    )) => {
                        println!("{}", listing.directory.display());
                        for name in listing.directory_names() {
                            println!("  {}/", name);
                        }
                        for (index, name) in listing.file_names().iter().enumerate() {
                            println!("  {:>3}  {}", index, name);
                        }
                    }
                    protocol::Message::Playlist(protocol::PlaylistMessage::Changed { titles }) => {
                        if titles.is_empty() {
                            println!("playlist: (empty)");
                        } else {
                            println!("playlist:");
                            for (index, title) in titles.iter().enumerate() {
                                println!("  {:>3}  {}", index, title);
                            }
                        }
                    }
                    protocol::Message::Playback(protocol::PlaybackMessage::TrackChanged {
                        title,
                        artist,
                    }) => {
                        if artist.is_empty() {
                            println!("now playing: {}", title);
                        } else {
                            println!("now playing: {} - {}", artist, title);
                        }
                    }
                    protocol::Message::Playback(protocol::PlaybackMessage::Progress {
                        elapsed_ms,
                        total_ms,
                        fraction,
                    }) => {
                        print!(
                            "\r{} / {}  ({:>3.0}%) ",
                            format_clock(elapsed_ms),
                            format_clock(total_ms),
                            fraction * 100.0
                        );
                        let _ = std::io::stdout().flush();
                    }
                    protocol::Message::Playback(protocol::PlaybackMessage::StateChanged(
                        state,
                    )) => {
                        println!("[{}]", state_label(state));
                    }
                    protocol::Message::Playback(protocol::PlaybackMessage::ModeChanged(mode)) => {
                        match mode {
                            AdvanceMode::Continuous => println!("mode: continuous"),
                            AdvanceMode::Shuffle => println!("mode: shuffle"),
                        }
                    }
                    protocol::Message::Session(protocol::SessionMessage::Saved {
                        track_count,
                    }) => {
                        println!("session saved ({} tracks)", track_count);
                    }
                    protocol::Message::Session(protocol::SessionMessage::Error {
                        kind,
                        message,
                    }) => {
                        eprintln!("error ({:?}): {}", kind, message);
                    }
                    other => {
                        debug!("ShellManager: Ignoring message {:?}", other);
                    }
                },
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    }
}

fn state_label(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Idle => "idle",
        PlaybackState::Loading => "loading",
        PlaybackState::Playing => "playing",
        PlaybackState::Paused => "paused",
        PlaybackState::Stopped => "stopped",
    }
}

fn format_clock(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::{format_clock, parse_line, ShellCommand};
    use crate::protocol::{self, AdvanceMode};

    fn parsed_message(line: &str) -> protocol::Message {
        match parse_line(line) {
            Ok(Some(ShellCommand::Send(message))) => message,
            other => panic!("expected a bus command for {:?}, got {:?}", line, other),
        }
    }

    #[test]
    fn test_parse_navigation_and_playlist_commands() {
        assert!(matches!(
            parsed_message("cd /music/My Albums"),
            protocol::Message::Library(protocol::LibraryMessage::Navigate(path))
                if path == std::path::PathBuf::from("/music/My Albums")
        ));
        assert!(matches!(
            parsed_message("up"),
            protocol::Message::Library(protocol::LibraryMessage::NavigateUp)
        ));
        assert!(matches!(
            parsed_message("radio https://radio.example/stream"),
            protocol::Message::Playlist(protocol::PlaylistMessage::AddRemoteTrack(uri))
                if uri == "https://radio.example/stream"
        ));
    }

    #[test]
    fn test_parse_play_with_and_without_index() {
        assert!(matches!(
            parsed_message("play"),
            protocol::Message::Playback(protocol::PlaybackMessage::PlayCurrent)
        ));
        assert!(matches!(
            parsed_message("play 3"),
            protocol::Message::Playback(protocol::PlaybackMessage::PlayAt(3))
        ));
        assert!(parse_line("play three").is_err());
    }

    #[test]
    fn test_parse_mode_values() {
        assert!(matches!(
            parsed_message("mode shuffle"),
            protocol::Message::Playback(protocol::PlaybackMessage::SetMode(AdvanceMode::Shuffle))
        ));
        assert!(matches!(
            parsed_message("mode continuous"),
            protocol::Message::Playback(protocol::PlaybackMessage::SetMode(
                AdvanceMode::Continuous
            ))
        ));
        assert!(parse_line("mode backwards").is_err());
    }

    #[test]
    fn test_parse_blank_unknown_and_quit() {
        assert!(matches!(parse_line(""), Ok(None)));
        assert!(matches!(parse_line("   "), Ok(None)));
        assert!(parse_line("dance").is_err());
        assert!(matches!(parse_line("quit"), Ok(Some(ShellCommand::Quit))));
        assert!(matches!(parse_line("exit"), Ok(Some(ShellCommand::Quit))));
        assert!(matches!(parse_line("help"), Ok(Some(ShellCommand::Help))));
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(93_000), "1:33");
        assert_eq!(format_clock(3_600_000), "60:00");
    }
}
