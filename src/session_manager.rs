use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::{
    audio_backend::MediaBackend,
    library::{self, ScanError},
    metadata_tags,
    playlist::{Playlist, Track},
    protocol::{
        self, AdvanceMode, BackendMessage, LibraryListing, MetadataMessage, PlaybackState,
        RawPlaybackState, SessionErrorKind,
    },
    session_store::{SessionStore, StoredSession, StoredTrack},
};

// Owns the playback session: current track, advance policy, playback state,
// and the persisted snapshot. Sole mutator of session state; everything
// asynchronous re-enters through the bus.
pub struct SessionManager {
    playlist: Playlist,
    current_index: usize,
    mode: AdvanceMode,
    playback_state: PlaybackState,
    last_known_offset_ms: u64,
    browse_directory: PathBuf,
    listing: Option<LibraryListing>,
    // Restore-time seek retried until the backend accepts it once.
    pending_seek_ms: Option<u64>,
    // Incremented on every playback start; stale async completions carry an
    // older value and are dropped.
    play_epoch: u64,
    // Suppresses repeated end-of-track advances until the backend is
    // observed playing again.
    advance_pending: bool,
    shuffle_rng: StdRng,
    backend: Box<dyn MediaBackend>,
    session_store: SessionStore,
    bus_consumer: Receiver<protocol::Message>,
    bus_producer: Sender<protocol::Message>,
}

impl SessionManager {
    pub fn new(
        playlist: Playlist,
        bus_consumer: Receiver<protocol::Message>,
        bus_producer: Sender<protocol::Message>,
        backend: Box<dyn MediaBackend>,
        session_store: SessionStore,
        start_directory: PathBuf,
    ) -> Self {
        Self {
            playlist,
            current_index: 0,
            mode: AdvanceMode::Continuous,
            playback_state: PlaybackState::Idle,
            last_known_offset_ms: 0,
            browse_directory: start_directory,
            listing: None,
            pending_seek_ms: None,
            play_epoch: 0,
            advance_pending: false,
            shuffle_rng: StdRng::from_entropy(),
            backend,
            session_store,
            bus_consumer,
            bus_producer,
        }
    }

    #[cfg(test)]
    fn seed_shuffle_rng(&mut self, seed: u64) {
        self.shuffle_rng = StdRng::seed_from_u64(seed);
    }

    pub fn run(&mut self) {
        self.restore_session();
        if self.listing.is_none() {
            let start = self.browse_directory.clone();
            self.navigate(start);
        }

        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => match message {
                    protocol::Message::Library(protocol::LibraryMessage::Navigate(directory)) => {
                        debug!("SessionManager: Navigating to {}", directory.display());
                        self.navigate(directory);
                    }
                    protocol::Message::Library(protocol::LibraryMessage::NavigateUp) => {
                        debug!("SessionManager: Navigating up");
                        match library::parent_target(&self.browse_directory) {
                            Some(parent) => self.navigate(parent),
                            None => {
                                debug!("SessionManager: Already at a filesystem root")
                            }
                        }
                    }
                    protocol::Message::Playlist(protocol::PlaylistMessage::AddAllListed) => {
                        debug!("SessionManager: Adding all listed files to playlist");
                        self.add_all_listed();
                    }
                    protocol::Message::Playlist(protocol::PlaylistMessage::AddRemoteTrack(uri)) => {
                        debug!("SessionManager: Adding remote track {}", uri);
                        self.playlist.add_track(Track::from_remote_uri(&uri));
                        self.broadcast_playlist_changed();
                    }
                    protocol::Message::Playlist(protocol::PlaylistMessage::Clear) => {
                        debug!("SessionManager: Clearing playlist");
                        self.clear_playlist();
                    }
                    protocol::Message::Playback(protocol::PlaybackMessage::PlayCurrent) => {
                        debug!("SessionManager: Received play command");
                        self.pending_seek_ms = None;
                        self.advance_pending = false;
                        self.play_current();
                    }
                    protocol::Message::Playback(protocol::PlaybackMessage::PlayAt(index)) => {
                        debug!("SessionManager: Received play track command: {}", index);
                        self.pending_seek_ms = None;
                        self.advance_pending = false;
                        self.play_at(index);
                    }
                    protocol::Message::Playback(protocol::PlaybackMessage::TogglePause) => {
                        debug!("SessionManager: Received pause toggle");
                        self.toggle_pause();
                    }
                    protocol::Message::Playback(protocol::PlaybackMessage::Skip) => {
                        debug!("SessionManager: Received skip command");
                        self.pending_seek_ms = None;
                        self.advance_pending = false;
                        self.advance();
                    }
                    protocol::Message::Playback(protocol::PlaybackMessage::SetMode(mode)) => {
                        debug!("SessionManager: Setting advance mode {:?}", mode);
                        self.set_mode(mode);
                    }
                    protocol::Message::Session(protocol::SessionMessage::Bookmark) => {
                        debug!("SessionManager: Bookmarking session");
                        if self.playback_state == PlaybackState::Playing {
                            self.backend.pause(true);
                            self.set_playback_state(PlaybackState::Paused);
                        }
                        self.save_session();
                    }
                    protocol::Message::Session(protocol::SessionMessage::Exit) => {
                        info!("SessionManager: Exit requested, saving session");
                        self.save_session();
                        self.backend.stop();
                        break;
                    }
                    protocol::Message::Backend(BackendMessage::Tick {
                        elapsed_ms,
                        total_ms,
                    }) => {
                        self.on_backend_tick(elapsed_ms, total_ms);
                    }
                    protocol::Message::Backend(BackendMessage::StateObserved(raw)) => {
                        self.on_backend_state_observed(raw);
                    }
                    protocol::Message::Backend(BackendMessage::RemoteMediaReady {
                        epoch,
                        bytes,
                        title,
                        artist,
                    }) => {
                        self.on_remote_media_ready(epoch, bytes, title, artist);
                    }
                    protocol::Message::Backend(BackendMessage::RemoteMediaFailed {
                        epoch,
                        message,
                    }) => {
                        if epoch != self.play_epoch {
                            debug!("SessionManager: Ignoring stale remote failure");
                        } else {
                            self.broadcast_error(SessionErrorKind::MediaUnresolvable, &message);
                            self.set_playback_state(PlaybackState::Idle);
                        }
                    }
                    protocol::Message::Metadata(MetadataMessage::Resolved {
                        epoch,
                        title,
                        artist,
                    }) => {
                        self.on_metadata_resolved(epoch, title, artist);
                    }
                    other => {
                        trace!("SessionManager: Ignoring message {:?}", other);
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SessionManager: Bus lagged, skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    fn navigate(&mut self, directory: PathBuf) {
        match library::scan_directory(&directory) {
            Ok(listing) => {
                self.browse_directory = directory;
                let _ = self.bus_producer.send(protocol::Message::Library(
                    protocol::LibraryMessage::ListingChanged(listing.clone()),
                ));
                self.listing = Some(listing);
            }
            Err(ScanError::AccessDenied) => {
                self.broadcast_error(
                    SessionErrorKind::AccessDenied,
                    &format!("access denied: {}", directory.display()),
                );
            }
            Err(ScanError::DirectoryNotFound) => {
                self.broadcast_error(
                    SessionErrorKind::DirectoryNotFound,
                    &format!("no such directory: {}", directory.display()),
                );
            }
            Err(ScanError::Io(message)) => {
                self.broadcast_error(SessionErrorKind::ScanFailed, &message);
            }
        }
    }

    fn add_all_listed(&mut self) {
        let files: Vec<PathBuf> = match &self.listing {
            Some(listing) => listing.files.clone(),
            None => {
                debug!("SessionManager: No listing to add from");
                return;
            }
        };
        for file in &files {
            self.playlist.add_track(Track::from_local_path(file));
        }
        self.broadcast_playlist_changed();
    }

    fn clear_playlist(&mut self) {
        self.backend.stop();
        self.playlist.clear();
        self.current_index = 0;
        self.pending_seek_ms = None;
        self.advance_pending = false;
        self.set_playback_state(PlaybackState::Idle);
        self.broadcast_playlist_changed();
    }

    fn play_current(&mut self) {
        if self.playlist.is_empty() {
            self.broadcast_error(SessionErrorKind::EmptyPlaylist, "the playlist is empty");
            return;
        }

        let track = match self.playlist.get_track(self.current_index) {
            Some(track) => track.clone(),
            None => {
                self.broadcast_error(
                    SessionErrorKind::IndexOutOfRange,
                    &format!(
                        "current index {} out of range ({} tracks)",
                        self.current_index,
                        self.playlist.num_tracks()
                    ),
                );
                return;
            }
        };

        self.play_epoch += 1;

        if track.is_remote() {
            self.set_playback_state(PlaybackState::Loading);
            self.spawn_remote_resolver(track.source.clone(), self.play_epoch);
            return;
        }

        match self.backend.load_local(Path::new(&track.source)) {
            Ok(()) => {
                self.backend.play();
                self.last_known_offset_ms = 0;
                self.set_playback_state(PlaybackState::Playing);
                self.broadcast_track_changed(&track.title, "");
                self.spawn_tag_resolver(PathBuf::from(&track.source), self.play_epoch);
            }
            Err(message) => {
                self.broadcast_error(SessionErrorKind::MediaUnresolvable, &message);
                self.set_playback_state(PlaybackState::Idle);
            }
        }
    }

    fn play_at(&mut self, index: usize) {
        if index >= self.playlist.num_tracks() {
            self.broadcast_error(
                SessionErrorKind::IndexOutOfRange,
                &format!(
                    "track index {} out of range ({} tracks)",
                    index,
                    self.playlist.num_tracks()
                ),
            );
            return;
        }
        self.current_index = index;
        self.play_current();
    }

    fn toggle_pause(&mut self) {
        match self.playback_state {
            PlaybackState::Playing => {
                self.backend.pause(true);
                self.set_playback_state(PlaybackState::Paused);
            }
            PlaybackState::Paused => {
                self.backend.pause(false);
                self.set_playback_state(PlaybackState::Playing);
            }
            _ => {
                debug!("SessionManager: Nothing playing, pause toggle ignored");
            }
        }
    }

    fn advance(&mut self) {
        if self.playlist.is_empty() {
            self.broadcast_error(SessionErrorKind::EmptyPlaylist, "the playlist is empty");
            return;
        }
        let num_tracks = self.playlist.num_tracks();
        self.current_index = match self.mode {
            AdvanceMode::Continuous => (self.current_index + 1) % num_tracks,
            AdvanceMode::Shuffle => {
                // The selection range excludes the last index. Kept as-is;
                // flagged for product review.
                if num_tracks == 1 {
                    0
                } else {
                    self.shuffle_rng.gen_range(0..num_tracks - 1)
                }
            }
        };
        self.play_current();
    }

    fn set_mode(&mut self, mode: AdvanceMode) {
        self.mode = mode;
        let _ = self.bus_producer.send(protocol::Message::Playback(
            protocol::PlaybackMessage::ModeChanged(mode),
        ));
        // Entering shuffle changes the track immediately; continuous only
        // changes the policy.
        if mode == AdvanceMode::Shuffle {
            self.pending_seek_ms = None;
            self.advance_pending = false;
            self.advance();
        }
    }

    fn on_backend_tick(&mut self, elapsed_ms: u64, total_ms: u64) {
        self.last_known_offset_ms = elapsed_ms;
        let fraction = if total_ms == 0 {
            0.0
        } else {
            elapsed_ms as f32 / total_ms as f32
        };
        let _ = self.bus_producer.send(protocol::Message::Playback(
            protocol::PlaybackMessage::Progress {
                elapsed_ms,
                total_ms,
                fraction,
            },
        ));
        self.try_pending_seek();
    }

    fn on_backend_state_observed(&mut self, raw: RawPlaybackState) {
        match raw {
            RawPlaybackState::Playing => {
                self.advance_pending = false;
                self.try_pending_seek();
            }
            RawPlaybackState::Paused | RawPlaybackState::Stopped => {}
            other => {
                // End-of-track condition. The poll is level-triggered, so
                // this fires repeatedly until the next track is audible.
                if self.playlist.is_empty() {
                    return;
                }
                let last_index = self.playlist.num_tracks() - 1;
                if self.current_index < last_index {
                    if self.advance_pending {
                        debug!(
                            "SessionManager: Advance already pending, ignoring observed {:?}",
                            other
                        );
                        return;
                    }
                    if self.playback_state == PlaybackState::Paused {
                        self.backend.pause(false);
                    }
                    self.advance_pending = true;
                    self.advance();
                } else if other == RawPlaybackState::Ended
                    && self.playback_state == PlaybackState::Playing
                {
                    debug!("SessionManager: Last track finished");
                    self.set_playback_state(PlaybackState::Stopped);
                }
            }
        }
    }

    fn on_remote_media_ready(&mut self, epoch: u64, bytes: Vec<u8>, title: String, artist: String) {
        if epoch != self.play_epoch {
            debug!("SessionManager: Ignoring stale remote media (epoch {})", epoch);
            return;
        }
        match self.backend.load_remote(bytes) {
            Ok(()) => {
                self.backend.play();
                self.last_known_offset_ms = 0;
                self.set_playback_state(PlaybackState::Playing);
                if !title.is_empty() && self.playlist.set_track_title(self.current_index, &title) {
                    self.broadcast_playlist_changed();
                }
                let display_title = self
                    .playlist
                    .get_track(self.current_index)
                    .map(|track| track.title.clone())
                    .unwrap_or(title);
                self.broadcast_track_changed(&display_title, &artist);
                self.try_pending_seek();
            }
            Err(message) => {
                self.broadcast_error(SessionErrorKind::MediaUnresolvable, &message);
                self.set_playback_state(PlaybackState::Idle);
            }
        }
    }

    fn on_metadata_resolved(&mut self, epoch: u64, title: String, artist: String) {
        if epoch != self.play_epoch {
            debug!("SessionManager: Ignoring stale metadata (epoch {})", epoch);
            return;
        }
        if title.is_empty() && artist.is_empty() {
            debug!("SessionManager: No tags found, keeping filename title");
            return;
        }
        if !title.is_empty() && self.playlist.set_track_title(self.current_index, &title) {
            self.broadcast_playlist_changed();
        }
        let display_title = self
            .playlist
            .get_track(self.current_index)
            .map(|track| track.title.clone())
            .unwrap_or(title);
        self.broadcast_track_changed(&display_title, &artist);
    }

    fn try_pending_seek(&mut self) {
        if let Some(offset_ms) = self.pending_seek_ms {
            match self.backend.seek(offset_ms) {
                Ok(()) => {
                    debug!("SessionManager: Applied deferred seek to {}ms", offset_ms);
                    self.pending_seek_ms = None;
                }
                Err(message) => {
                    trace!("SessionManager: Deferred seek not ready: {}", message);
                }
            }
        }
    }

    fn restore_session(&mut self) {
        let session = match self.session_store.load() {
            Some(session) => session,
            None => return,
        };
        info!(
            "SessionManager: Restoring session ({} tracks, index {}, offset {}ms)",
            session.tracks.len(),
            session.current_index,
            session.offset_ms
        );

        self.playlist
            .replace_tracks(session.tracks.into_iter().map(Track::from).collect());
        self.current_index = session.current_index;
        self.broadcast_playlist_changed();

        if let Some(directory) = session.last_directory {
            self.navigate(directory);
        }

        self.play_current();

        // Best-effort: the backend may not accept the seek until loading
        // completes, so keep retrying on ticks and observations.
        if session.offset_ms > 0 {
            self.pending_seek_ms = Some(session.offset_ms);
            self.try_pending_seek();
        }
    }

    fn save_session(&mut self) {
        let session = StoredSession {
            tracks: self.playlist.tracks().iter().map(StoredTrack::from).collect(),
            current_index: self.current_index,
            offset_ms: self.last_known_offset_ms,
            last_directory: Some(self.browse_directory.clone()),
        };
        match self.session_store.save(&session) {
            Ok(()) => {
                let _ = self.bus_producer.send(protocol::Message::Session(
                    protocol::SessionMessage::Saved {
                        track_count: session.tracks.len(),
                    },
                ));
            }
            Err(message) => {
                error!("SessionManager: Failed to save session: {}", message);
            }
        }
    }

    fn spawn_remote_resolver(&self, uri: String, epoch: u64) {
        let bus_producer = self.bus_producer.clone();
        thread::spawn(move || match fetch_remote_media(&uri) {
            Ok(bytes) => {
                let tags = metadata_tags::probe_track_tags(&bytes);
                let _ = bus_producer.send(protocol::Message::Backend(
                    BackendMessage::RemoteMediaReady {
                        epoch,
                        bytes,
                        title: tags.title,
                        artist: tags.artist,
                    },
                ));
            }
            Err(message) => {
                let _ = bus_producer.send(protocol::Message::Backend(
                    BackendMessage::RemoteMediaFailed { epoch, message },
                ));
            }
        });
    }

    fn spawn_tag_resolver(&self, path: PathBuf, epoch: u64) {
        let bus_producer = self.bus_producer.clone();
        thread::spawn(move || {
            let tags = metadata_tags::read_track_tags(&path);
            let _ = bus_producer.send(protocol::Message::Metadata(MetadataMessage::Resolved {
                epoch,
                title: tags.title,
                artist: tags.artist,
            }));
        });
    }

    fn set_playback_state(&mut self, state: PlaybackState) {
        if self.playback_state != state {
            self.playback_state = state;
            let _ = self.bus_producer.send(protocol::Message::Playback(
                protocol::PlaybackMessage::StateChanged(state),
            ));
        }
    }

    fn broadcast_playlist_changed(&self) {
        let _ = self.bus_producer.send(protocol::Message::Playlist(
            protocol::PlaylistMessage::Changed {
                titles: self.playlist.titles(),
            },
        ));
    }

    fn broadcast_track_changed(&self, title: &str, artist: &str) {
        let _ = self.bus_producer.send(protocol::Message::Playback(
            protocol::PlaybackMessage::TrackChanged {
                title: title.to_string(),
                artist: artist.to_string(),
            },
        ));
    }

    fn broadcast_error(&self, kind: SessionErrorKind, message: &str) {
        warn!("SessionManager: {:?}: {}", kind, message);
        let _ = self.bus_producer.send(protocol::Message::Session(
            protocol::SessionMessage::Error {
                kind,
                message: message.to_string(),
            },
        ));
    }
}

fn fetch_remote_media(uri: &str) -> Result<Vec<u8>, String> {
    let http_client = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .timeout_read(Duration::from_secs(30))
        .build();
    let response = http_client
        .get(uri)
        .call()
        .map_err(|err| format!("failed to fetch {}: {}", uri, err))?;

    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|err| format!("failed to read body of {}: {}", uri, err))?;
    Ok(bytes)
}
