//! Media backend seam and the rodio-based implementation.
//!
//! The session manager drives playback exclusively through the
//! [`MediaBackend`] trait; the rodio adapter here carries no session state.
//! Its poll thread reports progress ticks and raw playback states onto the
//! bus, where the session manager interprets them.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tokio::sync::broadcast::Sender;

use crate::metadata_tags;
use crate::protocol::{self, BackendMessage, RawPlaybackState};

/// Opaque decode/output engine. Remote media arrives pre-fetched as bytes;
/// the network fetch itself belongs to the session manager's resolver so the
/// backend never blocks on I/O beyond local decode.
pub trait MediaBackend {
    fn load_local(&mut self, path: &Path) -> Result<(), String>;
    fn load_remote(&mut self, bytes: Vec<u8>) -> Result<(), String>;
    fn play(&mut self);
    fn pause(&mut self, paused: bool);
    fn seek(&mut self, offset_ms: u64) -> Result<(), String>;
    fn stop(&mut self);
}

/// Rodio-backed media backend. A loaded track lives in a `Sink`; `stop`
/// drops the sink. The poll thread watches the shared sink slot and posts
/// `Backend(Tick)` / `Backend(StateObserved)` onto the bus.
pub struct RodioBackend {
    // Must stay alive for the audio device to keep playing.
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sink: Arc<Mutex<Option<Sink>>>,
    total_ms: Arc<AtomicU64>,
}

impl RodioBackend {
    pub fn new(
        bus_producer: Sender<protocol::Message>,
        poll_interval_ms: u64,
    ) -> Result<Self, String> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|err| format!("failed to open audio output: {}", err))?;

        let sink: Arc<Mutex<Option<Sink>>> = Arc::new(Mutex::new(None));
        let total_ms = Arc::new(AtomicU64::new(0));

        // Poll thread, modeled as a progress reporter: one tick plus one raw
        // state observation per interval.
        let sink_clone = sink.clone();
        let total_ms_clone = total_ms.clone();
        thread::spawn(move || loop {
            thread::sleep(Duration::from_millis(poll_interval_ms));

            let observed = {
                let guard = match sink_clone.lock() {
                    Ok(guard) => guard,
                    Err(_) => break,
                };
                match guard.as_ref() {
                    None => RawPlaybackState::Stopped,
                    Some(sink) if sink.empty() => RawPlaybackState::Ended,
                    Some(sink) => {
                        let elapsed_ms = sink.get_pos().as_millis() as u64;
                        let _ = bus_producer.send(protocol::Message::Backend(
                            BackendMessage::Tick {
                                elapsed_ms,
                                total_ms: total_ms_clone.load(Ordering::Relaxed),
                            },
                        ));
                        if sink.is_paused() {
                            RawPlaybackState::Paused
                        } else {
                            RawPlaybackState::Playing
                        }
                    }
                }
            };

            if bus_producer
                .send(protocol::Message::Backend(BackendMessage::StateObserved(
                    observed,
                )))
                .is_err()
            {
                // Bus closed, runtime is shutting down.
                break;
            }
        });

        Ok(Self {
            _stream: stream,
            stream_handle,
            sink,
            total_ms,
        })
    }

    fn replace_sink(&mut self, new_sink: Sink, duration_ms: u64) {
        self.total_ms.store(duration_ms, Ordering::Relaxed);
        if let Ok(mut guard) = self.sink.lock() {
            *guard = Some(new_sink);
        }
    }

    fn fresh_sink(&self) -> Result<Sink, String> {
        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|err| format!("failed to create playback sink: {}", err))?;
        // Loading and starting are separate steps; hold the sink paused until
        // `play` is called.
        sink.pause();
        Ok(sink)
    }
}

impl MediaBackend for RodioBackend {
    fn load_local(&mut self, path: &Path) -> Result<(), String> {
        let file = File::open(path)
            .map_err(|err| format!("failed to open {}: {}", path.display(), err))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|err| format!("failed to decode {}: {}", path.display(), err))?;

        let sink = self.fresh_sink()?;
        sink.append(source);
        self.replace_sink(sink, metadata_tags::read_duration_ms(path));
        debug!("RodioBackend: loaded {}", path.display());
        Ok(())
    }

    fn load_remote(&mut self, bytes: Vec<u8>) -> Result<(), String> {
        let duration_ms = metadata_tags::probe_duration_ms(&bytes);
        let source = Decoder::new(Cursor::new(bytes))
            .map_err(|err| format!("failed to decode fetched media: {}", err))?;

        let sink = self.fresh_sink()?;
        sink.append(source);
        self.replace_sink(sink, duration_ms);
        debug!("RodioBackend: loaded fetched remote media");
        Ok(())
    }

    fn play(&mut self) {
        if let Ok(guard) = self.sink.lock() {
            if let Some(sink) = guard.as_ref() {
                sink.play();
            }
        }
    }

    fn pause(&mut self, paused: bool) {
        if let Ok(guard) = self.sink.lock() {
            if let Some(sink) = guard.as_ref() {
                if paused {
                    sink.pause();
                } else {
                    sink.play();
                }
            }
        }
    }

    fn seek(&mut self, offset_ms: u64) -> Result<(), String> {
        let guard = self
            .sink
            .lock()
            .map_err(|_| "playback sink lock poisoned".to_string())?;
        match guard.as_ref() {
            Some(sink) => sink
                .try_seek(Duration::from_millis(offset_ms))
                .map_err(|err| format!("seek to {}ms failed: {}", offset_ms, err)),
            None => Err("no track loaded".to_string()),
        }
    }

    fn stop(&mut self) {
        if let Ok(mut guard) = self.sink.lock() {
            if let Some(sink) = guard.take() {
                sink.stop();
            }
        } else {
            warn!("RodioBackend: sink lock poisoned during stop");
        }
        self.total_ms.store(0, Ordering::Relaxed);
    }
}
