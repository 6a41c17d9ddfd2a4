//! Sequential read-aloud of text segments on a single worker thread.
//!
//! The controller lives on the caller's control context. The worker only
//! talks back through a channel; `poll_events` applies those events to the
//! visible state on the caller's side. Shared flags are limited to running,
//! paused (mutex + condvar), rate and volume.

use crate::error::{Error, Result};
use crate::speech::{EngineProvider, SpeechEngine, Voice};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PlaybackState {
    #[default]
    Idle,
    Reading,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Reading => "reading",
            PlaybackState::Paused => "paused",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    SegmentStarted { index: usize, text: String },
    Finished,
    Failed { message: String },
}

#[derive(Debug)]
struct SessionShared {
    running: AtomicBool,
    paused: Mutex<bool>,
    wake: Condvar,
    rate: AtomicU32,
    volume_bits: AtomicU32,
}

impl SessionShared {
    fn new(rate: u32, volume: f32) -> Self {
        Self {
            running: AtomicBool::new(true),
            paused: Mutex::new(false),
            wake: Condvar::new(),
            rate: AtomicU32::new(rate),
            volume_bits: AtomicU32::new(volume.to_bits()),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn paused_guard(&self) -> MutexGuard<'_, bool> {
        self.paused
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_paused(&self, paused: bool) {
        *self.paused_guard() = paused;
        self.wake.notify_all();
    }

    fn halt(&self) {
        self.running.store(false, Ordering::Release);
        let _guard = self.paused_guard();
        self.wake.notify_all();
    }

    /// Block while paused. Returns false once the session is stopped.
    fn wait_while_paused(&self) -> bool {
        let mut paused = self.paused_guard();
        while *paused && self.is_running() {
            paused = self
                .wake
                .wait(paused)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        self.is_running()
    }

    fn rate(&self) -> u32 {
        self.rate.load(Ordering::Acquire)
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Acquire))
    }
}

struct ActiveSession {
    id: u64,
    shared: Arc<SessionShared>,
    worker: Option<JoinHandle<()>>,
    segment_count: usize,
}

impl ActiveSession {
    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(session = self.id, "Narration worker panicked");
            }
        }
    }
}

pub struct PlaybackController {
    provider: Box<dyn EngineProvider>,
    engine: Option<Arc<dyn SpeechEngine>>,
    state: PlaybackState,
    rate: u32,
    volume: f32,
    cursor: Option<usize>,
    session: Option<ActiveSession>,
    next_session_id: u64,
    events_tx: Sender<(u64, PlaybackEvent)>,
    events_rx: Receiver<(u64, PlaybackEvent)>,
}

impl PlaybackController {
    pub fn new(provider: impl EngineProvider + 'static) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            provider: Box::new(provider),
            engine: None,
            state: PlaybackState::Idle,
            rate: 150,
            volume: 1.0,
            cursor: None,
            session: None,
            next_session_id: 1,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Index of the segment being narrated, if any.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn segment_count(&self) -> usize {
        self.session.as_ref().map_or(0, |session| session.segment_count)
    }

    /// Begin narrating `segments` in order.
    pub fn start(&mut self, segments: Vec<String>, rate: u32, volume: f32) -> Result<()> {
        self.poll_events();
        if self.state != PlaybackState::Idle {
            return Err(Error::InvalidState {
                operation: "start playback",
                state: self.state,
            });
        }

        let engine = match &self.engine {
            Some(engine) => Arc::clone(engine),
            None => {
                let engine = self
                    .provider
                    .open()
                    .map_err(|err| Error::EngineUnavailable(format!("{err:#}")))?;
                self.engine = Some(Arc::clone(&engine));
                engine
            }
        };

        self.rate = rate;
        self.volume = volume.clamp(0.0, 1.0);
        let id = self.next_session_id;
        self.next_session_id += 1;
        let shared = Arc::new(SessionShared::new(self.rate, self.volume));
        let segment_count = segments.len();

        let worker = {
            let shared = Arc::clone(&shared);
            let tx = self.events_tx.clone();
            std::thread::Builder::new()
                .name(format!("narration-{id}"))
                .spawn(move || run_session(id, segments, shared, engine, tx))
                .map_err(|err| {
                    Error::EngineUnavailable(format!("failed to start narration worker: {err}"))
                })?
        };

        info!(session = id, segment_count, rate, volume = self.volume, "Started narration");
        self.session = Some(ActiveSession {
            id,
            shared,
            worker: Some(worker),
            segment_count,
        });
        self.cursor = None;
        self.state = PlaybackState::Reading;
        Ok(())
    }

    /// Suspend before the next segment. No effect unless reading.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Reading {
            return;
        }
        if let Some(session) = &self.session {
            session.shared.set_paused(true);
            self.state = PlaybackState::Paused;
            debug!(session = session.id, "Paused narration");
        }
    }

    /// No effect unless paused.
    pub fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            return;
        }
        if let Some(session) = &self.session {
            session.shared.set_paused(false);
            self.state = PlaybackState::Reading;
            debug!(session = session.id, "Resumed narration");
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.state {
            PlaybackState::Reading => self.pause(),
            PlaybackState::Paused => self.resume(),
            PlaybackState::Idle => {}
        }
    }

    /// Stop from any state. Interrupts the current utterance, waits for the
    /// worker, and drops the engine so the next start opens a fresh one.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.shared.halt();
            if let Some(engine) = &self.engine {
                engine.stop();
            }
            session.join();
            info!(session = session.id, "Stopped narration");
        }
        self.engine = None;
        self.cursor = None;
        self.state = PlaybackState::Idle;
    }

    /// Takes effect at the next segment boundary.
    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate;
        if let Some(session) = &self.session {
            session.shared.rate.store(rate, Ordering::Release);
        }
    }

    /// Takes effect at the next segment boundary.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(session) = &self.session {
            session
                .shared
                .volume_bits
                .store(self.volume.to_bits(), Ordering::Release);
        }
    }

    pub fn voices(&mut self) -> Result<Vec<Voice>> {
        if let Some(engine) = &self.engine {
            return Ok(engine.voices());
        }
        let engine = self
            .provider
            .open()
            .map_err(|err| Error::EngineUnavailable(format!("{err:#}")))?;
        Ok(engine.voices())
    }

    /// Apply worker events on the caller's context and hand them back for
    /// display. Events from sessions that were already stopped are dropped.
    pub fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        let mut applied = Vec::new();
        while let Ok((id, event)) = self.events_rx.try_recv() {
            let Some(session) = self.session.as_mut().filter(|session| session.id == id) else {
                continue;
            };
            match &event {
                PlaybackEvent::SegmentStarted { index, .. } => self.cursor = Some(*index),
                PlaybackEvent::Finished | PlaybackEvent::Failed { .. } => {
                    session.join();
                    self.session = None;
                    self.cursor = None;
                    self.state = PlaybackState::Idle;
                    debug!(session = id, "Narration session closed");
                }
            }
            applied.push(event);
        }
        applied
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_session(
    id: u64,
    segments: Vec<String>,
    shared: Arc<SessionShared>,
    engine: Arc<dyn SpeechEngine>,
    tx: Sender<(u64, PlaybackEvent)>,
) {
    for (index, segment) in segments.into_iter().enumerate() {
        if !shared.wait_while_paused() {
            debug!(session = id, index, "Narration stopped before segment");
            return;
        }
        engine.set_rate(shared.rate());
        engine.set_volume(shared.volume());
        let _ = tx.send((
            id,
            PlaybackEvent::SegmentStarted {
                index,
                text: segment.clone(),
            },
        ));
        if !shared.is_running() {
            return;
        }
        if let Err(err) = engine.speak(&segment) {
            if !shared.is_running() {
                return;
            }
            warn!(session = id, index, "Speech engine failed: {err:#}");
            let _ = tx.send((
                id,
                PlaybackEvent::Failed {
                    message: format!("{err:#}"),
                },
            ));
            return;
        }
    }
    if shared.is_running() {
        let _ = tx.send((id, PlaybackEvent::Finished));
    }
}
