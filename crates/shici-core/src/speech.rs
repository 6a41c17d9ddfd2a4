//! Boundary to the external speech synthesizer.
//!
//! The playback controller only sees the `SpeechEngine` trait. The shipped
//! implementation drives a command-line synthesizer (`espeak-ng` by default),
//! one process per utterance, so stopping mid-utterance is a process kill.

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use ts_rs::TS;

const UTTERANCE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language: String,
}

/// An opaque synthesizer. `speak` blocks until the utterance ends or `stop`
/// is called from another thread.
pub trait SpeechEngine: Send + Sync {
    fn speak(&self, text: &str) -> Result<()>;
    fn stop(&self);
    /// Words-per-minute style rate.
    fn set_rate(&self, rate: u32);
    /// 0.0 to 1.0.
    fn set_volume(&self, volume: f32);
    fn voices(&self) -> Vec<Voice>;
}

/// Opens a fresh engine for each playback session.
pub trait EngineProvider: Send {
    fn open(&self) -> Result<Arc<dyn SpeechEngine>>;
}

impl<F> EngineProvider for F
where
    F: Fn() -> Result<Arc<dyn SpeechEngine>> + Send,
{
    fn open(&self) -> Result<Arc<dyn SpeechEngine>> {
        self()
    }
}

#[derive(Debug, Clone)]
pub struct CommandEngineProvider {
    program: String,
    voice: Option<String>,
}

impl CommandEngineProvider {
    pub fn new(program: impl Into<String>, voice: Option<String>) -> Self {
        Self {
            program: program.into(),
            voice: voice.filter(|v| !v.trim().is_empty()),
        }
    }
}

impl EngineProvider for CommandEngineProvider {
    fn open(&self) -> Result<Arc<dyn SpeechEngine>> {
        let engine = CommandEngine::new(self.program.clone(), self.voice.clone())?;
        Ok(Arc::new(engine))
    }
}

#[derive(Debug)]
pub struct CommandEngine {
    program: String,
    voice: Option<String>,
    rate: AtomicU32,
    volume_bits: AtomicU32,
    current: Mutex<Option<Child>>,
    interrupted: AtomicBool,
}

impl CommandEngine {
    /// Probe `program` and build an engine around it.
    pub fn new(program: String, voice: Option<String>) -> Result<Self> {
        let status = Command::new(&program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("Launching speech synthesizer '{program}'"))?;
        if !status.success() {
            bail!("speech synthesizer '{program}' exited with {status} on --version");
        }
        info!(program = %program, voice = ?voice, "Initialized speech engine");
        Ok(Self {
            program,
            voice,
            rate: AtomicU32::new(150),
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
            current: Mutex::new(None),
            interrupted: AtomicBool::new(false),
        })
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Acquire))
    }

    fn command_for(&self, text: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-s")
            .arg(self.rate.load(Ordering::Acquire).to_string())
            .arg("-a")
            .arg(volume_to_amplitude(self.volume()).to_string());
        if let Some(voice) = &self.voice {
            command.arg("-v").arg(voice);
        }
        command
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

impl SpeechEngine for CommandEngine {
    fn speak(&self, text: &str) -> Result<()> {
        {
            let mut current = lock_child(&self.current);
            if self.interrupted.load(Ordering::Acquire) {
                return Ok(());
            }
            let child = self
                .command_for(text)
                .spawn()
                .with_context(|| format!("Spawning '{}'", self.program))?;
            *current = Some(child);
        }
        debug!(chars = text.chars().count(), "Speaking segment");

        loop {
            {
                let mut guard = lock_child(&self.current);
                let Some(child) = guard.as_mut() else {
                    return Ok(());
                };
                if let Some(status) = child.try_wait().context("Waiting on synthesizer")? {
                    *guard = None;
                    if status.success() || self.interrupted.load(Ordering::Acquire) {
                        return Ok(());
                    }
                    return Err(anyhow!("synthesizer exited with {status}"));
                }
            }
            std::thread::sleep(UTTERANCE_POLL_INTERVAL);
        }
    }

    /// Interrupts the current utterance. The engine stays stopped; open a new
    /// one to speak again.
    fn stop(&self) {
        self.interrupted.store(true, Ordering::Release);
        if let Some(mut child) = lock_child(&self.current).take() {
            if let Err(err) = child.kill() {
                debug!("Synthesizer already exited: {err}");
            }
            let _ = child.wait();
        }
    }

    fn set_rate(&self, rate: u32) {
        self.rate.store(rate, Ordering::Release);
    }

    fn set_volume(&self, volume: f32) {
        self.volume_bits
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }

    fn voices(&self) -> Vec<Voice> {
        let output = match Command::new(&self.program).arg("--voices").output() {
            Ok(output) => output,
            Err(err) => {
                warn!(program = %self.program, "Listing voices failed: {err}");
                return Vec::new();
            }
        };
        parse_voice_table(&String::from_utf8_lossy(&output.stdout))
    }
}

fn lock_child(current: &Mutex<Option<Child>>) -> std::sync::MutexGuard<'_, Option<Child>> {
    current
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// espeak-style amplitude: 0 to 200, 100 is normal.
fn volume_to_amplitude(volume: f32) -> u32 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// Parse the `--voices` table: `Pty Language Age/Gender VoiceName File ...`.
fn parse_voice_table(table: &str) -> Vec<Voice> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 5 {
                return None;
            }
            Some(Voice {
                id: cols[4].to_string(),
                name: cols[3].to_string(),
                language: cols[1].to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_voice_table() {
        let table = "Pty Language       Age/Gender VoiceName          File                 Other Languages\n \
                      5  cmn             --/M      Chinese_(Mandarin) sit/cmn              (zh-cmn 5)(zh 5)\n \
                      5  en              --/M      English            gmw/en\n\
                     garbage\n";
        let voices = parse_voice_table(table);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].id, "sit/cmn");
        assert_eq!(voices[0].name, "Chinese_(Mandarin)");
        assert_eq!(voices[0].language, "cmn");
        assert_eq!(voices[1].language, "en");
    }

    #[test]
    fn amplitude_is_clamped() {
        assert_eq!(volume_to_amplitude(1.0), 100);
        assert_eq!(volume_to_amplitude(0.5), 50);
        assert_eq!(volume_to_amplitude(3.0), 100);
        assert_eq!(volume_to_amplitude(-1.0), 0);
    }

    #[test]
    fn missing_program_is_an_error() {
        let provider = CommandEngineProvider::new("definitely-not-a-synthesizer-binary", None);
        assert!(provider.open().is_err());
    }
}
