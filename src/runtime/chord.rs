use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::audio::SharedSynth;

/// A pending chord release.
///
/// Dropping the handle leaves the release scheduled. `cancel` aborts it,
/// leaving the chord's notes held.
pub struct ChordHandle {
    pitches: Vec<u8>,
    cancelled: Arc<AtomicBool>,
    timer: Option<JoinHandle<()>>,
}

impl ChordHandle {
    pub(crate) fn schedule(synth: SharedSynth, pitches: Vec<u8>, duration: Duration) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let release = pitches.clone();

        let timer = thread::Builder::new()
            .name("chord-release".into())
            .spawn(move || {
                let deadline = Instant::now() + duration;
                loop {
                    if flag.load(Ordering::Acquire) {
                        debug!("Chord release cancelled");
                        return;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::park_timeout(deadline - now);
                }
                let mut synth = synth.lock().unwrap_or_else(PoisonError::into_inner);
                if !flag.load(Ordering::Acquire) {
                    synth.release_notes(&release);
                }
            });

        let timer = match timer {
            Ok(timer) => Some(timer),
            Err(e) => {
                warn!("Failed to schedule chord release: {}", e);
                None
            }
        };

        Self {
            pitches,
            cancelled,
            timer,
        }
    }

    /// A handle with nothing scheduled, returned when the engine is unavailable.
    pub(crate) fn inert(pitches: Vec<u8>) -> Self {
        Self {
            pitches,
            cancelled: Arc::new(AtomicBool::new(true)),
            timer: None,
        }
    }

    pub fn pitches(&self) -> &[u8] {
        &self.pitches
    }

    /// Whether the release has run, been cancelled, or was never scheduled.
    pub fn is_finished(&self) -> bool {
        self.timer.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Aborts the pending release. No effect once it has run.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(timer) = &self.timer {
            timer.thread().unpark();
        }
    }

    /// Blocks until the release has run or been cancelled.
    pub fn wait(mut self) {
        if let Some(timer) = self.timer.take() {
            if timer.join().is_err() {
                warn!("Chord release thread panicked");
            }
        }
    }
}
