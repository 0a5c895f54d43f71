use anyhow::Context;
use chromasynth::export::{export_chord, ChordExportSpec};
use chromasynth::input::MidiRouter;
use chromasynth::runtime::{SynthEngine, DEFAULT_CHORD_DURATION, DEFAULT_VELOCITY};
use chromasynth::synth::note::NoteEvent;
use chromasynth::synth::EngineSettings;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{info, warn};

/// Usage: chromasynth [settings.json] [midi-device-id]
fn main() -> anyhow::Result<()> {
    chromasynth::logging::init();

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => EngineSettings::load(&path)
            .with_context(|| format!("loading settings from {}", path))?,
        None => EngineSettings::default(),
    };
    let device_id = args.next();

    let mut engine = SynthEngine::native(settings);
    if !engine.initialize() {
        warn!("No audio output; notes will be ignored");
    }
    engine.resume();

    // C major triad as a start-up chime
    let chime = [60, 64, 67];
    info!("Start-up chord {:?} at velocity {}", chime, DEFAULT_VELOCITY);
    engine.play_chord(&chime, DEFAULT_CHORD_DURATION);

    let spec = ChordExportSpec::new(0, vec![0, 4, 7], 4, 120.0);
    let path = export_chord(&spec, "c-major").context("exporting chord")?;
    info!("Wrote {}", path.display());

    // MIDI callbacks arrive on the router thread; hand them to the engine here
    let (note_tx, note_rx) = mpsc::channel();
    let router = MidiRouter::native();
    let mut session = if router.is_supported() {
        let session = router.initialize(
            move |status, note, velocity| {
                if let Some(event) = NoteEvent::from_midi(status, note, velocity) {
                    let _ = note_tx.send(event);
                }
            },
            device_id,
        );
        for device in session.devices() {
            info!("MIDI input: {} [{}]", device.name, device.id);
        }
        Some(session)
    } else {
        warn!("MIDI input is not supported on this platform");
        None
    };

    let (quit_tx, quit_rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = quit_tx.send(());
    });
    info!("Playing MIDI input; press Enter to quit");

    while quit_rx.try_recv().is_err() {
        match note_rx.recv_timeout(Duration::from_millis(10)) {
            Ok(event) => engine.handle_event(&event),
            Err(RecvTimeoutError::Timeout) => {}
            // Router gone (no MIDI); keep the engine alive until quit
            Err(RecvTimeoutError::Disconnected) => std::thread::sleep(Duration::from_millis(10)),
        }
    }

    if let Some(session) = session.as_mut() {
        session.cleanup();
    }
    engine.shutdown();
    Ok(())
}
