//! End-to-end session: capture a performance, store it, round-trip it
//! through the portable JSON format, and replay it into the voice engine.

use std::time::{Duration, Instant};

use clavier::engine::{EngineConfig, VoiceEngine};
use clavier::keyboard::{default_layout, frequency_of, NoteId};
use clavier::session::{NoteEvent, PerformanceRecorder, PlaybackScheduler, PlaybackSink};
use clavier::store::{export_one, BlobStore, MemoryStore, RecordingStore, STORAGE_KEY};

const SAMPLE_RATE: f32 = 1_000.0;

/// Replay sink that drives a real engine, the way the application does.
struct EngineSink<'a> {
    engine: &'a mut VoiceEngine,
    triggered: Vec<u64>,
}

impl PlaybackSink for EngineSink<'_> {
    fn trigger(&mut self, event: &NoteEvent) {
        self.triggered.push(event.timestamp);
        self.engine
            .trigger(event.frequency, NoteId::for_pitch(event.note, event.octave));
    }

    fn release(&mut self, id: NoteId) {
        self.engine.release(id);
    }
}

fn capture_performance() -> clavier::session::Recording {
    let layout = default_layout();
    let mut recorder = PerformanceRecorder::new();
    let t0 = Instant::now();

    recorder.start_capture_at(t0);
    for (offset_ms, index) in [(0u64, 17usize), (150, 21), (300, 24), (450, 17)] {
        let key = layout[index];
        recorder.capture_at(
            t0 + Duration::from_millis(offset_ms),
            key.note,
            key.octave,
            frequency_of(index as i32, &layout),
        );
    }

    recorder
        .stop_capture_at(t0 + Duration::from_millis(600), 0)
        .expect("non-empty session finalizes")
}

#[test]
fn captured_performances_replay_with_original_timing() {
    let recording = capture_performance();
    assert_eq!(recording.duration, 600);
    assert_eq!(recording.notes.len(), 4);

    let mut engine = VoiceEngine::new(EngineConfig {
        sample_rate: SAMPLE_RATE,
        ..EngineConfig::default()
    });
    let mut sink = EngineSink {
        engine: &mut engine,
        triggered: Vec::new(),
    };

    let t0 = Instant::now();
    let mut playback = PlaybackScheduler::start_at(&recording, t0);

    // Tick like the app does, a few milliseconds at a time.
    let mut now = t0;
    while playback.is_active() {
        now += Duration::from_millis(5);
        playback.tick_at(now, &mut sink);
    }

    assert!(playback.is_finished());
    assert_eq!(sink.triggered, vec![0, 150, 300, 450]);

    // The engine heard the performance.
    let mut out = vec![0.0f32; 64];
    sink.engine.render_block(&mut out);
    assert!(out.iter().any(|s| s.abs() > 0.0));

    // Playback lifted its keys on the way out: bookkeeping is clear even
    // though the last voices are still ringing.
    assert!(sink.engine.active_note_ids().is_empty());
    assert!(sink.engine.sounding_voices() > 0);
}

#[test]
fn store_round_trips_a_captured_performance() {
    let recording = capture_performance();
    let original_notes = recording.notes.clone();
    let original_id = recording.id.clone();

    let mut store = RecordingStore::new(MemoryStore::new());
    store.add(recording);
    assert!(store.has_recordings());

    // Reload from the persisted blob, as a fresh launch would.
    let blob = store.blobs().get(STORAGE_KEY).expect("collection persisted");
    let mut blobs = MemoryStore::new();
    blobs.set(STORAGE_KEY, &blob);
    let mut reloaded = RecordingStore::new(blobs);
    assert_eq!(reloaded.load().unwrap(), 1);
    assert_eq!(reloaded.recordings()[0].notes, original_notes);

    // Export/import keeps the performance but never the id.
    let json = export_one(&reloaded.recordings()[0]);
    let imported = reloaded.import_one(&json).unwrap();
    assert_eq!(imported.notes, original_notes);
    assert_ne!(imported.id, original_id);
    assert!(imported.name.ends_with("(Imported)"));
    assert_eq!(reloaded.len(), 2);
}

#[test]
fn cancelled_replay_leaves_ringing_voices_alone() {
    let recording = capture_performance();

    let mut engine = VoiceEngine::new(EngineConfig {
        sample_rate: SAMPLE_RATE,
        ..EngineConfig::default()
    });
    let mut sink = EngineSink {
        engine: &mut engine,
        triggered: Vec::new(),
    };

    let t0 = Instant::now();
    let mut playback = PlaybackScheduler::start_at(&recording, t0);
    playback.tick_at(t0 + Duration::from_millis(300), &mut sink);
    assert_eq!(sink.triggered.len(), 3);

    playback.cancel();
    playback.tick_at(t0 + Duration::from_millis(10_000), &mut sink);
    assert_eq!(sink.triggered.len(), 3, "no triggers after cancellation");

    // The three voices keep decaying naturally.
    assert_eq!(sink.engine.sounding_voices(), 3);
    let mut out = vec![0.0f32; 64];
    sink.engine.render_block(&mut out);
    assert!(out.iter().any(|s| s.abs() > 0.0));
}
