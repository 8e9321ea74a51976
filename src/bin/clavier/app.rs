//! Application state and event loop.

use std::fs;
use std::io::stdout;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use rtrb::RingBuffer;

use clavier::engine::{EngineConfig, EngineHandle, EngineMessage, VoiceEngine};
use clavier::keyboard::{default_layout, frequency_of, Key, NoteId};
use clavier::session::{NoteEvent, PerformanceRecorder, PlaybackScheduler, PlaybackSink};
use clavier::store::{export_file_name, export_one, FileStore, RecordingStore};
use clavier::MAX_BLOCK_SIZE;

use super::keymap;
use super::ui;

/// Where the persisted collection and exports live.
const DATA_DIR: &str = "clavier-data";
/// Control ring capacity. A keyboardist cannot outrun this.
const CONTROL_QUEUE_SIZE: usize = 256;
/// Input poll timeout; also bounds replay jitter.
const TICK: Duration = Duration::from_millis(4);

const VOLUME_STEP: f32 = 0.05;
const RING_STEP: f32 = 0.1;

pub struct App {
    pub handle: EngineHandle,
    pub layout: Vec<Key>,
    pub recorder: PerformanceRecorder,
    pub recordings: RecordingStore<FileStore>,
    pub playback: Option<PlaybackScheduler>,
    pub selected: usize,
    /// Keys currently held down, for release bookkeeping and display.
    pub held: Vec<(usize, NoteId)>,
    pub status: String,
    should_quit: bool,
    _stream: Option<cpal::Stream>,
}

impl App {
    pub fn new() -> EyreResult<Self> {
        let mut recordings = RecordingStore::new(FileStore::new(DATA_DIR));
        if let Err(err) = recordings.load() {
            log::warn!("{err}; starting with an empty collection");
        }

        // No audio is not fatal: the handle degrades to no-ops and the
        // recorder/store side keeps working.
        let (handle, stream) = match start_audio() {
            Ok((handle, stream)) => (handle, Some(stream)),
            Err(err) => {
                log::warn!("no audio output available ({err}); running silent");
                (EngineHandle::detached(), None)
            }
        };

        Ok(Self {
            handle,
            layout: default_layout(),
            recorder: PerformanceRecorder::new(),
            recordings,
            playback: None,
            selected: 0,
            held: Vec::new(),
            status: String::from("Ready"),
            should_quit: false,
            _stream: stream,
        })
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        // Key-release reporting needs the enhanced keyboard protocol; where
        // the terminal lacks it, notes simply ring out on their own.
        let release_events = crossterm::terminal::supports_keyboard_enhancement().unwrap_or(false);
        if release_events {
            execute!(
                stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }

        while !self.should_quit {
            self.tick_playback();
            terminal.draw(|frame| ui::render(frame, self))?;

            if event::poll(TICK)? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key);
                }
            }
        }

        if release_events {
            execute!(stdout(), PopKeyboardEnhancementFlags)?;
        }
        self.handle.stop_all();
        Ok(())
    }

    fn tick_playback(&mut self) {
        let Some(playback) = self.playback.as_mut() else {
            return;
        };

        playback.tick(&mut EngineSink {
            handle: &mut self.handle,
        });

        if playback.is_finished() {
            self.status = String::from("Playback finished");
            self.playback = None;
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            if let Some(index) = keymap::key_index(key.code) {
                self.release_key(index);
            }
            return;
        }
        if key.kind != KeyEventKind::Press {
            // Key repeat would machine-gun the envelope.
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('r') => self.toggle_recording(),
                KeyCode::Char('p') => self.toggle_playback(),
                KeyCode::Char('e') => self.export_selected(),
                KeyCode::Char('d') => self.delete_selected(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Up => self.select_previous(),
            KeyCode::Down => self.select_next(),
            KeyCode::Left => self.nudge_volume(-VOLUME_STEP),
            KeyCode::Right => self.nudge_volume(VOLUME_STEP),
            KeyCode::F(5) => self.nudge_sustain(-RING_STEP),
            KeyCode::F(6) => self.nudge_sustain(RING_STEP),
            KeyCode::F(7) => self.nudge_release(-RING_STEP),
            KeyCode::F(8) => self.nudge_release(RING_STEP),
            code => {
                if let Some(index) = keymap::key_index(code) {
                    self.press_key(index);
                }
            }
        }
    }

    fn press_key(&mut self, index: usize) {
        let Some(key) = self.layout.get(index).copied() else {
            return;
        };

        let frequency = frequency_of(index as i32, &self.layout);
        let id = NoteId::for_key(&key, index);
        self.handle.trigger(frequency, id);
        self.recorder.capture(key.note, key.octave, frequency);

        if !self.held.iter().any(|(held, _)| *held == index) {
            self.held.push((index, id));
        }
    }

    fn release_key(&mut self, index: usize) {
        if let Some(pos) = self.held.iter().position(|(held, _)| *held == index) {
            let (_, id) = self.held.remove(pos);
            self.handle.release(id);
        }
    }

    fn toggle_recording(&mut self) {
        if self.recorder.is_capturing() {
            match self.recorder.stop_capture(self.recordings.len()) {
                Some(recording) => {
                    self.status = format!("Saved \"{}\"", recording.name);
                    self.recordings.add(recording);
                    self.selected = self.recordings.len() - 1;
                }
                None => self.status = String::from("Recording discarded: no notes"),
            }
        } else {
            self.recorder.start_capture();
            self.status = String::from("Recording...");
        }
    }

    fn toggle_playback(&mut self) {
        // At most one playback at a time: whatever is in flight goes first.
        if let Some(mut playing) = self.playback.take() {
            playing.cancel();
            let selected_again = self
                .recordings
                .recordings()
                .get(self.selected)
                .is_some_and(|r| r.id == playing.recording_id());
            self.status = String::from("Playback stopped");
            if selected_again {
                return;
            }
        }

        let Some(recording) = self.recordings.recordings().get(self.selected) else {
            self.status = String::from("Nothing to play");
            return;
        };
        self.status = format!("Playing \"{}\"", recording.name);
        self.playback = Some(PlaybackScheduler::start(recording));
    }

    fn export_selected(&mut self) {
        let Some(recording) = self.recordings.recordings().get(self.selected) else {
            self.status = String::from("Nothing to export");
            return;
        };

        let file_name = export_file_name(recording, unix_time_ms());
        let path = Path::new(DATA_DIR).join(&file_name);
        let result = fs::create_dir_all(DATA_DIR).and_then(|()| fs::write(&path, export_one(recording)));
        match result {
            Ok(()) => self.status = format!("Exported {}", path.display()),
            Err(err) => {
                log::warn!("export to {} failed: {err}", path.display());
                self.status = format!("Export failed: {err}");
            }
        }
    }

    fn delete_selected(&mut self) {
        let Some(recording) = self.recordings.recordings().get(self.selected) else {
            return;
        };

        let id = recording.id.clone();
        let name = recording.name.clone();
        if self
            .playback
            .as_ref()
            .is_some_and(|p| p.recording_id() == id)
        {
            if let Some(mut playing) = self.playback.take() {
                playing.cancel();
            }
        }
        self.recordings.remove(&id);
        self.selected = self.selected.min(self.recordings.len().saturating_sub(1));
        self.status = format!("Deleted \"{name}\"");
    }

    fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn select_next(&mut self) {
        if self.selected + 1 < self.recordings.len() {
            self.selected += 1;
        }
    }

    fn nudge_volume(&mut self, delta: f32) {
        let volume = self.handle.volume() + delta;
        self.handle.set_volume(volume);
        self.status = format!("Volume {:.0}%", self.handle.volume() * 100.0);
    }

    fn nudge_sustain(&mut self, delta: f32) {
        let sustain = self.handle.sustain_time() + delta;
        self.handle.set_sustain_time(sustain);
        self.status = format!("Sustain {:.1}s", self.handle.sustain_time());
    }

    fn nudge_release(&mut self, delta: f32) {
        let release = self.handle.release_time() + delta;
        self.handle.set_release_time(release);
        self.status = format!("Release {:.1}s", self.handle.release_time());
    }
}

/// Forwards replayed events to the engine the way live key input would.
struct EngineSink<'a> {
    handle: &'a mut EngineHandle,
}

impl PlaybackSink for EngineSink<'_> {
    fn trigger(&mut self, event: &NoteEvent) {
        let id = NoteId::for_pitch(event.note, event.octave);
        self.handle.trigger(event.frequency, id);
    }

    fn release(&mut self, id: NoteId) {
        self.handle.release(id);
    }
}

/// Bring up the output stream and the engine behind it.
fn start_audio() -> EyreResult<(EngineHandle, cpal::Stream)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = config.sample_rate().0 as f32;
    let channels = config.channels() as usize;

    let engine_config = EngineConfig {
        sample_rate,
        ..EngineConfig::default()
    };
    let (tx, mut rx) = RingBuffer::<EngineMessage>::new(CONTROL_QUEUE_SIZE);
    let handle = EngineHandle::attached(tx, &engine_config);
    let mut engine = VoiceEngine::new(engine_config);
    let mut render_buf = vec![0.0f32; MAX_BLOCK_SIZE];

    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _| {
            while let Ok(message) = rx.pop() {
                engine.apply(message);
            }

            let total_frames = data.len() / channels;
            let mut frames_written = 0;

            while frames_written < total_frames {
                let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                let block = &mut render_buf[..frames];
                engine.render_block(block);

                // Mono to all channels.
                let out_off = frames_written * channels;
                for (i, &sample) in block.iter().enumerate() {
                    for ch in 0..channels {
                        data[out_off + i * channels + ch] = sample;
                    }
                }

                frames_written += frames;
            }
        },
        |err| log::error!("audio stream error: {err}"),
        None,
    )?;
    stream.play()?;

    Ok((handle, stream))
}

/// Headless `clavier import <file>...`: validate and keep foreign recordings.
pub fn import_files(paths: impl Iterator<Item = String>) -> EyreResult<()> {
    let mut store = RecordingStore::new(FileStore::new(DATA_DIR));
    if let Err(err) = store.load() {
        log::warn!("{err}; starting with an empty collection");
    }

    let mut imported = 0usize;
    for path in paths {
        let json = fs::read_to_string(&path).wrap_err_with(|| format!("cannot read {path}"))?;
        match store.import_one(&json) {
            Ok(recording) => {
                imported += 1;
                println!(
                    "Imported \"{}\" ({} notes, {:.1}s)",
                    recording.name,
                    recording.notes.len(),
                    recording.duration as f32 / 1000.0
                );
            }
            Err(err) => println!("{path}: {err}"),
        }
    }

    if imported == 0 {
        println!("Nothing imported");
    }
    Ok(())
}

fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
