use std::time::Instant;

use super::{fresh_id, unix_time_ms, NoteEvent, Recording};
use crate::keyboard::PitchClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    Idle,
    Capturing,
}

/// Captures key-press onsets while a session is open.
///
/// Two states: idle and capturing. Capture appends to a plain Vec (one push
/// per key press, nothing re-validated), so the hot path stays O(1) however
/// long the session runs. Stopping an empty session produces nothing.
///
/// Every operation has an `*_at` variant taking the current instant; the
/// plain methods pass `Instant::now()`. Tests drive the `_at` variants with
/// synthetic clocks.
pub struct PerformanceRecorder {
    state: CaptureState,
    events: Vec<NoteEvent>,
    session_start: Option<Instant>,
}

impl PerformanceRecorder {
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            events: Vec::new(),
            session_start: None,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.state == CaptureState::Capturing
    }

    /// Number of events captured so far in the open session.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Open a session. Restarting while capturing discards the buffer and
    /// starts over.
    pub fn start_capture(&mut self) {
        self.start_capture_at(Instant::now());
    }

    pub fn start_capture_at(&mut self, now: Instant) {
        self.state = CaptureState::Capturing;
        self.events.clear();
        self.session_start = Some(now);
    }

    /// Record one onset. A no-op outside an open session.
    pub fn capture(&mut self, note: PitchClass, octave: i32, frequency: f32) {
        self.capture_at(Instant::now(), note, octave, frequency);
    }

    pub fn capture_at(&mut self, now: Instant, note: PitchClass, octave: i32, frequency: f32) {
        if self.state != CaptureState::Capturing {
            return;
        }
        let Some(start) = self.session_start else {
            return;
        };

        self.events.push(NoteEvent {
            note,
            octave,
            frequency,
            timestamp: now.saturating_duration_since(start).as_millis() as u64,
        });
    }

    /// Close the session. Returns the finalized recording, or `None` for a
    /// session with no key presses. `stored_count` numbers the generated
    /// display name after the recordings already kept.
    pub fn stop_capture(&mut self, stored_count: usize) -> Option<Recording> {
        self.stop_capture_at(Instant::now(), stored_count)
    }

    pub fn stop_capture_at(&mut self, now: Instant, stored_count: usize) -> Option<Recording> {
        let start = self.session_start.take();
        self.state = CaptureState::Idle;

        if self.events.is_empty() {
            return None;
        }
        let start = start?;

        Some(Recording {
            id: fresh_id("recording"),
            name: format!("Recording {}", stored_count + 1),
            notes: std::mem::take(&mut self.events),
            duration: now.saturating_duration_since(start).as_millis() as u64,
            created_at: unix_time_ms(),
        })
    }
}

impl Default for PerformanceRecorder {
    fn default() -> Self {
        Self::new()
    }
}
