use std::time::{Duration, Instant};

use super::{NoteEvent, Recording};
use crate::keyboard::NoteId;

/// Receives replayed events. The engine-facing implementation forwards
/// triggers to the voice pool; tests implement it with plain Vecs.
pub trait PlaybackSink {
    /// A note's scheduled time has arrived.
    fn trigger(&mut self, event: &NoteEvent);
    /// Playback is done with this id; bookkeeping can be dropped.
    fn release(&mut self, id: NoteId);
}

/// Replays one recording at its original relative offsets.
///
/// The scheduler holds a cursor over the chronologically ordered events and
/// fires everything that has come due each time it is ticked, so replay
/// fidelity is bounded by the tick interval, not by per-event timers.
///
/// Cancellation is checked before any dispatch: once [`cancel`](Self::cancel)
/// has run, no further event fires even if its scheduled time had already
/// passed. Already-sounding voices are untouched either way - they decay on
/// their own envelopes.
///
/// At most one playback should be active at a time; whoever owns the
/// scheduler cancels the old one before starting the next.
pub struct PlaybackScheduler {
    recording_id: String,
    events: Vec<NoteEvent>,
    duration: Duration,
    started_at: Instant,
    cursor: usize,
    cancelled: bool,
    finished: bool,
}

impl PlaybackScheduler {
    /// Begin replaying `recording` now.
    pub fn start(recording: &Recording) -> Self {
        Self::start_at(recording, Instant::now())
    }

    pub fn start_at(recording: &Recording, now: Instant) -> Self {
        Self {
            recording_id: recording.id.clone(),
            events: recording.notes.clone(),
            duration: Duration::from_millis(recording.duration),
            started_at: now,
            cursor: 0,
            cancelled: false,
            finished: false,
        }
    }

    pub fn recording_id(&self) -> &str {
        &self.recording_id
    }

    /// Fraction of the recording elapsed, saturating at 1.
    pub fn progress(&self) -> f32 {
        self.progress_at(Instant::now())
    }

    pub fn progress_at(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    /// Still running: not cancelled, not past the end.
    pub fn is_active(&self) -> bool {
        !self.cancelled && !self.finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop scheduling. Nothing further fires, including events whose time
    /// had already passed; sounding voices are left to ring out.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Fire every event that has come due.
    pub fn tick(&mut self, sink: &mut impl PlaybackSink) {
        self.tick_at(Instant::now(), sink);
    }

    pub fn tick_at(&mut self, now: Instant, sink: &mut impl PlaybackSink) {
        if self.cancelled || self.finished {
            return;
        }

        let elapsed = now.saturating_duration_since(self.started_at);
        let elapsed_ms = elapsed.as_millis() as u64;

        while let Some(event) = self.events.get(self.cursor) {
            if event.timestamp > elapsed_ms {
                break;
            }
            sink.trigger(event);
            self.cursor += 1;
        }

        if elapsed >= self.duration && self.cursor >= self.events.len() {
            self.finished = true;
            // Lift every key the replay pressed.
            let mut released: Vec<NoteId> = Vec::new();
            for event in &self.events {
                let id = NoteId::for_pitch(event.note, event.octave);
                if !released.contains(&id) {
                    released.push(id);
                    sink.release(id);
                }
            }
        }
    }
}
