//! Performance capture and timed replay.
//!
//! A performance is a stream of key-press onsets. The recorder stamps each
//! onset with its offset from the start of the session and freezes the
//! stream into a [`Recording`]; the scheduler replays a recording through a
//! [`PlaybackSink`] at the original offsets, driving the engine exactly as
//! live input would.

/// Due-event replay with progress and cancellation.
pub mod playback;
/// The capture state machine.
pub mod recorder;

pub use playback::{PlaybackScheduler, PlaybackSink};
pub use recorder::PerformanceRecorder;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::keyboard::PitchClass;

/// One captured key press. Immutable once captured.
///
/// Field names follow the portable JSON schema shared with exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub note: PitchClass,
    pub octave: i32,
    pub frequency: f32,
    /// Milliseconds from recording start.
    pub timestamp: u64,
}

/// A finalized performance. Immutable once built; `notes` is chronological
/// because capture is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub id: String,
    pub name: String,
    pub notes: Vec<NoteEvent>,
    /// Total length of the session in milliseconds.
    pub duration: u64,
    /// Unix milliseconds at finalization.
    #[serde(rename = "createdAt")]
    pub created_at: u64,
}

/// Mint a collision-free id. The counter keeps ids distinct even when two
/// are minted inside the same millisecond.
pub(crate) fn fresh_id(prefix: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{n}", unix_time_ms())
}

pub(crate) fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
