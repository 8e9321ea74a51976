use crate::keyboard::NoteId;

/// Control vocabulary sent from the interactive thread to the audio thread.
///
/// Every variant is `Copy` so pushing onto the ring buffer never allocates.
#[derive(Debug, Clone, Copy)]
pub enum EngineMessage {
    /// Start a voice for a key press.
    Trigger { frequency: f32, id: NoteId },
    /// Key up: drop bookkeeping for the id, let its voices ring out.
    Release { id: NoteId },
    /// Master gain, clamped to [0, 1].
    SetVolume(f32),
    /// Sustain portion of the ring window for subsequent triggers, seconds.
    SetSustainTime(f32),
    /// Release portion of the ring window for subsequent triggers, seconds.
    SetReleaseTime(f32),
    /// Force-stop every voice and clear all bookkeeping.
    StopAll,
}
