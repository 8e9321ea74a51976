use rtrb::Producer;

use super::message::EngineMessage;
use super::{EngineConfig, RELEASE_TIME_RANGE, SUSTAIN_TIME_RANGE};
use crate::keyboard::NoteId;

/// Interactive-thread face of the voice engine.
///
/// An attached handle pushes messages onto the audio thread's ring. A
/// detached handle (no output device, headless test, CI) accepts every
/// call and does nothing, so calling code never branches on whether audio
/// came up. The handle mirrors the clamped volume and envelope times for
/// display, since the engine itself is on the other side of the ring.
pub struct EngineHandle {
    tx: Option<Producer<EngineMessage>>,
    volume: f32,
    sustain_time: f32,
    release_time: f32,
}

impl EngineHandle {
    /// Handle wired to a running audio thread.
    pub fn attached(tx: Producer<EngineMessage>, config: &EngineConfig) -> Self {
        Self {
            tx: Some(tx),
            volume: config.volume.clamp(0.0, 1.0),
            sustain_time: config.sustain_time.clamp(SUSTAIN_TIME_RANGE.0, SUSTAIN_TIME_RANGE.1),
            release_time: config.release_time.clamp(RELEASE_TIME_RANGE.0, RELEASE_TIME_RANGE.1),
        }
    }

    /// Handle with no audio thread behind it. Every operation is a no-op.
    pub fn detached() -> Self {
        let config = EngineConfig::default();
        Self {
            tx: None,
            volume: config.volume,
            sustain_time: config.sustain_time,
            release_time: config.release_time,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.tx.is_some()
    }

    pub fn trigger(&mut self, frequency: f32, id: NoteId) {
        self.send(EngineMessage::Trigger { frequency, id });
    }

    pub fn release(&mut self, id: NoteId) {
        self.send(EngineMessage::Release { id });
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        let v = self.volume;
        self.send(EngineMessage::SetVolume(v));
    }

    pub fn set_sustain_time(&mut self, seconds: f32) {
        self.sustain_time = seconds.clamp(SUSTAIN_TIME_RANGE.0, SUSTAIN_TIME_RANGE.1);
        let s = self.sustain_time;
        self.send(EngineMessage::SetSustainTime(s));
    }

    pub fn set_release_time(&mut self, seconds: f32) {
        self.release_time = seconds.clamp(RELEASE_TIME_RANGE.0, RELEASE_TIME_RANGE.1);
        let r = self.release_time;
        self.send(EngineMessage::SetReleaseTime(r));
    }

    /// Force-stop everything. Used on teardown.
    pub fn stop_all(&mut self) {
        self.send(EngineMessage::StopAll);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn sustain_time(&self) -> f32 {
        self.sustain_time
    }

    pub fn release_time(&self) -> f32 {
        self.release_time
    }

    fn send(&mut self, message: EngineMessage) {
        if let Some(tx) = &mut self.tx {
            if tx.push(message).is_err() {
                // A full ring means the audio thread has stalled; drop the
                // message rather than block a UI thread on it.
                log::debug!("engine control ring full, dropping {message:?}");
            }
        }
    }
}
