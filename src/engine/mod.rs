//! The polyphonic voice engine.
//!
//! [`VoiceEngine`] lives on the audio thread and owns a fixed arena of voice
//! slots. [`EngineHandle`] is the interactive-thread face: it pushes
//! [`EngineMessage`]s onto an SPSC ring the engine drains at the top of every
//! rendered block. A handle without an audio thread behind it (headless
//! environments, missing output device) is "detached" and silently ignores
//! every call - callers never need to guard against initialization timing.

pub mod handle;
pub mod message;
mod voice;

pub use handle::EngineHandle;
pub use message::EngineMessage;

use crate::keyboard::NoteId;
use voice::Voice;

/// Sustain-time clamp, seconds.
pub const SUSTAIN_TIME_RANGE: (f32, f32) = (0.1, 3.0);
/// Release-time clamp, seconds.
pub const RELEASE_TIME_RANGE: (f32, f32) = (0.1, 5.0);

/// Engine construction parameters. The defaults match the shipped
/// instrument: a quiet master gain and a one-second ring.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_rate: f32,
    /// Size of the voice arena. Triggers beyond this are dropped, not
    /// stolen.
    pub max_voices: usize,
    pub volume: f32,
    pub sustain_time: f32,
    pub release_time: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            max_voices: 32,
            volume: 0.2,
            sustain_time: 0.6,
            release_time: 0.4,
        }
    }
}

/// Audio-thread voice pool.
///
/// Voices are bookkept by [`NoteId`]: retriggering an id before its previous
/// voice has decayed stacks a second voice under the same id, the way rapid
/// repeated presses of one piano key overlap. Slots are reclaimed inside
/// [`render_block`](Self::render_block) the moment their envelope finishes,
/// so silent ids cost nothing.
pub struct VoiceEngine {
    sample_rate: f32,
    voices: Vec<Voice>,
    volume: f32,
    sustain_time: f32,
    release_time: f32,
    frame_counter: u64,
}

impl VoiceEngine {
    pub fn new(config: EngineConfig) -> Self {
        let voices = (0..config.max_voices.max(1)).map(|_| Voice::idle()).collect();

        let mut engine = Self {
            sample_rate: config.sample_rate,
            voices,
            volume: 0.0,
            sustain_time: 0.0,
            release_time: 0.0,
            frame_counter: 0,
        };
        engine.set_volume(config.volume);
        engine.set_sustain_time(config.sustain_time);
        engine.set_release_time(config.release_time);
        engine
    }

    /// Apply one control message. Called by the audio thread while draining
    /// its ring, and directly by tests.
    pub fn apply(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Trigger { frequency, id } => self.trigger(frequency, id),
            EngineMessage::Release { id } => self.release(id),
            EngineMessage::SetVolume(v) => self.set_volume(v),
            EngineMessage::SetSustainTime(s) => self.set_sustain_time(s),
            EngineMessage::SetReleaseTime(r) => self.set_release_time(r),
            EngineMessage::StopAll => self.stop_all(),
        }
    }

    /// Start a voice for `id`. Arena full: the press is dropped, not
    /// stolen.
    pub fn trigger(&mut self, frequency: f32, id: NoteId) {
        let ring_time = self.sustain_time + self.release_time;
        let age = self.frame_counter;

        match self.voices.iter_mut().find(|v| v.is_free()) {
            Some(slot) => slot.start(id, frequency, self.sample_rate, ring_time, age),
            None => log::debug!("voice arena full, dropping trigger for {id}"),
        }
    }

    /// Key up. Unbinds every voice bookkept under `id` without cutting the
    /// sound; a later trigger of the same id starts a fresh entry.
    pub fn release(&mut self, id: NoteId) {
        for voice in self.voices.iter_mut().filter(|v| v.id() == Some(id)) {
            voice.unbind();
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn set_sustain_time(&mut self, seconds: f32) {
        let (lo, hi) = SUSTAIN_TIME_RANGE;
        self.sustain_time = seconds.clamp(lo, hi);
    }

    pub fn set_release_time(&mut self, seconds: f32) {
        let (lo, hi) = RELEASE_TIME_RANGE;
        self.release_time = seconds.clamp(lo, hi);
    }

    /// Force-stop every voice and clear all bookkeeping. Used on teardown.
    pub fn stop_all(&mut self) {
        for voice in &mut self.voices {
            if voice.is_sounding() {
                voice.stop();
            }
        }
    }

    /// Mix every sounding voice into `out` and apply the master gain.
    /// Finished voices free their slots before this returns, so bookkeeping
    /// is consistent by the time anything else observes it.
    pub fn render_block(&mut self, out: &mut [f32]) {
        out.fill(0.0);

        for voice in &mut self.voices {
            voice.render_add(out, self.sample_rate);
        }

        for sample in out.iter_mut() {
            *sample *= self.volume;
        }

        self.frame_counter += out.len() as u64;
    }

    /// Voices still bookkept under `id` (bound and sounding).
    pub fn active_voice_count(&self, id: NoteId) -> usize {
        self.voices
            .iter()
            .filter(|v| v.is_bound() && v.id() == Some(id))
            .count()
    }

    /// Every id with live bookkeeping, in trigger order. Derived on demand;
    /// nothing caches this. Slots get reused, so trigger order comes from
    /// each voice's start frame rather than its arena position.
    pub fn active_note_ids(&self) -> Vec<NoteId> {
        let mut bound: Vec<_> = self
            .voices
            .iter()
            .filter(|v| v.is_bound())
            .filter_map(|v| v.id().map(|id| (v.age(), id)))
            .collect();
        bound.sort_by_key(|(age, _)| *age);

        let mut ids = Vec::with_capacity(bound.len());
        for (_, id) in bound {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Total sounding voices, bound or not.
    pub fn sounding_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_sounding()).count()
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::PitchClass;

    // Low rate keeps ring windows cheap to render through.
    const SAMPLE_RATE: f32 = 1_000.0;

    fn test_engine() -> VoiceEngine {
        VoiceEngine::new(EngineConfig {
            sample_rate: SAMPLE_RATE,
            max_voices: 8,
            volume: 1.0,
            sustain_time: 0.1,
            release_time: 0.1,
        })
    }

    fn a4() -> NoteId {
        NoteId::new(PitchClass::A, 4, 26)
    }

    fn render(engine: &mut VoiceEngine, samples: usize) {
        let mut out = vec![0.0f32; samples];
        engine.render_block(&mut out);
    }

    #[test]
    fn trigger_then_render_produces_sound() {
        let mut engine = test_engine();
        engine.trigger(440.0, a4());

        let mut out = vec![0.0f32; 64];
        engine.render_block(&mut out);
        assert!(out.iter().any(|s| s.abs() > 0.0));
    }

    #[test]
    fn retrigger_stacks_voices_under_one_id() {
        let mut engine = test_engine();
        engine.trigger(440.0, a4());
        render(&mut engine, 16);
        engine.trigger(441.0, a4());

        assert_eq!(engine.active_voice_count(a4()), 2);
        assert_eq!(engine.sounding_voices(), 2);

        // Both decay independently; the set empties only once both finish.
        render(&mut engine, 190);
        assert_eq!(engine.active_voice_count(a4()), 1);
        render(&mut engine, 30);
        assert_eq!(engine.active_voice_count(a4()), 0);
        assert_eq!(engine.sounding_voices(), 0);
    }

    #[test]
    fn release_drops_bookkeeping_but_not_sound() {
        let mut engine = test_engine();
        engine.trigger(440.0, a4());
        engine.release(a4());

        assert_eq!(engine.active_voice_count(a4()), 0);
        assert_eq!(engine.sounding_voices(), 1);

        let mut out = vec![0.0f32; 64];
        engine.render_block(&mut out);
        assert!(out.iter().any(|s| s.abs() > 0.0));
    }

    #[test]
    fn retrigger_after_release_starts_a_fresh_entry() {
        let mut engine = test_engine();
        engine.trigger(440.0, a4());
        engine.release(a4());
        engine.trigger(440.0, a4());

        assert_eq!(engine.active_voice_count(a4()), 1);
        assert_eq!(engine.sounding_voices(), 2);
    }

    #[test]
    fn silent_ids_vanish_from_bookkeeping() {
        let mut engine = test_engine();
        engine.trigger(440.0, a4());
        render(&mut engine, 250);

        assert!(engine.active_note_ids().is_empty());
        assert_eq!(engine.sounding_voices(), 0);
    }

    #[test]
    fn active_ids_come_back_in_trigger_order() {
        let mut engine = test_engine();
        let first = NoteId::new(PitchClass::C, 4, 17);
        let second = NoteId::new(PitchClass::E, 4, 21);
        engine.trigger(261.63, first);
        render(&mut engine, 8);
        engine.trigger(329.63, second);

        assert_eq!(engine.active_note_ids(), vec![first, second]);
    }

    #[test]
    fn full_arena_drops_triggers() {
        let mut engine = test_engine();
        for i in 0..10 {
            engine.trigger(440.0, NoteId::new(PitchClass::C, 4, i));
        }
        assert_eq!(engine.sounding_voices(), 8);
    }

    #[test]
    fn volume_clamps_to_unit_range() {
        let mut engine = test_engine();
        engine.set_volume(1.8);
        assert_eq!(engine.volume(), 1.0);
        engine.set_volume(-0.3);
        assert_eq!(engine.volume(), 0.0);
    }

    #[test]
    fn envelope_times_clamp_to_their_ranges() {
        let mut engine = test_engine();
        engine.set_sustain_time(99.0);
        assert_eq!(engine.sustain_time(), SUSTAIN_TIME_RANGE.1);
        engine.set_sustain_time(0.0);
        assert_eq!(engine.sustain_time(), SUSTAIN_TIME_RANGE.0);

        engine.set_release_time(99.0);
        assert_eq!(engine.release_time(), RELEASE_TIME_RANGE.1);
        engine.set_release_time(0.0);
        assert_eq!(engine.release_time(), RELEASE_TIME_RANGE.0);
    }

    #[test]
    fn envelope_times_apply_to_subsequent_triggers_only() {
        let mut engine = test_engine();
        engine.trigger(440.0, a4());
        engine.set_sustain_time(3.0);
        engine.set_release_time(5.0);

        // The in-flight voice still dies inside its original 0.2s window.
        render(&mut engine, 250);
        assert_eq!(engine.sounding_voices(), 0);
    }

    #[test]
    fn stop_all_clears_everything() {
        let mut engine = test_engine();
        engine.trigger(440.0, a4());
        engine.trigger(220.0, NoteId::new(PitchClass::A, 3, 14));
        engine.stop_all();

        assert_eq!(engine.sounding_voices(), 0);
        assert!(engine.active_note_ids().is_empty());

        let mut out = vec![0.0f32; 64];
        engine.render_block(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn master_volume_scales_all_voices() {
        let mut engine = test_engine();
        engine.trigger(440.0, a4());
        let mut loud = vec![0.0f32; 64];
        engine.render_block(&mut loud);

        let mut engine = test_engine();
        engine.set_volume(0.5);
        engine.trigger(440.0, a4());
        let mut soft = vec![0.0f32; 64];
        engine.render_block(&mut soft);

        for (l, s) in loud.iter().zip(&soft) {
            assert!((l * 0.5 - s).abs() < 1e-6);
        }
    }

    #[test]
    fn messages_drive_the_same_paths() {
        let mut engine = test_engine();
        engine.apply(EngineMessage::Trigger {
            frequency: 440.0,
            id: a4(),
        });
        engine.apply(EngineMessage::SetVolume(0.4));
        assert_eq!(engine.sounding_voices(), 1);
        assert_eq!(engine.volume(), 0.4);

        engine.apply(EngineMessage::StopAll);
        assert_eq!(engine.sounding_voices(), 0);
    }
}
