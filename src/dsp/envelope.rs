use crate::MIN_TIME;

/*
Strike Envelope
===============

Amplitude contour for a struck string: an instant peak, a fast drop to the
body level, then a long exponential ring-out to silence. There is no held
sustain stage - the key press schedules the whole contour up front and the
note decays on its own, which is why releasing a key does not cut the sound.

  Level
    1.0 ┤▚
        │ ▚
    0.5 ┤  ▚▄
        │     ▀▀▄▄
        │          ▀▀▀▄▄▄▄
    0.0 └──┬────────────────▄▄▄▄──→ Time
         strike        ring window
         (10ms)     (sustain + release)

Both stages are exponential: each sample multiplies the level by a
precomputed coefficient,

    coef = (target / start) ^ (1 / stage_samples)

so after stage_samples steps the level lands on target exactly. Exponential
ramps match how acoustic energy actually dissipates; linear ramps sound like
a fader, not a string.

The ring window aims at a -80 dB floor rather than zero (an exponential
never reaches zero). Crossing the floor, or exhausting the window, retires
the stage to Idle - that transition is what voice bookkeeping watches to
reclaim a slot.
*/

/// Duration of the strike transient.
const STRIKE_TIME: f32 = 0.01;

/// Level at the end of the strike, where the ring-out begins.
const STRIKE_LEVEL: f32 = 0.5;

/// -80 dB: the exponential's target, and the threshold below which a voice
/// counts as silent.
pub const SILENCE_FLOOR: f32 = 1.0e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    /// Producing nothing; the owning voice can be reclaimed.
    Idle,
    /// Initial transient, full level dropping to the body level.
    Strike,
    /// Ring-out from the body level down to the silence floor.
    Ring,
}

pub struct PluckEnvelope {
    stage: EnvelopeStage,
    level: f32,

    // Per-stage bookkeeping, precomputed at note-on.
    strike_coef: f32,
    ring_coef: f32,
    strike_remaining: u32,
    ring_remaining: u32,
}

impl PluckEnvelope {
    pub fn new() -> Self {
        Self {
            stage: EnvelopeStage::Idle,
            level: 0.0,
            strike_coef: 1.0,
            ring_coef: 1.0,
            strike_remaining: 0,
            ring_remaining: 0,
        }
    }

    /// Start the contour from the top.
    ///
    /// `ring_time` is the full window from strike to silence, in seconds.
    /// Retriggering an in-flight envelope restarts it cleanly.
    pub fn strike(&mut self, sample_rate: f32, ring_time: f32) {
        let strike_samples = (STRIKE_TIME * sample_rate).round().max(1.0);
        let ring_seconds = (ring_time - STRIKE_TIME).max(MIN_TIME);
        let ring_samples = (ring_seconds * sample_rate).round().max(1.0);

        self.level = 1.0;
        self.stage = EnvelopeStage::Strike;
        self.strike_coef = STRIKE_LEVEL.powf(1.0 / strike_samples);
        self.ring_coef = (SILENCE_FLOOR / STRIKE_LEVEL).powf(1.0 / ring_samples);
        self.strike_remaining = strike_samples as u32;
        self.ring_remaining = ring_samples as u32;
    }

    /// Advance one sample and return the new level.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }

            EnvelopeStage::Strike => {
                self.level *= self.strike_coef;
                self.strike_remaining -= 1;
                if self.strike_remaining == 0 {
                    self.level = STRIKE_LEVEL;
                    self.stage = EnvelopeStage::Ring;
                }
            }

            EnvelopeStage::Ring => {
                self.level *= self.ring_coef;
                self.ring_remaining = self.ring_remaining.saturating_sub(1);
                if self.ring_remaining == 0 || self.level <= SILENCE_FLOOR {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        self.level
    }

    /// Hard stop: drop to silence immediately.
    pub fn cut(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
    }

    /// True while the contour is producing output.
    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }
}

impl Default for PluckEnvelope {
    fn default() -> Self {
        Self::new()
    }
}
