use crate::dsp::{HarmonicOscillator, PluckEnvelope};
use crate::keyboard::NoteId;

/// One slot in the engine's voice arena.
///
/// A slot cycles between free and sounding. While sounding it renders its
/// oscillator through its envelope; when the envelope goes idle the slot
/// frees itself on the next render. The `bound` flag is the engine-side
/// bookkeeping bit: a released key unbinds its voices but lets them ring.
pub struct Voice {
    id: Option<NoteId>,
    frequency: f32,
    osc: HarmonicOscillator,
    env: PluckEnvelope,
    age: u64,
    bound: bool,
}

impl Voice {
    pub fn idle() -> Self {
        Self {
            id: None,
            frequency: 0.0,
            osc: HarmonicOscillator::new(),
            env: PluckEnvelope::new(),
            age: 0,
            bound: false,
        }
    }

    pub fn start(&mut self, id: NoteId, frequency: f32, sample_rate: f32, ring_time: f32, age: u64) {
        self.id = Some(id);
        self.frequency = frequency;
        self.age = age;
        self.bound = true;
        self.osc.reset();
        self.env.strike(sample_rate, ring_time);
    }

    /// Mix this voice into `out`. Frees the slot once the envelope finishes.
    pub fn render_add(&mut self, out: &mut [f32], sample_rate: f32) {
        if self.id.is_none() {
            return;
        }

        for sample in out.iter_mut() {
            let level = self.env.next_sample();
            *sample += self.osc.next_sample(self.frequency, sample_rate) * level;
        }

        if !self.env.is_active() {
            self.free();
        }
    }

    /// Hard-stop and free the slot.
    pub fn stop(&mut self) {
        self.env.cut();
        self.free();
    }

    fn free(&mut self) {
        self.id = None;
        self.bound = false;
    }

    pub fn is_free(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_sounding(&self) -> bool {
        self.id.is_some()
    }

    /// Drop bookkeeping membership without touching the sound.
    pub fn unbind(&mut self) {
        self.bound = false;
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn id(&self) -> Option<NoteId> {
        self.id
    }

    pub fn age(&self) -> u64 {
        self.age
    }
}
