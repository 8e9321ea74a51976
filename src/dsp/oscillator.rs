use std::f32::consts::TAU;

/*
Harmonic Oscillator
===================

A single-waveform sound source: the fundamental plus a small fixed set of
harmonic partials, summed from one phase accumulator.

  partial n:  sin(n · 2π · phase) · 1/n²

The 1/n² rolloff keeps the overtones audible but soft, which reads as a
struck or plucked string rather than the hollow purity of a sine or the buzz
of a full sawtooth series. Four partials is enough for that character; more
would only add energy near Nyquist at high notes.

The phase accumulator runs in cycles [0, 1), advanced by frequency/sample_rate
per sample, and is shared by all partials, so the partials stay phase-locked
the way a real string's modes do.
*/

/// Harmonic partials as (multiple, weight) pairs, 1/n² rolloff.
const PARTIALS: [(f32, f32); 4] = [(1.0, 1.0), (2.0, 0.25), (3.0, 1.0 / 9.0), (4.0, 0.0625)];

/// Normalization so the summed partials peak at or below 1.0.
const NORM: f32 = 1.0 / (1.0 + 0.25 + 1.0 / 9.0 + 0.0625);

pub struct HarmonicOscillator {
    /// Current position in the cycle, [0, 1).
    phase: f32,
}

impl HarmonicOscillator {
    pub fn new() -> Self {
        Self { phase: 0.0 }
    }

    /// Restart the cycle. Called at note-on so every strike begins at the
    /// same point in the waveform.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Produce the next sample at `frequency` and advance the phase.
    #[inline]
    pub fn next_sample(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let mut sum = 0.0;
        for (multiple, weight) in PARTIALS {
            sum += (TAU * self.phase * multiple).sin() * weight;
        }

        self.phase += frequency / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sum * NORM
    }

    /// Fill a block of samples at a fixed frequency.
    pub fn render(&mut self, out: &mut [f32], frequency: f32, sample_rate: f32) {
        for sample in out.iter_mut() {
            *sample = self.next_sample(frequency, sample_rate);
        }
    }
}

impl Default for HarmonicOscillator {
    fn default() -> Self {
        Self::new()
    }
}
