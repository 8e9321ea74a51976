use super::layout::Key;
use super::pitch::PitchClass;

/// Concert pitch: the frequency of the reference key.
pub const CONCERT_PITCH_HZ: f32 = 440.0;

/// Frequency of the key at `key_index` in `layout`.
///
/// The key marked as the reference sounds at [`CONCERT_PITCH_HZ`]; every
/// other index is tuned by its semitone distance from it. With no reference
/// key (or an empty layout) indices are read directly as semitones from
/// concert pitch.
///
/// This is pure arithmetic: `key_index` is not bounds-checked, and an
/// out-of-range index still yields a mathematically valid frequency.
pub fn frequency_of(key_index: i32, layout: &[Key]) -> f32 {
    let offset = layout
        .iter()
        .position(|key| key.reference)
        .map_or(0, |reference| -(reference as i32));
    let semitones = key_index + offset;
    CONCERT_PITCH_HZ * 2.0_f32.powf(semitones as f32 / 12.0)
}

/// Frequency of a pitch-class + octave pair, independent of any layout.
///
/// Used when a note arrives with no layout context, e.g. imported recordings
/// whose events lack a stored frequency.
pub fn pitch_frequency(note: PitchClass, octave: i32) -> f32 {
    let semitones = (octave - 4) * 12 + (note.semitone() - 9);
    CONCERT_PITCH_HZ * 2.0_f32.powf(semitones as f32 / 12.0)
}
