use std::fmt;

use super::pitch::PitchClass;

/// One key in a keyboard layout.
///
/// Layouts are ordered runs of keys, each one semitone above the previous.
/// That contiguity is assumed, not checked; a layout that violates it will
/// map to frequencies that do not match its labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub note: PitchClass,
    pub octave: i32,
    /// Marks the key tuned to concert pitch. At most one per layout.
    pub reference: bool,
}

impl Key {
    pub const fn new(note: PitchClass, octave: i32) -> Self {
        Self {
            note,
            octave,
            reference: false,
        }
    }

    /// A key carrying the reference-pitch mark.
    pub const fn reference(note: PitchClass, octave: i32) -> Self {
        Self {
            note,
            octave,
            reference: true,
        }
    }
}

/// Identity of one physical key instance.
///
/// This is what voices are bookkept under: not a pitch, but a particular key.
/// Two keys in a layout may carry the same note and octave, so the layout
/// position is part of the identity. The whole thing is `Copy` so control
/// messages never allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteId {
    pub pitch: PitchClass,
    pub octave: i32,
    /// Position of the key in its layout, or [`NoteId::REPLAY_SLOT`] for
    /// notes replayed from a recording.
    pub key: u16,
}

impl NoteId {
    /// Slot outside any real layout. Replayed notes use it so they never
    /// collide with live key bookkeeping.
    pub const REPLAY_SLOT: u16 = u16::MAX;

    pub fn new(pitch: PitchClass, octave: i32, key: u16) -> Self {
        Self { pitch, octave, key }
    }

    /// Identity of the key at `index` in a layout.
    pub fn for_key(key: &Key, index: usize) -> Self {
        Self {
            pitch: key.note,
            octave: key.octave,
            key: index as u16,
        }
    }

    /// Identity for a replayed note, which carries pitch but no layout
    /// position.
    pub fn for_pitch(pitch: PitchClass, octave: i32) -> Self {
        Self {
            pitch,
            octave,
            key: Self::REPLAY_SLOT,
        }
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{}", self.pitch, self.octave, self.key)
    }
}

/// The 46-key factory layout, G2 through E6, tuned around A4.
pub fn default_layout() -> Vec<Key> {
    use PitchClass::*;

    let mut keys = Vec::with_capacity(46);
    // Tail of octave 2.
    for note in [G, Gs, A, As, B] {
        keys.push(Key::new(note, 2));
    }
    for octave in 3..=5 {
        for note in PitchClass::ALL {
            keys.push(Key::new(note, octave));
        }
    }
    // Head of octave 6.
    for note in [C, Cs, D, Ds, E] {
        keys.push(Key::new(note, 6));
    }

    let a4 = keys
        .iter()
        .position(|k| k.note == A && k.octave == 4)
        .unwrap_or(0);
    keys[a4].reference = true;
    keys
}
