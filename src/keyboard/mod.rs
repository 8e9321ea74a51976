//! Key layouts and the mapping from keys to pitch.
//!
//! A keyboard is an ordered run of keys, one semitone apart, with a single
//! reference key pinned to concert pitch. Everything else about tuning falls
//! out of a key's distance from that reference.

/// Ordered key runs and key identity.
pub mod layout;
/// The twelve chromatic pitch classes.
pub mod pitch;
/// Equal-temperament frequency mapping.
pub mod tuning;

pub use layout::{default_layout, Key, NoteId};
pub use pitch::PitchClass;
pub use tuning::{frequency_of, pitch_frequency, CONCERT_PITCH_HZ};
