use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the twelve chromatic pitch classes.
///
/// Serializes as the conventional sharp spelling (`"C#"`, `"A"`), which is
/// also the spelling used in exported recordings. Flat spellings are accepted
/// when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl PitchClass {
    /// All pitch classes in chromatic order, C first.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    /// Semitone index within the octave (C = 0 .. B = 11).
    pub fn semitone(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }

    /// Whether this pitch class lands on a black key of a piano.
    pub fn is_sharp(self) -> bool {
        matches!(
            self,
            PitchClass::Cs | PitchClass::Ds | PitchClass::Fs | PitchClass::Gs | PitchClass::As
        )
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = ParsePitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pitch = match s {
            "C" => PitchClass::C,
            "C#" | "Db" => PitchClass::Cs,
            "D" => PitchClass::D,
            "D#" | "Eb" => PitchClass::Ds,
            "E" => PitchClass::E,
            "F" => PitchClass::F,
            "F#" | "Gb" => PitchClass::Fs,
            "G" => PitchClass::G,
            "G#" | "Ab" => PitchClass::Gs,
            "A" => PitchClass::A,
            "A#" | "Bb" => PitchClass::As,
            "B" => PitchClass::B,
            _ => return Err(ParsePitchError(s.to_string())),
        };
        Ok(pitch)
    }
}

impl From<PitchClass> for String {
    fn from(pitch: PitchClass) -> Self {
        pitch.name().to_string()
    }
}

impl TryFrom<String> for PitchClass {
    type Error = ParsePitchError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The input was not a recognizable note name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePitchError(String);

impl fmt::Display for ParsePitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a note name: {:?}", self.0)
    }
}

impl std::error::Error for ParsePitchError {}
