//! Computer-keyboard bindings for the factory layout.
//!
//! The bindings cover the middle of the 46-key layout, F#3 through F#5,
//! arranged so the home row carries the naturals and the number row the
//! sharps - the same shape a two-row tracker keyboard uses.

use crossterm::event::KeyCode;

/// Layout index for a key event, if the event is a note key.
pub fn key_index(code: KeyCode) -> Option<usize> {
    match code {
        KeyCode::Tab => Some(12),       // G3
        KeyCode::Backspace => Some(35), // F#5
        KeyCode::Char(c) => char_index(c),
        _ => None,
    }
}

fn char_index(c: char) -> Option<usize> {
    let index = match c {
        '`' => 11, // F#3
        '1' => 13, // G#3
        'q' => 14, // A3
        '2' => 15, // A#3
        'w' => 16, // B3
        'e' => 17, // C4
        '4' => 18, // C#4
        'r' => 19, // D4
        '5' => 20, // D#4
        't' => 21, // E4
        'y' => 22, // F4
        '7' => 23, // F#4
        'u' => 24, // G4
        '8' => 25, // G#4
        'i' => 26, // A4
        '9' => 27, // A#4
        'o' => 28, // B4
        'p' => 29, // C5
        '-' => 30, // C#5
        '[' => 31, // D5
        '=' => 32, // D#5
        ']' => 33, // E5
        '\\' => 34, // F5
        _ => return None,
    };
    Some(index)
}
