//! # Musical Tuning Module
//!
//! Equal temperament note arithmetic referenced to A4 = 440 Hz.
//! It snaps measured frequencies to the nearest tempered note, converts note names
//! back to frequencies (the pitch tracker's search range is configured that way) and
//! measures intervals in cents.
//!
//! ## Features
//! - Nearest-note lookup over the full MIDI range, sharps only (`A#4`)
//! - Note name parsing with `#`/`♯` and `b`/`♭` accidentals
//! - Cent deviation calculations

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::error::ConfigError;

/// Reference frequency of A4 in Hz.
pub const A4_HZ: f64 = 440.0;

/// MIDI number of A4.
const A4_MIDI: i32 = 69;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Semitone offset of each natural pitch letter above C.
static LETTER_OFFSETS: Lazy<BTreeMap<char, i32>> = Lazy::new(|| {
    [('C', 0), ('D', 2), ('E', 4), ('F', 5), ('G', 7), ('A', 9), ('B', 11)]
        .into_iter()
        .collect()
});

/// A note of the twelve-tone equal tempered scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    /// Pitch class, 0 = C .. 11 = B.
    pub pitch_class: u8,
    /// Scientific octave number (A4 is octave 4).
    pub octave: i32,
}

impl Note {
    /// Builds the note `semitones` steps away from A4.
    pub fn from_a4_offset(semitones: i32) -> Self {
        let midi = A4_MIDI + semitones;
        Self {
            pitch_class: midi.rem_euclid(12) as u8,
            octave: midi.div_euclid(12) - 1,
        }
    }

    /// Signed distance from A4 in semitones.
    pub fn a4_offset(&self) -> i32 {
        (self.octave + 1) * 12 + self.pitch_class as i32 - A4_MIDI
    }

    /// Exact tempered frequency of this note.
    pub fn frequency(&self) -> f64 {
        A4_HZ * 2.0_f64.powf(self.a4_offset() as f64 / 12.0)
    }

    /// Note name such as `"A4"` or `"C#3"`.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NOTE_NAMES[self.pitch_class as usize], self.octave)
    }
}

/// The tempered note nearest to a measured frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteMatch {
    pub note: Note,
    /// Canonical frequency of `note` in Hz.
    pub frequency: f64,
}

/// Rounds a fractional semitone count to the nearest integer.
///
/// Ties go up: `0.5` becomes `1` and `-0.5` becomes `0`. Exact ties practically never
/// occur with measured audio, but they have to land on a fixed side.
pub fn nearest_semitone(semitones: f64) -> i32 {
    (semitones + 0.5).floor() as i32
}

/// Finds the closest equal tempered note to a given frequency.
///
/// The semitone distance from A4 is `12 * log2(freq / 440)`, snapped with
/// [`nearest_semitone`]; the returned frequency is that note's exact pitch, not an
/// interpolation.
///
/// # Arguments
/// * `freq` - Input frequency in Hz, must be finite and positive
///
/// # Returns
/// * The nearest note and its canonical frequency
pub fn find_nearest_note(freq: f64) -> NoteMatch {
    debug_assert!(freq.is_finite() && freq > 0.0, "frequency must be positive");
    let semitones = 12.0 * (freq / A4_HZ).log2();
    let note = Note::from_a4_offset(nearest_semitone(semitones));
    NoteMatch {
        note,
        frequency: note.frequency(),
    }
}

/// Parses a note name like `"C2"`, `"F#3"`, `"Bb-1"` or `"c♯7"`.
pub fn parse_note(name: &str) -> Result<Note, ConfigError> {
    let invalid = || ConfigError::InvalidNote(name.to_string());
    let mut chars = name.trim().chars().peekable();

    let letter = chars.next().ok_or_else(invalid)?.to_ascii_uppercase();
    let mut offset = *LETTER_OFFSETS.get(&letter).ok_or_else(invalid)?;

    while let Some(&c) = chars.peek() {
        match c {
            '#' | '♯' => offset += 1,
            'b' | '♭' => offset -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave: i32 = chars.collect::<String>().parse().map_err(|_| invalid())?;
    let midi = (octave + 1) * 12 + offset;
    Ok(Note::from_a4_offset(midi - A4_MIDI))
}

/// Frequency in Hz of a named note.
pub fn note_to_hz(name: &str) -> Result<f64, ConfigError> {
    parse_note(name).map(|note| note.frequency())
}

/// Calculates the interval between two frequencies in cents.
///
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate `freq` is sharp of `reference`
pub fn cents_between(freq: f64, reference: f64) -> f64 {
    1200.0 * (freq / reference).log2()
}
