//! Console formatting for note lookups and capture reports.

use serde::Serialize;
use tuner_core::{Note, NoteFrequency};

/// A note lookup as printed by `tuner note --json`.
#[derive(Debug, Serialize)]
pub struct NoteReport {
    pub frequency: f32,
    pub concert_a: f32,
    pub name: String,
    #[serde(flatten)]
    pub note: Note,
}

impl NoteReport {
    pub fn new(frequency: f32, concert_a: f32, note: Note) -> Self {
        Self {
            frequency,
            concert_a,
            name: note.to_string(),
            note,
        }
    }
}

/// `Frequency 440.00: octave 4 (0) A   +0.0 cents`
pub fn note_line(frequency: f32, note: &Note) -> String {
    format!(
        "Frequency {:.2}: octave {} ({}) {:<2} {:+6.1} cents",
        frequency,
        note.octave,
        note.semitone,
        note.name(),
        note.cents
    )
}

/// `2: C  130.812790 (relative semitone: 3)`
///
/// `detected` is the note the entry's frequency converts back to.
pub fn table_line(entry: &NoteFrequency, detected: &Note) -> String {
    format!(
        "{}: {:<2} {:8.6} (relative semitone: {})",
        entry.note.octave,
        entry.note.name(),
        entry.frequency,
        detected.semitone
    )
}

/// `count: 44032`
pub fn count_line(frames: u64) -> String {
    format!("count: {frames}")
}
