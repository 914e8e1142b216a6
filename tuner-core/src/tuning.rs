//! # Musical Tuning Module
//!
//! This module converts between frequencies and positions in 12-tone equal
//! temperament. Every conversion is relative to a tuning reference, the
//! frequency assigned to A in octave 4 (concert A).
//!
//! ## Conventions
//! - Semitone 0 is A, 11 is G#. Octave numbers change at A, so octave 4
//!   starts at the reference itself.
//! - A frequency maps to the *nearest* semitone. The remaining deviation is
//!   reported in cents in the range `(-50, +50]`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TunerError, TunerResult};

/// Frequency of A4 used when the caller does not provide one.
pub const DEFAULT_CONCERT_A: f32 = 440.0;

/// Number of equal divisions of the octave.
pub const SEMITONES_PER_OCTAVE: u8 = 12;

/// Octave that contains the tuning reference.
pub const REFERENCE_OCTAVE: i32 = 4;

/// Widest octave range [`octave_table`] lists.
pub const MAX_TABLE_OCTAVES: i64 = 64;

/// Note names indexed by semitone, starting at A.
pub const NOTE_NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// A position in equal temperament: octave, semitone and the deviation
/// from that semitone in cents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Octave number; octave 4 contains the tuning reference.
    pub octave: i32,
    /// Semitone above A within the octave, always in `0..12`.
    pub semitone: u8,
    /// Deviation from the exact semitone, in `(-50, +50]`.
    pub cents: f32,
}

impl Note {
    /// Name of the note's semitone without the octave (e.g. "C#").
    pub fn name(&self) -> &'static str {
        NOTE_NAMES[self.semitone as usize % NOTE_NAMES.len()]
    }

    /// Frequency of the exact semitone this note is closest to.
    pub fn frequency(&self, tuning_reference: f32) -> TunerResult<f32> {
        note_to_frequency(self.octave, self.semitone, tuning_reference)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.octave)
    }
}

/// A note together with its exact frequency, as listed by [`octave_table`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteFrequency {
    pub note: Note,
    pub frequency: f32,
}

fn check_positive(name: &'static str, value: f32) -> TunerResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value as f64)
    } else {
        Err(TunerError::invalid_argument(
            name,
            format!("must be a positive finite frequency, got {value}"),
        ))
    }
}

/// Maps a frequency to the nearest note relative to `tuning_reference`.
///
/// # Arguments
/// * `freq` - Frequency in Hz, must be positive
/// * `tuning_reference` - Frequency of A4 in Hz, must be positive
///
/// # Returns
/// * `Ok(note)` - Nearest semitone with the remaining deviation in cents
/// * `Err(TunerError::InvalidArgument)` - Non-positive or non-finite input
pub fn frequency_to_note(freq: f32, tuning_reference: f32) -> TunerResult<Note> {
    let freq = check_positive("freq", freq)?;
    let reference = check_positive("tuning_reference", tuning_reference)?;

    let semitones = f64::from(SEMITONES_PER_OCTAVE) * (freq / reference).log2();
    let (nearest, cents) = split_semitones(semitones);

    let per_octave = i64::from(SEMITONES_PER_OCTAVE);
    // The f32 range keeps this within a few hundred octaves.
    let octave = (nearest.div_euclid(per_octave) + i64::from(REFERENCE_OCTAVE)) as i32;
    let semitone = nearest.rem_euclid(per_octave);

    Ok(Note {
        octave,
        semitone: semitone as u8,
        cents: cents as f32,
    })
}

/// Splits a continuous semitone offset into the nearest whole semitone and
/// the remainder in cents, in `(-50, +50]`.
fn split_semitones(semitones: f64) -> (i64, f64) {
    // Round half down: an exact half semitone stays below with +50 cents.
    let nearest = (semitones - 0.5).ceil();
    (nearest as i64, (semitones - nearest) * 100.0)
}

/// Returns the frequency of a semitone in the given octave.
///
/// # Arguments
/// * `octave` - Octave number (4 contains the reference A)
/// * `semitone` - Semitone above A, must be in `0..12`
/// * `tuning_reference` - Frequency of A4 in Hz, must be positive
///
/// Octaves whose frequency does not fit a positive finite `f32` (roughly
/// more than 120 octaves away from the reference) are rejected.
pub fn note_to_frequency(octave: i32, semitone: u8, tuning_reference: f32) -> TunerResult<f32> {
    if semitone >= SEMITONES_PER_OCTAVE {
        return Err(TunerError::invalid_argument(
            "semitone",
            format!("must be in 0..{SEMITONES_PER_OCTAVE}, got {semitone}"),
        ));
    }
    let reference = check_positive("tuning_reference", tuning_reference)?;

    let exponent = f64::from(octave) - f64::from(REFERENCE_OCTAVE)
        + f64::from(semitone) / f64::from(SEMITONES_PER_OCTAVE);
    let frequency = (reference * exponent.exp2()) as f32;
    if frequency.is_finite() && frequency > 0.0 {
        Ok(frequency)
    } else {
        Err(TunerError::invalid_argument(
            "octave",
            format!("octave {octave} is outside the representable frequency range"),
        ))
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values are flat. 100 cents make a
/// semitone and 1200 an octave.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> TunerResult<f32> {
    let freq = check_positive("freq", freq)?;
    let target = check_positive("target_freq", target_freq)?;
    Ok((1200.0 * (freq / target).log2()) as f32)
}

/// Lists every semitone of the octaves `start..=end`, followed by the A
/// that opens octave `end + 1`.
///
/// When `start > end` only the closing A is returned. Ranges spanning more
/// than [`MAX_TABLE_OCTAVES`] octaves are rejected.
pub fn octave_table(
    start: i32,
    end: i32,
    tuning_reference: f32,
) -> TunerResult<Vec<NoteFrequency>> {
    check_positive("tuning_reference", tuning_reference)?;

    let octaves = (i64::from(end) - i64::from(start) + 1).max(0);
    if octaves > MAX_TABLE_OCTAVES {
        return Err(TunerError::invalid_argument(
            "octave_end",
            format!("range {start}..={end} spans more than {MAX_TABLE_OCTAVES} octaves"),
        ));
    }
    let octaves = octaves as usize;
    let mut table = Vec::with_capacity(octaves * NOTE_NAMES.len() + 1);

    let notes = (start..=end)
        .flat_map(|octave| (0..SEMITONES_PER_OCTAVE).map(move |semitone| (octave, semitone)))
        .chain(std::iter::once((end.saturating_add(1), 0)));

    for (octave, semitone) in notes {
        let frequency = note_to_frequency(octave, semitone, tuning_reference)?;
        table.push(NoteFrequency {
            note: Note {
                octave,
                semitone,
                cents: 0.0,
            },
            frequency,
        });
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note(octave: i32, semitone: u8, cents: f32) -> Note {
        Note {
            octave,
            semitone,
            cents,
        }
    }

    #[test]
    fn test_reference_maps_to_itself() {
        assert_eq!(frequency_to_note(440.0, 440.0).unwrap(), note(4, 0, 0.0));
        assert_eq!(frequency_to_note(432.0, 432.0).unwrap(), note(4, 0, 0.0));
    }

    #[test]
    fn test_octave_up_and_down() {
        assert_eq!(frequency_to_note(880.0, 440.0).unwrap(), note(5, 0, 0.0));
        assert_eq!(frequency_to_note(220.0, 440.0).unwrap(), note(3, 0, 0.0));
        assert_eq!(frequency_to_note(27.5, 440.0).unwrap(), note(0, 0, 0.0));
    }

    #[test]
    fn test_below_reference_uses_true_modulo() {
        // The G# just below the reference belongs to octave 3.
        let g_sharp = frequency_to_note(415.3047, 440.0).unwrap();
        assert_eq!((g_sharp.octave, g_sharp.semitone), (3, 11));
        assert_eq!(g_sharp.name(), "G#");

        let c = frequency_to_note(261.6256, 440.0).unwrap();
        assert_eq!((c.octave, c.semitone), (3, 3));
        assert!(c.cents.abs() < 0.01);
    }

    #[test]
    fn test_cents_are_signed_around_nearest_semitone() {
        // 10 cents sharp of A4.
        let sharp = frequency_to_note(440.0 * 2f32.powf(10.0 / 1200.0), 440.0).unwrap();
        assert_eq!((sharp.octave, sharp.semitone), (4, 0));
        assert!((sharp.cents - 10.0).abs() < 1e-3);

        // 30 cents flat of A#4 rounds up to A#4, not down to A4.
        let flat = frequency_to_note(440.0 * 2f32.powf(70.0 / 1200.0), 440.0).unwrap();
        assert_eq!((flat.octave, flat.semitone), (4, 1));
        assert!((flat.cents + 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_carry_into_next_octave() {
        // 20 cents flat of A5 rolls over from G#4.
        let freq = 880.0 * 2f32.powf(-20.0 / 1200.0);
        let n = frequency_to_note(freq, 440.0).unwrap();
        assert_eq!((n.octave, n.semitone), (5, 0));
        assert!((n.cents + 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_half_semitone_stays_below() {
        assert_eq!(split_semitones(0.5), (0, 50.0));
        assert_eq!(split_semitones(-0.5), (-1, 50.0));
        assert_eq!(split_semitones(11.75), (12, -25.0));
        assert_eq!(split_semitones(-12.25), (-12, -25.0));
    }

    #[test]
    fn test_invalid_frequencies_rejected() {
        for freq in [0.0, -440.0, f32::NAN, f32::INFINITY] {
            let err = frequency_to_note(freq, 440.0).unwrap_err();
            assert!(err.is_invalid_argument(), "freq {freq} accepted");
        }
        assert!(frequency_to_note(440.0, 0.0).unwrap_err().is_invalid_argument());
        assert!(frequency_to_note(440.0, -1.0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_note_to_frequency() {
        assert_eq!(note_to_frequency(4, 0, 440.0).unwrap(), 440.0);
        assert_eq!(note_to_frequency(5, 0, 440.0).unwrap(), 880.0);
        assert_eq!(note_to_frequency(2, 0, 440.0).unwrap(), 110.0);
        let c = note_to_frequency(2, 3, 440.0).unwrap();
        assert!((c - 130.81279).abs() < 1e-3);
    }

    #[test]
    fn test_note_to_frequency_rejects_bad_input() {
        assert!(note_to_frequency(4, 12, 440.0).unwrap_err().is_invalid_argument());
        assert!(note_to_frequency(4, 0, 0.0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_note_to_frequency_rejects_unrepresentable_octaves() {
        for octave in [200, -200, i32::MAX, i32::MIN] {
            let err = note_to_frequency(octave, 0, 440.0).unwrap_err();
            assert!(err.is_invalid_argument(), "octave {octave} accepted");
        }
        // The widest octaves that still fit round-trip.
        for octave in [-100, 100] {
            let freq = note_to_frequency(octave, 0, 440.0).unwrap();
            let n = frequency_to_note(freq, 440.0).unwrap();
            assert_eq!((n.octave, n.semitone), (octave, 0));
        }
    }

    #[test]
    fn test_display_and_name() {
        assert_eq!(note(4, 0, 0.0).to_string(), "A4");
        assert_eq!(note(5, 4, 12.0).to_string(), "C#5");
        assert_eq!(note(-1, 11, 0.0).to_string(), "G#-1");
    }

    #[test]
    fn test_note_frequency_ignores_cents() {
        let n = note(4, 0, 25.0);
        assert_eq!(n.frequency(440.0).unwrap(), 440.0);
    }

    #[test]
    fn test_cents_deviation() {
        assert!((calculate_cents_deviation(880.0, 440.0).unwrap() - 1200.0).abs() < 1e-3);
        assert!((calculate_cents_deviation(440.0, 880.0).unwrap() + 1200.0).abs() < 1e-3);
        assert!(calculate_cents_deviation(0.0, 440.0).is_err());
    }

    #[test]
    fn test_octave_table_shape() {
        let table = octave_table(2, 3, 440.0).unwrap();
        assert_eq!(table.len(), 25);
        assert_eq!(table[0].note, note(2, 0, 0.0));
        assert_eq!(table[0].frequency, 110.0);
        assert_eq!(table[24].note, note(4, 0, 0.0));
        assert_eq!(table[24].frequency, 440.0);
        assert!(table.windows(2).all(|w| w[0].frequency < w[1].frequency));
    }

    #[test]
    fn test_octave_table_rejects_huge_range() {
        let err = octave_table(-1_000_000_000, 1_000_000_000, 440.0).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(octave_table(i32::MIN, i32::MAX, 440.0).is_err());

        let widest = octave_table(-30, 33, 440.0).unwrap();
        assert_eq!(widest.len(), 64 * 12 + 1);
    }

    #[test]
    fn test_octave_table_empty_range_keeps_closing_note() {
        let table = octave_table(5, 4, 440.0).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].note, note(5, 0, 0.0));
    }
}
