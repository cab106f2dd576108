// Diatonic scale construction over the 88-key pitch vocabulary.
//
// Pitches are named with sharps-only spelling from A0 up to C8 and measured
// as absolute positions in semitones, with A0 at position 0. A scale is built
// by testing every chromatic position against a 12-slot interval pattern
// rotated to the tonic; positions matching a slot become scale elements,
// tagged with an incrementing scale-relative ordinal (position in degrees)
// and a cyclic scale degree (1-7).
//
// The scale is built once per piece and then range-filtered to the piece's
// pitch boundaries with `slice_scale`. Consumed by generate.rs to form the
// pitch pool the optimizer searches over.

use crate::error::{CompositionError, Result};
use serde::{Deserialize, Serialize};

/// Pitch class names in sharps-only spelling, indexed from C.
const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Number of pitches in the vocabulary (A0 through C8, a standard keyboard).
pub const N_POSITIONS: i32 = 88;

/// A pitch available to a piece: an element of a diatonic scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleElement {
    /// Note name, e.g. "C4" or "F#2".
    pub note: String,
    /// Absolute pitch height in semitones above A0.
    pub position_in_semitones: i32,
    /// Ordinal position within the scale, strictly increasing with pitch.
    pub position_in_degrees: i32,
    /// Scale degree, 1-7, cyclic across octaves.
    pub degree: u8,
}

/// Supported diatonic scale types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    Major,
    NaturalMinor,
    HarmonicMinor,
}

impl ScaleType {
    /// The 12-slot degree pattern starting from the tonic.
    /// `Some(d)` marks a chromatic slot belonging to the scale as degree `d`.
    fn pattern(self) -> [Option<u8>; 12] {
        match self {
            ScaleType::Major => [
                Some(1),
                None,
                Some(2),
                None,
                Some(3),
                Some(4),
                None,
                Some(5),
                None,
                Some(6),
                None,
                Some(7),
            ],
            ScaleType::NaturalMinor => [
                Some(1),
                None,
                Some(2),
                Some(3),
                None,
                Some(4),
                None,
                Some(5),
                Some(6),
                None,
                Some(7),
                None,
            ],
            ScaleType::HarmonicMinor => [
                Some(1),
                None,
                Some(2),
                Some(3),
                None,
                Some(4),
                None,
                Some(5),
                Some(6),
                None,
                None,
                Some(7),
            ],
        }
    }
}

/// Absolute position in semitones of a note name, with A0 at 0.
///
/// Rejects anything outside the A0..=C8 vocabulary or not spelled with
/// sharps (flats are not part of the vocabulary).
pub fn note_to_position(name: &str) -> Result<i32> {
    let unknown = || CompositionError::UnknownNote(name.to_string());
    let split = name.find(|c: char| c.is_ascii_digit()).ok_or_else(unknown)?;
    let (pc_name, octave_str) = name.split_at(split);
    let pc = PITCH_CLASS_NAMES
        .iter()
        .position(|n| *n == pc_name)
        .ok_or_else(unknown)? as i32;
    let octave: i32 = octave_str.parse().map_err(|_| unknown())?;
    // A0 is 9 semitones above a hypothetical C0.
    let position = octave * 12 + pc - 9;
    if (0..N_POSITIONS).contains(&position) {
        Ok(position)
    } else {
        Err(unknown())
    }
}

/// Note name of an absolute position in semitones (inverse of `note_to_position`).
pub fn position_to_note(position: i32) -> String {
    let semitones_above_c0 = position + 9;
    format!(
        "{}{}",
        PITCH_CLASS_NAMES[(semitones_above_c0 % 12) as usize],
        semitones_above_c0 / 12
    )
}

/// Build a diatonic scale over the full vocabulary, sorted by pitch.
///
/// Every chromatic position is tested against the scale pattern rotated to
/// the tonic; matching positions are kept with an incrementing ordinal.
/// Fails if the tonic pitch class is not in the vocabulary.
pub fn build_scale(tonic: &str, scale_type: ScaleType) -> Result<Vec<ScaleElement>> {
    let pattern = scale_type.pattern();
    let tonic_position = note_to_position(&format!("{tonic}1"))?;
    let mut elements = Vec::new();
    let mut position_in_degrees = 0;
    for position in 0..N_POSITIONS {
        let remainder = (position - tonic_position).rem_euclid(12);
        if let Some(degree) = pattern[remainder as usize] {
            elements.push(ScaleElement {
                note: position_to_note(position),
                position_in_semitones: position,
                position_in_degrees,
                degree,
            });
            position_in_degrees += 1;
        }
    }
    Ok(elements)
}

/// Keep only scale elements between two notes, inclusive on both ends.
pub fn slice_scale(
    scale: &[ScaleElement],
    lowest_note: &str,
    highest_note: &str,
) -> Result<Vec<ScaleElement>> {
    let min_position = note_to_position(lowest_note)?;
    let max_position = note_to_position(highest_note)?;
    Ok(scale
        .iter()
        .filter(|x| (min_position..=max_position).contains(&x.position_in_semitones))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_to_position() {
        assert_eq!(note_to_position("A0").unwrap(), 0);
        assert_eq!(note_to_position("C1").unwrap(), 3);
        assert_eq!(note_to_position("C4").unwrap(), 39);
        assert_eq!(note_to_position("A4").unwrap(), 48);
        assert_eq!(note_to_position("C8").unwrap(), 87);
    }

    #[test]
    fn test_unknown_notes_rejected() {
        for name in ["H2", "Db3", "C9", "G#0", "C", "4"] {
            assert!(
                matches!(note_to_position(name), Err(CompositionError::UnknownNote(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_position_roundtrip() {
        for position in 0..N_POSITIONS {
            let name = position_to_note(position);
            assert_eq!(note_to_position(&name).unwrap(), position);
        }
    }

    #[test]
    fn test_c_major_scale_start() {
        let scale = build_scale("C", ScaleType::Major).unwrap();
        let head: Vec<(i32, u8)> = scale
            .iter()
            .take(7)
            .map(|x| (x.position_in_semitones, x.degree))
            .collect();
        assert_eq!(
            head,
            vec![(0, 6), (2, 7), (3, 1), (5, 2), (7, 3), (8, 4), (10, 5)]
        );
    }

    #[test]
    fn test_c_natural_minor_scale_start() {
        let scale = build_scale("C", ScaleType::NaturalMinor).unwrap();
        let head: Vec<(i32, u8)> = scale
            .iter()
            .take(7)
            .map(|x| (x.position_in_semitones, x.degree))
            .collect();
        assert_eq!(
            head,
            vec![(1, 7), (3, 1), (5, 2), (6, 3), (8, 4), (10, 5), (11, 6)]
        );
    }

    #[test]
    fn test_ordinals_strictly_increasing() {
        let scale = build_scale("A", ScaleType::HarmonicMinor).unwrap();
        for pair in scale.windows(2) {
            assert!(pair[0].position_in_degrees + 1 == pair[1].position_in_degrees);
            assert!(pair[0].position_in_semitones < pair[1].position_in_semitones);
        }
    }

    #[test]
    fn test_slice_scale_inclusive() {
        let scale = build_scale("C", ScaleType::Major).unwrap();
        let sliced = slice_scale(&scale, "C4", "C5").unwrap();
        assert_eq!(sliced.first().unwrap().note, "C4");
        assert_eq!(sliced.last().unwrap().note, "C5");
        assert_eq!(sliced.len(), 8);
    }
}
