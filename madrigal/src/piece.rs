// The piece model: the central representation for composition.
//
// A piece holds independent melodic lines (per-voice ordered note sequences)
// and derives "sonorities", the set of notes simultaneously sounding at each
// distinct onset time across all lines. Sonorities are a computed view over
// the melodic lines, never cached state: whenever a pitch changes, the whole
// sonority sequence is rebuilt from scratch. This makes re-derivation
// deterministic and rules out staleness between lines and their vertical
// slices.
//
// All times are measured in fractions of a whole measure, so the admissible
// durations (multiples of 1/8) are exactly representable as f64 and onset
// comparisons can use plain equality.
//
// The piece is the "source of truth" throughout optimization. MIDI output is
// derived from it, never the other way around.

use crate::scale::ScaleElement;
use serde::{Deserialize, Serialize};

/// One note instance in a melodic line.
///
/// Immutable value: the optimizer replaces elements wholesale rather than
/// mutating pitch fields in place, always preserving start time and duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceElement {
    /// Note name, e.g. "C4".
    pub note: String,
    /// Absolute pitch height in semitones above A0.
    pub position_in_semitones: i32,
    /// Ordinal position within the scale.
    pub position_in_degrees: i32,
    /// Scale degree, 1-7.
    pub degree: u8,
    /// Onset time in fractions of a measure from the piece start.
    pub start_time: f64,
    /// Duration in fractions of a measure.
    pub duration: f64,
}

impl PieceElement {
    /// Build an element from a scale pitch, keeping the given timing.
    pub fn from_scale(pitch: &ScaleElement, start_time: f64, duration: f64) -> Self {
        PieceElement {
            note: pitch.note.clone(),
            position_in_semitones: pitch.position_in_semitones,
            position_in_degrees: pitch.position_in_degrees,
            degree: pitch.degree,
            start_time,
            duration,
        }
    }
}

/// The metric position of a sonority's onset within the piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionType {
    /// The first onset of the piece.
    Beginning,
    /// The last onset of the piece.
    Ending,
    /// Onset exactly on a barline (fractional part 0).
    Downbeat,
    /// Onset exactly at mid-measure (fractional part 0.5).
    Middle,
    /// Any other onset.
    Other,
    /// A caller-supplied tag overriding the metric default.
    Custom(String),
}

impl PositionType {
    /// Parse a label from configuration. Known labels map to the core
    /// variants; anything else becomes a custom tag.
    pub fn from_label(label: &str) -> Self {
        match label {
            "beginning" => PositionType::Beginning,
            "ending" => PositionType::Ending,
            "downbeat" => PositionType::Downbeat,
            "middle" => PositionType::Middle,
            "other" => PositionType::Other,
            _ => PositionType::Custom(label.to_string()),
        }
    }

    /// The label used to index position-type-keyed tables.
    pub fn as_label(&self) -> &str {
        match self {
            PositionType::Beginning => "beginning",
            PositionType::Ending => "ending",
            PositionType::Downbeat => "downbeat",
            PositionType::Middle => "middle",
            PositionType::Other => "other",
            PositionType::Custom(label) => label,
        }
    }
}

/// A caller-supplied position-type override for one exact onset time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionOverride {
    /// Onset time the override applies to (exact match).
    pub time: f64,
    /// Replacement label for that onset.
    pub label: String,
}

/// Index of a sonority's element within its melodic line.
///
/// The ending sonority uses `Last` for every line: after the final onset no
/// new note starts, so "the last element" is the only meaningful reference
/// and no element lookup by onset is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SonorityIndex {
    At(usize),
    Last,
}

impl SonorityIndex {
    /// Resolve to a concrete index within a line of the given length.
    pub fn resolve(self, line_len: usize) -> usize {
        match self {
            SonorityIndex::At(index) => index,
            SonorityIndex::Last => line_len - 1,
        }
    }
}

/// Simultaneously sounding pitches at one onset time, one per melodic line.
#[derive(Debug, Clone, PartialEq)]
pub struct Sonority {
    /// The sounding element from each line, in line declaration order.
    pub elements: Vec<PieceElement>,
    /// Index of each element within its line.
    pub indices: Vec<SonorityIndex>,
    /// Metric position tag of this onset.
    pub position_type: PositionType,
}

/// A polyphonic piece over a diatonic scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    /// Total duration in measures.
    pub n_measures: usize,
    /// The pool of pitches available to the optimizer, sorted by pitch.
    pub pitches: Vec<ScaleElement>,
    /// Per-voice ordered note sequences.
    pub melodic_lines: Vec<Vec<PieceElement>>,
    /// Derived vertical view: one sonority per distinct onset time.
    pub sonorities: Vec<Sonority>,
    /// Position-type overrides, kept so re-derivation preserves them.
    position_overrides: Vec<PositionOverride>,
}

impl Piece {
    /// Assemble a piece from its melodic lines, deriving the sonorities.
    pub fn new(
        n_measures: usize,
        pitches: Vec<ScaleElement>,
        melodic_lines: Vec<Vec<PieceElement>>,
        position_overrides: Vec<PositionOverride>,
    ) -> Self {
        let sonorities = find_sonorities(&melodic_lines, &position_overrides);
        Piece {
            n_measures,
            pitches,
            melodic_lines,
            sonorities,
            position_overrides,
        }
    }

    /// Number of voices (melodic lines).
    pub fn n_voices(&self) -> usize {
        self.melodic_lines.len()
    }

    /// Replace the pitches of one sonority, propagating the change into every
    /// melodic line at the corresponding note index.
    ///
    /// Each targeted element is replaced wholesale with a new one carrying
    /// the old start time and duration; all other elements are untouched.
    /// Sonorities are then re-derived in full.
    ///
    /// Panics if `new_pitches` does not supply one pitch per line (caller bug).
    pub fn set_sonority(&mut self, position: usize, new_pitches: &[ScaleElement]) {
        assert_eq!(
            new_pitches.len(),
            self.melodic_lines.len(),
            "set_sonority: one pitch per melodic line required"
        );
        let indices = self.sonorities[position].indices.clone();
        for ((line, index), pitch) in self
            .melodic_lines
            .iter_mut()
            .zip(indices)
            .zip(new_pitches.iter())
        {
            let target = index.resolve(line.len());
            let old = &line[target];
            line[target] = PieceElement::from_scale(pitch, old.start_time, old.duration);
        }
        self.sonorities = find_sonorities(&self.melodic_lines, &self.position_overrides);
    }
}

/// The sounding element of each line at the given per-line indices.
fn elements_by_indices(
    melodic_lines: &[Vec<PieceElement>],
    indices: &[SonorityIndex],
) -> Vec<PieceElement> {
    melodic_lines
        .iter()
        .zip(indices.iter())
        .map(|(line, index)| line[index.resolve(line.len())].clone())
        .collect()
}

/// Metric position type of an interior onset: the onset's offset within its
/// measure selects downbeat (0), middle (0.5), or other; a caller override
/// for the exact onset time takes precedence.
fn position_type_at(onset: f64, overrides: &[PositionOverride]) -> PositionType {
    if let Some(custom) = overrides.iter().find(|o| o.time == onset) {
        return PositionType::from_label(&custom.label);
    }
    let offset = onset - onset.floor();
    if offset == 0.0 {
        PositionType::Downbeat
    } else if offset == 0.5 {
        PositionType::Middle
    } else {
        PositionType::Other
    }
}

/// Align melodic lines into sonorities: one per distinct onset time.
///
/// The first onset always yields the `Beginning` sonority (index 0 in every
/// line) and the last always yields `Ending` (`Last` in every line); interior
/// onsets advance each line's index monotonically to the most recently
/// started note at or before the onset. Pure function of its inputs:
/// re-running on unchanged lines yields identical sonorities.
pub fn find_sonorities(
    melodic_lines: &[Vec<PieceElement>],
    overrides: &[PositionOverride],
) -> Vec<Sonority> {
    let mut onsets: Vec<f64> = melodic_lines
        .iter()
        .flat_map(|line| line.iter().map(|x| x.start_time))
        .collect();
    onsets.sort_by(f64::total_cmp);
    onsets.dedup();

    let mut indices = vec![SonorityIndex::At(0); melodic_lines.len()];
    let mut sonorities = vec![Sonority {
        elements: elements_by_indices(melodic_lines, &indices),
        indices: indices.clone(),
        position_type: PositionType::Beginning,
    }];

    for &onset in onsets.iter().skip(1).take(onsets.len().saturating_sub(2)) {
        for (index, line) in indices.iter_mut().zip(melodic_lines.iter()) {
            let mut current = index.resolve(line.len());
            while current + 1 < line.len() && line[current + 1].start_time <= onset {
                current += 1;
            }
            *index = SonorityIndex::At(current);
        }
        sonorities.push(Sonority {
            elements: elements_by_indices(melodic_lines, &indices),
            indices: indices.clone(),
            position_type: position_type_at(onset, overrides),
        });
    }

    let last_indices = vec![SonorityIndex::Last; melodic_lines.len()];
    sonorities.push(Sonority {
        elements: elements_by_indices(melodic_lines, &last_indices),
        indices: last_indices,
        position_type: PositionType::Ending,
    });
    sonorities
}
