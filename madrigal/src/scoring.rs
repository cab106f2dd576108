// Evaluation engine: a battery of independent scoring functions.
//
// Each scoring function consumes the piece plus its own parameter bundle and
// returns a bounded score (typically within [-1, 0] or [-1, 1]); `evaluate`
// multiplies each by a configured weight and sums the contributions into the
// scalar objective the optimizer maximizes. Scoring never mutates the piece:
// the whole pipeline is a pure function of the piece and its parameters, so
// consecutive candidate evaluations cannot leak state into each other.
//
// Functions are dispatched by name through a registry so the battery is
// configurable: coefficients select and weight functions, parameter bundles
// arrive as raw JSON and are deserialized per function. A name missing from
// the registry, or a table entry missing during scoring, is a lookup error
// that propagates unmodified; a misconfigured battery must not be scored.
//
// Consumed by vns.rs for candidate evaluation.

use crate::error::{CompositionError, Result};
use crate::piece::{Piece, PieceElement};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const N_SEMITONES_PER_OCTAVE: i32 = 12;

/// Scale degrees arranged by thirds; tertian sonorities occupy one
/// contiguous arc of this circle.
const CIRCLE_OF_THIRDS: [u8; 7] = [1, 3, 5, 7, 2, 4, 6];

/// Weights and parameter bundles selecting the scoring battery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSettings {
    /// Scoring function name -> weight of its contribution.
    pub scoring_coefs: BTreeMap<String, f64>,
    /// Scoring function name -> its parameters; omitted entries mean
    /// defaults.
    #[serde(default)]
    pub scoring_fn_params: BTreeMap<String, serde_json::Value>,
}

// ── Per-function parameter bundles ──

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LargeIntervalsParams {
    /// Maximum allowed harmonic interval between adjacent voices, semitones.
    pub max_n_semitones: i32,
}

impl Default for LargeIntervalsParams {
    fn default() -> Self {
        LargeIntervalsParams { max_n_semitones: 16 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrowRangesParams {
    /// Range width (scale degrees) -> penalty for windows no wider than it.
    pub penalties: BTreeMap<i32, f64>,
    /// Rolling window size in line elements.
    pub range_size: usize,
}

impl Default for NarrowRangesParams {
    fn default() -> Self {
        NarrowRangesParams {
            penalties: BTreeMap::new(),
            range_size: 9,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelIntervalsParams {
    /// Interval size in scale degrees -> penalty for moving in parallel.
    pub n_degrees_to_penalty: BTreeMap<i32, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConjunctMotionParams {
    /// Leap penalty deducted once per melodic line before clipping.
    pub penalty_deduction_per_line: f64,
    /// Melodic interval in semitones -> penalty; unlisted intervals cost 1.0.
    pub n_semitones_to_penalty: BTreeMap<i32, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonicStabilityParams {
    /// Position-type label -> (minimum, maximum) acceptable stability.
    pub stability_ranges: BTreeMap<String, (f64, f64)>,
    /// Interval size in semitones (mod 12) -> harmonic stability in [0, 1].
    pub n_semitones_to_stability: BTreeMap<i32, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TonalStabilityParams {
    /// Position-type label -> (minimum, maximum) acceptable stability.
    pub stability_ranges: BTreeMap<String, (f64, f64)>,
    /// Scale degree -> tonal stability in [0, 1].
    pub degree_to_stability: BTreeMap<u8, f64>,
}

// ── Scoring functions ──

/// Penalize sonorities whose adjacent-by-declaration voices are separated by
/// more than the configured number of semitones.
///
/// Returns the fraction of offending sonorities, negated; within [-1, 0].
pub fn evaluate_absence_of_large_intervals(piece: &Piece, params: &LargeIntervalsParams) -> f64 {
    let mut score = 0.0;
    for sonority in &piece.sonorities {
        let too_wide = sonority.elements.windows(2).any(|pair| {
            (pair[1].position_in_semitones - pair[0].position_in_semitones).abs()
                > params.max_n_semitones
        });
        if too_wide {
            score -= 1.0;
        }
    }
    score / piece.sonorities.len() as f64
}

/// Penalize melodic lines stalling within narrow pitch ranges.
///
/// For each rolling window of `range_size` elements, the widest applicable
/// penalty from the table is charged; averaged over lines.
pub fn evaluate_absence_of_narrow_ranges(piece: &Piece, params: &NarrowRangesParams) -> f64 {
    let mut score = 0.0;
    for line in &piece.melodic_lines {
        let ordinals: Vec<i32> = line.iter().map(|x| x.position_in_degrees).collect();
        if params.range_size == 0 || ordinals.len() < params.range_size {
            continue;
        }
        for window in ordinals.windows(params.range_size) {
            let lowest = window.iter().copied().fold(i32::MAX, i32::min);
            let highest = window.iter().copied().fold(i32::MIN, i32::max);
            let width = highest - lowest;
            let penalty = params
                .penalties
                .iter()
                .filter(|(threshold, _)| **threshold >= width)
                .map(|(_, penalty)| *penalty)
                .fold(0.0, f64::max);
            score -= penalty;
        }
    }
    score / piece.melodic_lines.len() as f64
}

/// Penalize true parallel motion: consecutive sonorities where an adjacent
/// voice pair keeps the same degree interval while both voices move to
/// different notes. Held unisons are not parallel motion.
pub fn evaluate_absence_of_parallel_intervals(
    piece: &Piece,
    params: &ParallelIntervalsParams,
) -> f64 {
    // Per sonority: (lower element index, upper element index, interval in
    // degrees) for each adjacent voice pair. Indices are resolved so the
    // ending sonority's `Last` compares equal to an explicit final index.
    let intervals: Vec<Vec<(usize, usize, i32)>> = piece
        .sonorities
        .iter()
        .map(|sonority| {
            (0..sonority.elements.len().saturating_sub(1))
                .map(|voice| {
                    let lower = sonority.indices[voice]
                        .resolve(piece.melodic_lines[voice].len());
                    let upper = sonority.indices[voice + 1]
                        .resolve(piece.melodic_lines[voice + 1].len());
                    let n_degrees = sonority.elements[voice + 1].position_in_degrees
                        - sonority.elements[voice].position_in_degrees;
                    (lower, upper, n_degrees)
                })
                .collect()
        })
        .collect();

    let mut score = 0.0;
    for pair in intervals.windows(2) {
        for (first, second) in pair[0].iter().zip(pair[1].iter()) {
            let same_interval = first.2 == second.2;
            let lower_moved = first.0 != second.0;
            let upper_moved = first.1 != second.1;
            if same_interval && lower_moved && upper_moved {
                score -= params.n_degrees_to_penalty.get(&first.2).copied().unwrap_or(0.0);
            }
        }
    }
    score / (piece.sonorities.len() - 1) as f64
}

/// Penalize sonorities whose voices, in declaration order, are not
/// non-decreasing in pitch height.
///
/// Returns the fraction of offending sonorities, negated; within [-1, 0].
pub fn evaluate_absence_of_voice_crossing(piece: &Piece) -> f64 {
    let mut score = 0.0;
    for sonority in &piece.sonorities {
        let crossed = sonority
            .elements
            .windows(2)
            .any(|pair| pair[0].position_in_semitones > pair[1].position_in_semitones);
        if crossed {
            score -= 1.0;
        }
    }
    score / piece.sonorities.len() as f64
}

/// Reward coherent melodic lines that move almost without leaps.
///
/// Per line, melodic intervals accumulate penalties from the table (1.0 for
/// unlisted sizes), less a per-line deduction, clipped at 0, normalized by
/// the line's interval count; averaged over voices. Within [-1, 0].
pub fn evaluate_conjunct_motion(piece: &Piece, params: &ConjunctMotionParams) -> f64 {
    let mut score = 0.0;
    for line in &piece.melodic_lines {
        if line.len() < 2 {
            continue;
        }
        let mut line_score = 0.0;
        for pair in line.windows(2) {
            let interval = (pair[1].position_in_semitones - pair[0].position_in_semitones).abs();
            line_score -= params
                .n_semitones_to_penalty
                .get(&interval)
                .copied()
                .unwrap_or(1.0);
        }
        line_score = (line_score + params.penalty_deduction_per_line).min(0.0);
        line_score /= (line.len() - 1) as f64;
        score += line_score;
    }
    score / piece.melodic_lines.len() as f64
}

/// Penalize sonorities not built from thirds.
///
/// A sonority is tertian when its active scale degrees occupy one contiguous
/// arc of the circle of thirds: comparing the membership ring against
/// itself rotated by one yields at most two changes. Within [-1, 0].
pub fn evaluate_dominance_of_tertian_harmony(piece: &Piece) -> f64 {
    let mut score = 0.0;
    for sonority in &piece.sonorities {
        let degrees: Vec<u8> = sonority.elements.iter().map(|x| x.degree).collect();
        let active: Vec<bool> = CIRCLE_OF_THIRDS
            .iter()
            .map(|degree| degrees.contains(degree))
            .collect();
        let n_changes = (0..active.len())
            .filter(|&i| active[i] != active[(i + active.len() - 1) % active.len()])
            .count();
        if n_changes > 2 {
            score -= 1.0;
        }
    }
    score / piece.sonorities.len() as f64
}

/// Average pairwise-interval stability of a sonority, from a semitone table.
fn harmonic_stability_of_sonority(
    elements: &[PieceElement],
    n_semitones_to_stability: &BTreeMap<i32, f64>,
) -> Result<f64> {
    let mut stability = 0.0;
    let mut n_pairs = 0;
    for (i, first) in elements.iter().enumerate() {
        for second in &elements[i + 1..] {
            let interval = (first.position_in_semitones - second.position_in_semitones).abs()
                % N_SEMITONES_PER_OCTAVE;
            stability += n_semitones_to_stability.get(&interval).ok_or(
                CompositionError::MissingTableEntry {
                    table: "n_semitones_to_stability",
                    key: interval.to_string(),
                },
            )?;
            n_pairs += 1;
        }
    }
    if n_pairs == 0 {
        return Ok(0.0);
    }
    Ok(stability / n_pairs as f64)
}

/// Acceptable stability band for a sonority's position type.
fn stability_band(
    stability_ranges: &BTreeMap<String, (f64, f64)>,
    label: &str,
) -> Result<(f64, f64)> {
    stability_ranges
        .get(label)
        .copied()
        .ok_or(CompositionError::MissingTableEntry {
            table: "stability_ranges",
            key: label.to_string(),
        })
}

/// Penalize deviation of harmonic stability from its position-typed band.
///
/// Only deviations outside [min, max] are charged: shortfall below the
/// minimum and excess above the maximum, each clipped at 0. Within [-1, 0]
/// for stability tables bounded by [0, 1].
pub fn evaluate_harmonic_stability(piece: &Piece, params: &HarmonicStabilityParams) -> Result<f64> {
    let mut score = 0.0;
    for sonority in &piece.sonorities {
        let stability =
            harmonic_stability_of_sonority(&sonority.elements, &params.n_semitones_to_stability)?;
        let (min_stability, max_stability) =
            stability_band(&params.stability_ranges, sonority.position_type.as_label())?;
        score += (stability - min_stability).min(0.0);
        score += (max_stability - stability).min(0.0);
    }
    Ok(score / piece.sonorities.len() as f64)
}

/// Average per-pitch scale-degree stability of a sonority.
fn tonal_stability_of_sonority(
    elements: &[PieceElement],
    degree_to_stability: &BTreeMap<u8, f64>,
) -> Result<f64> {
    let mut stability = 0.0;
    for element in elements {
        stability += degree_to_stability.get(&element.degree).ok_or(
            CompositionError::MissingTableEntry {
                table: "degree_to_stability",
                key: element.degree.to_string(),
            },
        )?;
    }
    Ok(stability / elements.len() as f64)
}

/// Penalize deviation of tonal stability from its position-typed band.
/// Same banding discipline as `evaluate_harmonic_stability`. Within [-1, 0].
pub fn evaluate_tonal_stability(piece: &Piece, params: &TonalStabilityParams) -> Result<f64> {
    let mut score = 0.0;
    for sonority in &piece.sonorities {
        let stability =
            tonal_stability_of_sonority(&sonority.elements, &params.degree_to_stability)?;
        let (min_stability, max_stability) =
            stability_band(&params.stability_ranges, sonority.position_type.as_label())?;
        score += (stability - min_stability).min(0.0);
        score += (max_stability - stability).min(0.0);
    }
    Ok(score / piece.sonorities.len() as f64)
}

// ── Registry and weighted evaluation ──

fn parse_params<T: DeserializeOwned>(name: &str, params: serde_json::Value) -> Result<T> {
    serde_json::from_value(params).map_err(|source| CompositionError::InvalidScoringParams {
        name: name.to_string(),
        source,
    })
}

/// Apply one scoring function by registry name.
fn apply_scoring_function(name: &str, piece: &Piece, params: serde_json::Value) -> Result<f64> {
    match name {
        "absence_of_large_intervals" => {
            let params: LargeIntervalsParams = parse_params(name, params)?;
            Ok(evaluate_absence_of_large_intervals(piece, &params))
        }
        "absence_of_narrow_ranges" => {
            let params: NarrowRangesParams = parse_params(name, params)?;
            Ok(evaluate_absence_of_narrow_ranges(piece, &params))
        }
        "absence_of_parallel_intervals" => {
            let params: ParallelIntervalsParams = parse_params(name, params)?;
            Ok(evaluate_absence_of_parallel_intervals(piece, &params))
        }
        "absence_of_voice_crossing" => Ok(evaluate_absence_of_voice_crossing(piece)),
        "conjunct_motion" => {
            let params: ConjunctMotionParams = parse_params(name, params)?;
            Ok(evaluate_conjunct_motion(piece, &params))
        }
        "dominance_of_tertian_harmony" => Ok(evaluate_dominance_of_tertian_harmony(piece)),
        "harmonic_stability" => {
            let params: HarmonicStabilityParams = parse_params(name, params)?;
            evaluate_harmonic_stability(piece, &params)
        }
        "tonal_stability" => {
            let params: TonalStabilityParams = parse_params(name, params)?;
            evaluate_tonal_stability(piece, &params)
        }
        _ => Err(CompositionError::UnknownScoringFunction(name.to_string())),
    }
}

/// Evaluate a piece: the weighted sum of all configured scoring functions.
///
/// With `verbose`, each function's weighted contribution is printed, a
/// diagnostic side channel with no influence on the returned value.
pub fn evaluate(piece: &Piece, settings: &EvaluationSettings, verbose: bool) -> Result<f64> {
    let mut score = 0.0;
    for (name, weight) in &settings.scoring_coefs {
        let params = settings
            .scoring_fn_params
            .get(name)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));
        let contribution = weight * apply_scoring_function(name, piece, params)?;
        if verbose {
            println!("{name:>32}: {contribution:.5}");
        }
        score += contribution;
    }
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::Piece;
    use crate::scale::{ScaleElement, ScaleType, build_scale, slice_scale};

    fn element(
        note: &str,
        semitones: i32,
        degrees: i32,
        degree: u8,
        start: f64,
        dur: f64,
    ) -> PieceElement {
        PieceElement {
            note: note.to_string(),
            position_in_semitones: semitones,
            position_in_degrees: degrees,
            degree,
            start_time: start,
            duration: dur,
        }
    }

    /// The 2-measure, 2-voice fixture: C4 D4 E4 F4 over G4 C5.
    fn fixture_piece() -> Piece {
        let scale = build_scale("C", ScaleType::Major).unwrap();
        let pitches = slice_scale(&scale, "C4", "C5").unwrap();
        let lines = vec![
            vec![
                element("C4", 39, 23, 1, 0.0, 0.5),
                element("D4", 41, 24, 2, 0.5, 0.5),
                element("E4", 43, 25, 3, 1.0, 0.5),
                element("F4", 44, 26, 4, 1.5, 0.5),
            ],
            vec![
                element("G4", 46, 27, 5, 0.0, 1.0),
                element("C5", 51, 30, 1, 1.0, 1.0),
            ],
        ];
        Piece::new(2, pitches, lines, Vec::new())
    }

    fn stability_ranges() -> BTreeMap<String, (f64, f64)> {
        [
            ("beginning", (0.8, 1.0)),
            ("ending", (0.9, 1.0)),
            ("downbeat", (0.75, 1.0)),
            ("middle", (0.5, 0.9)),
            ("other", (0.25, 0.8)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    fn semitone_stability() -> BTreeMap<i32, f64> {
        [
            (0, 1.0),
            (1, 0.2),
            (2, 0.2),
            (3, 0.7),
            (4, 0.8),
            (5, 0.5),
            (6, 0.0),
            (7, 0.9),
            (8, 0.6),
            (9, 0.6),
            (10, 0.2),
            (11, 0.2),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_no_voice_crossing_scores_zero() {
        let piece = fixture_piece();
        assert_eq!(evaluate_absence_of_voice_crossing(&piece), 0.0);
    }

    #[test]
    fn test_voice_crossing_exact_penalty() {
        let mut piece = fixture_piece();
        // Push the lower-declared voice above the upper at sonority 1 only:
        // A4 (48) against the held G4 (46).
        let a4 = ScaleElement {
            note: "A4".to_string(),
            position_in_semitones: 48,
            position_in_degrees: 28,
            degree: 6,
        };
        let g4 = ScaleElement {
            note: "G4".to_string(),
            position_in_semitones: 46,
            position_in_degrees: 27,
            degree: 5,
        };
        piece.set_sonority(1, &[a4, g4]);
        // set_sonority rewrote line 1's first note to G4 as well, so only
        // sonority 1 (A4 over G4) is crossed.
        let n = piece.sonorities.len() as f64;
        assert_eq!(evaluate_absence_of_voice_crossing(&piece), -1.0 / n);
    }

    #[test]
    fn test_large_intervals_detected() {
        let piece = fixture_piece();
        // Widest harmonic interval in the fixture is C4-C5 = 12 semitones.
        let lenient = LargeIntervalsParams { max_n_semitones: 16 };
        assert_eq!(evaluate_absence_of_large_intervals(&piece, &lenient), 0.0);
        let strict = LargeIntervalsParams { max_n_semitones: 5 };
        // C4+G4 (7), D4+G4 (5), E4+C5 (8), F4+C5 (7): three sonorities exceed 5.
        assert_eq!(
            evaluate_absence_of_large_intervals(&piece, &strict),
            -3.0 / 4.0
        );
    }

    #[test]
    fn test_narrow_ranges_penalized() {
        let line: Vec<PieceElement> = (0..8)
            .map(|i| element("C4", 39, 23, 1, i as f64 * 0.25, 0.25))
            .collect();
        let wide_line: Vec<PieceElement> = (0..8)
            .map(|i| element("C4", 39, 23 + i, 1, i as f64 * 0.25, 0.25))
            .collect();
        let scale = build_scale("C", ScaleType::Major).unwrap();
        let pitches = slice_scale(&scale, "C4", "C5").unwrap();
        let piece = Piece::new(2, pitches, vec![line, wide_line], Vec::new());

        let params = NarrowRangesParams {
            penalties: [(1, 1.0), (2, 0.5)].into_iter().collect(),
            range_size: 4,
        };
        // First line: five windows of width 0, each charged max(1.0, 0.5).
        // Second line: windows of width 3, no applicable penalty.
        let score = evaluate_absence_of_narrow_ranges(&piece, &params);
        assert_eq!(score, -5.0 / 2.0);
    }

    #[test]
    fn test_parallel_intervals_penalized() {
        let scale = build_scale("C", ScaleType::Major).unwrap();
        let pitches = slice_scale(&scale, "C4", "C5").unwrap();
        // Both voices step up together keeping a two-degree interval.
        let lines = vec![
            vec![
                element("C4", 39, 23, 1, 0.0, 0.5),
                element("D4", 41, 24, 2, 0.5, 0.5),
            ],
            vec![
                element("E4", 43, 25, 3, 0.0, 0.5),
                element("F4", 44, 26, 4, 0.5, 0.5),
            ],
        ];
        let piece = Piece::new(1, pitches, lines, Vec::new());
        let params = ParallelIntervalsParams {
            n_degrees_to_penalty: [(2, 1.0)].into_iter().collect(),
        };
        assert_eq!(
            evaluate_absence_of_parallel_intervals(&piece, &params),
            -1.0
        );
    }

    #[test]
    fn test_held_voice_is_not_parallel_motion() {
        // A repeated C4 against a held G4 keeps the same 4-degree interval
        // across both sonorities, but the upper voice never moves.
        let scale = build_scale("C", ScaleType::Major).unwrap();
        let pitches = slice_scale(&scale, "C4", "C5").unwrap();
        let lines = vec![
            vec![
                element("C4", 39, 23, 1, 0.0, 0.5),
                element("C4", 39, 23, 1, 0.5, 0.5),
            ],
            vec![element("G4", 46, 27, 5, 0.0, 1.0)],
        ];
        let piece = Piece::new(1, pitches, lines, Vec::new());
        let params = ParallelIntervalsParams {
            n_degrees_to_penalty: [(4, 1.0)].into_iter().collect(),
        };
        assert_eq!(
            evaluate_absence_of_parallel_intervals(&piece, &params),
            0.0
        );
    }

    #[test]
    fn test_conjunct_motion_prefers_steps() {
        let piece = fixture_piece();
        let params = ConjunctMotionParams {
            penalty_deduction_per_line: 0.0,
            n_semitones_to_penalty: [(1, 0.0), (2, 0.0), (3, 0.1), (4, 0.2), (5, 0.3)]
                .into_iter()
                .collect(),
        };
        // Line 0 moves by 2,2,1 semitones (all free); line 1 leaps 5 (0.3).
        // Line scores: 0.0 and -0.3/1; average over 2 voices.
        let score = evaluate_conjunct_motion(&piece, &params);
        assert!((score - (-0.15)).abs() < 1e-12, "got {score}");
    }

    #[test]
    fn test_conjunct_motion_is_bounded() {
        let piece = fixture_piece();
        // Empty table: every interval costs 1.0; the score cannot drop
        // below -1 per voice after normalization.
        let params = ConjunctMotionParams::default();
        let score = evaluate_conjunct_motion(&piece, &params);
        assert!((-1.0..=0.0).contains(&score), "got {score}");
    }

    #[test]
    fn test_tertian_harmony_contiguous_arc() {
        let piece = fixture_piece();
        // Degrees per sonority: {1,5} (C+G: arc 1-3-5 edge count 2, but
        // membership ring 1,5 -> 1,0,1,0,0,0,0 has 4 changes), {2,5}, {3,1},
        // {4,1}. Only E4+C5 ({1,3}) forms a contiguous arc.
        let score = evaluate_dominance_of_tertian_harmony(&piece);
        assert_eq!(score, -3.0 / 4.0);
    }

    #[test]
    fn test_harmonic_stability_bounded() {
        let piece = fixture_piece();
        let params = HarmonicStabilityParams {
            stability_ranges: stability_ranges(),
            n_semitones_to_stability: semitone_stability(),
        };
        let score = evaluate_harmonic_stability(&piece, &params).unwrap();
        assert!((-1.0..=0.0).contains(&score), "got {score}");
    }

    #[test]
    fn test_harmonic_stability_missing_entry_is_lookup_error() {
        let piece = fixture_piece();
        let mut table = semitone_stability();
        table.remove(&7);
        let params = HarmonicStabilityParams {
            stability_ranges: stability_ranges(),
            n_semitones_to_stability: table,
        };
        let err = evaluate_harmonic_stability(&piece, &params).unwrap_err();
        assert!(matches!(err, CompositionError::MissingTableEntry { .. }));
    }

    #[test]
    fn test_tonal_stability_exact_value() {
        let piece = fixture_piece();
        let params = TonalStabilityParams {
            stability_ranges: stability_ranges(),
            degree_to_stability: [
                (1, 1.0),
                (2, 0.4),
                (3, 0.7),
                (4, 0.4),
                (5, 0.8),
                (6, 0.4),
                (7, 0.2),
            ]
            .into_iter()
            .collect(),
        };
        // Sonority stabilities: (1.0+0.8)/2 = 0.9, (0.4+0.8)/2 = 0.6,
        // (0.7+1.0)/2 = 0.85, (0.4+1.0)/2 = 0.7.
        // Bands: beginning [0.8,1.0] ok; middle [0.5,0.9] ok;
        // downbeat [0.75,1.0] ok; ending [0.9,1.0] shortfall -0.2.
        let score = evaluate_tonal_stability(&piece, &params).unwrap();
        assert!((score - (-0.2 / 4.0)).abs() < 1e-12, "got {score}");
    }

    #[test]
    fn test_evaluate_weighted_sum_and_defaults() {
        let piece = fixture_piece();
        let settings = EvaluationSettings {
            scoring_coefs: [
                ("absence_of_voice_crossing".to_string(), 2.0),
                ("absence_of_large_intervals".to_string(), 1.0),
            ]
            .into_iter()
            .collect(),
            scoring_fn_params: BTreeMap::new(),
        };
        // Both functions score 0 on the fixture with default parameters.
        assert_eq!(evaluate(&piece, &settings, false).unwrap(), 0.0);
    }

    #[test]
    fn test_evaluate_unknown_function_is_lookup_error() {
        let piece = fixture_piece();
        let settings = EvaluationSettings {
            scoring_coefs: [("absence_of_tritones".to_string(), 1.0)].into_iter().collect(),
            scoring_fn_params: BTreeMap::new(),
        };
        let err = evaluate(&piece, &settings, false).unwrap_err();
        assert!(matches!(err, CompositionError::UnknownScoringFunction(_)));
    }

    #[test]
    fn test_evaluate_does_not_mutate_piece() {
        let piece = fixture_piece();
        let before = piece.clone();
        let settings = EvaluationSettings {
            scoring_coefs: [
                ("absence_of_voice_crossing".to_string(), 1.0),
                ("dominance_of_tertian_harmony".to_string(), 1.0),
                ("conjunct_motion".to_string(), 1.0),
            ]
            .into_iter()
            .collect(),
            scoring_fn_params: BTreeMap::new(),
        };
        let first = evaluate(&piece, &settings, false).unwrap();
        let second = evaluate(&piece, &settings, false).unwrap();
        assert_eq!(first, second);
        assert_eq!(piece, before);
    }
}
