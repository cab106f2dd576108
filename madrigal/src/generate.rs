// Random piece generation from validated parameters.
//
// Builds the initial piece the optimizer starts from: validates the rhythm
// arguments, generates missing rhythms at random, builds and slices the
// scale into the pitch pool, fills each line with uniformly random pitches,
// and derives the sonorities. The returned piece always satisfies the model
// invariants (per-line durations sum to `n_measures`, sonorities aligned to
// the sorted distinct onset set); violations in the parameters surface as
// configuration errors before any piece is built.
//
// The quality of the random draft is irrelevant (the search replaces
// essentially every pitch) but its rhythm is fixed for the whole run.

use crate::error::{CompositionError, Result};
use crate::piece::{Piece, PieceElement, PositionOverride};
use crate::rhythm::{DurationWeight, generate_line_durations, validate_line_durations};
use crate::scale::{ScaleType, build_scale, slice_scale};
use madrigal_prng::ComposerRng;
use serde::{Deserialize, Serialize};

/// Parameters defining a piece to be generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PieceParams {
    /// Tonic pitch class, e.g. "C" or "A#".
    pub tonic: String,
    pub scale_type: ScaleType,
    /// Lowest available note (inclusive), e.g. "G3".
    pub lowest_note: String,
    /// Highest available note (inclusive), e.g. "G5".
    pub highest_note: String,
    pub n_measures: usize,
    /// All valid ways to split a measure into note durations; durations of
    /// notes tied over the barline are included without clipping.
    pub valid_rhythmic_patterns: Vec<Vec<f64>>,
    /// Note durations per line; `None` entries are generated at random.
    pub lines_durations: Vec<Option<Vec<f64>>>,
    /// Weights for random duration selection; required if any line's
    /// durations are omitted.
    #[serde(default)]
    pub duration_weights: Vec<DurationWeight>,
    /// Position-type overrides keyed by exact onset time.
    #[serde(default)]
    pub custom_position_types: Vec<PositionOverride>,
}

/// Check that the rhythm arguments can produce a valid piece.
fn validate_rhythm_arguments(params: &PieceParams) -> Result<()> {
    let any_missing = params.lines_durations.iter().any(|x| x.is_none());
    if any_missing && params.duration_weights.is_empty() {
        return Err(CompositionError::MissingDurationWeights);
    }
    for line_durations in params.lines_durations.iter().flatten() {
        validate_line_durations(
            line_durations,
            &params.valid_rhythmic_patterns,
            params.n_measures,
        )?;
    }
    Ok(())
}

/// Generate a random piece satisfying the model invariants.
pub fn generate_random_piece(params: &PieceParams, rng: &mut ComposerRng) -> Result<Piece> {
    validate_rhythm_arguments(params)?;

    let mut lines_durations = Vec::with_capacity(params.lines_durations.len());
    for line_durations in &params.lines_durations {
        match line_durations {
            Some(durations) => lines_durations.push(durations.clone()),
            None => lines_durations.push(generate_line_durations(
                params.n_measures,
                &params.duration_weights,
                &params.valid_rhythmic_patterns,
                true,
                rng,
            )?),
        }
    }

    let scale = build_scale(&params.tonic, params.scale_type)?;
    let pitches = slice_scale(&scale, &params.lowest_note, &params.highest_note)?;
    if pitches.is_empty() {
        return Err(CompositionError::EmptyPitchRange {
            lowest: params.lowest_note.clone(),
            highest: params.highest_note.clone(),
        });
    }

    let mut melodic_lines = Vec::with_capacity(lines_durations.len());
    for line_durations in &lines_durations {
        let mut line = Vec::with_capacity(line_durations.len());
        let mut current_time = 0.0;
        for &duration in line_durations {
            let pitch = rng.choose(&pitches);
            line.push(PieceElement::from_scale(pitch, current_time, duration));
            current_time += duration;
        }
        melodic_lines.push(line);
    }

    Ok(Piece::new(
        params.n_measures,
        pitches,
        melodic_lines,
        params.custom_position_types.clone(),
    ))
}
