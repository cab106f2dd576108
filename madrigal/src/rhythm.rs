// Rhythm validation and random rhythm generation.
//
// A line's rhythm is a sequence of note durations in fractions of a whole
// measure. Validity is defined by a configured set of rhythmic patterns:
// every prefix of the measure in progress must prefix-match at least one
// pattern. Patterns may be longer than one measure to describe notes tied
// over the barline; the overhang is carried into the next measure.
//
// All admissible durations are multiples of 1/8 of a measure, so sums and
// comparisons are exact in f64.
//
// Violations are configuration errors and abort the run; a rhythm is never
// silently corrected. Consumed by generate.rs.

use crate::error::{CompositionError, Result};
use madrigal_prng::ComposerRng;
use serde::{Deserialize, Serialize};

/// Durations a randomly generated line may use, in fractions of a measure.
const ALL_DURATIONS: [f64; 4] = [0.125, 0.25, 0.5, 1.0];

/// Weight of one duration for random rhythm selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationWeight {
    pub duration: f64,
    pub weight: f64,
}

/// Advance the measure-in-progress tracker by one note.
///
/// Returns the durations of the unfinished measure after the note, empty if
/// the note closes the measure exactly, or the syncopated overhang if the
/// note ties over the barline.
pub fn update_measure_durations(current_measure_durations: &[f64], next_duration: f64) -> Vec<f64> {
    let measure = 1.0;
    let extended: f64 = current_measure_durations.iter().sum::<f64>() + next_duration;
    if extended < measure {
        let mut updated = current_measure_durations.to_vec();
        updated.push(next_duration);
        updated
    } else if extended == measure {
        Vec::new()
    } else {
        vec![extended - measure]
    }
}

/// Whether the durations of an unfinished measure prefix-match some pattern.
fn matches_some_pattern(extended: &[f64], valid_patterns: &[Vec<f64>]) -> bool {
    valid_patterns
        .iter()
        .any(|pattern| pattern.len() >= extended.len() && pattern[..extended.len()] == *extended)
}

/// Check that a line has the required total duration and only uses allowed
/// rhythmic patterns.
pub fn validate_line_durations(
    line_durations: &[f64],
    valid_patterns: &[Vec<f64>],
    n_measures: usize,
) -> Result<()> {
    let mut total_time = 0.0;
    let mut current_measure_durations: Vec<f64> = Vec::new();
    for &duration in line_durations {
        let mut extended = current_measure_durations.clone();
        extended.push(duration);
        if !matches_some_pattern(&extended, valid_patterns) {
            return Err(CompositionError::InvalidRhythm(extended));
        }
        total_time += duration;
        current_measure_durations = update_measure_durations(&current_measure_durations, duration);
    }
    if total_time != n_measures as f64 {
        return Err(CompositionError::WrongTotalDuration {
            actual: total_time,
            expected: n_measures as f64,
        });
    }
    Ok(())
}

/// All durations that may continue the rhythm one note ahead.
fn appropriate_durations(
    current_time: f64,
    total_time: f64,
    current_measure_durations: &[f64],
    valid_patterns: &[Vec<f64>],
) -> Vec<f64> {
    let mut appropriate = Vec::new();
    for &duration in &ALL_DURATIONS {
        if current_time + duration > total_time {
            continue;
        }
        let mut extended = current_measure_durations.to_vec();
        extended.push(duration);
        if matches_some_pattern(&extended, valid_patterns) {
            appropriate.push(duration);
        }
    }
    appropriate
}

/// Generate a random rhythm for one line.
///
/// Draws durations weighted by `duration_weights` among the continuations
/// admitted by the pattern set. With `end_with_whole_note` the line is
/// guaranteed to close on a whole note.
pub fn generate_line_durations(
    n_measures: usize,
    duration_weights: &[DurationWeight],
    valid_patterns: &[Vec<f64>],
    end_with_whole_note: bool,
    rng: &mut ComposerRng,
) -> Result<Vec<f64>> {
    let total_time = n_measures as f64 - if end_with_whole_note { 1.0 } else { 0.0 };
    let mut current_time = 0.0;
    let mut line_durations = Vec::new();
    let mut current_measure_durations: Vec<f64> = Vec::new();

    while current_time < total_time {
        let options = appropriate_durations(
            current_time,
            total_time,
            &current_measure_durations,
            valid_patterns,
        );
        if options.is_empty() {
            return Err(CompositionError::RhythmDeadEnd(current_time));
        }
        let weights = options
            .iter()
            .map(|duration| weight_of(*duration, duration_weights))
            .collect::<Result<Vec<f64>>>()?;
        if weights.iter().all(|w| *w <= 0.0) {
            return Err(CompositionError::RhythmDeadEnd(current_time));
        }
        let duration = options[rng.choose_weighted(&weights)];
        current_time += duration;
        current_measure_durations = update_measure_durations(&current_measure_durations, duration);
        line_durations.push(duration);
    }

    if end_with_whole_note {
        line_durations.push(1.0);
    }
    Ok(line_durations)
}

/// Weight configured for a duration; a duration admissible by the patterns
/// but absent from the weights table is a misconfiguration.
fn weight_of(duration: f64, duration_weights: &[DurationWeight]) -> Result<f64> {
    duration_weights
        .iter()
        .find(|w| w.duration == duration)
        .map(|w| w.weight)
        .ok_or(CompositionError::MissingTableEntry {
            table: "duration_weights",
            key: duration.to_string(),
        })
}
