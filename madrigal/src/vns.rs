// Variable neighborhood search over the sonorities of a piece.
//
// Takes a generated draft piece and iteratively improves it. Each pass runs a
// best-improvement local search left to right over sonority positions: for
// each position, all size-n_voices pitch combinations from the pitch pool
// form the neighborhood, a Bernoulli subsample bounds its size, and the best
// strictly improving candidate (if any) is committed before moving right.
// When a pass stalls, the search has reached a local optimum and is shaken:
// each sonority is independently replaced, with some probability, by a
// uniformly random pitch combination. The pass count is fixed; the best piece
// ever seen is returned.
//
// The search carries three named slots: `best` (best ever seen), `previous`
// (end of the prior pass) and `current` (working piece). Candidates are
// scored on full deep copies, so no evaluation can leak state into the next.
//
// Depends on scoring.rs for candidate evaluation and piece.rs for the
// sonority mutation primitive.

use crate::error::{CompositionError, Result};
use crate::piece::Piece;
use crate::scale::ScaleElement;
use crate::scoring::{EvaluationSettings, evaluate};
use itertools::Itertools;
use madrigal_prng::ComposerRng;
use serde::{Deserialize, Serialize};

/// Search configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VnsSettings {
    /// Number of passes over the piece.
    pub n_passes: usize,
    /// Probability of trying each neighborhood candidate.
    pub fraction_to_try: f64,
    /// Per-sonority probability of randomization when shaking.
    pub perturbation_probability: f64,
}

impl Default for VnsSettings {
    fn default() -> Self {
        VnsSettings {
            n_passes: 10,
            fraction_to_try: 0.5,
            perturbation_probability: 0.25,
        }
    }
}

/// A piece together with its score.
#[derive(Debug, Clone)]
struct Candidate {
    piece: Piece,
    score: f64,
}

/// The three slots carried across passes. `best` and `current` are always
/// independent deep copies; committing to one never aliases the other.
#[derive(Debug, Clone)]
struct SearchState {
    best: Candidate,
    previous: Candidate,
    current: Candidate,
}

/// Result of a search run.
#[derive(Debug)]
pub struct VnsResult {
    /// The best piece seen across all passes.
    pub piece: Piece,
    /// Its score.
    pub score: f64,
    pub evaluations: usize,
    pub improvements: usize,
    pub perturbations: usize,
}

/// A uniformly random size-`n` pitch combination, sorted by pitch height.
fn random_combination(pool: &[ScaleElement], n: usize, rng: &mut ComposerRng) -> Vec<ScaleElement> {
    let mut indices: Vec<usize> = (0..pool.len()).collect();
    for i in 0..n {
        let j = rng.range_usize(i, indices.len());
        indices.swap(i, j);
    }
    let mut chosen = indices[..n].to_vec();
    // The pool is sorted by pitch, so sorted indices mean sorted pitches.
    chosen.sort_unstable();
    chosen.into_iter().map(|i| pool[i].clone()).collect()
}

/// Shake a stalled piece: independently replace each sonority, with the
/// given probability, by a random pitch combination. A pure diversification
/// move, never re-optimized in place.
fn perturb(piece: &mut Piece, pool: &[ScaleElement], probability: f64, rng: &mut ComposerRng) {
    let n_voices = piece.n_voices();
    for position in 0..piece.sonorities.len() {
        if rng.random_bool(probability) {
            let pitches = random_combination(pool, n_voices, rng);
            piece.set_sonority(position, &pitches);
        }
    }
}

/// Run variable neighborhood search on a piece.
///
/// Consumes the draft and returns the best piece found along with run
/// statistics. Fails fast when the pitch pool cannot even seat all voices,
/// since every neighborhood would then be empty and the draft would be
/// returned unchanged while masquerading as optimal.
pub fn run_variable_neighborhood_search(
    piece: Piece,
    evaluation: &EvaluationSettings,
    settings: &VnsSettings,
    rng: &mut ComposerRng,
) -> Result<VnsResult> {
    let n_voices = piece.n_voices();
    let n_pitches = piece.pitches.len();
    if n_pitches < n_voices {
        return Err(CompositionError::DegenerateNeighborhood { n_voices, n_pitches });
    }

    let pool = piece.pitches.clone();
    let score = evaluate(&piece, evaluation, false)?;
    let mut evaluations = 1;
    let mut improvements = 0;
    let mut perturbations = 0;

    let initial = Candidate { piece, score };
    let mut state = SearchState {
        best: initial.clone(),
        previous: initial.clone(),
        current: initial,
    };

    for _ in 0..settings.n_passes {
        state.previous = state.current.clone();

        for position in 0..state.current.piece.sonorities.len() {
            let mut best_candidate: Option<(Vec<ScaleElement>, f64)> = None;
            let mut tried_any = false;

            for combination in pool.iter().cloned().combinations(n_voices) {
                if !rng.random_bool(settings.fraction_to_try) {
                    continue;
                }
                tried_any = true;
                let mut candidate_piece = state.current.piece.clone();
                candidate_piece.set_sonority(position, &combination);
                let candidate_score = evaluate(&candidate_piece, evaluation, false)?;
                evaluations += 1;
                let incumbent = best_candidate
                    .as_ref()
                    .map_or(state.current.score, |(_, s)| *s);
                if candidate_score > incumbent {
                    best_candidate = Some((combination, candidate_score));
                }
            }

            if !tried_any {
                // The subsample came out empty; try one random combination
                // so every position sees at least one candidate.
                let combination = random_combination(&pool, n_voices, rng);
                let mut candidate_piece = state.current.piece.clone();
                candidate_piece.set_sonority(position, &combination);
                let candidate_score = evaluate(&candidate_piece, evaluation, false)?;
                evaluations += 1;
                if candidate_score > state.current.score {
                    best_candidate = Some((combination, candidate_score));
                }
            }

            if let Some((pitches, candidate_score)) = best_candidate {
                state.current.piece.set_sonority(position, &pitches);
                state.current.score = candidate_score;
                improvements += 1;
            }
        }

        if state.current.score > state.best.score {
            state.best = state.current.clone();
        } else if state.current.score <= state.previous.score {
            // Local optimum reached: shake and continue from the result.
            perturb(
                &mut state.current.piece,
                &pool,
                settings.perturbation_probability,
                rng,
            );
            state.current.score = evaluate(&state.current.piece, evaluation, false)?;
            evaluations += 1;
            perturbations += 1;
        }
    }

    Ok(VnsResult {
        piece: state.best.piece,
        score: state.best.score,
        evaluations,
        improvements,
        perturbations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{PieceParams, generate_random_piece};
    use crate::scale::ScaleType;
    use std::collections::BTreeMap;

    fn fixture_params() -> PieceParams {
        PieceParams {
            tonic: "C".to_string(),
            scale_type: ScaleType::Major,
            lowest_note: "C4".to_string(),
            highest_note: "C5".to_string(),
            n_measures: 2,
            valid_rhythmic_patterns: vec![vec![0.5, 0.5], vec![1.0]],
            lines_durations: vec![
                Some(vec![0.5, 0.5, 0.5, 0.5]),
                Some(vec![1.0, 1.0]),
            ],
            duration_weights: Vec::new(),
            custom_position_types: Vec::new(),
        }
    }

    fn fixture_evaluation() -> EvaluationSettings {
        EvaluationSettings {
            scoring_coefs: [
                ("absence_of_voice_crossing".to_string(), 1.0),
                ("dominance_of_tertian_harmony".to_string(), 1.0),
                ("conjunct_motion".to_string(), 0.5),
            ]
            .into_iter()
            .collect(),
            scoring_fn_params: BTreeMap::new(),
        }
    }

    #[test]
    fn test_search_never_regresses_below_draft() {
        let mut rng = ComposerRng::new(42);
        let piece = generate_random_piece(&fixture_params(), &mut rng).unwrap();
        let evaluation = fixture_evaluation();
        let draft_score = evaluate(&piece, &evaluation, false).unwrap();

        let settings = VnsSettings {
            n_passes: 3,
            fraction_to_try: 0.25,
            perturbation_probability: 0.5,
        };
        let result =
            run_variable_neighborhood_search(piece, &evaluation, &settings, &mut rng).unwrap();

        assert!(
            result.score >= draft_score,
            "best score {} regressed below draft score {draft_score}",
            result.score
        );
        assert!(result.evaluations > 0);
        // The returned score must match the returned piece.
        let rescored = evaluate(&result.piece, &evaluation, false).unwrap();
        assert_eq!(result.score, rescored);
    }

    #[test]
    fn test_search_is_reproducible_under_fixed_seed() {
        let evaluation = fixture_evaluation();
        let settings = VnsSettings {
            n_passes: 2,
            ..Default::default()
        };

        let run = |seed: u64| {
            let mut rng = ComposerRng::new(seed);
            let piece = generate_random_piece(&fixture_params(), &mut rng).unwrap();
            run_variable_neighborhood_search(piece, &evaluation, &settings, &mut rng).unwrap()
        };
        let first = run(7);
        let second = run(7);
        assert_eq!(first.score, second.score);
        assert_eq!(first.piece, second.piece);
        assert_eq!(first.evaluations, second.evaluations);
    }

    #[test]
    fn test_search_preserves_rhythm() {
        let mut rng = ComposerRng::new(3);
        let piece = generate_random_piece(&fixture_params(), &mut rng).unwrap();
        let timings: Vec<Vec<(f64, f64)>> = piece
            .melodic_lines
            .iter()
            .map(|line| line.iter().map(|x| (x.start_time, x.duration)).collect())
            .collect();

        let evaluation = fixture_evaluation();
        let settings = VnsSettings {
            n_passes: 2,
            fraction_to_try: 0.25,
            perturbation_probability: 1.0,
        };
        let result =
            run_variable_neighborhood_search(piece, &evaluation, &settings, &mut rng).unwrap();

        let after: Vec<Vec<(f64, f64)>> = result
            .piece
            .melodic_lines
            .iter()
            .map(|line| line.iter().map(|x| (x.start_time, x.duration)).collect())
            .collect();
        assert_eq!(timings, after);
    }

    #[test]
    fn test_degenerate_pitch_pool_fails_fast() {
        let mut params = fixture_params();
        // A one-note pool cannot seat two voices.
        params.highest_note = "C4".to_string();
        let mut rng = ComposerRng::new(1);
        let piece = generate_random_piece(&params, &mut rng).unwrap();
        let err = run_variable_neighborhood_search(
            piece,
            &fixture_evaluation(),
            &VnsSettings::default(),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompositionError::DegenerateNeighborhood {
                n_voices: 2,
                n_pitches: 1,
            }
        ));
    }

    #[test]
    fn test_random_combination_is_sorted_and_distinct() {
        let mut rng = ComposerRng::new(11);
        let params = fixture_params();
        let piece = generate_random_piece(&params, &mut rng).unwrap();
        for _ in 0..200 {
            let combination = random_combination(&piece.pitches, 3, &mut rng);
            assert_eq!(combination.len(), 3);
            for pair in combination.windows(2) {
                assert!(pair[0].position_in_semitones < pair[1].position_in_semitones);
            }
        }
    }
}
