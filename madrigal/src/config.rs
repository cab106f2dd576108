// Run configuration: everything one composition run needs.
//
// A `RunConfig` bundles the piece parameters, the scoring battery, the
// search settings, the rendering settings, and an optional seed. Loaded from
// a JSON file or built from defaults carrying a complete C-major three-voice
// setup with the full scoring battery and its stability tables.
//
// Parsing errors surface at the I/O seam as boxed errors; the core modules
// only ever see already-validated parameter bundles.

use crate::generate::PieceParams;
use crate::midi::RenderingSettings;
use crate::rhythm::DurationWeight;
use crate::scale::ScaleType;
use crate::scoring::EvaluationSettings;
use crate::vns::VnsSettings;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

/// Full configuration of a composition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Seed for the run's random generator; a fresh one is drawn when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    pub piece: PieceParams,
    pub evaluation: EvaluationSettings,
    #[serde(default)]
    pub optimization: VnsSettings,
    #[serde(default)]
    pub rendering: RenderingSettings,
}

impl RunConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        let piece = PieceParams {
            tonic: "C".to_string(),
            scale_type: ScaleType::Major,
            lowest_note: "G2".to_string(),
            highest_note: "G5".to_string(),
            n_measures: 8,
            valid_rhythmic_patterns: vec![
                vec![1.0],
                vec![0.5, 0.5],
                vec![0.5, 0.25, 0.25],
                vec![0.25, 0.25, 0.5],
                vec![0.25, 0.25, 0.25, 0.25],
                // Syncopated half note tied over the barline.
                vec![0.5, 1.0],
            ],
            lines_durations: vec![None, None, None],
            duration_weights: vec![
                DurationWeight { duration: 0.25, weight: 1.0 },
                DurationWeight { duration: 0.5, weight: 2.0 },
                DurationWeight { duration: 1.0, weight: 1.0 },
            ],
            custom_position_types: Vec::new(),
        };

        let stability_ranges = json!({
            "beginning": [0.8, 1.0],
            "ending": [0.9, 1.0],
            "downbeat": [0.75, 1.0],
            "middle": [0.5, 0.9],
            "other": [0.25, 0.8],
        });
        let evaluation = EvaluationSettings {
            scoring_coefs: [
                ("absence_of_large_intervals", 0.5),
                ("absence_of_narrow_ranges", 0.5),
                ("absence_of_parallel_intervals", 0.8),
                ("absence_of_voice_crossing", 1.0),
                ("conjunct_motion", 1.2),
                ("dominance_of_tertian_harmony", 1.0),
                ("harmonic_stability", 1.0),
                ("tonal_stability", 1.0),
            ]
            .into_iter()
            .map(|(name, weight)| (name.to_string(), weight))
            .collect(),
            scoring_fn_params: [
                (
                    "absence_of_large_intervals",
                    json!({"max_n_semitones": 16}),
                ),
                (
                    "absence_of_narrow_ranges",
                    json!({
                        "range_size": 9,
                        "penalties": {"2": 1.0, "3": 0.5},
                    }),
                ),
                (
                    "absence_of_parallel_intervals",
                    json!({
                        "n_degrees_to_penalty": {"4": 0.5, "7": 1.0},
                    }),
                ),
                (
                    "conjunct_motion",
                    json!({
                        "penalty_deduction_per_line": 0.2,
                        "n_semitones_to_penalty": {
                            "0": 0.2, "1": 0.0, "2": 0.0, "3": 0.1,
                            "4": 0.2, "5": 0.3, "7": 0.5, "12": 0.5,
                        },
                    }),
                ),
                (
                    "harmonic_stability",
                    json!({
                        "stability_ranges": stability_ranges.clone(),
                        "n_semitones_to_stability": {
                            "0": 1.0, "1": 0.2, "2": 0.2, "3": 0.7,
                            "4": 0.8, "5": 0.5, "6": 0.0, "7": 0.9,
                            "8": 0.6, "9": 0.6, "10": 0.2, "11": 0.2,
                        },
                    }),
                ),
                (
                    "tonal_stability",
                    json!({
                        "stability_ranges": stability_ranges,
                        "degree_to_stability": {
                            "1": 1.0, "2": 0.4, "3": 0.7, "4": 0.4,
                            "5": 0.8, "6": 0.4, "7": 0.2,
                        },
                    }),
                ),
            ]
            .into_iter()
            .map(|(name, params)| (name.to_string(), params))
            .collect(),
        };

        RunConfig {
            seed: None,
            piece,
            evaluation,
            optimization: VnsSettings::default(),
            rendering: RenderingSettings::default(),
        }
    }
}
