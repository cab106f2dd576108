// Error taxonomy for the composer.
//
// Three families, all fatal to a run:
// - configuration errors: invalid notes, rhythms, or parameter bundles
//   supplied by the caller; detected before or during piece generation;
// - lookup errors: a scoring function name or a required table entry is
//   missing from the configured battery;
// - degenerate-neighborhood errors: the search cannot enumerate a single
//   pitch combination, so "no improvement" would be meaningless.
//
// None of these are transient: the optimizer performs no I/O, so every
// failure traces back to caller configuration and must abort the run
// before any artifact is written.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("unknown note name `{0}` (expected sharps-only spelling between A0 and C8)")]
    UnknownNote(String),

    #[error("unknown scoring function `{0}`")]
    UnknownScoringFunction(String),

    #[error("invalid parameters for scoring function `{name}`: {source}")]
    InvalidScoringParams {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no entry for key `{key}` in table `{table}`")]
    MissingTableEntry { table: &'static str, key: String },

    #[error("disallowed rhythmic pattern found: {0:?}")]
    InvalidRhythm(Vec<f64>),

    #[error("line lasts {actual} measures, but {expected} measures are needed")]
    WrongTotalDuration { actual: f64, expected: f64 },

    #[error("`duration_weights` must be provided when some line durations are omitted")]
    MissingDurationWeights,

    #[error("no admissible duration continues the rhythm at time {0}")]
    RhythmDeadEnd(f64),

    #[error("no pitches available between `{lowest}` and `{highest}`")]
    EmptyPitchRange { lowest: String, highest: String },

    #[error("{n_voices} voices cannot be drawn from {n_pitches} available pitches")]
    DegenerateNeighborhood { n_voices: usize, n_pitches: usize },
}

/// Result type for composer operations.
pub type Result<T> = std::result::Result<T, CompositionError>;
