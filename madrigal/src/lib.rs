// Madrigal
//
// A polyphonic piece generator over diatonic scales. A random draft piece is
// refined by variable neighborhood search: each sonority (the set of notes
// simultaneously sounding at one onset) is repeatedly re-chosen among pitch
// combinations from the scale slice, guided by a configurable battery of
// music-theoretic scoring functions, with random perturbation to escape
// local optima. The best piece found is written out as a MIDI file.
//
// Architecture:
// - scale.rs: 88-key note vocabulary, diatonic scale building and slicing
// - piece.rs: Piece model (melodic lines + derived sonorities) and the
//   sonority mutation primitive
// - rhythm.rs: Rhythm validation and random duration generation against
//   pattern and weight tables
// - generate.rs: Random draft piece generation from validated parameters
// - scoring.rs: Scoring battery (voice crossing, parallel intervals, tertian
//   harmony, harmonic/tonal stability, conjunct motion, range checks)
// - vns.rs: Variable neighborhood search over sonority positions
// - midi.rs: MIDI file output from finished pieces
// - config.rs: Run configuration (JSON) with complete defaults
// - error.rs: Error taxonomy shared by the core modules
//
// The composer is deterministic given a seed, supporting reproducible output.

pub mod config;
pub mod error;
pub mod generate;
pub mod midi;
pub mod piece;
pub mod rhythm;
pub mod scale;
pub mod scoring;
pub mod vns;
