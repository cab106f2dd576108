// Madrigal — CLI entry point.
//
// Composes a polyphonic piece over a diatonic scale and writes it to MIDI.
// The pipeline: load config → generate random draft → variable neighborhood
// search → MIDI output.
//
// Usage:
//   cargo run -p madrigal -- [output.mid] [--config PATH] [--passes N] [--seed N]

use madrigal::config::RunConfig;
use madrigal::generate::generate_random_piece;
use madrigal::midi::write_midi;
use madrigal::scoring::evaluate;
use madrigal::vns::run_variable_neighborhood_search;
use madrigal_prng::ComposerRng;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let output_path = args
        .get(1)
        .filter(|s| !s.starts_with("--"))
        .map(|s| s.as_str())
        .unwrap_or("output.mid");
    let config_path: Option<String> = parse_flag(&args, "--config");
    let passes: Option<usize> = parse_flag(&args, "--passes");
    let seed_flag: Option<u64> = parse_flag(&args, "--seed");

    println!("=== Madrigal ===");
    println!("Output: {output_path}");

    // Load configuration
    println!("[1/4] Loading configuration...");
    let mut config = match &config_path {
        Some(path) => match RunConfig::load(Path::new(path)) {
            Ok(config) => {
                println!("  Loaded {path}.");
                config
            }
            Err(e) => {
                eprintln!("  Failed to load {path}: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("  Using default configuration.");
            RunConfig::default()
        }
    };
    if let Some(n) = passes {
        config.optimization.n_passes = n;
    }

    let seed = seed_flag.or(config.seed).unwrap_or_else(fallback_seed);
    println!("  Seed: {seed}");
    println!(
        "  {} {:?}, {} measures, {} voices",
        config.piece.tonic,
        config.piece.scale_type,
        config.piece.n_measures,
        config.piece.lines_durations.len()
    );
    let mut rng = ComposerRng::new(seed);

    // Generate the draft
    println!("[2/4] Generating random draft...");
    let piece = match generate_random_piece(&config.piece, &mut rng) {
        Ok(piece) => piece,
        Err(e) => {
            eprintln!("  Configuration error: {e}");
            std::process::exit(1);
        }
    };
    println!(
        "  {} sonorities over {} pitches.",
        piece.sonorities.len(),
        piece.pitches.len()
    );
    let draft_score = match evaluate(&piece, &config.evaluation, true) {
        Ok(score) => score,
        Err(e) => {
            eprintln!("  Scoring error: {e}");
            std::process::exit(1);
        }
    };
    println!("  Draft score: {draft_score:.5}");

    // Search
    println!(
        "[3/4] Running variable neighborhood search ({} passes)...",
        config.optimization.n_passes
    );
    let result = match run_variable_neighborhood_search(
        piece,
        &config.evaluation,
        &config.optimization,
        &mut rng,
    ) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("  Search error: {e}");
            std::process::exit(1);
        }
    };
    println!("  Evaluations: {}", result.evaluations);
    println!("  Improvements: {}", result.improvements);
    println!("  Perturbations: {}", result.perturbations);
    if let Err(e) = evaluate(&result.piece, &config.evaluation, true) {
        eprintln!("  Scoring error: {e}");
        std::process::exit(1);
    }
    println!(
        "  Score: {:.5} -> {:.5} (delta {:+.5})",
        draft_score,
        result.score,
        result.score - draft_score
    );

    // Write MIDI
    println!("[4/4] Writing MIDI to {output_path}...");
    match write_midi(&result.piece, Path::new(output_path), &config.rendering) {
        Ok(()) => {
            let duration_seconds =
                result.piece.n_measures as f64 * config.rendering.measure_in_seconds;
            println!(
                "  Done! Duration: {:.0}s ({} measures)",
                duration_seconds, result.piece.n_measures
            );
        }
        Err(e) => {
            eprintln!("  Error writing MIDI: {e}");
            std::process::exit(1);
        }
    }

    println!();
    println!("Play with: timidity {output_path} (or any MIDI player)");
}

/// Seed drawn from the wall clock when neither flag nor config provides one.
fn fallback_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
