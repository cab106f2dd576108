// MIDI output from finished pieces.
//
// Converts a Piece into a Standard MIDI File (SMF) for playback. Each melodic
// line maps to a separate MIDI track with its own General MIDI program; all
// notes share one velocity. Start times and durations, measured in fractions
// of a whole measure, map to MIDI ticks at a fixed resolution.
//
// Consumes the piece purely through its melodic lines and `n_measures`.
// Uses the `midly` crate for MIDI writing. Output is SMF Format 1
// (multi-track).

use crate::piece::Piece;
use midly::{
    Format, Header, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// Ticks per whole measure (four quarters).
const TICKS_PER_MEASURE: f64 = 4.0 * TICKS_PER_QUARTER as f64;

/// Semitone offset of A0 (the pitch-pool origin) in MIDI numbering.
const MIDI_A0: i32 = 21;

/// Rendering parameters for MIDI output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingSettings {
    /// Duration of one whole measure in seconds.
    pub measure_in_seconds: f64,
    /// General MIDI program per melodic line; lines beyond the list reuse
    /// the last entry.
    pub instruments: Vec<u8>,
    /// One common velocity for all notes.
    pub velocity: u8,
}

impl Default for RenderingSettings {
    fn default() -> Self {
        RenderingSettings {
            measure_in_seconds: 3.0,
            // Church organ.
            instruments: vec![19],
            velocity: 100,
        }
    }
}

impl RenderingSettings {
    fn program_for_line(&self, line: usize) -> u8 {
        self.instruments
            .get(line)
            .or(self.instruments.last())
            .copied()
            .unwrap_or(0)
    }
}

/// Convert a Piece to MIDI and write to a file.
pub fn write_midi(
    piece: &Piece,
    path: &Path,
    settings: &RenderingSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let smf = piece_to_smf(piece, settings);
    let mut buf = Vec::new();
    smf.write(&mut buf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

/// Convert a Piece to an in-memory SMF.
fn piece_to_smf(piece: &Piece, settings: &RenderingSettings) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo track. One quarter is a fourth of a measure.
    let mut tempo_track: Track<'static> = Vec::new();
    let quarter_microseconds = (settings.measure_in_seconds * 1_000_000.0 / 4.0) as u32;
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::Tempo(u24::new(quarter_microseconds))),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    // One track per melodic line. Lines never overlap internally (each note
    // starts when the previous ends), so note-on/note-off pairs can be
    // emitted in element order.
    for (line_index, line) in piece.melodic_lines.iter().enumerate() {
        let mut track: Track<'static> = Vec::new();
        let channel = u4::new((line_index % 16) as u8);

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(settings.program_for_line(line_index)),
                },
            },
        });

        let mut last_event_tick: u32 = 0;
        for element in line {
            let on_tick = (element.start_time * TICKS_PER_MEASURE).round() as u32;
            let off_tick =
                ((element.start_time + element.duration) * TICKS_PER_MEASURE).round() as u32;
            let key = u7::new((element.position_in_semitones + MIDI_A0) as u8);

            track.push(TrackEvent {
                delta: u28::new(on_tick - last_event_tick),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key,
                        vel: u7::new(settings.velocity),
                    },
                },
            });
            track.push(TrackEvent {
                delta: u28::new(off_tick - on_tick),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key,
                        vel: u7::new(0),
                    },
                },
            });
            last_event_tick = off_tick;
        }

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }

    smf
}
