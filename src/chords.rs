//! Chord materializer and note-pool expander — turns a resolved chord
//! symbol into concrete MIDI pitches, then replicates those pitch classes
//! across the keyboard to form the candidate pool the voice assigners
//! draw from.

use crate::error::VoicelibError;
use crate::model::{BassInterval, ChordNotes, ChordSpec};
use crate::theory::{midi_to_name, parse_chord_symbol, Key, Mode, MIDI_MAX, MIDI_MIN};

/// Lowest root the octave heuristic will accept (C2).
const ROOT_FLOOR: i32 = 36;
/// Highest root the octave heuristic will accept (C5).
const ROOT_CEILING: i32 = 72;

// ═══════════════════════════════════════════════════════════════════════
// Materializer
// ═══════════════════════════════════════════════════════════════════════

/// Build concrete root-position pitches for a resolved chord.
pub fn materialize(spec: &ChordSpec, key: &Key) -> Result<ChordNotes, VoicelibError> {
    let parsed = parse_chord_symbol(&spec.symbol)?;
    if parsed.intervals.is_empty() {
        return Err(VoicelibError::theory(format!(
            "chord '{}' resolved to no intervals",
            spec.symbol
        )));
    }

    let root_midi = place_root(&parsed.tonic_name, parsed.tonic_pc, key);
    let use_flats = key.prefers_flats();

    let mut midi: Vec<i32> = parsed
        .intervals
        .iter()
        .map(|iv| root_midi + iv)
        .filter(|&m| (0..=127).contains(&m))
        .collect();
    if midi.is_empty() {
        return Err(VoicelibError::theory(format!(
            "chord '{}' has no playable tones",
            spec.symbol
        )));
    }
    midi.sort_unstable();
    midi.dedup();
    let names = midi.iter().map(|&m| midi_to_name(m, use_flats)).collect();

    let required_bass_pc = resolve_bass_pc(spec, parsed.tonic_pc, parsed.intervals);

    Ok(ChordNotes {
        midi,
        names,
        root_midi,
        required_bass_pc,
    })
}

/// Deterministic root-octave heuristic.
///
/// Default octave 3; F/G/A/B roots drop to octave 2 so their chords do not
/// crowd the upper register, except that minor-key A and B roots are nudged
/// back up to octave 3. The result is shifted by octaves into the
/// C2–C5 root band when it lands outside.
fn place_root(tonic_name: &str, tonic_pc: u8, key: &Key) -> i32 {
    let letter = tonic_name.chars().next().unwrap_or('C');
    let mut octave = 3;
    if matches!(letter, 'F' | 'G' | 'A' | 'B') {
        octave = 2;
    }
    if key.mode == Mode::Minor && matches!(letter, 'A' | 'B') {
        octave = 3;
    }

    let mut root = (octave + 1) * 12 + tonic_pc as i32;
    if root < ROOT_FLOOR {
        root += 12;
    } else if root > ROOT_CEILING {
        root -= 12;
    }
    root
}

/// Resolve the inversion request into a required bass pitch class.
///
/// Figured-bass positions use the chord's own tone at that degree; slash
/// tokens name an exact interval (accidentals shift the plain size). A
/// request that lands outside the chord's pitch classes is musically
/// inconsistent — it degrades to root position with a warning instead of
/// erroring.
fn resolve_bass_pc(spec: &ChordSpec, tonic_pc: u8, intervals: &[i32]) -> Option<u8> {
    let semis = match &spec.bass {
        BassInterval::Root => return None,
        BassInterval::Third => chord_tone_in(intervals, 3..=4),
        BassInterval::Fifth => chord_tone_in(intervals, 6..=8),
        BassInterval::Seventh => chord_tone_in(intervals, 9..=11),
        BassInterval::Interval(token) => slash_semitones(token, intervals),
    };

    let Some(semis) = semis else {
        log::warn!(
            "inversion '{}' names a tone chord '{}' does not contain, using root position",
            spec.numeral,
            spec.symbol
        );
        return None;
    };

    let pc = ((tonic_pc as i32 + semis).rem_euclid(12)) as u8;
    let member = intervals
        .iter()
        .any(|iv| ((tonic_pc as i32 + iv).rem_euclid(12)) as u8 == pc);
    if member {
        Some(pc)
    } else {
        log::warn!(
            "inversion bass pitch class {pc} is not a tone of '{}', using root position",
            spec.symbol
        );
        None
    }
}

/// Find the chord's own tone whose interval falls in the given semitone
/// span (e.g. 3..=4 finds the third whatever its quality).
fn chord_tone_in(intervals: &[i32], span: std::ops::RangeInclusive<i32>) -> Option<i32> {
    intervals.iter().copied().find(|iv| span.contains(iv))
}

/// Interpret a slash-notation interval token. A bare digit takes the
/// chord's own tone at that degree; a `b`/`#` prefix names an exact
/// interval relative to the plain (major/perfect) size.
fn slash_semitones(token: &str, intervals: &[i32]) -> Option<i32> {
    let (alter, digit) = match token.strip_prefix('b') {
        Some(rest) => (-1, rest),
        None => match token.strip_prefix('#') {
            Some(rest) => (1, rest),
            None => (0, token),
        },
    };
    match (digit, alter) {
        ("3", 0) => chord_tone_in(intervals, 3..=4),
        ("5", 0) => chord_tone_in(intervals, 6..=8),
        ("7", 0) => chord_tone_in(intervals, 9..=11),
        ("3", _) => Some(4 + alter),
        ("5", _) => Some(7 + alter),
        ("7", _) => Some(11 + alter),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Note-pool expander
// ═══════════════════════════════════════════════════════════════════════

/// Octave offsets the pool replicates the base chord across.
const POOL_OCTAVES: std::ops::RangeInclusive<i32> = -2..=4;

/// Replicate the chord's pitches across octaves, clamped to the piano
/// compass, deduplicated and ascending. Pure: empty input gives an empty
/// pool.
pub fn expand_pool(pitches: &[i32]) -> Vec<i32> {
    let mut pool: Vec<i32> = pitches
        .iter()
        .flat_map(|&p| POOL_OCTAVES.clone().map(move |oct| p + 12 * oct))
        .filter(|&p| (MIDI_MIN..=MIDI_MAX).contains(&p))
        .collect();
    pool.sort_unstable();
    pool.dedup();
    pool
}
