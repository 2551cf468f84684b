//! Pitch, key, scale, and chord-symbol fundamentals.
//!
//! Everything here is a pure lookup or conversion: note names ↔ MIDI
//! numbers, key parsing, scale variants, diatonic triads per degree, and
//! chord-symbol → interval resolution. The resolver and materializer build
//! on these tables; nothing in this module logs or mutates state.

use crate::error::VoicelibError;

/// Lowest pitch the engine will ever emit (A0, bottom of the piano).
pub const MIDI_MIN: i32 = 21;
/// Highest pitch the engine will ever emit (C8, top of the piano).
pub const MIDI_MAX: i32 = 108;

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

// ═══════════════════════════════════════════════════════════════════════
// Pitch names
// ═══════════════════════════════════════════════════════════════════════

/// Convert a note letter (A–G) to its natural semitone offset from C.
fn letter_semitone(letter: char) -> Option<i32> {
    match letter.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Parse a pitch-class name (e.g. `"C"`, `"F#"`, `"Bb"`) into 0–11.
/// Accepts single or double accidentals.
pub fn pitch_class_from_name(name: &str) -> Option<u8> {
    let trimmed = name.trim();
    let mut chars = trimmed.chars();
    let base = letter_semitone(chars.next()?)?;
    let mut alter: i32 = 0;
    for c in chars {
        match c {
            '#' => alter += 1,
            'b' => alter -= 1,
            _ => return None,
        }
    }
    Some((base + alter).rem_euclid(12) as u8)
}

/// Parse a full note name with octave (e.g. `"C4"`, `"F#3"`, `"Bb2"`)
/// into a MIDI number. Middle C (C4) = 60.
pub fn parse_note_name(name: &str) -> Result<i32, VoicelibError> {
    let trimmed = name.trim();
    let split = trimmed
        .find(|c: char| c.is_ascii_digit() || c == '-')
        .ok_or_else(|| VoicelibError::invalid_input(format!("note '{trimmed}' has no octave")))?;
    let (pc_part, oct_part) = trimmed.split_at(split);

    let mut chars = pc_part.chars();
    let base = chars
        .next()
        .and_then(letter_semitone)
        .ok_or_else(|| VoicelibError::invalid_input(format!("unrecognized note name '{trimmed}'")))?;
    let mut alter: i32 = 0;
    for c in chars {
        match c {
            '#' => alter += 1,
            'b' => alter -= 1,
            _ => {
                return Err(VoicelibError::invalid_input(format!(
                    "unrecognized accidental in '{trimmed}'"
                )))
            }
        }
    }
    let octave: i32 = oct_part
        .parse()
        .map_err(|_| VoicelibError::invalid_input(format!("bad octave in '{trimmed}'")))?;

    // Spelled semitone is kept un-wrapped so Cb4 lands at 59, B#3 at 60.
    Ok((octave + 1) * 12 + base + alter)
}

/// Render a MIDI number as a note name with octave, choosing sharp or
/// flat spelling.
pub fn midi_to_name(midi: i32, use_flats: bool) -> String {
    let pc = midi.rem_euclid(12) as usize;
    let octave = midi.div_euclid(12) - 1;
    let name = if use_flats {
        NOTE_NAMES_FLAT[pc]
    } else {
        NOTE_NAMES_SHARP[pc]
    };
    format!("{name}{octave}")
}

/// Octave-shift `midi` into `[min, max]`.
///
/// A note already inside comes back unchanged. When no octave of the pitch
/// fits (range narrower than an octave), the note is clamped to the bound
/// it overshoots. `min > max` is a malformed range: the note is left
/// unmodified and an `InvalidInput` error is returned instead.
pub fn fit_note_to_range(midi: i32, min: i32, max: i32) -> Result<i32, VoicelibError> {
    if min > max {
        return Err(VoicelibError::invalid_input(format!(
            "range min {min} exceeds max {max}"
        )));
    }
    let mut note = midi;
    while note < min && note + 12 <= max {
        note += 12;
    }
    while note > max && note - 12 >= min {
        note -= 12;
    }
    if note < min {
        note = min;
    } else if note > max {
        note = max;
    }
    Ok(note)
}

// ═══════════════════════════════════════════════════════════════════════
// Keys and scales
// ═══════════════════════════════════════════════════════════════════════

/// Major or minor tonality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Major,
    Minor,
}

/// Scale variant used for diatonic lookups. Major keys only ever use
/// `Major`; minor keys pick between the three minor forms per degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleVariant {
    Major,
    NaturalMinor,
    HarmonicMinor,
    MelodicMinor,
}

impl ScaleVariant {
    /// Semitone offsets of the seven scale degrees from the tonic.
    pub fn intervals(self) -> [i32; 7] {
        match self {
            ScaleVariant::Major => [0, 2, 4, 5, 7, 9, 11],
            ScaleVariant::NaturalMinor => [0, 2, 3, 5, 7, 8, 10],
            ScaleVariant::HarmonicMinor => [0, 2, 3, 5, 7, 8, 11],
            ScaleVariant::MelodicMinor => [0, 2, 3, 5, 7, 9, 11],
        }
    }
}

/// A resolved key: tonic pitch class, spelled tonic name, and mode.
/// Immutable for the duration of a generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub tonic_pc: u8,
    pub tonic_name: String,
    pub mode: Mode,
}

impl Key {
    /// Resolve a key name. Tries a major-key reading first
    /// (`"C"`, `"Eb"`, `"F# major"`), then minor (`"Gm"`, `"c minor"`,
    /// `"Amin"`). Anything else is an `InvalidInput` error.
    pub fn parse(name: &str) -> Result<Key, VoicelibError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(VoicelibError::invalid_input("empty key name"));
        }

        if let Some(key) = Self::try_parse(trimmed, Mode::Major, &["major", "maj", "M"]) {
            return Ok(key);
        }
        if let Some(key) = Self::try_parse(trimmed, Mode::Minor, &["minor", "min", "m"]) {
            return Ok(key);
        }
        Err(VoicelibError::invalid_input(format!(
            "unrecognized key name '{trimmed}'"
        )))
    }

    /// Attempt one mode reading: the bare tonic (major only) or the tonic
    /// followed by one of the given mode suffixes, space-separated or not.
    fn try_parse(name: &str, mode: Mode, suffixes: &[&str]) -> Option<Key> {
        let make = |tonic: &str| {
            let tonic = tonic.trim();
            pitch_class_from_name(tonic).map(|pc| Key {
                tonic_pc: pc,
                tonic_name: normalize_tonic(tonic),
                mode,
            })
        };

        if mode == Mode::Major {
            if let Some(key) = make(name) {
                return Some(key);
            }
        }
        for suffix in suffixes {
            if let Some(stripped) = name.strip_suffix(suffix) {
                if let Some(key) = make(stripped) {
                    return Some(key);
                }
            }
        }
        None
    }

    /// Whether note output for this key should use flat spellings.
    pub fn prefers_flats(&self) -> bool {
        if self.tonic_name.contains('b') {
            return true;
        }
        if self.tonic_name.contains('#') {
            return false;
        }
        let letter = self.tonic_name.chars().next().unwrap_or('C');
        match self.mode {
            // F major is the only natural-letter major key with flats.
            Mode::Major => letter == 'F',
            // d, g, c, f minor carry flat signatures.
            Mode::Minor => matches!(letter, 'D' | 'G' | 'C' | 'F'),
        }
    }

    /// Pitch classes of the given scale variant, tonic first.
    pub fn scale_pcs(&self, variant: ScaleVariant) -> [u8; 7] {
        let mut out = [0u8; 7];
        for (i, step) in variant.intervals().iter().enumerate() {
            out[i] = ((self.tonic_pc as i32 + step).rem_euclid(12)) as u8;
        }
        out
    }

    /// Every pitch class that is diatonic in some form of this key.
    /// For minor keys this is the union of the three minor variants.
    pub fn diatonic_pcs(&self) -> Vec<u8> {
        let mut pcs: Vec<u8> = match self.mode {
            Mode::Major => self.scale_pcs(ScaleVariant::Major).to_vec(),
            Mode::Minor => {
                let mut all = self.scale_pcs(ScaleVariant::NaturalMinor).to_vec();
                all.extend(self.scale_pcs(ScaleVariant::HarmonicMinor));
                all.extend(self.scale_pcs(ScaleVariant::MelodicMinor));
                all
            }
        };
        pcs.sort_unstable();
        pcs.dedup();
        pcs
    }

    /// The raised seventh degree, conventionally never doubled.
    pub fn leading_tone_pc(&self) -> u8 {
        ((self.tonic_pc as i32 + 11).rem_euclid(12)) as u8
    }

    /// Diatonic triad symbols for all seven degrees of a scale variant,
    /// built by stacking scale thirds and classifying the result.
    pub fn diatonic_chords(&self, variant: ScaleVariant) -> [String; 7] {
        let pcs = self.scale_pcs(variant);
        let use_flats = self.prefers_flats();
        std::array::from_fn(|degree| {
            let root = pcs[degree];
            let third = pcs[(degree + 2) % 7];
            let fifth = pcs[(degree + 4) % 7];
            let third_iv = (third as i32 - root as i32).rem_euclid(12);
            let fifth_iv = (fifth as i32 - root as i32).rem_euclid(12);
            let suffix = match (third_iv, fifth_iv) {
                (4, 7) => "",
                (3, 7) => "m",
                (3, 6) => "dim",
                (4, 8) => "aug",
                // Stacked thirds of the standard variants only produce the
                // four triad classes above.
                _ => "",
            };
            let name = if use_flats {
                NOTE_NAMES_FLAT[root as usize]
            } else {
                NOTE_NAMES_SHARP[root as usize]
            };
            format!("{name}{suffix}")
        })
    }
}

/// Canonicalize a tonic spelling: uppercase letter, accidentals kept as-is.
fn normalize_tonic(tonic: &str) -> String {
    let mut out = String::with_capacity(tonic.len());
    for (i, c) in tonic.chars().enumerate() {
        if i == 0 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════
// Chord symbols
// ═══════════════════════════════════════════════════════════════════════

/// Interval sets for every chord quality the resolver can produce.
/// Semitones above the root; the root (0) is always first.
const CHORD_QUALITIES: [(&str, &[i32]); 11] = [
    ("", &[0, 4, 7]),
    ("m", &[0, 3, 7]),
    ("dim", &[0, 3, 6]),
    ("aug", &[0, 4, 8]),
    ("7", &[0, 4, 7, 10]),
    ("maj7", &[0, 4, 7, 11]),
    ("m7", &[0, 3, 7, 10]),
    ("m7b5", &[0, 3, 6, 10]),
    ("dim7", &[0, 3, 6, 9]),
    ("mMaj7", &[0, 3, 7, 11]),
    ("aug7", &[0, 4, 8, 10]),
];

/// Look up the interval set for a chord-quality suffix.
pub fn chord_intervals(suffix: &str) -> Option<&'static [i32]> {
    CHORD_QUALITIES
        .iter()
        .find(|(s, _)| *s == suffix)
        .map(|(_, iv)| *iv)
}

/// A chord symbol split into its tonic and quality parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChordSymbol {
    pub tonic_name: String,
    pub tonic_pc: u8,
    pub suffix: String,
    pub intervals: &'static [i32],
}

/// Parse a chord symbol (e.g. `"C"`, `"Dm"`, `"G7"`, `"Bm7b5"`) into its
/// tonic and interval set. Unknown tonics or suffixes are `MusicTheory`
/// errors — a symbol the tables cannot resolve yields no playable chord.
pub fn parse_chord_symbol(symbol: &str) -> Result<ParsedChordSymbol, VoicelibError> {
    let trimmed = symbol.trim();
    let mut tonic_len = 0;
    let mut chars = trimmed.char_indices();
    match chars.next() {
        Some((_, c)) if letter_semitone(c).is_some() => tonic_len = 1,
        _ => {
            return Err(VoicelibError::theory(format!(
                "chord symbol '{trimmed}' has no tonic"
            )))
        }
    }
    for (i, c) in chars {
        // Accidentals extend the tonic; 'b' only counts while we have not
        // yet hit a quality letter (so the "b5" in "m7b5" stays in the suffix).
        if c == '#' || (c == 'b' && i == tonic_len) {
            tonic_len = i + 1;
        } else {
            break;
        }
    }
    let (tonic, suffix) = trimmed.split_at(tonic_len);
    let tonic_pc = pitch_class_from_name(tonic)
        .ok_or_else(|| VoicelibError::theory(format!("bad chord tonic '{tonic}'")))?;
    let intervals = chord_intervals(suffix).ok_or_else(|| {
        VoicelibError::theory(format!("unknown chord quality '{suffix}' in '{trimmed}'"))
    })?;
    Ok(ParsedChordSymbol {
        tonic_name: normalize_tonic(tonic),
        tonic_pc,
        suffix: suffix.to_string(),
        intervals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_name_round_trip() {
        assert_eq!(parse_note_name("C4").unwrap(), 60);
        assert_eq!(parse_note_name("A0").unwrap(), 21);
        assert_eq!(parse_note_name("F#3").unwrap(), 54);
        assert_eq!(parse_note_name("Bb2").unwrap(), 46);
        assert_eq!(midi_to_name(60, false), "C4");
        assert_eq!(midi_to_name(46, true), "Bb2");
        assert_eq!(midi_to_name(54, false), "F#3");
    }

    #[test]
    fn key_parsing_tries_major_then_minor() {
        let c = Key::parse("C").unwrap();
        assert_eq!((c.tonic_pc, c.mode), (0, Mode::Major));

        let gm = Key::parse("Gm").unwrap();
        assert_eq!((gm.tonic_pc, gm.mode), (7, Mode::Minor));

        let eb = Key::parse("Eb").unwrap();
        assert_eq!((eb.tonic_pc, eb.mode), (3, Mode::Major));

        let am = Key::parse("A minor").unwrap();
        assert_eq!((am.tonic_pc, am.mode), (9, Mode::Minor));

        assert!(Key::parse("H").is_err());
        assert!(Key::parse("").is_err());
    }

    #[test]
    fn diatonic_chords_c_major() {
        let key = Key::parse("C").unwrap();
        let chords = key.diatonic_chords(ScaleVariant::Major);
        assert_eq!(
            chords,
            ["C", "Dm", "Em", "F", "G", "Am", "Bdim"].map(String::from)
        );
    }

    #[test]
    fn diatonic_chords_a_harmonic_minor() {
        let key = Key::parse("Am").unwrap();
        let chords = key.diatonic_chords(ScaleVariant::HarmonicMinor);
        // Harmonic minor raises the seventh: V is major, vii is diminished
        // on G#.
        assert_eq!(chords[4], "E");
        assert_eq!(chords[6], "G#dim");
        let natural = key.diatonic_chords(ScaleVariant::NaturalMinor);
        assert_eq!(natural[4], "Em");
        assert_eq!(natural[6], "G");
    }

    #[test]
    fn chord_symbol_parsing() {
        let g7 = parse_chord_symbol("G7").unwrap();
        assert_eq!(g7.tonic_pc, 7);
        assert_eq!(g7.intervals, &[0, 4, 7, 10]);

        let half_dim = parse_chord_symbol("Bm7b5").unwrap();
        assert_eq!(half_dim.tonic_pc, 11);
        assert_eq!(half_dim.intervals, &[0, 3, 6, 10]);

        let flat = parse_chord_symbol("Bbm").unwrap();
        assert_eq!(flat.tonic_pc, 10);
        assert_eq!(flat.suffix, "m");

        assert!(parse_chord_symbol("Xyz").is_err());
        assert!(parse_chord_symbol("Cblah").is_err());
    }

    #[test]
    fn range_fit_octave_shifts_and_clamps() {
        // Already inside: unchanged.
        assert_eq!(fit_note_to_range(62, 60, 72).unwrap(), 62);
        // Octave shifts.
        assert_eq!(fit_note_to_range(48, 60, 72).unwrap(), 60);
        assert_eq!(fit_note_to_range(86, 60, 72).unwrap(), 62);
        // Narrow range with no fitting octave: clamp to the overshot bound.
        assert_eq!(fit_note_to_range(67, 60, 64).unwrap(), 64);
        assert_eq!(fit_note_to_range(55, 60, 64).unwrap(), 60);
        // Malformed range is an error, not a silent repair.
        assert!(fit_note_to_range(62, 72, 60).is_err());
    }

    #[test]
    fn leading_tone() {
        assert_eq!(Key::parse("C").unwrap().leading_tone_pc(), 11);
        assert_eq!(Key::parse("Am").unwrap().leading_tone_pc(), 8);
    }
}
