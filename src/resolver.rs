//! Harmonic resolver — turns a Roman-numeral string into a concrete chord
//! symbol plus a requested bass position.
//!
//! Resolution runs in fixed stages: isolate the inversion marker (figured
//! bass or slash notation), map the numeral to a scale degree, pick the
//! diatonic triad for the key (harmonic minor supplies V and VII in minor
//! keys), then apply any explicit quality override and seventh request.
//! Quality/seventh construction failures degrade with a logged fallback;
//! an unparseable numeral is a hard `MusicTheory` error.

use crate::error::VoicelibError;
use crate::model::{BassInterval, ChordSpec};
use crate::theory::{chord_intervals, parse_chord_symbol, Key, Mode, ScaleVariant};

/// Explicit chord-quality override suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quality {
    Major,
    Minor,
    Diminished,
    Augmented,
}

impl Quality {
    fn suffix(self) -> &'static str {
        match self {
            Quality::Major => "",
            Quality::Minor => "m",
            Quality::Diminished => "dim",
            Quality::Augmented => "aug",
        }
    }
}

/// Default seventh suffix per scale degree in major keys.
const MAJOR_SEVENTHS: [&str; 7] = ["maj7", "m7", "m7", "maj7", "7", "m7", "m7b5"];
/// Default seventh suffix per scale degree in minor keys. V and VII come
/// from harmonic minor, so V is a dominant seventh and VII fully diminished.
const MINOR_SEVENTHS: [&str; 7] = ["m7", "m7b5", "maj7", "m7", "7", "maj7", "dim7"];

/// Resolve one Roman numeral against a key.
pub fn resolve_numeral(numeral: &str, key: &Key) -> Result<ChordSpec, VoicelibError> {
    let trimmed = numeral.trim();
    if trimmed.is_empty() {
        return Err(VoicelibError::theory("empty chord numeral"));
    }

    // ── Stage 1: inversion marker ───────────────────────────────────
    let (head, slash) = match trimmed.split_once('/') {
        Some((h, s)) => (h, Some(s)),
        None => (trimmed, None),
    };
    let (body, figure_bass, figure_seventh) = strip_figures(head)?;
    let bass = match slash {
        Some(token) if !token.is_empty() => BassInterval::Interval(token.to_string()),
        Some(_) => return Err(VoicelibError::theory(format!("empty slash bass in '{trimmed}'"))),
        None => figure_bass,
    };

    // ── Stage 2: numeral and quality markers ────────────────────────
    let roman_len = body
        .chars()
        .take_while(|c| matches!(c, 'i' | 'I' | 'v' | 'V'))
        .count();
    if roman_len == 0 {
        return Err(VoicelibError::theory(format!(
            "unable to isolate a base numeral in '{trimmed}'"
        )));
    }
    let (roman, markers) = body.split_at(roman_len);
    let degree = degree_index(roman).ok_or_else(|| {
        VoicelibError::theory(format!("unknown Roman numeral '{roman}' in '{trimmed}'"))
    })?;
    let parsed = parse_markers(markers, trimmed)?;
    let wants_seventh = figure_seventh || parsed.seventh || parsed.half_diminished;

    // ── Stage 3: diatonic triad for the key ─────────────────────────
    let diatonic = diatonic_symbol(key, degree)?;
    let tonic = parse_chord_symbol(&diatonic)?.tonic_name;

    // ── Stage 4: explicit quality override (non-fatal) ──────────────
    let mut symbol = diatonic.clone();
    if let Some(q) = parsed.quality {
        let candidate = format!("{tonic}{}", q.suffix());
        if parse_chord_symbol(&candidate).is_ok() {
            symbol = candidate;
        } else {
            log::warn!(
                "quality override '{markers}' produced invalid chord '{candidate}', keeping '{diatonic}'"
            );
        }
    }

    // ── Stage 5: seventh (non-fatal fallback chain) ─────────────────
    if wants_seventh {
        symbol = apply_seventh(&symbol, &tonic, key, degree, &parsed)?;
    }

    Ok(ChordSpec {
        numeral: trimmed.to_string(),
        degree,
        symbol,
        bass,
    })
}

/// Split trailing figured-bass digits off the numeral body.
/// Returns the remaining body, the implied bass position, and whether the
/// figures request a seventh.
fn strip_figures(head: &str) -> Result<(&str, BassInterval, bool), VoicelibError> {
    let digits_at = head
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + head[i..].chars().next().map_or(1, char::len_utf8));
    let (body, figures) = head.split_at(digits_at.min(head.len()));
    match figures {
        "" => Ok((body, BassInterval::Root, false)),
        "6" => Ok((body, BassInterval::Third, false)),
        "64" => Ok((body, BassInterval::Fifth, false)),
        "7" => Ok((body, BassInterval::Root, true)),
        "65" => Ok((body, BassInterval::Third, true)),
        "43" => Ok((body, BassInterval::Fifth, true)),
        "42" | "2" => Ok((body, BassInterval::Seventh, true)),
        other => Err(VoicelibError::theory(format!(
            "unknown figured-bass marker '{other}' in '{head}'"
        ))),
    }
}

/// Map a Roman-letter run to its 0-based scale degree, ignoring case.
fn degree_index(roman: &str) -> Option<usize> {
    match roman.to_ascii_uppercase().as_str() {
        "I" => Some(0),
        "II" => Some(1),
        "III" => Some(2),
        "IV" => Some(3),
        "V" => Some(4),
        "VI" => Some(5),
        "VII" => Some(6),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct Markers {
    quality: Option<Quality>,
    half_diminished: bool,
    seventh: bool,
}

/// Parse the marker run between the numeral and the figures: quality
/// overrides (`dim`, `°`, `aug`, `+`, `maj`, `M`, `m`, `min`) and the
/// half-diminished signs (`ø`, `hd`).
fn parse_markers(markers: &str, numeral: &str) -> Result<Markers, VoicelibError> {
    let mut out = Markers::default();
    let mut rest = markers;
    while !rest.is_empty() {
        // Multi-character tokens first so "dim"/"min"/"maj" are not eaten
        // as a bare 'm'.
        if let Some(r) = rest.strip_prefix("dim") {
            out.quality = Some(Quality::Diminished);
            rest = r;
        } else if let Some(r) = rest.strip_prefix("maj") {
            out.quality = Some(Quality::Major);
            rest = r;
        } else if let Some(r) = rest.strip_prefix("min") {
            out.quality = Some(Quality::Minor);
            rest = r;
        } else if let Some(r) = rest.strip_prefix("hd") {
            out.half_diminished = true;
            rest = r;
        } else if let Some(r) = rest.strip_prefix('°') {
            out.quality = Some(Quality::Diminished);
            rest = r;
        } else if let Some(r) = rest.strip_prefix('ø') {
            out.half_diminished = true;
            rest = r;
        } else if let Some(r) = rest.strip_prefix('+') {
            out.quality = Some(Quality::Augmented);
            rest = r;
        } else if let Some(r) = rest.strip_prefix('M') {
            out.quality = Some(Quality::Major);
            rest = r;
        } else if let Some(r) = rest.strip_prefix('m') {
            out.quality = Some(Quality::Minor);
            rest = r;
        } else {
            return Err(VoicelibError::theory(format!(
                "unrecognized chord marker '{rest}' in '{numeral}'"
            )));
        }
    }
    // "ø" and "°7" imply a seventh even without an explicit figure.
    out.seventh = out.half_diminished;
    Ok(out)
}

/// Pick the diatonic triad symbol for a degree. Minor keys draw V and VII
/// from harmonic minor (dominant function), everything else from natural
/// minor.
fn diatonic_symbol(key: &Key, degree: usize) -> Result<String, VoicelibError> {
    let variant = match key.mode {
        Mode::Major => ScaleVariant::Major,
        Mode::Minor if degree == 4 || degree == 6 => ScaleVariant::HarmonicMinor,
        Mode::Minor => ScaleVariant::NaturalMinor,
    };
    key.diatonic_chords(variant)
        .get(degree)
        .cloned()
        .ok_or_else(|| {
            VoicelibError::theory(format!("scale degree {degree} out of range for key"))
        })
}

/// Construct the seventh-chord symbol for a resolved triad.
fn apply_seventh(
    triad: &str,
    tonic: &str,
    key: &Key,
    degree: usize,
    markers: &Markers,
) -> Result<String, VoicelibError> {
    // Half-diminished and fully-diminished markers force their quality.
    if markers.half_diminished {
        return Ok(format!("{tonic}m7b5"));
    }
    if markers.quality == Some(Quality::Diminished) {
        return Ok(format!("{tonic}dim7"));
    }

    let table = match key.mode {
        Mode::Major => &MAJOR_SEVENTHS,
        Mode::Minor => &MINOR_SEVENTHS,
    };
    let candidate = format!("{tonic}{}", table[degree]);
    if parse_chord_symbol(&candidate).is_ok() {
        return Ok(candidate);
    }
    log::warn!("seventh symbol '{candidate}' is invalid, trying dominant form");

    let dominant = format!("{tonic}7");
    if chord_intervals("7").is_some() && parse_chord_symbol(&dominant).is_ok() {
        return Ok(dominant);
    }
    log::warn!("dominant fallback '{dominant}' is invalid, keeping triad '{triad}'");
    Ok(triad.to_string())
}
