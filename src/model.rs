//! Data model shared across the harmony and voicing pipeline.
//!
//! These structures capture the request coming from the host application,
//! the intermediate chord descriptions flowing between pipeline stages,
//! and the per-voice output handed back (as structs or as JSON over FFI).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// Request side
// ═══════════════════════════════════════════════════════════════════════

/// Which voicing style the engine should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Style {
    #[serde(rename = "SATB")]
    Satb,
    MelodyAccompaniment,
}

/// A pitch range request for one part. `None` bounds mean "use the style's
/// default range" for that side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeSpec {
    /// Lowest allowed pitch name (e.g. `"C4"`), or `None` for the default.
    pub min: Option<String>,
    /// Highest allowed pitch name, or `None` for the default.
    pub max: Option<String>,
}

/// Per-part range overrides. Absent parts use their style defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartRanges {
    pub soprano: Option<RangeSpec>,
    pub alto: Option<RangeSpec>,
    pub tenor: Option<RangeSpec>,
    pub bass: Option<RangeSpec>,
    pub melody: Option<RangeSpec>,
    pub accompaniment: Option<RangeSpec>,
}

/// A complete voicing request from the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoicingRequest {
    /// Roman numerals in order, optionally with inversion markers
    /// (e.g. `["I", "IV6", "V65", "vi/3"]`).
    pub progression: Vec<String>,
    /// Key name: tonic plus optional mode hint (`"C"`, `"Gm"`, `"Eb major"`).
    pub key: String,
    /// Voicing style to produce.
    pub style: Style,
    /// Number of accompaniment voices (MelodyAccompaniment style only).
    #[serde(default = "default_num_voices")]
    pub num_voices: usize,
    /// Melodic smoothness preference, 0 (angular) to 10 (maximally smooth).
    #[serde(default = "default_smoothness")]
    pub smoothness: u8,
    /// Meter used to attach a per-chord rhythm value (e.g. `"4/4"`).
    /// One chord occupies one full measure.
    #[serde(default = "default_meter")]
    pub meter: String,
    /// Per-part pitch range overrides.
    #[serde(default)]
    pub ranges: PartRanges,
}

fn default_num_voices() -> usize {
    3
}

fn default_smoothness() -> u8 {
    5
}

fn default_meter() -> String {
    "4/4".to_string()
}

// ═══════════════════════════════════════════════════════════════════════
// Pipeline intermediates
// ═══════════════════════════════════════════════════════════════════════

/// Where the bass of a chord should sit, as requested by the numeral's
/// inversion marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BassInterval {
    /// Root position — no inversion requested.
    Root,
    /// Chord third in the bass (figures 6, 65).
    Third,
    /// Chord fifth in the bass (figures 64, 43).
    Fifth,
    /// Chord seventh in the bass (figures 42, 2).
    Seventh,
    /// Slash notation passes its interval token through unchanged
    /// (e.g. `"b3"`, `"5"`).
    Interval(String),
}

/// The resolved description of one progression step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordSpec {
    /// The numeral string as supplied by the caller.
    pub numeral: String,
    /// Scale-degree index 0–6 (I..VII).
    pub degree: usize,
    /// Final chord symbol after quality and seventh resolution.
    pub symbol: String,
    /// Requested bass position.
    pub bass: BassInterval,
}

/// Concrete pitches for one chord, root position, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordNotes {
    /// MIDI pitches, ascending and deduplicated.
    pub midi: Vec<i32>,
    /// Note names parallel to `midi`.
    pub names: Vec<String>,
    /// MIDI pitch of the chord root as placed by the octave heuristic.
    pub root_midi: i32,
    /// Pitch class the bass must take when an inversion was requested;
    /// `None` means root position.
    pub required_bass_pc: Option<u8>,
}

impl ChordNotes {
    /// Pitch classes present in this chord.
    pub fn pitch_classes(&self) -> Vec<u8> {
        let mut pcs: Vec<u8> = self.midi.iter().map(|&m| m.rem_euclid(12) as u8).collect();
        pcs.sort_unstable();
        pcs.dedup();
        pcs
    }

    /// Pitch class of the chord root.
    pub fn root_pc(&self) -> u8 {
        self.root_midi.rem_euclid(12) as u8
    }
}

/// Contour memory for melody generation: the sign of the last movement and
/// how many consecutive steps kept that sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContourState {
    /// -1 descending, 0 no movement yet, 1 ascending.
    pub last_direction: i32,
    /// Consecutive movements in `last_direction`.
    pub direction_streak: u32,
}

impl ContourState {
    /// Fold one melodic movement (in signed semitones) into the contour.
    /// Same-sign movement extends the streak, a reversal resets it to 1,
    /// zero movement leaves the state untouched.
    pub fn update(&mut self, movement: i32) {
        let dir = movement.signum();
        if dir == 0 {
            return;
        }
        if dir == self.last_direction {
            self.direction_streak += 1;
        } else {
            self.last_direction = dir;
            self.direction_streak = 1;
        }
    }
}

/// One chord's worth of voice assignments, keyed by voice name.
/// `None` means no valid note could be placed for that voice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoicingStep {
    pub voices: BTreeMap<String, Option<i32>>,
}

// ═══════════════════════════════════════════════════════════════════════
// Response side
// ═══════════════════════════════════════════════════════════════════════

/// One note event handed back to the host: a pitch name (or `None` for a
/// rest / unplaceable voice) and its rhythm value in quarter-note beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoicedNote {
    pub note: Option<String>,
    pub rhythm: f64,
}

/// A complete voicing result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style")]
pub enum VoicingResponse {
    #[serde(rename = "SATB")]
    Satb {
        soprano: Vec<VoicedNote>,
        alto: Vec<VoicedNote>,
        tenor: Vec<VoicedNote>,
        bass: Vec<VoicedNote>,
    },
    MelodyAccompaniment {
        melody: Vec<VoicedNote>,
        /// One inner list per accompaniment voice, lowest voice first.
        accompaniment: Vec<Vec<VoicedNote>>,
    },
}

/// One note from the external accompaniment provider's JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidedNote {
    pub note: String,
    pub rhythm: f64,
}
