//! Progression orchestrator — walks the chord list, runs each numeral
//! through resolution, materialization, and pool expansion, then hands the
//! candidates to the style's voice assigner with the previous step's
//! pitches as voice-leading context.
//!
//! Theory errors abort the offending chord (optionally degrading to rests);
//! voicing failures only ever cost individual voices their note.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::chords::{expand_pool, materialize};
use crate::error::VoicelibError;
use crate::melody::{
    next_melody_note, voice_accompaniment, MelodyState, MelodyWeights, ACCOMPANIMENT_RANGE,
    MELODY_RANGE,
};
use crate::model::{
    ChordNotes, ProvidedNote, RangeSpec, Style, VoicedNote, VoicingRequest, VoicingResponse,
    VoicingStep,
};
use crate::resolver::resolve_numeral;
use crate::satb::{assign_satb, SatbRanges, SatbState};
use crate::scorer::ScoringWeights;
use crate::theory::{midi_to_name, parse_note_name, Key};

/// Process-scoped configuration for a generation run. Everything tunable
/// lives here rather than in module-level state.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Voice-leading scorer weights.
    pub weights: ScoringWeights,
    /// Melody candidate-pool tuning.
    pub melody: MelodyWeights,
    /// Seed for the melody's random source. `None` seeds from entropy;
    /// tests pass a fixed seed for reproducible output.
    pub melody_seed: Option<u64>,
    /// Replace chords that fail harmonic resolution with rests instead of
    /// propagating the error.
    pub skip_unresolvable: bool,
}

/// Generate a voicing with default options.
pub fn generate_voicing(request: &VoicingRequest) -> Result<VoicingResponse, VoicelibError> {
    generate_voicing_with(request, &EngineOptions::default())
}

/// Generate a voicing, returning per-voice note-name lists with rhythm
/// values attached.
pub fn generate_voicing_with(
    request: &VoicingRequest,
    options: &EngineOptions,
) -> Result<VoicingResponse, VoicelibError> {
    let key = Key::parse(&request.key)?;
    let rhythm = beats_per_measure(&request.meter)?;
    let steps = generate_steps(request, options)?;
    let use_flats = key.prefers_flats();

    let voiced = |steps: &[VoicingStep], voice: &str| -> Vec<VoicedNote> {
        steps
            .iter()
            .map(|s| VoicedNote {
                note: s
                    .voices
                    .get(voice)
                    .copied()
                    .flatten()
                    .map(|m| midi_to_name(m, use_flats)),
                rhythm,
            })
            .collect()
    };

    match request.style {
        Style::Satb => Ok(VoicingResponse::Satb {
            soprano: voiced(&steps, "soprano"),
            alto: voiced(&steps, "alto"),
            tenor: voiced(&steps, "tenor"),
            bass: voiced(&steps, "bass"),
        }),
        Style::MelodyAccompaniment => Ok(VoicingResponse::MelodyAccompaniment {
            melody: voiced(&steps, "melody"),
            accompaniment: (1..=request.num_voices)
                .map(|i| voiced(&steps, &accompaniment_voice(i)))
                .collect(),
        }),
    }
}

/// Generate raw MIDI-level steps, one per chord. This is the numeric form
/// the invariants are stated over; `generate_voicing_with` only renames
/// and packages it.
pub fn generate_steps(
    request: &VoicingRequest,
    options: &EngineOptions,
) -> Result<Vec<VoicingStep>, VoicelibError> {
    let key = Key::parse(&request.key)?;
    if request.smoothness > 10 {
        return Err(VoicelibError::invalid_input(format!(
            "smoothness {} outside 0..=10",
            request.smoothness
        )));
    }

    match request.style {
        Style::Satb => satb_steps(request, options, &key),
        Style::MelodyAccompaniment => melody_steps(request, options, &key),
    }
}

fn accompaniment_voice(i: usize) -> String {
    format!("accompaniment{i}")
}

/// Quarter-note beats in one measure of the given meter.
fn beats_per_measure(meter: &str) -> Result<f64, VoicelibError> {
    let (beats, beat_type) = meter
        .split_once('/')
        .ok_or_else(|| VoicelibError::invalid_input(format!("malformed meter '{meter}'")))?;
    let beats: u32 = beats
        .trim()
        .parse()
        .map_err(|_| VoicelibError::invalid_input(format!("malformed meter '{meter}'")))?;
    let beat_type: u32 = beat_type
        .trim()
        .parse()
        .map_err(|_| VoicelibError::invalid_input(format!("malformed meter '{meter}'")))?;
    if beats == 0 || beat_type == 0 {
        return Err(VoicelibError::invalid_input(format!(
            "meter '{meter}' has a zero component"
        )));
    }
    Ok(f64::from(beats) / f64::from(beat_type) * 4.0)
}

/// Apply a caller range override on top of a style default, parsing any
/// explicit bounds. A resolved `min > max` is malformed input.
fn resolve_range(
    spec: &Option<RangeSpec>,
    default: (i32, i32),
) -> Result<(i32, i32), VoicelibError> {
    let (mut min, mut max) = default;
    if let Some(r) = spec {
        if let Some(s) = &r.min {
            min = parse_note_name(s)?;
        }
        if let Some(s) = &r.max {
            max = parse_note_name(s)?;
        }
    }
    if min > max {
        return Err(VoicelibError::invalid_input(format!(
            "range min {min} exceeds max {max}"
        )));
    }
    Ok((min, max))
}

/// Resolve and materialize one numeral into chord plus candidate pool.
fn prepare_chord(numeral: &str, key: &Key) -> Result<(ChordNotes, Vec<i32>), VoicelibError> {
    let spec = resolve_numeral(numeral, key)?;
    let chord = materialize(&spec, key)?;
    let pool = expand_pool(&chord.midi);
    Ok((chord, pool))
}

/// Handle a per-chord theory error according to the skip policy: `Ok` means
/// "write rests and continue", `Err` propagates.
fn unresolvable(numeral: &str, err: VoicelibError, skip: bool) -> Result<(), VoicelibError> {
    if skip {
        log::warn!("chord '{numeral}' could not be resolved ({err}), writing rests");
        Ok(())
    } else {
        Err(err)
    }
}

// ─── SATB ────────────────────────────────────────────────────────────

fn satb_steps(
    request: &VoicingRequest,
    options: &EngineOptions,
    key: &Key,
) -> Result<Vec<VoicingStep>, VoicelibError> {
    let defaults = SatbRanges::default();
    let ranges = SatbRanges {
        soprano: resolve_range(&request.ranges.soprano, defaults.soprano)?,
        alto: resolve_range(&request.ranges.alto, defaults.alto)?,
        tenor: resolve_range(&request.ranges.tenor, defaults.tenor)?,
        bass: resolve_range(&request.ranges.bass, defaults.bass)?,
    };

    let mut state = SatbState::default();
    let mut steps = Vec::with_capacity(request.progression.len());

    for numeral in &request.progression {
        let (chord, pool) = match prepare_chord(numeral, key) {
            Ok(prepared) => prepared,
            Err(err) => {
                unresolvable(numeral, err, options.skip_unresolvable)?;
                steps.push(satb_step(&SatbState::default()));
                state = SatbState::default();
                continue;
            }
        };

        let assigned = assign_satb(
            &chord,
            &pool,
            key,
            &ranges,
            &state,
            request.smoothness,
            &options.weights,
        );
        steps.push(satb_step(&assigned));
        state = assigned;
    }

    Ok(steps)
}

fn satb_step(state: &SatbState) -> VoicingStep {
    let mut step = VoicingStep::default();
    step.voices.insert("soprano".to_string(), state.soprano);
    step.voices.insert("alto".to_string(), state.alto);
    step.voices.insert("tenor".to_string(), state.tenor);
    step.voices.insert("bass".to_string(), state.bass);
    step
}

// ─── Melody + accompaniment ──────────────────────────────────────────

fn melody_steps(
    request: &VoicingRequest,
    options: &EngineOptions,
    key: &Key,
) -> Result<Vec<VoicingStep>, VoicelibError> {
    let melody_range = resolve_range(&request.ranges.melody, MELODY_RANGE)?;
    let accomp_range = resolve_range(&request.ranges.accompaniment, ACCOMPANIMENT_RANGE)?;

    let mut rng = match options.melody_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut state = MelodyState::default();
    let mut accomp_prev: Vec<Option<i32>> = vec![None; request.num_voices];
    let mut steps = Vec::with_capacity(request.progression.len());

    for numeral in &request.progression {
        let (chord, pool) = match prepare_chord(numeral, key) {
            Ok(prepared) => prepared,
            Err(err) => {
                unresolvable(numeral, err, options.skip_unresolvable)?;
                steps.push(melody_step(None, &vec![None; request.num_voices]));
                state = MelodyState {
                    previous: None,
                    contour: state.contour,
                };
                accomp_prev = vec![None; request.num_voices];
                continue;
            }
        };

        let note = next_melody_note(
            &chord,
            &pool,
            key,
            melody_range,
            &state,
            request.smoothness,
            &options.weights,
            &options.melody,
            &mut rng,
        );
        let voices = voice_accompaniment(
            &chord,
            &pool,
            note,
            accomp_range,
            request.num_voices,
            &accomp_prev,
            request.smoothness,
            &options.weights,
        );
        steps.push(melody_step(note, &voices));

        // State changes only after the step is complete.
        if let (Some(prev), Some(chosen)) = (state.previous, note) {
            state.contour.update(chosen - prev);
        }
        state.previous = note;
        accomp_prev = voices;
    }

    Ok(steps)
}

fn melody_step(note: Option<i32>, voices: &[Option<i32>]) -> VoicingStep {
    let mut step = VoicingStep::default();
    step.voices.insert("melody".to_string(), note);
    for (i, &v) in voices.iter().enumerate() {
        step.voices.insert(accompaniment_voice(i + 1), v);
    }
    step
}

// ─── External accompaniment provider ─────────────────────────────────

/// An opaque note-sequence provider (typically an LLM behind the host's
/// transport). The host owns any async machinery and blocks here.
pub trait AccompanimentProvider {
    /// Produce raw text expected to parse as a JSON array of
    /// `{note, rhythm}` objects.
    fn generate(&self, key: &str, progression: &[String]) -> Result<String, VoicelibError>;
}

/// Generate the melody line deterministically and take the accompaniment
/// from the external provider instead of the stacked voicer.
///
/// The provider is invoked exactly once, after the melody is computed; its
/// failure propagates as a `Provider` error without touching any voicing
/// state the caller holds.
pub fn generate_with_ai_accompaniment(
    request: &VoicingRequest,
    options: &EngineOptions,
    provider: &dyn AccompanimentProvider,
) -> Result<VoicingResponse, VoicelibError> {
    let key = Key::parse(&request.key)?;
    if request.smoothness > 10 {
        return Err(VoicelibError::invalid_input(format!(
            "smoothness {} outside 0..=10",
            request.smoothness
        )));
    }
    let rhythm = beats_per_measure(&request.meter)?;
    let steps = melody_steps(request, options, &key)?;
    let use_flats = key.prefers_flats();

    let melody = steps
        .iter()
        .map(|s| VoicedNote {
            note: s
                .voices
                .get("melody")
                .copied()
                .flatten()
                .map(|m| midi_to_name(m, use_flats)),
            rhythm,
        })
        .collect();

    let provided = request_ai_accompaniment(provider, &request.key, &request.progression)?;
    let line = provided
        .into_iter()
        .map(|n| VoicedNote {
            note: Some(n.note),
            rhythm: n.rhythm,
        })
        .collect();

    Ok(VoicingResponse::MelodyAccompaniment {
        melody,
        accompaniment: vec![line],
    })
}

/// Invoke the provider once and validate its payload. Non-JSON, empty, or
/// malformed note lists are hard errors — there is no silent fallback.
pub fn request_ai_accompaniment(
    provider: &dyn AccompanimentProvider,
    key: &str,
    progression: &[String],
) -> Result<Vec<ProvidedNote>, VoicelibError> {
    let raw = provider.generate(key, progression)?;
    let notes: Vec<ProvidedNote> = serde_json::from_str(&raw).map_err(|e| {
        VoicelibError::Provider(format!("response is not a JSON note list: {e}"))
    })?;
    if notes.is_empty() {
        return Err(VoicelibError::Provider(
            "provider returned an empty note list".to_string(),
        ));
    }
    for note in &notes {
        parse_note_name(&note.note).map_err(|_| {
            VoicelibError::Provider(format!("unparseable note name '{}'", note.note))
        })?;
        if note.rhythm <= 0.0 {
            return Err(VoicelibError::Provider(format!(
                "non-positive rhythm value {}",
                note.rhythm
            )));
        }
    }
    Ok(notes)
}
