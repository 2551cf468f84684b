//! End-to-end tests for the progression orchestrator: full requests in,
//! per-voice note lists out, plus the JSON/FFI entry point and the
//! external accompaniment provider contract.

use pretty_assertions::assert_eq;

use voicelib::engine::{request_ai_accompaniment, AccompanimentProvider};
use voicelib::melody::MelodyWeights;
use voicelib::{
    generate_steps, generate_voicing, generate_voicing_json, generate_voicing_with,
    generate_with_ai_accompaniment, parse_note_name, EngineOptions, PartRanges, RangeSpec, Style,
    VoicelibError, VoicingRequest, VoicingResponse,
};

fn request(progression: &[&str], key: &str, style: Style) -> VoicingRequest {
    VoicingRequest {
        progression: progression.iter().map(|s| s.to_string()).collect(),
        key: key.to_string(),
        style,
        num_voices: 3,
        smoothness: 5,
        meter: "4/4".to_string(),
        ranges: PartRanges::default(),
    }
}

fn seeded(seed: u64) -> EngineOptions {
    EngineOptions {
        melody_seed: Some(seed),
        ..EngineOptions::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SATB end to end
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn satb_response_has_four_full_voices() {
    let req = request(&["I", "IV", "V7", "I"], "C", Style::Satb);
    let response = generate_voicing(&req).unwrap();
    let VoicingResponse::Satb {
        soprano,
        alto,
        tenor,
        bass,
    } = response
    else {
        panic!("expected SATB response");
    };

    for part in [&soprano, &alto, &tenor, &bass] {
        assert_eq!(part.len(), 4);
        for note in part.iter() {
            assert_eq!(note.rhythm, 4.0);
            if let Some(name) = &note.note {
                parse_note_name(name).expect("output names must parse back");
            }
        }
    }
    // Outer voices always place in a plain cadence.
    assert!(soprano.iter().all(|n| n.note.is_some()));
    assert!(bass.iter().all(|n| n.note.is_some()));
    println!("✓ I-IV-V7-I: 4 voices x 4 chords, rhythm 4.0 each");
}

#[test]
fn satb_is_deterministic_end_to_end() {
    let req = request(&["I", "vi", "IV", "V", "I"], "C", Style::Satb);
    assert_eq!(generate_voicing(&req).unwrap(), generate_voicing(&req).unwrap());
    println!("✓ repeated SATB runs are identical");
}

#[test]
fn meter_controls_the_rhythm_value() {
    let mut req = request(&["I", "V"], "C", Style::Satb);
    req.meter = "3/4".to_string();
    let VoicingResponse::Satb { soprano, .. } = generate_voicing(&req).unwrap() else {
        panic!("expected SATB response");
    };
    assert!(soprano.iter().all(|n| n.rhythm == 3.0));
    println!("✓ 3/4 meter yields rhythm 3.0 per chord");
}

// ═══════════════════════════════════════════════════════════════════════
// Melody + accompaniment end to end
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn melody_with_default_ranges_produces_notes() {
    let req = request(&["I", "V"], "C", Style::MelodyAccompaniment);
    let response = generate_voicing_with(&req, &seeded(42)).unwrap();
    let VoicingResponse::MelodyAccompaniment {
        melody,
        accompaniment,
    } = response
    else {
        panic!("expected melody response");
    };

    assert!(!melody.is_empty());
    assert_eq!(melody.len(), 2);
    assert_eq!(accompaniment.len(), 3);
    for voice in &accompaniment {
        assert_eq!(voice.len(), 2);
    }
    println!("✓ C: I-V melody+accompaniment generated without error");
}

#[test]
fn tight_melody_range_clamps_high_chord_tones() {
    let mut req = request(&["V", "iii"], "C", Style::MelodyAccompaniment);
    req.ranges.melody = Some(RangeSpec {
        min: Some("C4".to_string()),
        max: Some("E4".to_string()),
    });
    // Chromatic admission off so the assertion is purely about range
    // handling, not the random allowance.
    let options = EngineOptions {
        melody_seed: Some(1),
        melody: MelodyWeights {
            chromatic_probability: 0.0,
            ..MelodyWeights::default()
        },
        ..EngineOptions::default()
    };

    let e4 = parse_note_name("E4").unwrap();
    let steps = generate_steps(&req, &options).unwrap();
    let melody: Vec<i32> = steps
        .iter()
        .filter_map(|s| s.voices.get("melody").copied().flatten())
        .collect();

    assert!(!melody.is_empty());
    assert!(melody.iter().all(|&m| m <= e4), "melody exceeds E4: {melody:?}");
    assert!(
        melody.contains(&e4),
        "expected a clamped E4 in {melody:?}"
    );
    println!("✓ melody clamps to C4-E4 and touches the E4 ceiling");
}

#[test]
fn accompaniment_stacks_ascending_under_the_melody() {
    let req = request(&["I", "IV", "V", "I"], "C", Style::MelodyAccompaniment);
    let steps = generate_steps(&req, &seeded(7)).unwrap();

    for step in &steps {
        let melody = step.voices.get("melody").copied().flatten();
        let voices: Vec<Option<i32>> = (1..=3)
            .map(|i| step.voices.get(&format!("accompaniment{i}")).copied().flatten())
            .collect();
        let mut last: Option<i32> = None;
        for v in voices.into_iter().flatten() {
            if let Some(prev) = last {
                assert!(v > prev, "accompaniment not ascending in {step:?}");
            }
            if let Some(m) = melody {
                assert!(v < m, "accompaniment above the melody in {step:?}");
            }
            last = Some(v);
        }
    }
    println!("✓ accompaniment voices ascend and stay under the melody");
}

#[test]
fn melody_is_reproducible_with_the_same_seed() {
    let req = request(&["I", "vi", "ii", "V", "I", "IV", "V7", "I"], "C", Style::MelodyAccompaniment);
    let a = generate_voicing_with(&req, &seeded(123)).unwrap();
    let b = generate_voicing_with(&req, &seeded(123)).unwrap();
    assert_eq!(a, b);
    println!("✓ same seed, same melody");
}

// ═══════════════════════════════════════════════════════════════════════
// Error handling
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn unknown_key_is_invalid_input() {
    let req = request(&["I"], "Hsharp", Style::Satb);
    assert!(matches!(
        generate_voicing(&req),
        Err(VoicelibError::InvalidInput(_))
    ));
    println!("✓ unknown key rejected as InvalidInput");
}

#[test]
fn bad_numeral_propagates_or_rests_by_policy() {
    let req = request(&["I", "XI", "V"], "C", Style::Satb);

    // Default policy: the theory error propagates.
    assert!(matches!(
        generate_voicing(&req),
        Err(VoicelibError::MusicTheory(_))
    ));

    // Skip policy: the bad chord becomes a rest step, the rest proceed.
    let options = EngineOptions {
        skip_unresolvable: true,
        ..EngineOptions::default()
    };
    let steps = generate_steps(&req, &options).unwrap();
    assert_eq!(steps.len(), 3);
    assert!(steps[1].voices.values().all(|v| v.is_none()));
    assert!(steps[2].voices.values().any(|v| v.is_some()));
    println!("✓ theory errors propagate by default, degrade to rests on request");
}

#[test]
fn malformed_range_is_invalid_input() {
    let mut req = request(&["I"], "C", Style::Satb);
    req.ranges.soprano = Some(RangeSpec {
        min: Some("C5".to_string()),
        max: Some("C4".to_string()),
    });
    assert!(matches!(
        generate_voicing(&req),
        Err(VoicelibError::InvalidInput(_))
    ));
    println!("✓ min > max rejected as InvalidInput");
}

// ═══════════════════════════════════════════════════════════════════════
// JSON boundary
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn json_round_trip_matches_the_struct_api() {
    let json = r#"{
        "progression": ["I", "V7", "I"],
        "key": "C",
        "style": "SATB",
        "smoothness": 5,
        "meter": "4/4"
    }"#;
    let out = generate_voicing_json(json).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["style"], "SATB");
    assert_eq!(parsed["soprano"].as_array().unwrap().len(), 3);
    assert!(parsed["bass"][0]["note"].is_string());
    assert_eq!(parsed["bass"][0]["rhythm"], 4.0);

    assert!(matches!(
        generate_voicing_json("not json"),
        Err(VoicelibError::InvalidInput(_))
    ));
    println!("✓ JSON entry point round-trips and rejects bad requests");
}

// ═══════════════════════════════════════════════════════════════════════
// Accompaniment provider
// ═══════════════════════════════════════════════════════════════════════

struct FixedProvider(&'static str);

impl AccompanimentProvider for FixedProvider {
    fn generate(&self, _key: &str, _progression: &[String]) -> Result<String, VoicelibError> {
        Ok(self.0.to_string())
    }
}

struct FailingProvider;

impl AccompanimentProvider for FailingProvider {
    fn generate(&self, _key: &str, _progression: &[String]) -> Result<String, VoicelibError> {
        Err(VoicelibError::Provider("timeout".to_string()))
    }
}

#[test]
fn provider_backed_generation_keeps_the_melody_and_takes_the_line() {
    let req = request(&["I", "V", "I"], "C", Style::MelodyAccompaniment);
    let provider =
        FixedProvider(r#"[{"note": "C3", "rhythm": 2.0}, {"note": "G3", "rhythm": 2.0}]"#);

    let response = generate_with_ai_accompaniment(&req, &seeded(9), &provider).unwrap();
    let VoicingResponse::MelodyAccompaniment {
        melody,
        accompaniment,
    } = response
    else {
        panic!("expected melody response");
    };

    // The melody is the engine's own, one note per chord.
    assert_eq!(melody.len(), 3);
    assert!(melody.iter().any(|n| n.note.is_some()));
    // The accompaniment is the provider's line, verbatim.
    assert_eq!(accompaniment.len(), 1);
    assert_eq!(accompaniment[0].len(), 2);
    assert_eq!(accompaniment[0][0].note.as_deref(), Some("C3"));
    assert_eq!(accompaniment[0][0].rhythm, 2.0);

    // A failing provider propagates without producing partial output.
    assert!(matches!(
        generate_with_ai_accompaniment(&req, &seeded(9), &FailingProvider),
        Err(VoicelibError::Provider(_))
    ));
    println!("✓ provider-backed generation: own melody, provider accompaniment");
}

#[test]
fn provider_payload_is_parsed_and_validated() {
    let progression = vec!["I".to_string(), "V".to_string()];

    let good = FixedProvider(r#"[{"note": "C4", "rhythm": 1.0}, {"note": "E4", "rhythm": 0.5}]"#);
    let notes = request_ai_accompaniment(&good, "C", &progression).unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].note, "C4");

    for bad in [
        FixedProvider("here are your notes!"),
        FixedProvider("[]"),
        FixedProvider(r#"[{"note": "X9", "rhythm": 1.0}]"#),
        FixedProvider(r#"[{"note": "C4", "rhythm": 0.0}]"#),
    ] {
        assert!(matches!(
            request_ai_accompaniment(&bad, "C", &progression),
            Err(VoicelibError::Provider(_))
        ));
    }

    assert!(matches!(
        request_ai_accompaniment(&FailingProvider, "C", &progression),
        Err(VoicelibError::Provider(_))
    ));
    println!("✓ provider payloads are strictly validated");
}
