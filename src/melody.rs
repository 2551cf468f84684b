//! Melody and accompaniment voicer.
//!
//! The melody line keeps a contour memory (direction and streak length)
//! and assembles a candidate pool from chord tones near the previous note,
//! diatonic tones that continue the current direction, and an occasional
//! chromatic neighbor. Accompaniment voices stack under the chosen melody
//! pitch, root-biased at the bottom, each within an octave of the
//! accompaniment bass.

use rand::Rng;

use crate::model::{ChordNotes, ContourState};
use crate::scorer::{find_closest_note, ScoringWeights};
use crate::theory::{fit_note_to_range, Key};

/// Default melody range, C4–C6.
pub const MELODY_RANGE: (i32, i32) = (60, 84);
/// Default accompaniment range, C2–C5.
pub const ACCOMPANIMENT_RANGE: (i32, i32) = (36, 72);
/// Accompaniment must stay within two octaves below the melody.
pub const MAX_MELODY_SPREAD: i32 = 24;
/// Upper accompaniment voices stay within an octave of their bass.
pub const ACCOMP_STACK_SPAN: i32 = 12;

/// Candidate-pool tuning for melody generation.
#[derive(Debug, Clone)]
pub struct MelodyWeights {
    /// Probability per step of admitting chromatic neighbors into the pool.
    pub chromatic_probability: f64,
    /// How far from the previous note chord tones stay "near", in semitones.
    pub chord_tone_window: i32,
    /// Window for diatonic neighbors regardless of direction.
    pub diatonic_window: i32,
    /// Cap on how far the streak-direction window can grow.
    pub streak_window_cap: i32,
    /// Oscillation guard: per-streak-step probability of dropping the
    /// previous pitch from the pool, and its cap.
    pub oscillation_base: f64,
    pub oscillation_cap: f64,
}

impl Default for MelodyWeights {
    fn default() -> Self {
        Self {
            chromatic_probability: 0.05,
            chord_tone_window: 12,
            diatonic_window: 5,
            streak_window_cap: 7,
            oscillation_base: 0.2,
            oscillation_cap: 0.8,
        }
    }
}

/// Previous melody pitch plus contour memory. Mutated only between steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct MelodyState {
    pub previous: Option<i32>,
    pub contour: ContourState,
}

/// Pick the next melody note for a chord, or `None` when nothing fits the
/// range.
#[allow(clippy::too_many_arguments)]
pub fn next_melody_note<R: Rng + ?Sized>(
    chord: &ChordNotes,
    pool: &[i32],
    key: &Key,
    range: (i32, i32),
    state: &MelodyState,
    smoothness: u8,
    weights: &ScoringWeights,
    melody: &MelodyWeights,
    rng: &mut R,
) -> Option<i32> {
    // Both rolls happen every step so a seeded generator produces the same
    // sequence regardless of which branches fire.
    let chroma_roll: f64 = rng.gen();
    let guard_roll: f64 = rng.gen();

    let base = chord_tone_candidates(chord, pool, range);
    if base.is_empty() {
        return None;
    }

    let Some(prev) = state.previous else {
        let target = (range.0 + range.1) / 2;
        return find_closest_note(target, &base, None, smoothness, weights);
    };

    let mut candidates: Vec<i32> = base
        .iter()
        .copied()
        .filter(|&c| (c - prev).abs() <= melody.chord_tone_window)
        .collect();
    if candidates.is_empty() {
        candidates = base;
    }

    let diatonic = key.diatonic_pcs();
    let is_diatonic = |n: i32| diatonic.contains(&(n.rem_euclid(12) as u8));
    let in_range = |n: i32| n >= range.0 && n <= range.1;

    // Diatonic tones continuing the streak direction; the window widens as
    // the streak grows.
    let dir = state.contour.last_direction;
    if dir != 0 && state.contour.direction_streak >= 1 {
        let window = (2 + state.contour.direction_streak as i32).min(melody.streak_window_cap);
        for offset in 1..=window {
            let n = prev + dir * offset;
            if in_range(n) && is_diatonic(n) {
                candidates.push(n);
            }
        }
    }

    // Nearby diatonic tones in either direction.
    for offset in 1..=melody.diatonic_window {
        for n in [prev - offset, prev + offset] {
            if in_range(n) && is_diatonic(n) {
                candidates.push(n);
            }
        }
    }

    // Small chromatic allowance.
    if chroma_roll < melody.chromatic_probability {
        for offset in 1..=2 {
            for n in [prev - offset, prev + offset] {
                if in_range(n) && !is_diatonic(n) {
                    candidates.push(n);
                }
            }
        }
    }

    // Oscillation guard: a live streak makes revisiting the previous pitch
    // increasingly unlikely.
    if state.contour.direction_streak >= 1 {
        let p = (melody.oscillation_base * state.contour.direction_streak as f64)
            .min(melody.oscillation_cap);
        if guard_roll < p {
            candidates.retain(|&c| c != prev);
        }
    }

    candidates.sort_unstable();
    candidates.dedup();
    find_closest_note(prev, &candidates, Some(prev), smoothness, weights)
}

/// Chord tones available inside the range. A pitch class with no octave in
/// range contributes its nearest pool note clamped to the boundary, so
/// tight ranges still see every chord tone.
fn chord_tone_candidates(chord: &ChordNotes, pool: &[i32], range: (i32, i32)) -> Vec<i32> {
    let mut out: Vec<i32> = pool
        .iter()
        .copied()
        .filter(|&p| p >= range.0 && p <= range.1)
        .collect();

    for pc in chord.pitch_classes() {
        if out.iter().any(|&n| n.rem_euclid(12) as u8 == pc) {
            continue;
        }
        let nearest = pool
            .iter()
            .copied()
            .filter(|&n| n.rem_euclid(12) as u8 == pc)
            .min_by_key(|&n| distance_to_range(n, range));
        if let Some(n) = nearest {
            if let Ok(fitted) = fit_note_to_range(n, range.0, range.1) {
                out.push(fitted);
            }
        }
    }

    out.sort_unstable();
    out.dedup();
    out
}

fn distance_to_range(n: i32, range: (i32, i32)) -> i32 {
    if n < range.0 {
        range.0 - n
    } else if n > range.1 {
        n - range.1
    } else {
        0
    }
}

/// Stack accompaniment voices under the melody. Returns exactly
/// `num_voices` entries, lowest first, padded with `None` when the pool
/// runs short.
#[allow(clippy::too_many_arguments)]
pub fn voice_accompaniment(
    chord: &ChordNotes,
    pool: &[i32],
    melody: Option<i32>,
    range: (i32, i32),
    num_voices: usize,
    prev: &[Option<i32>],
    smoothness: u8,
    weights: &ScoringWeights,
) -> Vec<Option<i32>> {
    if num_voices == 0 {
        return Vec::new();
    }
    let ceiling = melody.unwrap_or(range.1 + 1);
    let candidates: Vec<i32> = pool
        .iter()
        .copied()
        .filter(|&p| p >= range.0 && p <= range.1 && p < ceiling)
        .filter(|&p| melody.map_or(true, |m| m - p <= MAX_MELODY_SPREAD))
        .collect();
    if candidates.is_empty() {
        return vec![None; num_voices];
    }

    let mut voices: Vec<Option<i32>> = Vec::with_capacity(num_voices);

    // Bass of the group: chord root in the lower half of the range, then
    // any root, then anything.
    let lower_half = (range.0 + range.1) / 2;
    let roots_low: Vec<i32> = candidates
        .iter()
        .copied()
        .filter(|&p| p.rem_euclid(12) as u8 == chord.root_pc() && p <= lower_half)
        .collect();
    let roots: Vec<i32> = candidates
        .iter()
        .copied()
        .filter(|&p| p.rem_euclid(12) as u8 == chord.root_pc())
        .collect();
    let bass_candidates = if !roots_low.is_empty() {
        roots_low
    } else if !roots.is_empty() {
        roots
    } else {
        candidates.clone()
    };
    let prev_bass = prev.first().copied().flatten();
    let target = prev_bass.unwrap_or(chord.root_midi - 12);
    let bass = find_closest_note(target, &bass_candidates, prev_bass, smoothness, weights);
    voices.push(bass);

    // Remaining voices climb from the bass, each within an octave of it
    // and above the voice below.
    let Some(bass) = bass else {
        voices.resize(num_voices, None);
        return voices;
    };
    let mut floor = bass;
    for i in 1..num_voices {
        let step_candidates: Vec<i32> = candidates
            .iter()
            .copied()
            .filter(|&p| p > floor && p - bass <= ACCOMP_STACK_SPAN)
            .collect();
        let prev_voice = prev.get(i).copied().flatten();
        let spread_target = bass + (i as i32) * (ceiling - bass) / (num_voices as i32);
        let target = prev_voice.unwrap_or(spread_target);
        let chosen = find_closest_note(target, &step_candidates, prev_voice, smoothness, weights);
        if let Some(n) = chosen {
            floor = n;
        }
        voices.push(chosen);
    }

    voices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chords::{expand_pool, materialize};
    use crate::resolver::resolve_numeral;
    use crate::theory::Key;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(numeral: &str, key_name: &str) -> (ChordNotes, Vec<i32>, Key) {
        let key = Key::parse(key_name).unwrap();
        let spec = resolve_numeral(numeral, &key).unwrap();
        let chord = materialize(&spec, &key).unwrap();
        let pool = expand_pool(&chord.midi);
        (chord, pool, key)
    }

    #[test]
    fn first_note_lands_near_the_range_center() {
        let (chord, pool, key) = setup("I", "C");
        let mut rng = StdRng::seed_from_u64(7);
        let note = next_melody_note(
            &chord,
            &pool,
            &key,
            MELODY_RANGE,
            &MelodyState::default(),
            5,
            &ScoringWeights::default(),
            &MelodyWeights::default(),
            &mut rng,
        )
        .unwrap();
        assert!(note >= MELODY_RANGE.0 && note <= MELODY_RANGE.1);
        // C4–C6 centers on C5, which is itself a chord tone.
        assert_eq!(note, 72);
    }

    #[test]
    fn tight_range_clamps_out_of_range_chord_tones() {
        let (chord, pool, _) = setup("I", "C");
        // C4–E4: G has no octave inside, so its nearest pool note (G4)
        // clamps onto the top bound.
        let candidates = chord_tone_candidates(&chord, &pool, (60, 64));
        assert_eq!(candidates, vec![60, 64]);
    }

    #[test]
    fn melody_is_deterministic_under_a_fixed_seed() {
        let (chord, pool, key) = setup("ii", "C");
        let state = MelodyState {
            previous: Some(65),
            contour: ContourState {
                last_direction: 1,
                direction_streak: 3,
            },
        };
        let run = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            next_melody_note(
                &chord,
                &pool,
                &key,
                MELODY_RANGE,
                &state,
                8,
                &ScoringWeights::default(),
                &MelodyWeights::default(),
                &mut rng,
            )
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn accompaniment_stacks_ascending_under_the_melody() {
        let (chord, pool, _) = setup("I", "C");
        let voices = voice_accompaniment(
            &chord,
            &pool,
            Some(72),
            ACCOMPANIMENT_RANGE,
            3,
            &[],
            5,
            &ScoringWeights::default(),
        );
        assert_eq!(voices.len(), 3);
        let notes: Vec<i32> = voices.iter().flatten().copied().collect();
        assert_eq!(notes.len(), 3);
        // Lowest voice is a root in the lower register.
        assert_eq!(notes[0].rem_euclid(12), 0);
        assert!(notes[0] <= (ACCOMPANIMENT_RANGE.0 + ACCOMPANIMENT_RANGE.1) / 2);
        // Ascending, all chord tones, all under the melody.
        assert!(notes.windows(2).all(|w| w[0] < w[1]));
        for &n in &notes {
            assert!([0, 4, 7].contains(&n.rem_euclid(12)));
            assert!(n < 72 && 72 - n <= MAX_MELODY_SPREAD);
        }
    }

    #[test]
    fn short_pool_pads_with_none() {
        let (chord, _, _) = setup("I", "C");
        // A pool with a single usable note cannot fill three voices.
        let voices = voice_accompaniment(
            &chord,
            &[48],
            Some(72),
            ACCOMPANIMENT_RANGE,
            3,
            &[],
            5,
            &ScoringWeights::default(),
        );
        assert_eq!(voices[0], Some(48));
        assert_eq!(voices[1], None);
        assert_eq!(voices[2], None);
    }

    #[test]
    fn empty_pool_yields_all_none() {
        let (chord, _, _) = setup("I", "C");
        let voices = voice_accompaniment(
            &chord,
            &[],
            Some(72),
            ACCOMPANIMENT_RANGE,
            3,
            &[],
            5,
            &ScoringWeights::default(),
        );
        assert_eq!(voices, vec![None, None, None]);
    }
}
