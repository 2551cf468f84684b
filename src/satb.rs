//! SATB voice assigner: bass first, then soprano, then the two inner
//! voices against doubling targets.
//!
//! Constraint handling is tiered: every voice first looks for its target
//! pitch class inside the full constraint set, then accepts any chord tone
//! in range, then relaxes spacing before giving up. A voice that still has
//! no candidates comes back as `None`; the caller carries on with the next
//! chord.

use crate::model::ChordNotes;
use crate::scorer::{find_closest_note, ScoringWeights};
use crate::theory::Key;

/// Default soprano range, C4–A5.
pub const SOPRANO_RANGE: (i32, i32) = (60, 81);
/// Default alto range, G3–D5.
pub const ALTO_RANGE: (i32, i32) = (55, 74);
/// Default tenor range, C3–G4.
pub const TENOR_RANGE: (i32, i32) = (48, 67);
/// Default bass range, E2–C4.
pub const BASS_RANGE: (i32, i32) = (40, 60);

/// Widest allowed soprano–alto gap, one octave.
pub const MAX_SOPRANO_ALTO: i32 = 12;
/// Widest allowed alto–tenor gap, one octave.
pub const MAX_ALTO_TENOR: i32 = 12;
/// Widest allowed tenor–bass gap, a perfect twelfth.
pub const MAX_TENOR_BASS: i32 = 19;

/// Configured MIDI ranges for the four parts.
#[derive(Debug, Clone, Copy)]
pub struct SatbRanges {
    pub soprano: (i32, i32),
    pub alto: (i32, i32),
    pub tenor: (i32, i32),
    pub bass: (i32, i32),
}

impl Default for SatbRanges {
    fn default() -> Self {
        Self {
            soprano: SOPRANO_RANGE,
            alto: ALTO_RANGE,
            tenor: TENOR_RANGE,
            bass: BASS_RANGE,
        }
    }
}

/// Previous pitches per part. Mutated only between steps, never inside one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SatbState {
    pub soprano: Option<i32>,
    pub alto: Option<i32>,
    pub tenor: Option<i32>,
    pub bass: Option<i32>,
}

/// Assign all four voices for one chord.
pub fn assign_satb(
    chord: &ChordNotes,
    pool: &[i32],
    key: &Key,
    ranges: &SatbRanges,
    prev: &SatbState,
    smoothness: u8,
    weights: &ScoringWeights,
) -> SatbState {
    let bass = pick_bass(chord, pool, ranges.bass, prev.bass, smoothness, weights);
    let soprano = pick_soprano(pool, ranges.soprano, bass, prev.soprano, smoothness, weights);

    // Without an outer frame there is nothing to space the inner voices
    // against.
    let (alto, tenor) = match (bass, soprano) {
        (Some(b), Some(s)) => {
            let targets = inner_target_pcs(chord, key, b, s);
            let lt = key.leading_tone_pc();
            let sounded = |notes: &[i32]| notes.iter().any(|&n| n.rem_euclid(12) as u8 == lt);
            let avoid = sounded(&[b, s]).then_some(lt);
            let alto = pick_alto(pool, ranges.alto, s, b, targets[0], avoid, prev, smoothness, weights);
            let avoid = sounded(&[b, s].into_iter().chain(alto).collect::<Vec<_>>()).then_some(lt);
            let tenor =
                pick_tenor(pool, ranges.tenor, alto, s, b, targets[1], avoid, prev, smoothness, weights);
            (alto, tenor)
        }
        _ => (None, None),
    };

    SatbState {
        soprano,
        alto,
        tenor,
        bass,
    }
}

fn in_range(pool: &[i32], range: (i32, i32)) -> Vec<i32> {
    pool.iter()
        .copied()
        .filter(|&p| p >= range.0 && p <= range.1)
        .collect()
}

fn with_pc(candidates: &[i32], pc: u8) -> Vec<i32> {
    candidates
        .iter()
        .copied()
        .filter(|&p| p.rem_euclid(12) as u8 == pc)
        .collect()
}

// ─── Bass ────────────────────────────────────────────────────────────

fn pick_bass(
    chord: &ChordNotes,
    pool: &[i32],
    range: (i32, i32),
    prev: Option<i32>,
    smoothness: u8,
    weights: &ScoringWeights,
) -> Option<i32> {
    let bass_pool = in_range(pool, range);
    if bass_pool.is_empty() {
        log::warn!("no chord tones in the bass range for '{:?}'", chord.names);
        return None;
    }

    if let Some(pc) = chord.required_bass_pc {
        let inverted = with_pc(&bass_pool, pc);
        if !inverted.is_empty() {
            let target = prev.map_or(chord.root_midi - 12, |p| p - 1);
            return find_closest_note(target, &inverted, prev, smoothness, weights);
        }
        log::warn!(
            "inversion bass pitch class {pc} not reachable in the bass range, using root position"
        );
    }

    // Root position preference: root, then fifth, then the lowest note in
    // range as an absolute fallback that bypasses the scorer.
    let root_notes = with_pc(&bass_pool, chord.root_pc());
    let candidates = if root_notes.is_empty() {
        match fifth_pc(chord) {
            Some(pc) => {
                let fifths = with_pc(&bass_pool, pc);
                if fifths.is_empty() {
                    return bass_pool.first().copied();
                }
                fifths
            }
            None => return bass_pool.first().copied(),
        }
    } else {
        root_notes
    };

    let target = prev.map_or(chord.root_midi - 12, |p| p - 1);
    find_closest_note(target, &candidates, prev, smoothness, weights)
}

/// Pitch class of the chord's fifth, if it has one.
fn fifth_pc(chord: &ChordNotes) -> Option<u8> {
    let root = chord.root_pc();
    chord
        .pitch_classes()
        .into_iter()
        .find(|&pc| (6..=8).contains(&(pc as i32 - root as i32).rem_euclid(12)))
}

// ─── Soprano ─────────────────────────────────────────────────────────

fn pick_soprano(
    pool: &[i32],
    range: (i32, i32),
    bass: Option<i32>,
    prev: Option<i32>,
    smoothness: u8,
    weights: &ScoringWeights,
) -> Option<i32> {
    let candidates: Vec<i32> = in_range(pool, range)
        .into_iter()
        .filter(|&p| bass.map_or(true, |b| p > b))
        .collect();
    if candidates.is_empty() {
        log::warn!("no chord tones in the soprano range");
        return None;
    }
    let target = prev.unwrap_or((range.0 + range.1) / 2);
    find_closest_note(target, &candidates, prev, smoothness, weights)
}

// ─── Doubling ────────────────────────────────────────────────────────

/// Decide which pitch classes the alto and tenor should aim for.
///
/// Uncovered chord tones come first, essential tones (third, seventh)
/// before root and fifth. When fewer than two tones remain uncovered, the
/// gap is filled by doubling: root over fifth over third, never the
/// leading tone. A chord whose every preferred double collides with the
/// leading tone falls back to any other chord tone, then the root.
fn inner_target_pcs(chord: &ChordNotes, key: &Key, bass: i32, soprano: i32) -> [u8; 2] {
    let root = chord.root_pc();
    let pcs = chord.pitch_classes();
    let covered = [bass.rem_euclid(12) as u8, soprano.rem_euclid(12) as u8];

    let degree_of = |pc: u8| (pc as i32 - root as i32).rem_euclid(12);
    let mut ordered: Vec<u8> = pcs.clone();
    // third/seventh first, then root, then fifth
    ordered.sort_by_key(|&pc| match degree_of(pc) {
        3 | 4 => 0,
        9..=11 => 1,
        0 => 2,
        _ => 3,
    });

    let mut targets: Vec<u8> = ordered
        .iter()
        .copied()
        .filter(|pc| !covered.contains(pc))
        .collect();

    while targets.len() < 2 {
        targets.push(doubling_pc(chord, key));
    }
    [targets[0], targets[1]]
}

/// Pick the pitch class to double: root > fifth > third, excluding the
/// leading tone, with emergency tiers when everything collides.
fn doubling_pc(chord: &ChordNotes, key: &Key) -> u8 {
    let lt = key.leading_tone_pc();
    let root = chord.root_pc();
    let mut preferred = vec![root];
    if let Some(fifth) = fifth_pc(chord) {
        preferred.push(fifth);
    }
    if let Some(third) = chord
        .pitch_classes()
        .into_iter()
        .find(|&pc| (3..=4).contains(&(pc as i32 - root as i32).rem_euclid(12)))
    {
        preferred.push(third);
    }

    if let Some(pc) = preferred.iter().copied().find(|&pc| pc != lt) {
        return pc;
    }
    if let Some(pc) = chord.pitch_classes().into_iter().find(|&pc| pc != lt) {
        log::warn!(
            "all preferred doubles of '{:?}' are the leading tone, doubling {pc} instead",
            chord.names
        );
        return pc;
    }
    log::warn!(
        "chord '{:?}' exhausts every doubling tier, doubling the root",
        chord.names
    );
    root
}

// ─── Inner voices ────────────────────────────────────────────────────

/// Target pitch class first; failing that, candidates that do not double
/// an already-sounded leading tone; any candidate last.
fn prefer_pc(candidates: Vec<i32>, pc: u8, avoid: Option<u8>) -> Vec<i32> {
    let preferred = with_pc(&candidates, pc);
    if !preferred.is_empty() {
        return preferred;
    }
    if let Some(avoid_pc) = avoid {
        let safe: Vec<i32> = candidates
            .iter()
            .copied()
            .filter(|&p| p.rem_euclid(12) as u8 != avoid_pc)
            .collect();
        if !safe.is_empty() {
            return safe;
        }
    }
    candidates
}

#[allow(clippy::too_many_arguments)]
fn pick_alto(
    pool: &[i32],
    range: (i32, i32),
    soprano: i32,
    bass: i32,
    target_pc: u8,
    avoid: Option<u8>,
    prev: &SatbState,
    smoothness: u8,
    weights: &ScoringWeights,
) -> Option<i32> {
    let bounded: Vec<i32> = in_range(pool, range)
        .into_iter()
        .filter(|&p| p < soprano && p > bass)
        .collect();

    let spaced: Vec<i32> = bounded
        .iter()
        .copied()
        .filter(|&p| soprano - p <= MAX_SOPRANO_ALTO)
        .collect();

    let candidates = if spaced.is_empty() {
        if bounded.is_empty() {
            log::warn!("no alto candidates between bass {bass} and soprano {soprano}");
            return None;
        }
        log::warn!("relaxing soprano-alto spacing to place the alto");
        prefer_pc(bounded, target_pc, avoid)
    } else {
        prefer_pc(spaced, target_pc, avoid)
    };

    let target = prev.alto.unwrap_or((soprano + bass) / 2);
    find_closest_note(target, &candidates, prev.alto, smoothness, weights)
}

#[allow(clippy::too_many_arguments)]
fn pick_tenor(
    pool: &[i32],
    range: (i32, i32),
    alto: Option<i32>,
    soprano: i32,
    bass: i32,
    target_pc: u8,
    avoid: Option<u8>,
    prev: &SatbState,
    smoothness: u8,
    weights: &ScoringWeights,
) -> Option<i32> {
    let ceiling = alto.unwrap_or(soprano);
    let bounded: Vec<i32> = in_range(pool, range)
        .into_iter()
        .filter(|&p| p > bass && p < ceiling)
        .collect();

    let spaced: Vec<i32> = bounded
        .iter()
        .copied()
        .filter(|&p| ceiling - p <= MAX_ALTO_TENOR && p - bass <= MAX_TENOR_BASS)
        .collect();

    let candidates = if spaced.is_empty() {
        if bounded.is_empty() {
            log::warn!("no tenor candidates between bass {bass} and {ceiling}");
            return None;
        }
        log::warn!("relaxing tenor spacing limits to place the tenor");
        prefer_pc(bounded, target_pc, avoid)
    } else {
        prefer_pc(spaced, target_pc, avoid)
    };

    let target = prev.tenor.unwrap_or((ceiling + bass) / 2);
    let chosen = find_closest_note(target, &candidates, prev.tenor, smoothness, weights);

    // Tenor must stay strictly below the alto. The candidate sets above
    // already enforce it; re-check in case the relaxed tier ever widens.
    if let (Some(t), Some(a)) = (chosen, alto) {
        if t >= a {
            let lower: Vec<i32> = candidates.into_iter().filter(|&p| p < a).collect();
            return find_closest_note(target, &lower, prev.tenor, smoothness, weights);
        }
    }
    chosen
}
