//! Voice-leading scorer: pick the candidate pitch that best continues a
//! line toward a target, given the previous pitch and a smoothness
//! preference.
//!
//! Every candidate gets one score (lower is better) built from its
//! distance to the target, shaped by the melodic interval it would form
//! from the previous pitch: repeated notes are penalized, steps are
//! rewarded, leaps cost more the wider they get, and motion against the
//! target direction is discouraged throughout.

/// Tunable weights for [`find_closest_note`]. One struct so individual
/// weights can be pinned in tests while the rest stay at their defaults.
#[derive(Debug, Clone)]
pub struct ScoringWeights {
    /// Widest interval still treated as an ordinary leap, in semitones.
    /// Anything larger falls into the wide-leap tier.
    pub leap_threshold: i32,
    /// Multiplier applied when the candidate moves against the direction
    /// from the previous pitch toward the target.
    pub reversal_penalty: f64,
    /// Flat penalty added for repeating the previous pitch.
    pub repeat_penalty: f64,
    /// How much smoothness softens the repeat penalty (0–1 scale factor).
    pub repeat_smoothness_relief: f64,
    /// Base discount for stepwise motion (1–2 semitones).
    pub step_factor: f64,
    /// How much smoothness deepens the stepwise discount.
    pub step_smoothness_relief: f64,
    /// Extra discount when a step also moves toward the target.
    pub step_direction_bonus: f64,
    /// A step's discount may mask at most this much target distance, in
    /// semitones. Keeps far-away stepwise candidates from out-scoring
    /// near-target ones.
    pub step_max_credit: f64,
    /// Base multiplier for leaps up to the threshold.
    pub leap_base: f64,
    /// Smoothness contribution to the leap multiplier.
    pub leap_smoothness_weight: f64,
    /// Extra multiplier when a leap moves against the target direction.
    pub leap_mismatch_penalty: f64,
    /// Base multiplier for leaps beyond the threshold.
    pub wide_leap_base: f64,
    /// Smoothness contribution to the wide-leap multiplier.
    pub wide_leap_smoothness_weight: f64,
    /// Extra multiplier when a wide leap moves against the target direction.
    pub wide_leap_mismatch_penalty: f64,
    /// Mild bias toward the target when there is no previous pitch.
    pub centering_bias: f64,
    /// Smoothness level at or above which the stepwise post-selection
    /// override kicks in.
    pub override_smoothness: u8,
    /// Maximum distance from the previous pitch for override candidates.
    pub override_span: i32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            leap_threshold: 7,
            reversal_penalty: 2.0,
            repeat_penalty: 8.0,
            repeat_smoothness_relief: 0.3,
            step_factor: 0.3,
            step_smoothness_relief: 0.6,
            step_direction_bonus: 0.7,
            step_max_credit: 2.0,
            leap_base: 1.2,
            leap_smoothness_weight: 0.8,
            leap_mismatch_penalty: 1.3,
            wide_leap_base: 2.0,
            wide_leap_smoothness_weight: 2.0,
            wide_leap_mismatch_penalty: 1.5,
            centering_bias: 0.2,
            override_smoothness: 7,
            override_span: 2,
        }
    }
}

/// Choose the best candidate for a voice moving toward `target`.
///
/// Returns `None` only for an empty candidate list; a singleton list
/// returns its element unconditionally. Score ties resolve to the higher
/// pitch, so equal inputs always produce equal outputs.
pub fn find_closest_note(
    target: i32,
    candidates: &[i32],
    previous: Option<i32>,
    smoothness: u8,
    weights: &ScoringWeights,
) -> Option<i32> {
    match candidates {
        [] => return None,
        [only] => return Some(*only),
        _ => {}
    }

    let w = f64::from(smoothness.min(10)) / 10.0;
    let target_dir = previous.map_or(0, |p| (target - p).signum());

    let mut best = candidates[0];
    let mut best_score = f64::INFINITY;
    for &candidate in candidates {
        let score = score_candidate(candidate, target, previous, target_dir, w, weights);
        if score < best_score || (score == best_score && candidate > best) {
            best_score = score;
            best = candidate;
        }
    }

    // At high smoothness, stepwise motion toward the target wins outright
    // over near-tie raw scores: among candidates within `override_span` of
    // the previous pitch that move with the target, take the one closest
    // to the target.
    if smoothness >= weights.override_smoothness && target_dir != 0 {
        if let Some(prev) = previous {
            let stepwise = candidates
                .iter()
                .copied()
                .filter(|&c| {
                    let iv = c - prev;
                    iv != 0 && iv.abs() <= weights.override_span && iv.signum() == target_dir
                })
                .min_by_key(|&c| (c - target).abs());
            if let Some(choice) = stepwise {
                return Some(choice);
            }
        }
    }

    Some(best)
}

fn score_candidate(
    candidate: i32,
    target: i32,
    previous: Option<i32>,
    target_dir: i32,
    w: f64,
    weights: &ScoringWeights,
) -> f64 {
    let base = f64::from((candidate - target).abs());

    let Some(prev) = previous else {
        // No history: mild centering pull toward the target.
        return base * (1.0 + base / 24.0 * weights.centering_bias);
    };

    let interval = candidate - prev;
    let span = interval.abs();
    let dir = interval.signum();
    let mut score = base;

    if dir != 0 && target_dir != 0 && dir != target_dir {
        score *= weights.reversal_penalty;
    }

    if span == 0 {
        score += weights.repeat_penalty * (1.0 - w * weights.repeat_smoothness_relief);
    } else if span <= 2 {
        let mut factor = weights.step_factor * (1.0 - w * weights.step_smoothness_relief);
        if dir == target_dir {
            factor *= weights.step_direction_bonus;
        }
        // The discount is capped: a step can hide only so much distance.
        score = (score * factor).max(score - weights.step_max_credit);
    } else if span <= weights.leap_threshold {
        let mut factor = weights.leap_base
            + (f64::from(span) / f64::from(weights.leap_threshold)) * w * weights.leap_smoothness_weight;
        if target_dir != 0 && dir != target_dir {
            factor *= weights.leap_mismatch_penalty;
        }
        score *= factor;
    } else {
        let mut factor =
            weights.wide_leap_base + (f64::from(span) / 12.0) * w * weights.wide_leap_smoothness_weight;
        if target_dir != 0 && dir != target_dir {
            factor *= weights.wide_leap_mismatch_penalty;
        }
        // Floor at the span itself so even an exact target hit pays for a
        // wide leap.
        score = (score * factor).max(f64::from(span));
    }

    score
}
