//! Top-level health score synthesis.

use crate::types::{HealthScores, ScoreKind};

use super::rng::SeededRng;

/// Offset stride between score draws; score `i` uses `SCORE_OFFSET_STRIDE * (i + 1)`.
pub const SCORE_OFFSET_STRIDE: i64 = 100;

/// Plausible synthetic range for each dimension. Kept narrower than `[0, 100]`
/// so threshold logic (e.g. critical below 30) still splits the population.
pub fn score_bounds(kind: ScoreKind) -> (i64, i64) {
    match kind {
        ScoreKind::Wellbeing => (30, 95),
        ScoreKind::Activity => (25, 90),
        ScoreKind::Sleep => (35, 85),
        ScoreKind::MentalWellbeing => (40, 88),
        ScoreKind::Readiness => (30, 92),
    }
}

fn score_offset(kind: ScoreKind) -> i64 {
    let index = ScoreKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_default() as i64;
    SCORE_OFFSET_STRIDE * (index + 1)
}

/// Synthesize all five scores for a profile. Total for any input.
pub fn generate_health_scores(profile_id: &str) -> HealthScores {
    let rng = SeededRng::new(profile_id);
    let mut scores = HealthScores::default();
    for kind in ScoreKind::ALL {
        let (min, max) = score_bounds(kind);
        let value = rng.rand_int(min, max, score_offset(kind));
        scores.set(kind, Some(value as f64));
    }
    scores
}
