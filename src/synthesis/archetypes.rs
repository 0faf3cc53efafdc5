//! Behavioural archetype classification.
//!
//! The definition table is a closed, versioned vocabulary: fourteen keys, ten
//! ordinal (values ranked 0..=3) and four categorical. Ordinal ranks come from
//! the health score returned by [`relevant_score`], nudged by one step either
//! way so that profiles with equal scores don't all land on the same label.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::types::{Archetype, ArchetypeDataType, HealthScores, Periodicity, ScoreKind};

use super::rng::SeededRng;

/// Number of archetype keys in the definition table.
pub const ARCHETYPE_COUNT: usize = 14;

/// Length of the observation window stamped on every archetype.
pub const WINDOW_DAYS: i64 = 30;

/// Presence roll must exceed this (out of 0..=99) for the archetype to exist.
const PRESENCE_THRESHOLD: i64 = 15;

/// Completeness ceiling regardless of wearable data.
const COMPLETENESS_CAP: i64 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchetypeDefinition {
    pub name: &'static str,
    pub data_type: ArchetypeDataType,
    pub requires_wearable: bool,
    /// Ordinal values are listed lowest rank first.
    pub values: &'static [&'static str],
}

pub const DEFINITIONS: [ArchetypeDefinition; ARCHETYPE_COUNT] = [
    ArchetypeDefinition {
        name: "activity_level",
        data_type: ArchetypeDataType::Ordinal,
        requires_wearable: false,
        values: &["sedentary", "lightly_active", "moderately_active", "highly_active"],
    },
    ArchetypeDefinition {
        name: "exercise_frequency",
        data_type: ArchetypeDataType::Ordinal,
        requires_wearable: true,
        values: &["rare_exerciser", "occasional_exerciser", "regular_exerciser", "frequent_exerciser"],
    },
    ArchetypeDefinition {
        name: "sleep_duration",
        data_type: ArchetypeDataType::Ordinal,
        requires_wearable: false,
        values: &["very_short_sleeper", "short_sleeper", "average_sleeper", "long_sleeper"],
    },
    ArchetypeDefinition {
        name: "sleep_regularity",
        data_type: ArchetypeDataType::Ordinal,
        requires_wearable: false,
        values: &[
            "highly_irregular_sleeper",
            "irregular_sleeper",
            "regular_sleeper",
            "highly_regular_sleeper",
        ],
    },
    ArchetypeDefinition {
        name: "sleep_quality",
        data_type: ArchetypeDataType::Ordinal,
        requires_wearable: true,
        values: &["poor_sleep_quality", "fair_sleep_quality", "good_sleep_quality", "optimal_sleep_quality"],
    },
    ArchetypeDefinition {
        name: "sleep_efficiency",
        data_type: ArchetypeDataType::Ordinal,
        requires_wearable: true,
        values: &[
            "highly_inefficient_sleeper",
            "inefficient_sleeper",
            "efficient_sleeper",
            "highly_efficient_sleeper",
        ],
    },
    ArchetypeDefinition {
        name: "bed_schedule",
        data_type: ArchetypeDataType::Ordinal,
        requires_wearable: false,
        values: &["very_late_sleeper", "late_sleeper", "early_sleeper", "very_early_sleeper"],
    },
    ArchetypeDefinition {
        name: "wake_schedule",
        data_type: ArchetypeDataType::Ordinal,
        requires_wearable: false,
        values: &["very_late_riser", "late_riser", "early_riser", "very_early_riser"],
    },
    ArchetypeDefinition {
        name: "mental_wellness",
        data_type: ArchetypeDataType::Ordinal,
        requires_wearable: false,
        values: &[
            "poor_mental_wellness",
            "fair_mental_wellness",
            "good_mental_wellness",
            "optimal_mental_wellness",
        ],
    },
    ArchetypeDefinition {
        name: "overall_wellness",
        data_type: ArchetypeDataType::Ordinal,
        requires_wearable: false,
        values: &["poor_wellness", "fair_wellness", "good_wellness", "optimal_wellness"],
    },
    ArchetypeDefinition {
        name: "primary_exercise",
        data_type: ArchetypeDataType::Categorical,
        requires_wearable: true,
        values: &["walking", "running", "cycling", "strength_training", "swimming", "yoga", "hiit"],
    },
    ArchetypeDefinition {
        name: "primary_exercise_type",
        data_type: ArchetypeDataType::Categorical,
        requires_wearable: true,
        values: &["cardio_focused", "strength_focused", "flexibility_focused", "mixed_training"],
    },
    ArchetypeDefinition {
        name: "secondary_exercise",
        data_type: ArchetypeDataType::Categorical,
        requires_wearable: true,
        values: &["walking", "running", "cycling", "strength_training", "swimming", "yoga", "hiit"],
    },
    ArchetypeDefinition {
        name: "sleep_pattern",
        data_type: ArchetypeDataType::Categorical,
        requires_wearable: false,
        values: &[
            "consistent_early_riser",
            "consistent_night_owl",
            "inconsistent_early_riser",
            "inconsistent_night_owl",
        ],
    },
];

/// Look up a definition by archetype key.
pub fn definition(name: &str) -> Option<&'static ArchetypeDefinition> {
    DEFINITIONS.iter().find(|d| d.name == name)
}

/// Which health score drives an ordinal archetype's rank.
///
/// `None` for categorical keys and for names outside the table.
pub fn relevant_score(name: &str) -> Option<ScoreKind> {
    match name {
        "activity_level" | "exercise_frequency" => Some(ScoreKind::Activity),
        "sleep_duration" | "sleep_regularity" | "sleep_quality" | "sleep_efficiency"
        | "bed_schedule" | "wake_schedule" => Some(ScoreKind::Sleep),
        "mental_wellness" => Some(ScoreKind::MentalWellbeing),
        "overall_wellness" => Some(ScoreKind::Wellbeing),
        _ => None,
    }
}

/// Map a 0..=100 score onto rank 0..=3 and apply a -1/0/+1 nudge.
pub fn ordinal_rank(score: f64, nudge: i64) -> u8 {
    let base = (score.clamp(0.0, 100.0) / 25.0).floor() as i64;
    (base + nudge).clamp(0, 3) as u8
}

/// Result of classifying one profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub archetypes: Vec<Archetype>,
    /// Independently seeded data-quality signal in `[45, 95]`.
    ///
    /// Deliberately NOT `archetypes.len() / 14`: the product tracks data
    /// completeness and archetype coverage as separate metrics.
    pub completeness: u8,
    pub has_wearable_data: bool,
}

/// Classify a profile into its archetypes.
///
/// Pure in its inputs: `now` only anchors the 30-day window timestamps.
pub fn classify_archetypes(
    profile_id: &str,
    external_id: &str,
    scores: &HealthScores,
    now: DateTime<Utc>,
) -> Classification {
    let rng = SeededRng::new(profile_id);
    let end = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let start = (now - Duration::days(WINDOW_DAYS)).to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut archetypes = Vec::with_capacity(ARCHETYPE_COUNT);
    for (position, def) in DEFINITIONS.iter().enumerate() {
        // 1-based so that no key shares offset 0 between its rolls.
        let index = position as i64 + 1;

        if rng.rand_int(0, 99, index * 7) <= PRESENCE_THRESHOLD {
            continue;
        }

        let (value, ordinality) = match def.data_type {
            ArchetypeDataType::Ordinal => {
                let score = relevant_score(def.name)
                    .and_then(|kind| scores.get(kind))
                    // No score to anchor on: fall back to a seeded rank.
                    .unwrap_or_else(|| (rng.rand_int(0, 3, index * 17) * 25) as f64);
                let nudge = rng.rand_int(0, 99, index * 11) % 3 - 1;
                let rank = ordinal_rank(score, nudge);
                (def.values[rank as usize], Some(rank))
            }
            ArchetypeDataType::Categorical => {
                let Some(value) = rng.pick(def.values, index * 13) else {
                    continue;
                };
                (*value, None)
            }
        };

        archetypes.push(Archetype {
            id: format!("{}:{}", profile_id, def.name),
            profile_id: profile_id.to_string(),
            external_id: external_id.to_string(),
            name: def.name.to_string(),
            value: value.to_string(),
            data_type: def.data_type,
            ordinality,
            requires_wearable: def.requires_wearable,
            periodicity: Periodicity::Monthly,
            start_date_time: start.clone(),
            end_date_time: end.clone(),
        });
    }

    let (completeness, has_wearable_data) = completeness_for(&rng);
    Classification {
        archetypes,
        completeness,
        has_wearable_data,
    }
}

fn completeness_for(rng: &SeededRng) -> (u8, bool) {
    let has_wearable = rng.rand_int(1, 10, 1) > 3;
    let raw = if has_wearable {
        rng.rand_int(75, 95, 2)
    } else {
        rng.rand_int(45, 75, 3)
    };
    (raw.min(COMPLETENESS_CAP) as u8, has_wearable)
}
