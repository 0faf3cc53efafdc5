//! Sub-score (biomarker) synthesis.
//!
//! Every field has exactly one offset in `FIELDS`, so a field that shows up in
//! several buckets (e.g. `steps` under activity and mental wellbeing) carries
//! the same value in each. Names and units are what the dashboard labels
//! render verbatim.

use crate::types::{SubScore, SubScoreBuckets, SubScoreValue};

use super::rng::SeededRng;

/// Gate draws sit this far past the field's value offset.
const GATE_OFFSET: i64 = 5;

#[derive(Debug, Clone, Copy)]
enum FieldRule {
    Int { min: i64, max: i64 },
    /// Drawn in tenths, reported with one decimal.
    Tenths { min: i64, max: i64 },
    /// Present on roughly half of profiles, `"--"` otherwise.
    Gated { min: i64, max: i64 },
    /// `"Xhrs Ymins"`; hours at the offset, minutes at offset + 1.
    Duration { min_hours: i64, max_hours: i64 },
    /// Instrument not available for synthetic profiles.
    Unavailable,
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    unit: &'static str,
    offset: i64,
    rule: FieldRule,
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "steps", unit: "count", offset: 1000, rule: FieldRule::Int { min: 2000, max: 15000 } },
    FieldSpec { name: "active_hours", unit: "hrs", offset: 1010, rule: FieldRule::Tenths { min: 10, max: 80 } },
    FieldSpec { name: "active_calories", unit: "kcal", offset: 1020, rule: FieldRule::Int { min: 150, max: 900 } },
    FieldSpec { name: "intense_activity_duration", unit: "mins", offset: 1030, rule: FieldRule::Gated { min: 5, max: 90 } },
    FieldSpec { name: "extended_inactivity", unit: "", offset: 1040, rule: FieldRule::Duration { min_hours: 4, max_hours: 12 } },
    FieldSpec { name: "floors_climbed", unit: "count", offset: 1050, rule: FieldRule::Gated { min: 0, max: 30 } },
    FieldSpec { name: "sleep_duration", unit: "hrs", offset: 1060, rule: FieldRule::Tenths { min: 50, max: 95 } },
    FieldSpec { name: "sleep_regularity", unit: "%", offset: 1070, rule: FieldRule::Int { min: 50, max: 95 } },
    FieldSpec { name: "sleep_debt", unit: "mins", offset: 1080, rule: FieldRule::Int { min: 0, max: 120 } },
    FieldSpec { name: "circadian_alignment", unit: "hrs", offset: 1090, rule: FieldRule::Tenths { min: 0, max: 30 } },
    FieldSpec { name: "sleep_continuity", unit: "%", offset: 1100, rule: FieldRule::Gated { min: 60, max: 98 } },
    FieldSpec { name: "physical_recovery", unit: "%", offset: 1110, rule: FieldRule::Unavailable },
    FieldSpec { name: "mental_recovery", unit: "%", offset: 1120, rule: FieldRule::Unavailable },
    FieldSpec { name: "activity_regularity", unit: "%", offset: 1130, rule: FieldRule::Int { min: 40, max: 95 } },
    FieldSpec { name: "walking_strain_capacity", unit: "%", offset: 1140, rule: FieldRule::Int { min: 40, max: 100 } },
    FieldSpec { name: "exercise_strain_capacity", unit: "%", offset: 1150, rule: FieldRule::Int { min: 30, max: 100 } },
    FieldSpec { name: "resting_heart_rate", unit: "bpm", offset: 1160, rule: FieldRule::Unavailable },
    FieldSpec { name: "heart_rate_variability", unit: "ms", offset: 1170, rule: FieldRule::Unavailable },
];

pub const ACTIVITY_FIELDS: &[&str] = &[
    "steps",
    "active_hours",
    "active_calories",
    "intense_activity_duration",
    "extended_inactivity",
    "floors_climbed",
];

pub const SLEEP_FIELDS: &[&str] = &[
    "sleep_duration",
    "sleep_regularity",
    "sleep_debt",
    "circadian_alignment",
    "sleep_continuity",
    "physical_recovery",
    "mental_recovery",
];

pub const MENTAL_WELLBEING_FIELDS: &[&str] = &[
    "circadian_alignment",
    "steps",
    "active_hours",
    "extended_inactivity",
    "activity_regularity",
    "sleep_regularity",
];

pub const READINESS_FIELDS: &[&str] = &[
    "sleep_duration",
    "sleep_debt",
    "physical_recovery",
    "mental_recovery",
    "walking_strain_capacity",
    "exercise_strain_capacity",
    "resting_heart_rate",
    "heart_rate_variability",
];

/// Wellbeing is the activity and sleep buckets back to back (13 entries).
pub fn wellbeing_fields() -> impl Iterator<Item = &'static str> {
    ACTIVITY_FIELDS.iter().chain(SLEEP_FIELDS.iter()).copied()
}

fn field_for(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

fn generate_value(rng: &SeededRng, field: &FieldSpec) -> SubScoreValue {
    match field.rule {
        FieldRule::Int { min, max } => SubScoreValue::Number(rng.rand_int(min, max, field.offset) as f64),
        FieldRule::Tenths { min, max } => {
            SubScoreValue::Number(rng.rand_int(min, max, field.offset) as f64 / 10.0)
        }
        FieldRule::Gated { min, max } => {
            if rng.coin_flip(field.offset + GATE_OFFSET) {
                SubScoreValue::Number(rng.rand_int(min, max, field.offset) as f64)
            } else {
                SubScoreValue::Unavailable
            }
        }
        FieldRule::Duration { min_hours, max_hours } => {
            let hours = rng.rand_int(min_hours, max_hours, field.offset);
            let mins = rng.rand_int(0, 59, field.offset + 1);
            SubScoreValue::Text(format!("{hours}hrs {mins}mins"))
        }
        FieldRule::Unavailable => SubScoreValue::Unavailable,
    }
}

fn build_bucket<'a>(rng: &SeededRng, names: impl IntoIterator<Item = &'a str>) -> Vec<SubScore> {
    names
        .into_iter()
        .filter_map(field_for)
        .map(|field| SubScore {
            name: field.name.to_string(),
            value: generate_value(rng, field),
            unit: field.unit.to_string(),
        })
        .collect()
}

/// Synthesize every sub-score bucket for a profile. Total for any input.
pub fn generate_sub_scores(profile_id: &str) -> SubScoreBuckets {
    let rng = SeededRng::new(profile_id);
    SubScoreBuckets {
        activity: build_bucket(&rng, ACTIVITY_FIELDS.iter().copied()),
        sleep: build_bucket(&rng, SLEEP_FIELDS.iter().copied()),
        mental_wellbeing: build_bucket(&rng, MENTAL_WELLBEING_FIELDS.iter().copied()),
        readiness: build_bucket(&rng, READINESS_FIELDS.iter().copied()),
        wellbeing: build_bucket(&rng, wellbeing_fields()),
    }
}
