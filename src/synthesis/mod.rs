//! Deterministic demo data for when live Sahha data is unavailable.
//!
//! Everything here is a pure function of the profile id (plus a caller-chosen
//! `now` for archetype window stamps). Calling twice with the same id yields
//! identical output, so nothing needs persisting between refreshes.
//!
//! Modules:
//! - rng: seeded `sin`-based draws addressed by offset
//! - scores: the five top-level health scores
//! - sub_scores: per-dimension biomarkers, with `"--"` for missing instruments
//! - archetypes: the 14-key behavioural classifier + completeness signal

pub mod archetypes;
pub mod rng;
pub mod scores;
pub mod sub_scores;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::types::{DataOrigin, Department, HealthScores, Profile, ProfileIdentity};

pub use archetypes::{classify_archetypes, relevant_score, Classification};
pub use rng::SeededRng;
pub use scores::generate_health_scores;
pub use sub_scores::generate_sub_scores;

/// Offset for the demo department draw; clear of score/sub-score/archetype offsets.
const DEPARTMENT_OFFSET: i64 = 3000;

/// Departments demo profiles are spread across. `Unassigned` is left for the
/// user to exercise assignment.
const DEMO_DEPARTMENTS: [Department; 5] = [
    Department::Tech,
    Department::Operations,
    Department::Sales,
    Department::Admin,
    Department::Unassigned,
];

/// Namespace for deterministic demo external ids.
const DEMO_NAMESPACE: Uuid = Uuid::from_u128(0x5a4a_2f0e_7c1b_4d8e_9b61_3c2f_d0a1_e7b4);

/// Identity for `demo_profile_{n}`. The external id is a v5 UUID so it is
/// stable across runs yet looks like a real one.
pub fn demo_identity(n: usize) -> ProfileIdentity {
    let profile_id = format!("demo_profile_{n}");
    let external_id = Uuid::new_v5(&DEMO_NAMESPACE, profile_id.as_bytes()).to_string();
    let mut identity = ProfileIdentity::new(profile_id, external_id);
    identity.editable_id = format!("Employee {n:03}");
    identity
}

/// Identities `demo_profile_1 ..= demo_profile_{count}`.
pub fn demo_identities(count: usize) -> Vec<ProfileIdentity> {
    (1..=count).map(demo_identity).collect()
}

/// Seeded department for a demo profile.
pub fn demo_department(profile_id: &str) -> Department {
    SeededRng::new(profile_id)
        .pick(&DEMO_DEPARTMENTS, DEPARTMENT_OFFSET)
        .copied()
        .unwrap_or_default()
}

/// Full synthetic profile: scores, sub-scores, archetypes and completeness.
pub fn synthesize_profile(identity: ProfileIdentity, now: DateTime<Utc>) -> Profile {
    let scores = generate_health_scores(&identity.profile_id);
    enrich_profile(identity, scores, DataOrigin::Demo, now)
}

/// Attach synthesized sub-scores and archetypes to externally supplied scores.
///
/// Live and webhook profiles only carry top-level scores; the breakdown views
/// still need something to show, and deriving it from the id keeps it stable.
pub fn enrich_profile(
    identity: ProfileIdentity,
    scores: HealthScores,
    origin: DataOrigin,
    now: DateTime<Utc>,
) -> Profile {
    let sub_scores = generate_sub_scores(&identity.profile_id);
    let Classification {
        archetypes,
        completeness,
        ..
    } = classify_archetypes(&identity.profile_id, &identity.external_id, &scores, now);

    Profile {
        identity,
        scores,
        sub_scores,
        archetypes,
        completeness: Some(completeness),
        origin,
        created_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// Synthesize the full demo roster.
pub fn demo_roster(count: usize, now: DateTime<Utc>) -> Vec<Profile> {
    demo_identities(count)
        .into_iter()
        .map(|identity| synthesize_profile(identity, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 9, 30, 0).single().unwrap()
    }

    #[test]
    fn test_demo_identity_is_stable() {
        let a = demo_identity(1);
        let b = demo_identity(1);
        assert_eq!(a, b);
        assert_eq!(a.profile_id, "demo_profile_1");
        assert_eq!(a.editable_id, "Employee 001");
        assert_ne!(a.external_id, demo_identity(2).external_id);
    }

    #[test]
    fn test_synthesize_profile_is_deterministic() {
        let first = synthesize_profile(demo_identity(1), now());
        let second = synthesize_profile(demo_identity(1), now());
        assert_eq!(first, second);
        assert_eq!(first.scores.activity, Some(37.0));
        assert_eq!(first.origin, DataOrigin::Demo);
        assert_eq!(first.completeness, Some(87));
    }

    #[test]
    fn test_demo_roster_size_and_order() {
        let roster = demo_roster(5, now());
        let ids: Vec<&str> = roster.iter().map(|p| p.profile_id()).collect();
        assert_eq!(
            ids,
            ["demo_profile_1", "demo_profile_2", "demo_profile_3", "demo_profile_4", "demo_profile_5"]
        );
        assert!(demo_roster(0, now()).is_empty());
    }

    #[test]
    fn test_demo_department_is_stable() {
        for i in 1..=10 {
            let id = format!("demo_profile_{i}");
            assert_eq!(demo_department(&id), demo_department(&id));
        }
    }

    #[test]
    fn test_enrich_keeps_supplied_scores() {
        let scores = HealthScores {
            wellbeing: Some(12.0),
            activity: None,
            sleep: Some(99.0),
            mental_wellbeing: None,
            readiness: Some(50.0),
        };
        let profile = enrich_profile(
            ProfileIdentity::new("live-1", "ext-1"),
            scores,
            DataOrigin::Live,
            now(),
        );
        assert_eq!(profile.scores, scores);
        assert_eq!(profile.origin, DataOrigin::Live);
        assert_eq!(profile.created_at, "2025-06-15T09:30:00Z");
    }
}
