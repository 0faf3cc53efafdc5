//! Profile store: the profile list plus the department assignment map.
//!
//! Transitions go through [`reduce`], a pure function from the previous store
//! and an action to the next store. Callers own the container (the server
//! keeps one inside `AppState`); there is no global instance.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{Department, Profile};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStore {
    profiles: Vec<Profile>,
    /// profile_id -> department. Profiles without an entry are unassigned.
    assignments: BTreeMap<String, Assignment>,
}

/// Who decided a profile's department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentSource {
    /// Derived from the data source on refresh; later seeds replace it.
    Seeded,
    /// Chosen through the API; seeds never replace it.
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub department: Department,
    pub source: AssignmentSource,
}

/// State transitions the UI layer can request.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileAction {
    /// Replace the whole profile list (a refresh).
    ///
    /// Scores are replaced wholesale; user-edited display ids survive for
    /// profiles that are still present. Seeded assignments for profiles that
    /// are gone are dropped; user assignments are kept.
    ReplaceProfiles(Vec<Profile>),
    /// Add or replace a single profile by id.
    UpsertProfile(Profile),
    AssignDepartment {
        profile_id: String,
        department: Department,
    },
    /// Seed assignments. Replaces earlier seeds, never a user choice.
    SeedAssignments(Vec<(String, Department)>),
    EditDisplayId {
        profile_id: String,
        editable_id: String,
    },
    Clear,
}

/// Apply an action. Unknown profile ids make assignment/edit actions no-ops.
pub fn reduce(state: &ProfileStore, action: ProfileAction) -> ProfileStore {
    let mut next = state.clone();
    match action {
        ProfileAction::ReplaceProfiles(mut profiles) => {
            for profile in &mut profiles {
                if let Some(previous) = state.get(profile.profile_id()) {
                    profile.identity.editable_id = previous.identity.editable_id.clone();
                }
            }
            next.assignments.retain(|id, a| {
                a.source == AssignmentSource::User || profiles.iter().any(|p| p.profile_id() == id)
            });
            next.profiles = profiles;
        }
        ProfileAction::UpsertProfile(profile) => {
            match next
                .profiles
                .iter_mut()
                .find(|p| p.profile_id() == profile.profile_id())
            {
                Some(existing) => *existing = profile,
                None => next.profiles.push(profile),
            }
        }
        ProfileAction::AssignDepartment {
            profile_id,
            department,
        } => {
            if state.get(&profile_id).is_some() {
                next.assignments.insert(
                    profile_id,
                    Assignment {
                        department,
                        source: AssignmentSource::User,
                    },
                );
            }
        }
        ProfileAction::SeedAssignments(pairs) => {
            for (profile_id, department) in pairs {
                let user_chosen = next
                    .assignments
                    .get(&profile_id)
                    .is_some_and(|a| a.source == AssignmentSource::User);
                if !user_chosen {
                    next.assignments.insert(
                        profile_id,
                        Assignment {
                            department,
                            source: AssignmentSource::Seeded,
                        },
                    );
                }
            }
        }
        ProfileAction::EditDisplayId {
            profile_id,
            editable_id,
        } => {
            if let Some(profile) = next
                .profiles
                .iter_mut()
                .find(|p| p.profile_id() == profile_id)
            {
                profile.identity.editable_id = editable_id;
            }
        }
        ProfileAction::Clear => {
            next = ProfileStore::default();
        }
    }
    next
}

impl ProfileStore {
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, profile_id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.profile_id() == profile_id)
    }

    pub fn department_of(&self, profile_id: &str) -> Department {
        self.assignments
            .get(profile_id)
            .map(|a| a.department)
            .unwrap_or_default()
    }

    pub fn assignment(&self, profile_id: &str) -> Option<Assignment> {
        self.assignments.get(profile_id).copied()
    }

    /// Profiles grouped by department, in `Department` order.
    pub fn by_department(&self) -> BTreeMap<Department, Vec<&Profile>> {
        let mut groups: BTreeMap<Department, Vec<&Profile>> = BTreeMap::new();
        for profile in &self.profiles {
            groups
                .entry(self.department_of(profile.profile_id()))
                .or_default()
                .push(profile);
        }
        groups
    }

    /// Profiles in one department.
    pub fn in_department(&self, department: Department) -> Vec<&Profile> {
        self.profiles
            .iter()
            .filter(|p| self.department_of(p.profile_id()) == department)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::{demo_identity, synthesize_profile};
    use chrono::{TimeZone, Utc};

    fn profile(n: usize) -> Profile {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap();
        synthesize_profile(demo_identity(n), now)
    }

    fn seeded() -> ProfileStore {
        reduce(
            &ProfileStore::default(),
            ProfileAction::ReplaceProfiles(vec![profile(1), profile(2), profile(3)]),
        )
    }

    #[test]
    fn test_reduce_does_not_mutate_input() {
        let empty = ProfileStore::default();
        let next = reduce(&empty, ProfileAction::ReplaceProfiles(vec![profile(1)]));
        assert!(empty.is_empty());
        assert_eq!(next.len(), 1);
    }

    #[test]
    fn test_assign_department() {
        let store = seeded();
        assert_eq!(store.department_of("demo_profile_2"), Department::Unassigned);

        let store = reduce(
            &store,
            ProfileAction::AssignDepartment {
                profile_id: "demo_profile_2".into(),
                department: Department::Sales,
            },
        );
        assert_eq!(store.department_of("demo_profile_2"), Department::Sales);
        assert_eq!(store.in_department(Department::Sales).len(), 1);
    }

    #[test]
    fn test_assign_unknown_profile_is_noop() {
        let store = seeded();
        let next = reduce(
            &store,
            ProfileAction::AssignDepartment {
                profile_id: "ghost".into(),
                department: Department::Tech,
            },
        );
        assert_eq!(next, store);
    }

    #[test]
    fn test_seed_does_not_override_user_choice() {
        let store = reduce(
            &seeded(),
            ProfileAction::AssignDepartment {
                profile_id: "demo_profile_1".into(),
                department: Department::Admin,
            },
        );
        let store = reduce(
            &store,
            ProfileAction::SeedAssignments(vec![
                ("demo_profile_1".into(), Department::Tech),
                ("demo_profile_3".into(), Department::Operations),
            ]),
        );
        assert_eq!(store.department_of("demo_profile_1"), Department::Admin);
        assert_eq!(store.department_of("demo_profile_3"), Department::Operations);
    }

    #[test]
    fn test_later_seed_replaces_earlier_seed() {
        let store = reduce(
            &seeded(),
            ProfileAction::SeedAssignments(vec![("demo_profile_1".into(), Department::Sales)]),
        );
        let store = reduce(
            &store,
            ProfileAction::SeedAssignments(vec![("demo_profile_1".into(), Department::Tech)]),
        );
        assert_eq!(store.department_of("demo_profile_1"), Department::Tech);
        assert_eq!(
            store.assignment("demo_profile_1").map(|a| a.source),
            Some(AssignmentSource::Seeded)
        );
    }

    #[test]
    fn test_user_choice_outlives_seeds() {
        let store = reduce(
            &seeded(),
            ProfileAction::AssignDepartment {
                profile_id: "demo_profile_1".into(),
                department: Department::Admin,
            },
        );
        let store = reduce(
            &store,
            ProfileAction::SeedAssignments(vec![("demo_profile_1".into(), Department::Tech)]),
        );
        assert_eq!(store.department_of("demo_profile_1"), Department::Admin);
        assert_eq!(
            store.assignment("demo_profile_1").map(|a| a.source),
            Some(AssignmentSource::User)
        );
    }

    #[test]
    fn test_replace_drops_seeds_for_departed_profiles() {
        let store = reduce(
            &seeded(),
            ProfileAction::SeedAssignments(vec![
                ("demo_profile_1".into(), Department::Sales),
                ("demo_profile_2".into(), Department::Tech),
            ]),
        );
        let store = reduce(
            &store,
            ProfileAction::AssignDepartment {
                profile_id: "demo_profile_3".into(),
                department: Department::Admin,
            },
        );
        let store = reduce(&store, ProfileAction::ReplaceProfiles(vec![profile(2)]));

        assert_eq!(store.assignment("demo_profile_1"), None);
        assert_eq!(store.department_of("demo_profile_2"), Department::Tech);
        // Explicit choices are kept in case the profile comes back.
        assert_eq!(store.department_of("demo_profile_3"), Department::Admin);
    }

    #[test]
    fn test_edit_display_id_survives_refresh() {
        let store = reduce(
            &seeded(),
            ProfileAction::EditDisplayId {
                profile_id: "demo_profile_3".into(),
                editable_id: "Night shift lead".into(),
            },
        );
        let refreshed = reduce(
            &store,
            ProfileAction::ReplaceProfiles(vec![profile(3), profile(4)]),
        );
        assert_eq!(
            refreshed.get("demo_profile_3").unwrap().identity.editable_id,
            "Night shift lead"
        );
        assert_eq!(refreshed.get("demo_profile_4").unwrap().identity.editable_id, "Employee 004");
        assert!(refreshed.get("demo_profile_1").is_none());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut replacement = profile(2);
        replacement.scores.activity = Some(11.0);
        let store = reduce(&seeded(), ProfileAction::UpsertProfile(replacement));
        assert_eq!(store.len(), 3);
        assert_eq!(store.profiles()[1].scores.activity, Some(11.0));

        let store = reduce(&store, ProfileAction::UpsertProfile(profile(9)));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_by_department_groups_everyone() {
        let store = reduce(
            &seeded(),
            ProfileAction::AssignDepartment {
                profile_id: "demo_profile_1".into(),
                department: Department::Tech,
            },
        );
        let groups = store.by_department();
        assert_eq!(groups[&Department::Tech].len(), 1);
        assert_eq!(groups[&Department::Unassigned].len(), 2);
    }

    #[test]
    fn test_clear() {
        let store = reduce(&seeded(), ProfileAction::Clear);
        assert!(store.is_empty());
        assert_eq!(store.department_of("demo_profile_1"), Department::Unassigned);
    }
}
