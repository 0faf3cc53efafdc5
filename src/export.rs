//! CSV export of the profile store.
//!
//! Column order is fixed so spreadsheets built on earlier exports keep working.
//! Fields are quoted per RFC 4180 only when they need it.

use crate::store::ProfileStore;
use crate::synthesis::sub_scores::wellbeing_fields;
use crate::types::{Profile, ScoreKind};

const BASE_COLUMNS: [&str; 11] = [
    "profile_id",
    "external_id",
    "editable_id",
    "department",
    "wellbeing",
    "activity",
    "sleep",
    "mental_wellbeing",
    "readiness",
    "archetype_count",
    "completeness",
];

const NOT_AVAILABLE: &str = "N/A";

/// Header row: base columns then every wellbeing sub-score name.
pub fn csv_header() -> Vec<&'static str> {
    BASE_COLUMNS.iter().copied().chain(wellbeing_fields()).collect()
}

/// Quote a field if it holds a comma, quote, or line break.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn format_score(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{v:.1}"),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn sub_score_cell(profile: &Profile, name: &str) -> String {
    profile
        .sub_scores
        .wellbeing
        .iter()
        .find(|s| s.name == name)
        .map(|s| s.value.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn row(store: &ProfileStore, profile: &Profile) -> Vec<String> {
    let mut cells = vec![
        profile.identity.profile_id.clone(),
        profile.identity.external_id.clone(),
        profile.identity.editable_id.clone(),
        store.department_of(profile.profile_id()).as_str().to_string(),
    ];
    cells.extend(ScoreKind::ALL.iter().map(|k| format_score(profile.scores.get(*k))));
    cells.push(profile.archetypes.len().to_string());
    cells.push(
        profile
            .completeness
            .map(|c| c.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    );
    cells.extend(wellbeing_fields().map(|name| sub_score_cell(profile, name)));
    cells
}

/// Render the whole store as CSV with CRLF line endings.
pub fn export_csv(store: &ProfileStore) -> String {
    let mut out = String::new();
    let header: Vec<String> = csv_header().into_iter().map(escape_field).collect();
    out.push_str(&header.join(","));
    out.push_str("\r\n");
    for profile in store.profiles() {
        let cells: Vec<String> = row(store, profile).iter().map(|c| escape_field(c)).collect();
        out.push_str(&cells.join(","));
        out.push_str("\r\n");
    }
    log::debug!("Exported {} profiles to CSV", store.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{reduce, ProfileAction};
    use crate::synthesis::{demo_identity, synthesize_profile};
    use crate::types::Department;
    use chrono::{TimeZone, Utc};

    fn store_with(profiles: Vec<Profile>) -> ProfileStore {
        reduce(&ProfileStore::default(), ProfileAction::ReplaceProfiles(profiles))
    }

    fn profile(n: usize) -> Profile {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).single().unwrap();
        synthesize_profile(demo_identity(n), now)
    }

    #[test]
    fn test_header_layout() {
        let header = csv_header();
        assert_eq!(header.len(), 11 + 13);
        assert_eq!(header[0], "profile_id");
        assert_eq!(header[10], "completeness");
        assert_eq!(header[11], "steps");
        assert_eq!(header[23], "mental_recovery");
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_row_values() {
        let mut p = profile(1);
        p.scores.sleep = None;
        p.identity.editable_id = "Smith, J".into();
        let store = reduce(
            &store_with(vec![p]),
            ProfileAction::AssignDepartment {
                profile_id: "demo_profile_1".into(),
                department: Department::Sales,
            },
        );

        let csv = export_csv(&store);
        let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);

        let row = lines[1];
        assert!(row.starts_with("demo_profile_1,"));
        assert!(row.contains(",\"Smith, J\",sales,67,37,N/A,82,33,12,87,"));
        // physical_recovery and mental_recovery are always unavailable.
        assert!(row.ends_with(",--,--"));
    }

    #[test]
    fn test_empty_store_exports_header_only() {
        let csv = export_csv(&ProfileStore::default());
        assert_eq!(csv.matches("\r\n").count(), 1);
        assert!(csv.starts_with("profile_id,external_id,editable_id,department,"));
    }
}
