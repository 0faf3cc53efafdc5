use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Configuration
// =============================================================================

/// Application configuration stored in ~/.sahha-pulse/config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub sahha: SahhaCredentials,
    #[serde(default)]
    pub server: ServerConfig,
    /// Seconds between background profile refreshes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Number of `demo_profile_N` identities synthesized in demo mode.
    #[serde(default = "default_demo_profile_count")]
    pub demo_profile_count: usize,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_demo_profile_count() -> usize {
    25
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sahha: SahhaCredentials::default(),
            server: ServerConfig::default(),
            poll_interval_secs: default_poll_interval_secs(),
            demo_profile_count: default_demo_profile_count(),
        }
    }
}

/// Sahha API credentials. Any missing field puts the app in demo mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SahhaCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub environment: SahhaEnvironment,
}

impl SahhaCredentials {
    /// True when the account token exchange has everything it needs.
    pub fn is_complete(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.client_id) && present(&self.client_secret)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SahhaEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl SahhaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox-api.sahha.ai",
            Self::Production => "https://api.sahha.ai",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Override for the webhook database file. Defaults to ~/.sahha-pulse/webhook.db.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_path: None,
        }
    }
}

// =============================================================================
// Profiles
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileIdentity {
    pub profile_id: String,
    pub external_id: String,
    /// User-editable display label. No constraints.
    pub editable_id: String,
}

impl ProfileIdentity {
    pub fn new(profile_id: impl Into<String>, external_id: impl Into<String>) -> Self {
        let external_id = external_id.into();
        Self {
            profile_id: profile_id.into(),
            editable_id: external_id.clone(),
            external_id,
        }
    }
}

/// The five top-level health dimensions, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreKind {
    Wellbeing,
    Activity,
    Sleep,
    MentalWellbeing,
    Readiness,
}

impl ScoreKind {
    pub const ALL: [ScoreKind; 5] = [
        ScoreKind::Wellbeing,
        ScoreKind::Activity,
        ScoreKind::Sleep,
        ScoreKind::MentalWellbeing,
        ScoreKind::Readiness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wellbeing => "wellbeing",
            Self::Activity => "activity",
            Self::Sleep => "sleep",
            Self::MentalWellbeing => "mental_wellbeing",
            Self::Readiness => "readiness",
        }
    }
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level scores. `None` means no data for that dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HealthScores {
    pub wellbeing: Option<f64>,
    pub activity: Option<f64>,
    pub sleep: Option<f64>,
    pub mental_wellbeing: Option<f64>,
    pub readiness: Option<f64>,
}

impl HealthScores {
    pub fn get(&self, kind: ScoreKind) -> Option<f64> {
        match kind {
            ScoreKind::Wellbeing => self.wellbeing,
            ScoreKind::Activity => self.activity,
            ScoreKind::Sleep => self.sleep,
            ScoreKind::MentalWellbeing => self.mental_wellbeing,
            ScoreKind::Readiness => self.readiness,
        }
    }

    pub fn set(&mut self, kind: ScoreKind, value: Option<f64>) {
        let slot = match kind {
            ScoreKind::Wellbeing => &mut self.wellbeing,
            ScoreKind::Activity => &mut self.activity,
            ScoreKind::Sleep => &mut self.sleep,
            ScoreKind::MentalWellbeing => &mut self.mental_wellbeing,
            ScoreKind::Readiness => &mut self.readiness,
        };
        *slot = value.filter(|v| v.is_finite() && (0.0..=100.0).contains(v));
    }
}

/// A sub-score value. `Unavailable` serializes as the `"--"` sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum SubScoreValue {
    Number(f64),
    /// Pre-formatted composite such as `"7hrs 12mins"`.
    Text(String),
    Unavailable,
}

pub const UNAVAILABLE_SENTINEL: &str = "--";

impl SubScoreValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for SubScoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{:.1}", n),
            Self::Text(s) => f.write_str(s),
            Self::Unavailable => f.write_str(UNAVAILABLE_SENTINEL),
        }
    }
}

impl Serialize for SubScoreValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Unavailable => serializer.serialize_str(UNAVAILABLE_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for SubScoreValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(match raw {
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(SubScoreValue::Number)
                .unwrap_or(SubScoreValue::Unavailable),
            serde_json::Value::String(s) if s == UNAVAILABLE_SENTINEL => SubScoreValue::Unavailable,
            serde_json::Value::String(s) => SubScoreValue::Text(s),
            _ => SubScoreValue::Unavailable,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub name: String,
    pub value: SubScoreValue,
    pub unit: String,
}

/// Sub-scores grouped by the health dimension they explain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubScoreBuckets {
    pub activity: Vec<SubScore>,
    pub sleep: Vec<SubScore>,
    pub mental_wellbeing: Vec<SubScore>,
    pub readiness: Vec<SubScore>,
    pub wellbeing: Vec<SubScore>,
}

impl SubScoreBuckets {
    pub fn bucket(&self, kind: ScoreKind) -> &[SubScore] {
        match kind {
            ScoreKind::Wellbeing => &self.wellbeing,
            ScoreKind::Activity => &self.activity,
            ScoreKind::Sleep => &self.sleep,
            ScoreKind::MentalWellbeing => &self.mental_wellbeing,
            ScoreKind::Readiness => &self.readiness,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchetypeDataType {
    Ordinal,
    Categorical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    Weekly,
    Monthly,
    Quarterly,
}

/// A behavioural label for one of the fixed archetype dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Archetype {
    pub id: String,
    pub profile_id: String,
    pub external_id: String,
    pub name: String,
    pub value: String,
    pub data_type: ArchetypeDataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinality: Option<u8>,
    pub requires_wearable: bool,
    pub periodicity: Periodicity,
    pub start_date_time: String,
    pub end_date_time: String,
}

/// Organisational unit a profile is grouped under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Tech,
    Operations,
    Sales,
    Admin,
    #[default]
    Unassigned,
}

impl Department {
    pub const ALL: [Department; 5] = [
        Department::Tech,
        Department::Operations,
        Department::Sales,
        Department::Admin,
        Department::Unassigned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tech => "tech",
            Self::Operations => "operations",
            Self::Sales => "sales",
            Self::Admin => "admin",
            Self::Unassigned => "unassigned",
        }
    }

    /// Lenient parse for values arriving from payloads; unknown ids are `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "tech" => Some(Self::Tech),
            "operations" => Some(Self::Operations),
            "sales" => Some(Self::Sales),
            "admin" => Some(Self::Admin),
            "unassigned" | "" => Some(Self::Unassigned),
            _ => None,
        }
    }
}

/// Where a profile's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Demo,
    Live,
    Webhook,
}

/// Canonical profile record used everywhere past the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub identity: ProfileIdentity,
    pub scores: HealthScores,
    #[serde(default)]
    pub sub_scores: SubScoreBuckets,
    #[serde(default)]
    pub archetypes: Vec<Archetype>,
    /// Independently tracked data-richness percentage; not derived from
    /// `archetypes.len()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness: Option<u8>,
    pub origin: DataOrigin,
    pub created_at: String,
}

impl Profile {
    pub fn profile_id(&self) -> &str {
        &self.identity.profile_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_score_value_sentinel_serialization() {
        let json = serde_json::to_string(&SubScoreValue::Unavailable).unwrap();
        assert_eq!(json, "\"--\"");

        let back: SubScoreValue = serde_json::from_str("\"--\"").unwrap();
        assert!(back.is_unavailable());

        let n: SubScoreValue = serde_json::from_str("42").unwrap();
        assert_eq!(n.as_number(), Some(42.0));

        let text: SubScoreValue = serde_json::from_str("\"6hrs 5mins\"").unwrap();
        assert_eq!(text, SubScoreValue::Text("6hrs 5mins".to_string()));
    }

    #[test]
    fn test_sub_score_value_display() {
        assert_eq!(SubScoreValue::Number(8412.0).to_string(), "8412");
        assert_eq!(SubScoreValue::Number(7.5).to_string(), "7.5");
        assert_eq!(SubScoreValue::Unavailable.to_string(), "--");
    }

    #[test]
    fn test_health_scores_set_rejects_out_of_range() {
        let mut scores = HealthScores::default();
        scores.set(ScoreKind::Sleep, Some(140.0));
        assert_eq!(scores.sleep, None);
        scores.set(ScoreKind::Sleep, Some(f64::NAN));
        assert_eq!(scores.sleep, None);
        scores.set(ScoreKind::Sleep, Some(64.0));
        assert_eq!(scores.get(ScoreKind::Sleep), Some(64.0));
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.demo_profile_count, 25);
        assert_eq!(config.server.bind_addr, "127.0.0.1:8787");
        assert!(!config.sahha.is_complete());
        assert_eq!(config.sahha.environment, SahhaEnvironment::Sandbox);
    }

    #[test]
    fn test_department_parse() {
        assert_eq!(Department::parse("Sales"), Some(Department::Sales));
        assert_eq!(Department::parse(""), Some(Department::Unassigned));
        assert_eq!(Department::parse("marketing"), None);
    }
}
