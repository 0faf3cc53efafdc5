//! Live Sahha API access
//!
//! The app only reads from Sahha: exchange client credentials for an account
//! token, list the account's profiles, then pull the latest score per
//! dimension for each one. Any failure here is logged and the caller falls
//! back to synthesized data; nothing in this module is fatal.
//!
//! Modules:
//! - client: reqwest client for token exchange, profile search and scores

pub mod client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::synthesis;
use crate::types::{DataOrigin, HealthScores, Profile, ProfileIdentity, ScoreKind};

pub use client::SahhaClient;

/// Per-request timeout for the Sahha HTTP client.
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SahhaApiError {
    #[error("Sahha credentials not configured")]
    MissingCredentials,
    #[error("Account token rejected")]
    Unauthorized,
    #[error("Rate limited by Sahha")]
    RateLimited,
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(alias = "account_token")]
    pub account_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// One entry of the account profile search.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProfile {
    #[serde(alias = "id", alias = "profile_id")]
    pub profile_id: String,
    #[serde(alias = "external_id")]
    pub external_id: String,
    #[serde(default)]
    pub created_at_utc: Option<String>,
}

/// Profile search responses come either bare or wrapped in `items`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProfilePage {
    Items {
        items: Vec<ApiProfile>,
        #[serde(default, alias = "totalCount")]
        total_count: Option<usize>,
    },
    Bare(Vec<ApiProfile>),
}

impl ProfilePage {
    pub fn into_profiles(self) -> Vec<ApiProfile> {
        match self {
            ProfilePage::Items { items, .. } => items,
            ProfilePage::Bare(items) => items,
        }
    }
}

/// A single score record. `score` is a fraction in `[0, 1]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiScore {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub score_date_time: Option<String>,
}

fn score_kind(raw: &str) -> Option<ScoreKind> {
    let normalized: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    match normalized.as_str() {
        "wellbeing" => Some(ScoreKind::Wellbeing),
        "activity" => Some(ScoreKind::Activity),
        "sleep" => Some(ScoreKind::Sleep),
        "mentalwellbeing" => Some(ScoreKind::MentalWellbeing),
        "readiness" => Some(ScoreKind::Readiness),
        _ => None,
    }
}

/// Collapse score records into one value per dimension, latest wins.
///
/// Records sort by `scoreDateTime` (RFC 3339 strings compare in time order);
/// undated records count as oldest.
pub fn latest_scores(records: &[ApiScore]) -> HealthScores {
    let mut sorted: Vec<&ApiScore> = records.iter().collect();
    sorted.sort_by(|a, b| a.score_date_time.cmp(&b.score_date_time));

    let mut scores = HealthScores::default();
    for record in sorted {
        let (Some(kind), Some(score)) = (score_kind(&record.kind), record.score) else {
            continue;
        };
        let scaled = if (0.0..=1.0).contains(&score) {
            score * 100.0
        } else {
            score
        };
        scores.set(kind, Some((scaled * 10.0).round() / 10.0));
    }
    scores
}

/// Canonical profile for a live record; breakdowns are synthesized from the id.
pub fn live_profile(api: &ApiProfile, scores: HealthScores, now: DateTime<Utc>) -> Profile {
    let identity = ProfileIdentity::new(api.profile_id.clone(), api.external_id.clone());
    let mut profile = synthesis::enrich_profile(identity, scores, DataOrigin::Live, now);
    if let Some(created) = &api.created_at_utc {
        profile.created_at = created.clone();
    }
    profile
}

// ============================================================================
// Profile sources
// ============================================================================

/// Anything that can produce the current profile list.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_profiles(&self, now: DateTime<Utc>) -> Result<Vec<Profile>, SahhaApiError>;
}

/// Deterministic demo roster. Never fails.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSource {
    pub count: usize,
}

#[async_trait]
impl ProfileSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn fetch_profiles(&self, now: DateTime<Utc>) -> Result<Vec<Profile>, SahhaApiError> {
        Ok(synthesis::demo_roster(self.count, now))
    }
}

/// Try `primary`, fall back to the synthesizer on error or an empty account.
pub async fn fetch_or_synthesize(
    primary: &dyn ProfileSource,
    fallback: &SyntheticSource,
    now: DateTime<Utc>,
) -> Vec<Profile> {
    match primary.fetch_profiles(now).await {
        Ok(profiles) if !profiles.is_empty() => {
            log::info!("Loaded {} profiles from {}", profiles.len(), primary.name());
            profiles
        }
        Ok(_) => {
            log::info!("{} returned no profiles; using demo data", primary.name());
            synthesis::demo_roster(fallback.count, now)
        }
        Err(e) => {
            log::warn!("{} fetch failed, using demo data: {}", primary.name(), e);
            synthesis::demo_roster(fallback.count, now)
        }
    }
}
