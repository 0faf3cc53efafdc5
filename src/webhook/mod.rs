//! Webhook intake for externally pushed Sahha profile batches.
//!
//! Payloads arrive in whichever shape the sender uses (`scores.wellbeing` or a
//! flat `wellbeingScore`, 0–1 or 0–100 scale). They are converted exactly once
//! here into [`StoredProfile`]; nothing past this module sees the raw shape.
//!
//! Modules:
//! - db: SQLite persistence (last-write-wins per profile id)

pub mod db;

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PulseError;
use crate::synthesis;
use crate::types::{DataOrigin, HealthScores, Profile, ProfileIdentity, ScoreKind};

use db::WebhookDb;

// =============================================================================
// Wire types
// =============================================================================

/// Scores nested under `scores`. Accepts both camelCase and snake_case keys.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScores {
    #[serde(default)]
    pub wellbeing: Option<f64>,
    #[serde(default)]
    pub activity: Option<f64>,
    #[serde(default)]
    pub sleep: Option<f64>,
    #[serde(default, alias = "mental_wellbeing")]
    pub mental_wellbeing: Option<f64>,
    #[serde(default)]
    pub readiness: Option<f64>,
}

/// A profile exactly as a webhook sender delivers it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProfile {
    #[serde(alias = "id", alias = "profile_id")]
    pub profile_id: String,
    #[serde(default, alias = "external_id")]
    pub external_id: Option<String>,
    #[serde(default, alias = "editable_id")]
    pub editable_id: Option<String>,
    #[serde(default)]
    pub scores: Option<RawScores>,
    #[serde(default)]
    pub wellbeing_score: Option<f64>,
    #[serde(default)]
    pub activity_score: Option<f64>,
    #[serde(default)]
    pub sleep_score: Option<f64>,
    #[serde(default)]
    pub mental_wellbeing_score: Option<f64>,
    #[serde(default)]
    pub readiness_score: Option<f64>,
    #[serde(default)]
    pub department: Option<String>,
}

impl RawProfile {
    fn raw_score(&self, kind: ScoreKind) -> Option<f64> {
        let nested = self.scores.as_ref().and_then(|s| match kind {
            ScoreKind::Wellbeing => s.wellbeing,
            ScoreKind::Activity => s.activity,
            ScoreKind::Sleep => s.sleep,
            ScoreKind::MentalWellbeing => s.mental_wellbeing,
            ScoreKind::Readiness => s.readiness,
        });
        nested.or(match kind {
            ScoreKind::Wellbeing => self.wellbeing_score,
            ScoreKind::Activity => self.activity_score,
            ScoreKind::Sleep => self.sleep_score,
            ScoreKind::MentalWellbeing => self.mental_wellbeing_score,
            ScoreKind::Readiness => self.readiness_score,
        })
    }

    /// Canonical scores on a 0–100 scale.
    ///
    /// Sahha reports fractions in `[0, 1]`; when every present score fits that
    /// range the whole set is scaled up. Mixed scales are taken as 0–100.
    pub fn health_scores(&self) -> HealthScores {
        let raw: Vec<(ScoreKind, Option<f64>)> =
            ScoreKind::ALL.iter().map(|k| (*k, self.raw_score(*k))).collect();
        let present: Vec<f64> = raw.iter().filter_map(|(_, v)| *v).collect();
        let fractional = !present.is_empty() && present.iter().all(|v| (0.0..=1.0).contains(v));
        let factor = if fractional { 100.0 } else { 1.0 };

        let mut scores = HealthScores::default();
        for (kind, value) in raw {
            scores.set(kind, value.map(|v| (v * factor * 10.0).round() / 10.0));
        }
        scores
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub profiles: Vec<RawProfile>,
}

/// `POST` body: `{ event, timestamp, data: { profiles } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub data: WebhookData,
}

/// Stored subset of a webhook profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProfile {
    pub profile_id: String,
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable_id: Option<String>,
    pub scores: HealthScores,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub event: String,
    pub received_at: String,
}

impl StoredProfile {
    pub fn from_raw(raw: &RawProfile, event: &str, received_at: &str) -> Self {
        Self {
            profile_id: raw.profile_id.trim().to_string(),
            external_id: raw
                .external_id
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| raw.profile_id.trim().to_string()),
            editable_id: raw.editable_id.clone(),
            scores: raw.health_scores(),
            department: raw.department.clone(),
            event: event.to_string(),
            received_at: received_at.to_string(),
        }
    }

    /// Canonical profile with id-derived sub-scores and archetypes attached.
    pub fn to_profile(&self, now: DateTime<Utc>) -> Profile {
        let mut identity = ProfileIdentity::new(self.profile_id.clone(), self.external_id.clone());
        if let Some(editable) = &self.editable_id {
            identity.editable_id = editable.clone();
        }
        let mut profile = synthesis::enrich_profile(identity, self.scores, DataOrigin::Webhook, now);
        profile.created_at = self.received_at.clone();
        profile
    }
}

/// `{ success, message }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
}

/// `{ success, count, profiles, lastUpdated }`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSnapshot {
    pub success: bool,
    pub count: usize,
    pub profiles: Vec<StoredProfile>,
    pub last_updated: Option<String>,
}

// =============================================================================
// Operations
// =============================================================================

/// Validate a raw request body. Errors name the first missing piece.
pub fn parse_payload(body: &[u8]) -> Result<WebhookPayload, PulseError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| PulseError::InvalidPayload(format!("body is not valid JSON: {e}")))?;

    if !value.get("event").is_some_and(|e| e.is_string()) {
        return Err(PulseError::InvalidPayload("missing event type".into()));
    }
    let has_profiles = value
        .get("data")
        .and_then(|d| d.get("profiles"))
        .is_some_and(|p| p.is_array());
    if !has_profiles {
        return Err(PulseError::InvalidPayload("missing profiles array".into()));
    }

    let payload: WebhookPayload = serde_json::from_value(value)
        .map_err(|e| PulseError::InvalidPayload(format!("malformed profile entry: {e}")))?;

    if let Some(blank) = payload
        .data
        .profiles
        .iter()
        .position(|p| p.profile_id.trim().is_empty())
    {
        return Err(PulseError::InvalidPayload(format!(
            "profile at index {blank} has an empty profileId"
        )));
    }
    Ok(payload)
}

/// Handle a `POST`: validate, then upsert every profile in the batch.
pub fn ingest(db: &mut WebhookDb, body: &[u8], now: DateTime<Utc>) -> Result<WebhookAck, PulseError> {
    let payload = parse_payload(body)?;
    let received_at = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let stored: Vec<StoredProfile> = payload
        .data
        .profiles
        .iter()
        .map(|raw| StoredProfile::from_raw(raw, &payload.event, &received_at))
        .collect();

    let received = db.upsert_profiles(&stored, &received_at)?;
    // Later entries for the same id overwrite earlier ones within the batch.
    let distinct = stored
        .iter()
        .map(|p| p.profile_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    log::info!(
        "Webhook '{}' stored {} profile(s) from {} entries (sent at {})",
        payload.event,
        distinct,
        received,
        payload.timestamp.as_deref().unwrap_or("unknown")
    );
    let message = if distinct == received {
        format!("Stored {distinct} profile(s) from '{}'", payload.event)
    } else {
        format!(
            "Stored {distinct} profile(s) from '{}' ({received} received, {distinct} distinct)",
            payload.event
        )
    };
    Ok(WebhookAck {
        success: true,
        message,
    })
}

/// Handle a `GET`.
pub fn snapshot(db: &WebhookDb) -> Result<WebhookSnapshot, PulseError> {
    let profiles = db.list_profiles()?;
    Ok(WebhookSnapshot {
        success: true,
        count: profiles.len(),
        profiles,
        last_updated: db.last_updated()?,
    })
}

/// Handle a `DELETE`. Refuses unless `confirm` is set.
pub fn clear(db: &mut WebhookDb, confirm: bool, now: DateTime<Utc>) -> Result<WebhookAck, PulseError> {
    if !confirm {
        return Err(PulseError::ConfirmationRequired);
    }
    let removed = db.clear(&now.to_rfc3339_opts(SecondsFormat::Secs, true))?;
    log::warn!("Webhook store cleared ({} profile(s) removed)", removed);
    Ok(WebhookAck {
        success: true,
        message: format!("Cleared {removed} profile(s)"),
    })
}
