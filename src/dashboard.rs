//! Dashboard aggregates over the profile store.
//!
//! Unavailable sub-scores (`"--"`) are excluded from every average. Treating
//! them as zero drags metrics down for whoever lacks a wearable, which is
//! exactly the population the dashboard must not misreport.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::store::ProfileStore;
use crate::types::{DataOrigin, Department, HealthScores, Profile, ScoreKind, SubScoreValue};

const CRITICAL_BELOW: f64 = 30.0;
const AT_RISK_BELOW: f64 = 50.0;
const MODERATE_BELOW: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Critical,
    AtRisk,
    Moderate,
    Healthy,
}

pub fn risk_tier(score: f64) -> RiskTier {
    if score < CRITICAL_BELOW {
        RiskTier::Critical
    } else if score < AT_RISK_BELOW {
        RiskTier::AtRisk
    } else if score < MODERATE_BELOW {
        RiskTier::Moderate
    } else {
        RiskTier::Healthy
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Mean of the numeric values, skipping `"--"` and composite text.
pub fn average_sub_score(values: &[SubScoreValue]) -> Option<f64> {
    let numbers: Vec<f64> = values.iter().filter_map(SubScoreValue::as_number).collect();
    if numbers.is_empty() {
        return None;
    }
    Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

/// Mean that counts `"--"` as zero. The dashboard never reports this one.
pub fn average_sub_score_zero_filled(values: &[SubScoreValue]) -> Option<f64> {
    let numbers: Vec<f64> = values
        .iter()
        .filter_map(|v| match v {
            SubScoreValue::Number(n) => Some(*n),
            SubScoreValue::Unavailable => Some(0.0),
            SubScoreValue::Text(_) => None,
        })
        .collect();
    if numbers.is_empty() {
        return None;
    }
    Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

/// Average of one sub-score across profiles.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAverage {
    pub name: String,
    pub unit: String,
    pub average: Option<f64>,
    pub samples: usize,
    /// Profiles reporting `"--"` for this metric.
    pub unavailable: usize,
}

pub fn metric_average(profiles: &[&Profile], bucket: ScoreKind, name: &str) -> MetricAverage {
    let mut unit = String::new();
    let mut values = Vec::new();
    for profile in profiles {
        if let Some(sub) = profile
            .sub_scores
            .bucket(bucket)
            .iter()
            .find(|s| s.name == name)
        {
            if unit.is_empty() {
                unit = sub.unit.clone();
            }
            values.push(sub.value.clone());
        }
    }
    MetricAverage {
        name: name.to_string(),
        unit,
        average: average_sub_score(&values).map(round1),
        samples: values.iter().filter(|v| v.as_number().is_some()).count(),
        unavailable: values.iter().filter(|v| v.is_unavailable()).count(),
    }
}

/// Per-dimension mean over profiles, ignoring missing scores.
pub fn average_scores(profiles: &[&Profile]) -> HealthScores {
    let mut averages = HealthScores::default();
    for kind in ScoreKind::ALL {
        let present: Vec<f64> = profiles.iter().filter_map(|p| p.scores.get(kind)).collect();
        if !present.is_empty() {
            let mean = present.iter().sum::<f64>() / present.len() as f64;
            averages.set(kind, Some(round1(mean)));
        }
    }
    averages
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRisk {
    pub score: ScoreKind,
    pub tiers: BTreeMap<RiskTier, usize>,
    pub no_data: usize,
}

pub fn risk_distribution(profiles: &[&Profile], kind: ScoreKind) -> ScoreRisk {
    let mut tiers: BTreeMap<RiskTier, usize> = [
        RiskTier::Critical,
        RiskTier::AtRisk,
        RiskTier::Moderate,
        RiskTier::Healthy,
    ]
    .into_iter()
    .map(|t| (t, 0))
    .collect();
    let mut no_data = 0;
    for profile in profiles {
        match profile.scores.get(kind) {
            Some(score) => *tiers.entry(risk_tier(score)).or_default() += 1,
            None => no_data += 1,
        }
    }
    ScoreRisk {
        score: kind,
        tiers,
        no_data,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
    pub department: Department,
    pub profile_count: usize,
    pub averages: HealthScores,
    /// Profiles with at least one score in the critical tier.
    pub critical_profiles: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub generated_at: String,
    pub total_profiles: usize,
    pub origins: BTreeMap<String, usize>,
    pub averages: HealthScores,
    pub risk: Vec<ScoreRisk>,
    pub departments: Vec<DepartmentSummary>,
    pub average_completeness: Option<f64>,
    pub average_archetype_count: Option<f64>,
    /// archetype name -> value -> profile count
    pub archetype_distribution: BTreeMap<String, BTreeMap<String, usize>>,
    pub activity_metrics: Vec<MetricAverage>,
    pub sleep_metrics: Vec<MetricAverage>,
}

fn has_critical_score(profile: &Profile) -> bool {
    ScoreKind::ALL
        .iter()
        .filter_map(|k| profile.scores.get(*k))
        .any(|s| risk_tier(s) == RiskTier::Critical)
}

fn origin_key(origin: DataOrigin) -> &'static str {
    match origin {
        DataOrigin::Demo => "demo",
        DataOrigin::Live => "live",
        DataOrigin::Webhook => "webhook",
    }
}

/// Build the full dashboard summary for the current store.
pub fn summarize(store: &ProfileStore, now: DateTime<Utc>) -> DashboardSummary {
    let all: Vec<&Profile> = store.profiles().iter().collect();

    let mut origins: BTreeMap<String, usize> = BTreeMap::new();
    for profile in &all {
        *origins.entry(origin_key(profile.origin).to_string()).or_default() += 1;
    }

    let departments = store
        .by_department()
        .into_iter()
        .map(|(department, members)| DepartmentSummary {
            department,
            profile_count: members.len(),
            averages: average_scores(&members),
            critical_profiles: members.iter().filter(|p| has_critical_score(p)).count(),
        })
        .collect();

    let completeness: Vec<f64> = all
        .iter()
        .filter_map(|p| p.completeness.map(f64::from))
        .collect();
    let average_completeness = (!completeness.is_empty())
        .then(|| round1(completeness.iter().sum::<f64>() / completeness.len() as f64));
    let average_archetype_count = (!all.is_empty()).then(|| {
        round1(all.iter().map(|p| p.archetypes.len() as f64).sum::<f64>() / all.len() as f64)
    });

    let mut archetype_distribution: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for archetype in all.iter().flat_map(|p| p.archetypes.iter()) {
        *archetype_distribution
            .entry(archetype.name.clone())
            .or_default()
            .entry(archetype.value.clone())
            .or_default() += 1;
    }

    let metric_names = |bucket: ScoreKind| -> Vec<String> {
        all.first()
            .map(|p| p.sub_scores.bucket(bucket).iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    };
    let activity_metrics = metric_names(ScoreKind::Activity)
        .iter()
        .map(|name| metric_average(&all, ScoreKind::Activity, name))
        .collect();
    let sleep_metrics = metric_names(ScoreKind::Sleep)
        .iter()
        .map(|name| metric_average(&all, ScoreKind::Sleep, name))
        .collect();

    DashboardSummary {
        generated_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        total_profiles: all.len(),
        origins,
        averages: average_scores(&all),
        risk: ScoreKind::ALL
            .iter()
            .map(|k| risk_distribution(&all, *k))
            .collect(),
        departments,
        average_completeness,
        average_archetype_count,
        archetype_distribution,
        activity_metrics,
        sleep_metrics,
    }
}
