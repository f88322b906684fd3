//! Alert rule evaluation
//!
//! Rules are user-defined thresholds on one metric each. Evaluation is a
//! pure pass over (observation, derived metrics, rules): each active rule
//! either triggers an alert or it doesn't, and a rule whose metric cannot
//! be computed yet (growth rate before a second observation exists) is
//! skipped for the cycle — an expected cold-start condition, not an error.
//!
//! The engine itself is stateless and never de-duplicates: idempotence of
//! persisted alerts rests entirely on the storage layer's uniqueness key
//! `(rule_id, video_id, observed_at)`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, trace};
use uuid::Uuid;

use crate::VideoObservation;
use crate::metrics::DerivedMetrics;
use crate::storage::schema::{Alert, AlertRule, Comparison, MetricKind, Severity};
use crate::storage::{StorageBackend, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// The rule does not exist, or belongs to another identity.
    #[error("rule not found")]
    NotFound,

    #[error("threshold must be a finite number")]
    InvalidThreshold,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Extract the metric a rule thresholds on.
///
/// `None` means the metric is not computable for this observation yet.
fn metric_value(
    kind: MetricKind,
    observation: &VideoObservation,
    metrics: &DerivedMetrics,
) -> Option<f64> {
    match kind {
        MetricKind::ViewCount => Some(observation.view_count as f64),
        MetricKind::Vph => Some(metrics.vph),
        MetricKind::EngagementRate => Some(metrics.engagement_rate),
        MetricKind::ViralScore => Some(metrics.viral_score),
        MetricKind::GrowthRate => metrics.growth_rate,
    }
}

/// Evaluate one observation against a set of rules.
///
/// Pure: no storage access, no clock reads. Returns one alert per active
/// rule whose comparison holds. Inactive rules and rules with an
/// uncomputable metric produce nothing.
pub fn evaluate(
    observation: &VideoObservation,
    metrics: &DerivedMetrics,
    rules: &[AlertRule],
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for rule in rules.iter().filter(|r| r.is_active) {
        let Some(value) = metric_value(rule.metric, observation, metrics) else {
            trace!(
                "rule {} skipped: {} not computable for video {}",
                rule.id, rule.metric, observation.video_id
            );
            continue;
        };

        if !rule.comparison.holds(value, rule.threshold) {
            continue;
        }

        alerts.push(Alert {
            id: Uuid::new_v4(),
            rule_id: rule.id,
            owner: rule.owner.clone(),
            video_id: observation.video_id.clone(),
            channel_id: observation.channel_id.clone(),
            metric: rule.metric,
            metric_value: value,
            severity: Severity::for_value(value),
            message: format!(
                "{} is {value:.1} ({} {}) for video {}",
                rule.metric, rule.comparison, rule.threshold, observation.video_id
            ),
            triggered_at: now,
            observed_at: observation.observed_at,
            is_read: false,
            is_archived: false,
        });
    }

    alerts
}

/// Stateless service wrapping rule CRUD and alert persistence.
#[derive(Clone)]
pub struct RuleEngine {
    storage: Arc<dyn StorageBackend>,
}

impl RuleEngine {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Create a rule.
    ///
    /// Metric and operator validity is guaranteed by their closed enums;
    /// the threshold is the only thing left to validate.
    #[instrument(skip(self))]
    pub async fn create_rule(
        &self,
        owner: &str,
        metric: MetricKind,
        comparison: Comparison,
        threshold: f64,
    ) -> Result<AlertRule, RuleError> {
        if !threshold.is_finite() {
            return Err(RuleError::InvalidThreshold);
        }

        let rule = AlertRule {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            metric,
            comparison,
            threshold,
            is_active: true,
            created_at: Utc::now(),
        };

        self.storage.insert_rule(rule.clone()).await?;
        debug!("created rule {} ({metric} {comparison} {threshold})", rule.id);

        Ok(rule)
    }

    /// All rules for an identity.
    pub async fn list_rules(&self, owner: &str) -> Result<Vec<AlertRule>, RuleError> {
        Ok(self.storage.list_rules(owner).await?)
    }

    /// Only the rules the scheduler evaluates.
    pub async fn active_rules(&self, owner: &str) -> Result<Vec<AlertRule>, RuleError> {
        let rules = self.storage.list_rules(owner).await?;
        Ok(rules.into_iter().filter(|r| r.is_active).collect())
    }

    /// Enable or disable a rule.
    pub async fn set_active(
        &self,
        owner: &str,
        id: Uuid,
        is_active: bool,
    ) -> Result<AlertRule, RuleError> {
        let mut rule = self
            .storage
            .get_rule(owner, id)
            .await?
            .ok_or(RuleError::NotFound)?;

        rule.is_active = is_active;
        self.storage.update_rule(rule.clone()).await?;

        Ok(rule)
    }

    /// Delete a rule.
    pub async fn delete_rule(&self, owner: &str, id: Uuid) -> Result<(), RuleError> {
        if self.storage.delete_rule(owner, id).await? {
            Ok(())
        } else {
            Err(RuleError::NotFound)
        }
    }

    /// Persist a batch of alerts. An empty batch is a no-op. Returns how
    /// many alerts were actually stored after de-duplication.
    #[instrument(skip(self, alerts), fields(batch = alerts.len()))]
    pub async fn save(&self, alerts: Vec<Alert>) -> Result<usize, RuleError> {
        if alerts.is_empty() {
            return Ok(0);
        }

        let inserted = self.storage.insert_alerts(alerts).await?;
        debug!("persisted {inserted} alerts");

        Ok(inserted)
    }
}
