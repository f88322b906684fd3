//! Stored record definitions
//!
//! Every record the core persists lives here: user-owned folders and rules,
//! generated alerts, and the daily quota ledger. Records are plain data —
//! ownership checks and evaluation logic live in the service modules.
//!
//! Folders, rules, and quota ledger rows are scoped to exactly one owning
//! identity. Alerts reference the rule that produced them and carry their
//! own idempotence key (`rule_id`, `video_id`, `observed_at`): inserting
//! the same key twice must leave a single stored row, which is the one
//! uniqueness guarantee the core demands of any backend.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-defined named grouping of monitored channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFolder {
    pub id: Uuid,

    /// Owning identity; all access is scoped to it
    pub owner: String,

    pub name: String,
    pub description: Option<String>,

    /// Member channel identifiers. Set semantics: no duplicates.
    pub channel_ids: Vec<String>,

    /// Whether the monitoring scheduler includes this folder's channels
    pub monitoring_enabled: bool,

    pub created_at: DateTime<Utc>,
}

/// The metric a rule thresholds on. Closed set — unknown names are
/// rejected at deserialization time and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    ViewCount,
    Vph,
    EngagementRate,
    ViralScore,
    GrowthRate,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::ViewCount => write!(f, "view count"),
            MetricKind::Vph => write!(f, "views per hour"),
            MetricKind::EngagementRate => write!(f, "engagement rate"),
            MetricKind::ViralScore => write!(f, "viral score"),
            MetricKind::GrowthRate => write!(f, "growth rate"),
        }
    }
}

/// Comparison operator applied between an observed metric and a rule's
/// threshold. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

impl Comparison {
    /// Apply the operator. Equality on metric values is exact — rules that
    /// want tolerance should band with `>=`/`<=` instead.
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Greater => value > threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::Less => value < threshold,
            Comparison::LessOrEqual => value <= threshold,
            Comparison::Equal => value == threshold,
            Comparison::NotEqual => value != threshold,
        }
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Equal => "=",
            Comparison::NotEqual => "!=",
        };
        write!(f, "{symbol}")
    }
}

/// A user-defined threshold condition on one metric type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: Uuid,
    pub owner: String,
    pub metric: MetricKind,
    pub comparison: Comparison,
    pub threshold: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Severity banding derived from the magnitude of the triggering value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Fixed banding on the observed metric value.
    pub fn for_value(value: f64) -> Self {
        if value > 1_000_000.0 {
            Severity::Critical
        } else if value > 100_000.0 {
            Severity::High
        } else if value > 10_000.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A generated, immutable alert fact.
///
/// Created only by the rule engine. `(rule_id, video_id, observed_at)` is
/// the de-duplication key enforced on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub owner: String,
    pub video_id: String,
    pub channel_id: String,
    pub metric: MetricKind,
    pub metric_value: f64,
    pub severity: Severity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,

    /// Timestamp of the observation that triggered this alert
    pub observed_at: DateTime<Utc>,

    pub is_read: bool,
    pub is_archived: bool,
}

impl Alert {
    /// The storage-level uniqueness key.
    pub fn dedupe_key(&self) -> (Uuid, String, DateTime<Utc>) {
        (self.rule_id, self.video_id.clone(), self.observed_at)
    }
}

/// One day's consumed quota for one identity.
///
/// Keyed by `(owner, day)`; a missing row reads as zero used. There is no
/// explicit reset — a new UTC day simply keys a new row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaLedgerEntry {
    pub owner: String,
    pub day: NaiveDate,
    pub units_used: u64,

    /// Per-operation breakdown of `units_used`
    pub by_operation: HashMap<OperationKind, u64>,
}

impl QuotaLedgerEntry {
    /// Fresh zero-used entry for an (owner, day) pair.
    pub fn zeroed(owner: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            owner: owner.into(),
            day,
            units_used: 0,
            by_operation: HashMap::new(),
        }
    }
}

/// Kind of costed upstream operation, for the ledger breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Full-text search against the upstream platform
    Search,

    /// Per-video statistics fetch
    VideoDetails,

    /// Listing a channel's recent uploads
    ChannelVideos,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Search => write!(f, "search"),
            OperationKind::VideoDetails => write!(f, "video_details"),
            OperationKind::ChannelVideos => write!(f, "channel_videos"),
        }
    }
}
