//! Daily API-quota budget tracking
//!
//! Every costed upstream call is charged against a per-identity budget that
//! resets at the UTC day boundary. The tracker is a stateless service over
//! the storage trait: the ledger row is the source of truth, and the
//! storage layer's atomic increment is what makes concurrent `record`
//! calls safe.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::config::QuotaConfig;
use crate::storage::schema::OperationKind;
use crate::storage::{StorageBackend, StorageResult};

/// Unit cost of one occurrence of an operation.
///
/// Search is the expensive call; everything else is charged per item.
pub fn unit_cost(operation: OperationKind) -> u64 {
    match operation {
        OperationKind::Search => 100,
        OperationKind::VideoDetails => 1,
        OperationKind::ChannelVideos => 1,
    }
}

/// Deterministic cost estimate for `item_count` occurrences of an
/// operation, so callers can pre-check the budget before spending.
pub fn estimate_cost(operation: OperationKind, item_count: usize) -> u64 {
    unit_cost(operation) * item_count as u64
}

/// A point-in-time view of an identity's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub used: u64,
    pub limit: u64,
    pub remaining: u64,
}

/// Tracks and enforces the shared daily unit budget.
#[derive(Clone)]
pub struct QuotaTracker {
    storage: Arc<dyn StorageBackend>,
    config: QuotaConfig,
}

impl QuotaTracker {
    pub fn new(storage: Arc<dyn StorageBackend>, config: QuotaConfig) -> Self {
        Self { storage, config }
    }

    /// Today's budget status for an identity.
    ///
    /// A missing ledger row reads as zero used; the limit falls back to
    /// the system default when the identity has no override.
    pub async fn remaining(&self, owner: &str) -> StorageResult<QuotaStatus> {
        self.remaining_at(owner, Utc::now()).await
    }

    /// Budget status against an explicit clock (the day key is derived
    /// from it). Split out so tests control the reset boundary.
    pub async fn remaining_at(&self, owner: &str, now: DateTime<Utc>) -> StorageResult<QuotaStatus> {
        let entry = self.storage.quota_entry(owner, now.date_naive()).await?;
        let limit = self.config.limit_for(owner);

        Ok(QuotaStatus {
            used: entry.units_used,
            limit,
            remaining: limit.saturating_sub(entry.units_used),
        })
    }

    /// Admission check: does the budget cover `estimated_units`?
    ///
    /// This is a soft budget, not a lock: two concurrent reservations can
    /// both pass before either records, and an upstream call may consume
    /// more units than estimated. Call this before issuing the costed
    /// operation, then `record` what was actually spent.
    #[instrument(skip(self))]
    pub async fn reserve(&self, owner: &str, estimated_units: u64) -> StorageResult<bool> {
        let status = self.remaining(owner).await?;
        let admitted = status.remaining >= estimated_units;

        if !admitted {
            debug!(
                "quota admission refused for {owner}: {} remaining, {estimated_units} requested",
                status.remaining
            );
        }

        Ok(admitted)
    }

    /// Record actually consumed units against today's ledger row.
    ///
    /// The increment happens atomically at the storage layer, so
    /// concurrent workers recording for the same identity never lose an
    /// update. Returns the new daily total.
    #[instrument(skip(self))]
    pub async fn record(
        &self,
        owner: &str,
        operation: OperationKind,
        units: u64,
    ) -> StorageResult<u64> {
        self.storage
            .quota_add(owner, Utc::now().date_naive(), operation, units)
            .await
    }
}
