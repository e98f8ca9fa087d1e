//! Threshold-driven promotion of fallback selectors
//!
//! Counters are keyed by `(artifact, logical_id, strategy)` and guarded by a
//! single in-process lock; the store's compare-and-swap covers writers in
//! other processes. A counter reaching the threshold is reset inside the lock
//! before the promotion runs, so one burst of reports promotes once.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use resel_core_types::{FallbackUsageReport, HealingRecord, ProfileKey, SelectorStrategy};
use resel_locator::ReportSink;
use resel_profile_store::ProfileStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::HealError;
use crate::policy::HealPolicy;
use crate::promote::promote;

type CounterKey = (ProfileKey, SelectorStrategy);

const AUDIT_ATTEMPTS: u32 = 2;

enum Promotion {
    Committed(HealingRecord),
    AlreadyPrimary,
    Conflicted,
}

pub struct HealingEngine {
    store: Arc<dyn ProfileStore>,
    policy: HealPolicy,
    counters: Mutex<HashMap<CounterKey, u32>>,
}

impl HealingEngine {
    pub fn new(store: Arc<dyn ProfileStore>, policy: HealPolicy) -> Self {
        Self {
            store,
            policy,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &HealPolicy {
        &self.policy
    }

    /// Current count toward promotion for one strategy of one element.
    pub fn pending(&self, key: &ProfileKey, strategy: SelectorStrategy) -> u32 {
        self.counters
            .lock()
            .get(&(key.clone(), strategy))
            .copied()
            .unwrap_or(0)
    }

    /// Consume one report. Returns the healing record when it caused a
    /// promotion.
    pub async fn handle_report(
        &self,
        report: FallbackUsageReport,
    ) -> Result<Option<HealingRecord>, HealError> {
        if self.policy.retain_reports {
            self.store.append_report(&report).await?;
        }
        let key = report.key();

        if report.is_primary_success() {
            self.reset(&key);
            debug!(key = %key, "primary success resets counters");
            return Ok(None);
        }
        let Some(strategy) = report.fallback_strategy() else {
            debug!(key = %key, "exhausted resolution does not count toward promotion");
            return Ok(None);
        };
        if !self.bump(&key, strategy) {
            return Ok(None);
        }

        match self.promote_with_retry(&key, strategy).await {
            Ok(Promotion::Committed(record)) => {
                self.reset(&key);
                Ok(Some(record))
            }
            Ok(Promotion::AlreadyPrimary) => {
                debug!(key = %key, strategy = strategy.name(), "strategy already primary");
                self.reset(&key);
                Ok(None)
            }
            Ok(Promotion::Conflicted) => {
                warn!(
                    key = %key,
                    strategy = strategy.name(),
                    "promotion abandoned after repeated version conflicts"
                );
                self.rearm(&key, strategy);
                Ok(None)
            }
            Err(err @ HealError::StrategyNotInProfile { .. }) => {
                warn!(key = %key, error = %err, "promotion abandoned");
                self.reset(&key);
                Ok(None)
            }
            Err(err) => {
                self.rearm(&key, strategy);
                Err(err)
            }
        }
    }

    /// Run the engine as a task fed by the returned handle. Reports are
    /// consumed in submission order; the task ends when every handle is
    /// dropped.
    pub fn spawn(self: Arc<Self>) -> (HealingHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<FallbackUsageReport>();
        let task = tokio::spawn(async move {
            while let Some(report) = rx.recv().await {
                if let Err(err) = self.handle_report(report).await {
                    warn!(error = %err, "healing step failed");
                }
            }
            debug!("healing loop stopped");
        });
        (HealingHandle { tx }, task)
    }

    /// Increment and report whether the threshold was reached; a reached
    /// counter is cleared before the lock is released.
    fn bump(&self, key: &ProfileKey, strategy: SelectorStrategy) -> bool {
        let mut counters = self.counters.lock();
        let slot = counters.entry((key.clone(), strategy)).or_insert(0);
        *slot += 1;
        debug!(
            key = %key,
            strategy = strategy.name(),
            count = *slot,
            threshold = self.policy.promotion_threshold,
            "fallback success counted"
        );
        if *slot >= self.policy.promotion_threshold {
            counters.remove(&(key.clone(), strategy));
            return true;
        }
        false
    }

    fn reset(&self, key: &ProfileKey) {
        self.counters
            .lock()
            .retain(|(counted, _), _| counted != key);
    }

    /// Leave the counter one short so the next qualifying report retries.
    fn rearm(&self, key: &ProfileKey, strategy: SelectorStrategy) {
        self.counters.lock().insert(
            (key.clone(), strategy),
            self.policy.promotion_threshold.saturating_sub(1),
        );
    }

    async fn promote_with_retry(
        &self,
        key: &ProfileKey,
        strategy: SelectorStrategy,
    ) -> Result<Promotion, HealError> {
        for attempt in 0..=self.policy.conflict_retries {
            let current = self.store.get(key).await?;
            if current.primary.strategy == strategy {
                return Ok(Promotion::AlreadyPrimary);
            }
            let next = promote(&current, strategy, self.policy.max_fallbacks).ok_or_else(|| {
                HealError::StrategyNotInProfile {
                    key: key.clone(),
                    strategy,
                }
            })?;

            match self
                .store
                .compare_and_swap(key, current.version, next.clone())
                .await
            {
                Ok(backup) => {
                    let record = HealingRecord {
                        record_id: Uuid::new_v4(),
                        logical_id: next.logical_id.clone(),
                        owning_artifact: next.owning_artifact.clone(),
                        platform: next.platform,
                        old_profile_version: current.version,
                        new_profile_version: next.version,
                        promoted_strategy: strategy,
                        demoted_strategy: current.primary.strategy,
                        backup_path: backup.path,
                        timestamp: Utc::now(),
                    };
                    self.record_audit(key, &record).await;
                    info!(
                        key = %key,
                        promoted = strategy.name(),
                        demoted = current.primary.strategy.name(),
                        old_version = current.version,
                        new_version = next.version,
                        stability = next.stability.name(),
                        "promoted fallback selector"
                    );
                    return Ok(Promotion::Committed(record));
                }
                Err(err) if err.is_conflict() => {
                    warn!(key = %key, attempt, error = %err, "promotion lost compare-and-swap");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(Promotion::Conflicted)
    }

    /// The swap is already committed, so a failing audit append is retried
    /// once and then only logged.
    async fn record_audit(&self, key: &ProfileKey, record: &HealingRecord) {
        for attempt in 0..AUDIT_ATTEMPTS {
            match self.store.append_healing(record).await {
                Ok(()) => return,
                Err(err) => warn!(
                    key = %key,
                    record_id = %record.record_id,
                    attempt,
                    error = %err,
                    "could not append healing record"
                ),
            }
        }
    }
}

/// Submission side of a spawned [`HealingEngine`].
#[derive(Clone)]
pub struct HealingHandle {
    tx: mpsc::UnboundedSender<FallbackUsageReport>,
}

impl HealingHandle {
    pub fn submit(&self, report: FallbackUsageReport) -> Result<(), HealError> {
        self.tx.send(report).map_err(|_| HealError::ChannelClosed)
    }
}

#[async_trait]
impl ReportSink for HealingHandle {
    async fn deliver(&self, report: FallbackUsageReport) {
        if let Err(err) = self.submit(report) {
            warn!(error = %err, "dropping fallback usage report");
        }
    }
}
