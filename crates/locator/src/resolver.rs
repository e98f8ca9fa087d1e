//! Run-time resolution with fallback chain orchestration

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use resel_core_types::{FallbackUsageReport, SelectorProfile, SelectorStrategy};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::LocatorError;
use crate::policy::RuntimeCfg;

/// Opaque reference to a live element, owned by the test executor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Failure of the live finder itself, as opposed to "not found".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FinderError {
    #[error("driver error: {0}")]
    Driver(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

/// Live "find element by (strategy, value)" capability.
#[async_trait]
pub trait ElementFinder: Send + Sync {
    async fn find(
        &self,
        strategy: SelectorStrategy,
        value: &str,
    ) -> Result<Option<ElementHandle>, FinderError>;
}

/// Destination for fallback usage reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, report: FallbackUsageReport);
}

#[async_trait]
impl ReportSink for mpsc::UnboundedSender<FallbackUsageReport> {
    async fn deliver(&self, report: FallbackUsageReport) {
        if self.send(report).is_err() {
            warn!("report channel closed, dropping fallback usage report");
        }
    }
}

/// State machine of one resolution. Indices are attempt-chain positions, so
/// the first fallback is `TryingFallback(1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionState {
    Idle,
    TryingPrimary,
    TryingFallback(usize),
    DonePrimary,
    DoneFallback(usize),
    Failed,
    Cancelled,
}

impl ResolutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolutionState::DonePrimary
                | ResolutionState::DoneFallback(_)
                | ResolutionState::Failed
                | ResolutionState::Cancelled
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Found,
    NotFound,
    TimedOut,
    Error(String),
}

/// One step of the attempt chain.
#[derive(Clone, Debug)]
pub struct AttemptRecord {
    pub index: usize,
    pub strategy: SelectorStrategy,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
}

/// Successful resolution.
#[derive(Clone, Debug)]
pub struct ResolvedElement {
    pub handle: ElementHandle,
    pub strategy: SelectorStrategy,
    pub succeeded_index: usize,
    pub state: ResolutionState,
    pub elapsed: Duration,
    pub attempts: Vec<AttemptRecord>,
    /// Report emitted for this resolution, if any.
    pub report: Option<FallbackUsageReport>,
}

impl ResolvedElement {
    pub fn used_fallback(&self) -> bool {
        self.succeeded_index > 0
    }
}

/// Tries the primary then each fallback of a profile against a live finder.
///
/// The runtime only reads profiles; reports go to the optional sink and are
/// also attached to the returned value.
pub struct ResolutionRuntime {
    finder: Arc<dyn ElementFinder>,
    cfg: RuntimeCfg,
    sink: Option<Arc<dyn ReportSink>>,
}

impl ResolutionRuntime {
    pub fn new(finder: Arc<dyn ElementFinder>, cfg: RuntimeCfg) -> Self {
        Self {
            finder,
            cfg,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &RuntimeCfg {
        &self.cfg
    }

    pub async fn resolve(&self, profile: &SelectorProfile) -> Result<ResolvedElement, LocatorError> {
        self.resolve_with_cancel(profile, &CancellationToken::new())
            .await
    }

    pub async fn resolve_with_cancel(
        &self,
        profile: &SelectorProfile,
        cancel: &CancellationToken,
    ) -> Result<ResolvedElement, LocatorError> {
        let started = Instant::now();
        let mut attempts = Vec::with_capacity(profile.attempt_count());
        let mut state = ResolutionState::Idle;

        for (index, candidate) in profile.attempt_chain().enumerate() {
            if cancel.is_cancelled() {
                return Err(self.cancelled(profile, state));
            }
            let budget = if index == 0 {
                state = ResolutionState::TryingPrimary;
                self.cfg.primary_timeout()
            } else {
                state = ResolutionState::TryingFallback(index);
                self.cfg.fallback_timeout()
            };
            debug!(
                logical_id = %profile.logical_id,
                index,
                strategy = candidate.strategy.name(),
                budget_ms = budget.as_millis() as u64,
                "attempting selector"
            );

            let attempt_started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(profile, state)),
                result = timeout(budget, self.finder.find(candidate.strategy, &candidate.value)) => result,
            };
            let (outcome, handle) = match result {
                Ok(Ok(Some(handle))) => (AttemptOutcome::Found, Some(handle)),
                Ok(Ok(None)) => (AttemptOutcome::NotFound, None),
                Ok(Err(err)) => (AttemptOutcome::Error(err.to_string()), None),
                Err(_) => (AttemptOutcome::TimedOut, None),
            };
            attempts.push(AttemptRecord {
                index,
                strategy: candidate.strategy,
                outcome: outcome.clone(),
                elapsed: attempt_started.elapsed(),
            });

            let Some(handle) = handle else {
                debug!(
                    logical_id = %profile.logical_id,
                    index,
                    outcome = ?outcome,
                    "selector attempt failed"
                );
                continue;
            };

            state = if index == 0 {
                ResolutionState::DonePrimary
            } else {
                ResolutionState::DoneFallback(index)
            };
            let report = if index > 0 || self.cfg.report_primary_success {
                let report = success_report(profile, index, candidate.strategy);
                self.emit(&report).await;
                Some(report)
            } else {
                None
            };
            if index > 0 {
                info!(
                    logical_id = %profile.logical_id,
                    artifact = %profile.owning_artifact,
                    primary = profile.primary.strategy.name(),
                    strategy = candidate.strategy.name(),
                    index,
                    "resolved via fallback"
                );
            }
            return Ok(ResolvedElement {
                handle,
                strategy: candidate.strategy,
                succeeded_index: index,
                state,
                elapsed: started.elapsed(),
                attempts,
                report,
            });
        }

        let report = failure_report(profile);
        self.emit(&report).await;
        warn!(
            logical_id = %profile.logical_id,
            artifact = %profile.owning_artifact,
            attempts = attempts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "element not resolvable"
        );
        Err(LocatorError::ElementNotResolvable {
            logical_id: profile.logical_id.clone(),
            attempts: attempts.len(),
            report: Box::new(report),
        })
    }

    async fn emit(&self, report: &FallbackUsageReport) {
        if let Some(sink) = &self.sink {
            sink.deliver(report.clone()).await;
        }
    }

    fn cancelled(&self, profile: &SelectorProfile, state: ResolutionState) -> LocatorError {
        debug!(
            logical_id = %profile.logical_id,
            state = ?state,
            "resolution cancelled"
        );
        LocatorError::Cancelled(profile.logical_id.clone())
    }
}

fn success_report(
    profile: &SelectorProfile,
    index: usize,
    strategy: SelectorStrategy,
) -> FallbackUsageReport {
    FallbackUsageReport {
        report_id: Uuid::new_v4(),
        logical_id: profile.logical_id.clone(),
        owning_artifact: profile.owning_artifact.clone(),
        platform: profile.platform,
        failed_strategy: (index > 0).then_some(profile.primary.strategy),
        succeeded_strategy: Some(strategy),
        succeeded_index: Some(index),
        profile_version: profile.version,
        timestamp: Utc::now(),
    }
}

fn failure_report(profile: &SelectorProfile) -> FallbackUsageReport {
    FallbackUsageReport {
        report_id: Uuid::new_v4(),
        logical_id: profile.logical_id.clone(),
        owning_artifact: profile.owning_artifact.clone(),
        platform: profile.platform,
        failed_strategy: Some(profile.primary.strategy),
        succeeded_strategy: None,
        succeeded_index: None,
        profile_version: profile.version,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use resel_core_types::{ArtifactId, LogicalId, Platform, SelectorCandidate, Stability};

    #[derive(Clone)]
    enum Behavior {
        Found(&'static str),
        Missing,
        Hang,
        Broken,
    }

    struct ScriptedFinder {
        script: HashMap<SelectorStrategy, Behavior>,
        calls: AtomicUsize,
    }

    impl ScriptedFinder {
        fn new(script: &[(SelectorStrategy, Behavior)]) -> Arc<Self> {
            Arc::new(Self {
                script: script.iter().cloned().collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ElementFinder for ScriptedFinder {
        async fn find(
            &self,
            strategy: SelectorStrategy,
            _value: &str,
        ) -> Result<Option<ElementHandle>, FinderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.get(&strategy).cloned().unwrap_or(Behavior::Missing) {
                Behavior::Found(id) => Ok(Some(ElementHandle::new(id))),
                Behavior::Missing => Ok(None),
                Behavior::Hang => std::future::pending().await,
                Behavior::Broken => Err(FinderError::Driver("session lost".into())),
            }
        }
    }

    fn profile() -> SelectorProfile {
        let candidate = |strategy, priority| {
            SelectorCandidate::new(strategy, "v", priority).with_unique(true)
        };
        SelectorProfile {
            logical_id: LogicalId::new("checkout"),
            platform: Platform::Web,
            primary: candidate(SelectorStrategy::XpathById, 95),
            fallbacks: vec![
                candidate(SelectorStrategy::CssById, 90),
                candidate(SelectorStrategy::VisibleTextExact, 75),
            ],
            stability: Stability::High,
            version: 4,
            owning_artifact: ArtifactId::new("cart_test"),
        }
    }

    fn runtime(
        finder: Arc<ScriptedFinder>,
        cfg: RuntimeCfg,
    ) -> (
        ResolutionRuntime,
        mpsc::UnboundedReceiver<FallbackUsageReport>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ResolutionRuntime::new(finder, cfg).with_sink(Arc::new(tx)), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_then_second_fallback() {
        let finder = ScriptedFinder::new(&[
            (SelectorStrategy::XpathById, Behavior::Hang),
            (SelectorStrategy::CssById, Behavior::Hang),
            (SelectorStrategy::VisibleTextExact, Behavior::Found("el-7")),
        ]);
        let (runtime, mut rx) = runtime(finder, RuntimeCfg::default());

        let resolved = runtime.resolve(&profile()).await.unwrap();
        assert_eq!(resolved.state, ResolutionState::DoneFallback(2));
        assert_eq!(resolved.succeeded_index, 2);
        assert_eq!(resolved.handle, ElementHandle::new("el-7"));
        assert_eq!(resolved.elapsed, Duration::from_secs(12));
        assert_eq!(resolved.attempts[0].outcome, AttemptOutcome::TimedOut);
        assert_eq!(resolved.attempts[1].outcome, AttemptOutcome::TimedOut);

        let report = rx.try_recv().unwrap();
        assert_eq!(report.succeeded_index, Some(2));
        assert_eq!(report.failed_strategy, Some(SelectorStrategy::XpathById));
        assert_eq!(
            report.succeeded_strategy,
            Some(SelectorStrategy::VisibleTextExact)
        );
        assert_eq!(report.profile_version, 4);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn primary_success_is_silent() {
        let finder = ScriptedFinder::new(&[(SelectorStrategy::XpathById, Behavior::Found("el"))]);
        let (runtime, mut rx) = runtime(finder.clone(), RuntimeCfg::default());

        let resolved = runtime.resolve(&profile()).await.unwrap();
        assert_eq!(resolved.state, ResolutionState::DonePrimary);
        assert!(resolved.report.is_none());
        assert!(rx.try_recv().is_err());
        assert_eq!(finder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn primary_success_reported_when_enabled() {
        let finder = ScriptedFinder::new(&[(SelectorStrategy::XpathById, Behavior::Found("el"))]);
        let cfg = RuntimeCfg {
            report_primary_success: true,
            ..RuntimeCfg::default()
        };
        let (runtime, mut rx) = runtime(finder, cfg);

        runtime.resolve(&profile()).await.unwrap();
        let report = rx.try_recv().unwrap();
        assert!(report.is_primary_success());
        assert_eq!(report.failed_strategy, None);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_failure() {
        let finder = ScriptedFinder::new(&[]);
        let (runtime, mut rx) = runtime(finder.clone(), RuntimeCfg::default());

        let err = runtime.resolve(&profile()).await.unwrap_err();
        match &err {
            LocatorError::ElementNotResolvable { attempts, .. } => assert_eq!(*attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.report().unwrap().is_failure());
        assert!(rx.try_recv().unwrap().is_failure());
        assert_eq!(finder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn total_time_is_bounded() {
        let finder = ScriptedFinder::new(&[
            (SelectorStrategy::XpathById, Behavior::Hang),
            (SelectorStrategy::CssById, Behavior::Hang),
            (SelectorStrategy::VisibleTextExact, Behavior::Hang),
        ]);
        let cfg = RuntimeCfg::default();
        let (runtime, _rx) = runtime(finder, cfg.clone());

        let started = Instant::now();
        assert!(runtime.resolve(&profile()).await.is_err());
        assert_eq!(started.elapsed(), cfg.worst_case(2));
    }

    #[tokio::test(start_paused = true)]
    async fn finder_errors_count_as_failed_attempts() {
        let finder = ScriptedFinder::new(&[
            (SelectorStrategy::XpathById, Behavior::Broken),
            (SelectorStrategy::CssById, Behavior::Found("el")),
        ]);
        let (runtime, _rx) = runtime(finder, RuntimeCfg::default());

        let resolved = runtime.resolve(&profile()).await.unwrap();
        assert_eq!(resolved.state, ResolutionState::DoneFallback(1));
        assert!(matches!(
            resolved.attempts[0].outcome,
            AttemptOutcome::Error(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_emits_nothing() {
        let finder = ScriptedFinder::new(&[(SelectorStrategy::XpathById, Behavior::Hang)]);
        let (runtime, mut rx) = runtime(finder, RuntimeCfg::default());
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            }
        };

        let profile = profile();
        let (result, _) = tokio::join!(runtime.resolve_with_cancel(&profile, &token), canceller);
        assert!(matches!(result, Err(LocatorError::Cancelled(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_is_repeatable() {
        let finder = ScriptedFinder::new(&[
            (SelectorStrategy::XpathById, Behavior::Missing),
            (SelectorStrategy::CssById, Behavior::Found("el")),
        ]);
        let (runtime, _rx) = runtime(finder, RuntimeCfg::default());
        let profile = profile();

        let first = runtime.resolve(&profile).await.unwrap();
        let second = runtime.resolve(&profile).await.unwrap();
        assert_eq!(first.state, second.state);
        assert_eq!(first.handle, second.handle);
        assert_eq!(first.strategy, second.strategy);
    }
}
