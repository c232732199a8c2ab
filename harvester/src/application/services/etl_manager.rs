// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # ETL Manager
//!
//! Aggregate state over the registered pipelines: combined hash, combined
//! health, overall progress, a remaining-time estimate, and a persistent
//! cache of the last combined hash plus audit histories.
//!
//! One orchestrator task exists per `harvest()` call. It prepares all
//! enabled pipelines (sequentially or fanned out, per the
//! `harvester.concurrentHarvest` parameter), runs them the same way, then
//! recomputes the combined hash, persists state, emits the finished event,
//! and returns the manager to `IDLE`. Aborting never waits: it flips the
//! run token and each pipeline's state, and the pipelines observe that at
//! their own suspension points.
//!
//! The pipeline set is sealed after initialization; registration during a
//! harvest has no defined semantics and is rejected.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use harvester_bootstrap::shutdown::CancellationToken;
use harvester_domain::services::digest;
use harvester_domain::value_objects::Parameter;
use harvester_domain::{
    EtlHealth, EtlState, HarvestError, HarvestEventListener, HarvestFinishedEvent, HarvestStartedEvent,
    ManagerState, TimestampedHistory,
};

use crate::infrastructure::config::ParameterRegistry;
use crate::infrastructure::persistence::StateRepository;
use crate::infrastructure::runtime::{join_supervised, spawn_supervised, AppResult};

use super::etl_pipeline::{EtlMonitor, EtlPipeline};

/// Parameter category of the manager's own knobs
const PARAM_CATEGORY: &str = "harvester";

/// Aggregate orchestrator over a sealed set of pipelines.
pub struct EtlManager {
    name: String,
    repository: StateRepository,
    pipelines: Vec<Arc<AsyncMutex<EtlPipeline>>>,
    monitors: Vec<Arc<EtlMonitor>>,
    sealed: AtomicBool,

    state: RwLock<EtlState>,
    state_history: Mutex<TimestampedHistory<EtlState>>,
    last_combined_hash: RwLock<Option<String>>,
    /// Unix millis of the running harvest's start; 0 when idle
    harvest_started_ms: AtomicI64,

    root_token: CancellationToken,
    run_token: Mutex<Option<CancellationToken>>,
    orchestrator: AsyncMutex<Option<JoinHandle<AppResult<()>>>>,

    force_harvest: Arc<Parameter>,
    concurrent_harvest: Arc<Parameter>,

    listeners: RwLock<Vec<Arc<dyn HarvestEventListener>>>,
}

impl EtlManager {
    /// Creates a manager and registers its own parameters
    /// (`harvester.forceHarvest`, `harvester.concurrentHarvest`).
    pub fn new(
        name: impl Into<String>,
        repository: StateRepository,
        registry: &ParameterRegistry,
        root_token: CancellationToken,
    ) -> Result<Self, HarvestError> {
        let force_harvest = registry.register(Parameter::bool(PARAM_CATEGORY, "forceHarvest", false)?);
        let concurrent_harvest = registry.register(Parameter::bool(PARAM_CATEGORY, "concurrentHarvest", false)?);

        let state_history = TimestampedHistory::new();
        let manager = Self {
            name: name.into(),
            repository,
            pipelines: Vec::new(),
            monitors: Vec::new(),
            sealed: AtomicBool::new(false),
            state: RwLock::new(EtlState::Initializing),
            state_history: Mutex::new(state_history),
            last_combined_hash: RwLock::new(None),
            harvest_started_ms: AtomicI64::new(0),
            root_token,
            run_token: Mutex::new(None),
            orchestrator: AsyncMutex::new(None),
            force_harvest,
            concurrent_harvest,
            listeners: RwLock::new(Vec::new()),
        };
        manager.state_history.lock().append(EtlState::Initializing);
        Ok(manager)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a pipeline, de-duplicating names with an increasing
    /// integer suffix. Only legal before `seal`.
    pub fn register(&mut self, pipeline: EtlPipeline) -> Result<String, HarvestError> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(HarvestError::precondition(
                "the pipeline set is sealed; registration after initialization is not supported",
            ));
        }

        let monitor = pipeline.monitor();
        let base = monitor.name();
        let mut candidate = base.clone();
        let mut suffix = 2u32;
        while self.monitors.iter().any(|m| m.name() == candidate) {
            candidate = format!("{}{}", base, suffix);
            suffix += 1;
        }
        if candidate != base {
            monitor.rename(candidate.clone());
        }

        info!(pipeline = %candidate, "registered pipeline");
        self.monitors.push(monitor);
        self.pipelines.push(Arc::new(AsyncMutex::new(pipeline)));
        Ok(candidate)
    }

    /// Registers an observer for harvest lifecycle events.
    pub fn add_listener(&self, listener: Arc<dyn HarvestEventListener>) {
        self.listeners.write().push(listener);
    }

    /// Initializes every pipeline, restores persisted state, and moves the
    /// manager to IDLE. Pipeline init failures are recorded in health and
    /// logged, not escalated; the deployment stays up for inspection.
    pub async fn init(&self) -> Result<(), HarvestError> {
        self.sealed.store(true, Ordering::SeqCst);

        for pipeline in &self.pipelines {
            let mut pipeline = pipeline.lock().await;
            let name = pipeline.name();
            if let Err(e) = pipeline.init().await {
                warn!(pipeline = %name, error = %e, "pipeline initialization failed");
            }
        }

        self.load_from_disk().await?;
        self.record_state(EtlState::Idle);
        Ok(())
    }

    fn record_state(&self, next: EtlState) {
        let mut state = self.state.write();
        if *state != next {
            *state = next;
            self.state_history.lock().append(next);
        }
    }

    /// Manager-level state
    pub fn state(&self) -> EtlState {
        *self.state.read()
    }

    /// Combined health across enabled pipelines
    pub fn health(&self) -> EtlHealth {
        EtlHealth::combine_all(
            self.monitors
                .iter()
                .filter(|m| m.is_enabled())
                .map(|m| m.health()),
        )
    }

    /// Total source records processed across enabled pipelines
    pub fn harvested_count(&self) -> u64 {
        self.monitors
            .iter()
            .filter(|m| m.is_enabled())
            .map(|m| m.harvested_count())
            .sum()
    }

    /// Total expected documents; `-1` when any enabled pipeline is unknown
    pub fn max_document_count(&self) -> i64 {
        let mut total = 0i64;
        for monitor in self.monitors.iter().filter(|m| m.is_enabled()) {
            let max = monitor.max_document_count();
            if max < 0 {
                return -1;
            }
            total += max;
        }
        total
    }

    /// Combined hash over enabled pipelines in registration order; `None`
    /// when any contribution is unknown.
    pub fn combined_hash(&self) -> Option<String> {
        let hashes: Vec<Option<String>> = self
            .monitors
            .iter()
            .filter(|m| m.is_enabled())
            .map(|m| m.version_hash())
            .collect();
        digest::combine_hashes(hashes.iter().map(|h| h.as_deref()))
    }

    /// Last combined hash of a successful harvest
    pub fn last_combined_hash(&self) -> Option<String> {
        self.last_combined_hash.read().clone()
    }

    /// Estimated remaining harvest time in milliseconds; `-1` when no
    /// estimate is defined.
    pub fn estimate_remaining_millis(&self) -> i64 {
        if self.state() != EtlState::Harvesting {
            return -1;
        }
        let started = self.harvest_started_ms.load(Ordering::SeqCst);
        let max = self.max_document_count();
        let done = self.harvested_count();
        if started <= 0 || max < 0 || done == 0 {
            return -1;
        }

        let elapsed = Utc::now().timestamp_millis() - started;
        let remaining_docs = (max as i128 - done as i128).max(0);
        let avg = elapsed as i128 / done as i128;
        (avg * remaining_docs) as i64
    }

    /// Whether any enabled pipeline has unharvested changes. When idle,
    /// refreshes every pipeline's hash first.
    pub async fn has_outdated_etls(&self) -> Result<bool, HarvestError> {
        if self.state() == EtlState::Idle {
            self.refresh_pipelines().await;
        }
        Ok(self.check_outdated())
    }

    async fn refresh_pipelines(&self) {
        for pipeline in &self.pipelines {
            let mut pipeline = pipeline.lock().await;
            if !pipeline.monitor().is_enabled() {
                continue;
            }
            let name = pipeline.name();
            if let Err(e) = pipeline.update().await {
                warn!(pipeline = %name, error = %e, "source probe failed");
            }
        }
    }

    fn check_outdated(&self) -> bool {
        let enabled: Vec<&Arc<EtlMonitor>> = self.monitors.iter().filter(|m| m.is_enabled()).collect();
        if enabled.is_empty() {
            return false;
        }

        let not_all_harvested = enabled.iter().any(|m| {
            let max = m.max_document_count();
            max < 0 || m.harvested_count() < max as u64
        });

        let hash_changed = match (self.combined_hash(), self.last_combined_hash()) {
            (Some(current), Some(last)) => current != last,
            _ => true,
        };

        not_all_harvested || hash_changed
    }

    /// Starts a harvest: atomic transition from IDLE, precondition checks,
    /// then one orchestrator task. Returns as soon as the task is running.
    pub async fn harvest(self: Arc<Self>) -> Result<(), HarvestError> {
        {
            let mut state = self.state.write();
            if *state != EtlState::Idle {
                return Err(HarvestError::busy(format!(
                    "a harvest is already in progress (state {})",
                    *state
                )));
            }
            *state = EtlState::Queued;
            self.state_history.lock().append(EtlState::Queued);
        }

        let force = self.force_harvest.bool_value();
        if !force {
            self.refresh_pipelines().await;
            if !self.check_outdated() {
                self.record_state(EtlState::Idle);
                return Err(HarvestError::precondition(
                    "no changes detected since the last harvest",
                ));
            }
        }

        let token = self.root_token.child();
        *self.run_token.lock() = Some(token.clone());

        let manager = Arc::clone(&self);
        let handle = spawn_supervised("harvest-orchestrator", async move {
            manager.run_harvest(token).await
        });
        *self.orchestrator.lock().await = Some(handle);
        Ok(())
    }

    /// The orchestrator body: prepare, run, persist, settle.
    async fn run_harvest(self: Arc<Self>, token: CancellationToken) -> AppResult<()> {
        let force = self.force_harvest.bool_value();
        let concurrent = self.concurrent_harvest.bool_value();

        let prepared = self.prepare_all(force, concurrent).await;

        if prepared == 0 || token.is_cancelled() || self.state() == EtlState::Aborting {
            // Nothing ran: no terminal state, no finished event, just back
            // to IDLE with any queued pipelines settled.
            info!(prepared, "nothing to harvest");
            for monitor in &self.monitors {
                if matches!(monitor.state(), EtlState::Queued | EtlState::Aborting) {
                    let _ = monitor.transition(EtlState::Idle);
                }
            }
            *self.run_token.lock() = None;
            self.record_state(EtlState::Idle);
            return Ok(());
        }

        self.record_state(EtlState::Harvesting);
        self.harvest_started_ms
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);

        let started = HarvestStartedEvent::new(self.combined_hash(), self.max_document_count());
        for listener in self.listeners.read().iter() {
            listener.on_harvest_started(&started);
        }
        info!(
            pipelines = prepared,
            max = started.max_document_count,
            "harvest started"
        );

        let results = self.run_all(concurrent, &token).await;
        let success = !results.is_empty() && results.iter().all(|r| r.is_ok());

        self.finish_run(success, &token).await;
        Ok(())
    }

    /// Prepares every enabled pipeline; returns how many are queued.
    async fn prepare_all(&self, force: bool, concurrent: bool) -> usize {
        if concurrent {
            let tasks: Vec<_> = self
                .pipelines
                .iter()
                .cloned()
                .map(|pipeline| {
                    spawn_supervised("prepare-pipeline", async move {
                        pipeline.lock().await.prepare_harvest(force).await
                    })
                })
                .collect();

            let mut prepared = 0;
            for task in tasks {
                match join_supervised(task).await {
                    Ok(()) => prepared += 1,
                    Err(e) => Self::log_prepare_failure(&e),
                }
            }
            prepared
        } else {
            let mut prepared = 0;
            for pipeline in &self.pipelines {
                match pipeline.lock().await.prepare_harvest(force).await {
                    Ok(()) => prepared += 1,
                    Err(e) => Self::log_prepare_failure(&e),
                }
            }
            prepared
        }
    }

    fn log_prepare_failure(error: &HarvestError) {
        if error.is_precondition() {
            info!(reason = %error, "pipeline skipped");
        } else {
            warn!(error = %error, "pipeline preparation failed");
        }
    }

    /// Runs every queued pipeline, sequentially or fanned out.
    async fn run_all(&self, concurrent: bool, token: &CancellationToken) -> Vec<AppResult<()>> {
        let queued: Vec<Arc<AsyncMutex<EtlPipeline>>> = {
            let mut queued = Vec::new();
            for (pipeline, monitor) in self.pipelines.iter().zip(&self.monitors) {
                if matches!(monitor.state(), EtlState::Queued | EtlState::Aborting) {
                    queued.push(pipeline.clone());
                }
            }
            queued
        };

        if concurrent {
            let tasks: Vec<_> = queued
                .into_iter()
                .map(|pipeline| {
                    let token = token.clone();
                    spawn_supervised("harvest-pipeline", async move {
                        pipeline.lock().await.harvest(&token).await
                    })
                })
                .collect();

            let mut results = Vec::with_capacity(tasks.len());
            for task in tasks {
                results.push(join_supervised(task).await);
            }
            results
        } else {
            let mut results = Vec::with_capacity(queued.len());
            for pipeline in queued {
                results.push(pipeline.lock().await.harvest(token).await);
            }
            results
        }
    }

    /// Completion path shared by finished, failed, and aborted runs.
    async fn finish_run(&self, success: bool, token: &CancellationToken) {
        let aborted = token.is_cancelled() || self.state() == EtlState::Aborting;

        if success && !aborted {
            *self.last_combined_hash.write() = self.combined_hash();
        }

        for monitor in &self.monitors {
            monitor.settle();
        }

        let terminal = if aborted {
            EtlState::Aborted
        } else if success {
            EtlState::Done
        } else {
            EtlState::Failed
        };
        if self.state() != EtlState::Idle {
            self.record_state(terminal);
        }

        self.harvest_started_ms.store(0, Ordering::SeqCst);

        if let Err(e) = self.save_to_disk().await {
            warn!(error = %e, "failed to persist manager state");
        }

        let finished = HarvestFinishedEvent::new(success && !aborted, self.combined_hash());
        for listener in self.listeners.read().iter() {
            listener.on_harvest_finished(&finished);
        }

        *self.run_token.lock() = None;
        self.record_state(EtlState::Idle);
        info!(success = finished.succeeded, "harvest run finished");
    }

    /// Requests a cooperative abort; legal in QUEUED or HARVESTING. Never
    /// waits for the run to drain.
    pub fn abort_harvest(&self) -> Result<(), HarvestError> {
        {
            let mut state = self.state.write();
            if !state.accepts_abort() {
                return Err(HarvestError::precondition(format!(
                    "no harvest to abort (state {})",
                    *state
                )));
            }
            *state = EtlState::Aborting;
            self.state_history.lock().append(EtlState::Aborting);
        }

        if let Some(token) = self.run_token.lock().as_ref() {
            token.cancel();
        }
        for monitor in &self.monitors {
            monitor.request_abort();
        }
        info!("harvest abort requested");
        Ok(())
    }

    /// Waits for the current orchestrator task, if any. Used by tests and
    /// the shutdown path; REST callers never block on this.
    pub async fn join_harvest(&self) -> AppResult<()> {
        let handle = self.orchestrator.lock().await.take();
        match handle {
            Some(handle) => join_supervised(handle).await,
            None => Ok(()),
        }
    }

    /// Aborts any running harvest, waits for it to drain, refreshes every
    /// pipeline, and returns the manager to IDLE.
    pub async fn reset(&self) -> Result<(), HarvestError> {
        if self.abort_harvest().is_ok() {
            let _ = self.join_harvest().await;
        }
        self.load_from_disk().await?;
        self.refresh_pipelines().await;
        self.record_state(EtlState::Idle);
        info!("manager reset");
        Ok(())
    }

    /// Builds the persistable snapshot of manager and pipelines.
    pub fn snapshot(&self) -> ManagerState {
        let mut state = ManagerState::new(self.name.clone());
        state.overall.state_history = self.state_history.lock().clone();
        state.overall.harvested_count = self.harvested_count();
        state.overall.max_document_count = self.max_document_count();
        state.overall.version_hash = self.last_combined_hash();

        let mut health_history = TimestampedHistory::new();
        health_history.append(self.health());
        state.overall.health_history = health_history;

        for monitor in &self.monitors {
            let info = monitor.snapshot();
            state.etls.insert(info.name.clone(), info);
        }
        state
    }

    /// Persists the full manager state via an atomic replace.
    pub async fn save_to_disk(&self) -> Result<(), HarvestError> {
        self.repository.save(&self.snapshot()).await
    }

    /// Restores persisted state; a missing file is a fresh deployment.
    pub async fn load_from_disk(&self) -> Result<(), HarvestError> {
        let persisted = match self.repository.load().await? {
            Some(persisted) => persisted,
            None => return Ok(()),
        };

        *self.last_combined_hash.write() = persisted.overall.version_hash.clone();
        self.state_history
            .lock()
            .merge_sorted(&persisted.overall.state_history);

        for monitor in &self.monitors {
            if let Some(info) = persisted.etls.get(&monitor.name()) {
                monitor.restore(info);
            }
        }
        info!(path = %self.repository.path().display(), "restored persisted state");
        Ok(())
    }

    /// Monitors in registration order
    pub fn monitors(&self) -> &[Arc<EtlMonitor>] {
        &self.monitors
    }

    /// Monitor of one pipeline by name
    pub fn monitor_by_name(&self, name: &str) -> Option<Arc<EtlMonitor>> {
        self.monitors.iter().find(|m| m.name() == name).cloned()
    }
}
