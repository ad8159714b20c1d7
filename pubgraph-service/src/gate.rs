//! The per-stream concurrency gate
//!
//! One bounded channel, one consuming worker: that pair is the whole
//! concurrency story for a publication graph. Nothing else mutates the graph
//! or its job records, so the worker's at-most-one-active-execution loop is
//! the lock. Separate streams get separate workers and never contend.
//!
//! Incremental changesets are admitted only when no reconciliation job is
//! scheduled or busy and (when required) an initial sync has succeeded at
//! least once. A reconciliation trigger supersedes every changeset queued at
//! the moment it starts: they are discarded, deliberately, because the
//! recompute reads source truth that already includes them. A changeset
//! arriving while reconciliation is busy is likewise skipped and left for
//! the next healing pass, a documented, imperfect mitigation of the
//! publication/delta-emission race rather than a guaranteed property.

use crate::error::{Result, ServiceError};
use crate::job::{JobKind, JobStatus, JobStore, ScheduledJob};
use crate::result::ResultStore;
use crate::sink::DeltaSink;
use pubgraph_core::{ChangeSet, DeltaPayload, ExportConfig};
use pubgraph_delta::{CascadePropagator, ChangeFolder};
use pubgraph_heal::{HealConfig, HealEngine, HealStats};
use pubgraph_store::{BatchedExecutor, RequestOptions, SparqlGateway, UpdateOp};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Work accepted by a stream worker
#[derive(Debug)]
pub enum Command {
    /// An ordered delta payload from the change feed
    Deltas(DeltaPayload),
    /// A reconciliation trigger; the scheduled job is looked up in-store
    Reconcile(JobKind),
}

/// Admission state for incremental changesets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    BlockedByJob,
    AwaitingInitialSync,
}

/// Per-stream wiring and tuning
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub export: ExportConfig,
    /// Graph holding job, task and error records
    pub jobs_graph: String,
    /// Directory receiving result-container dump files
    pub share_dir: PathBuf,
    /// Refuse deltas until an initial sync has succeeded once
    pub require_initial_sync: bool,
    /// Bound on queued commands; senders back off past it
    pub queue_capacity: usize,
    /// Triples per write batch and rows per read page
    pub batch_size: usize,
    /// Pacing delay between write batches
    pub update_delay: Duration,
    pub heal: HealConfig,
}

impl StreamConfig {
    pub fn new(export: ExportConfig, jobs_graph: impl Into<String>, share_dir: impl Into<PathBuf>) -> Self {
        Self {
            export,
            jobs_graph: jobs_graph.into(),
            share_dir: share_dir.into(),
            require_initial_sync: true,
            queue_capacity: 64,
            batch_size: 100,
            update_delay: Duration::from_millis(100),
            heal: HealConfig::default(),
        }
    }
}

/// Handle for feeding a running stream worker
#[derive(Debug)]
pub struct StreamHandle {
    tx: mpsc::Sender<Command>,
    join: JoinHandle<()>,
}

impl StreamHandle {
    /// Enqueue a delta payload, waiting when the queue is full.
    pub async fn submit_deltas(&self, payload: DeltaPayload) -> Result<()> {
        self.tx
            .send(Command::Deltas(payload))
            .await
            .map_err(|_| ServiceError::QueueClosed)
    }

    /// Enqueue a reconciliation trigger.
    pub async fn trigger_reconcile(&self, kind: JobKind) -> Result<()> {
        self.tx
            .send(Command::Reconcile(kind))
            .await
            .map_err(|_| ServiceError::QueueClosed)
    }

    /// Close the queue and wait for in-flight work to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.join.await;
    }
}

/// The single consumer of one publication-graph stream
#[derive(Debug)]
pub struct StreamWorker {
    config: StreamConfig,
    executor: BatchedExecutor,
    propagator: CascadePropagator,
    folder: ChangeFolder,
    heal: HealEngine,
    jobs: JobStore,
    results: ResultStore,
    sink: Arc<dyn DeltaSink>,
    /// Sticky: once an initial sync has succeeded the store is not asked
    /// again
    synced_once: bool,
}

impl StreamWorker {
    pub fn new(
        gateway: Arc<dyn SparqlGateway>,
        config: StreamConfig,
        sink: Arc<dyn DeltaSink>,
    ) -> Self {
        let executor = BatchedExecutor::new(gateway.clone(), config.batch_size, config.update_delay);
        Self {
            propagator: CascadePropagator::new(gateway.clone(), executor.clone()),
            folder: ChangeFolder::new(gateway.clone()),
            heal: HealEngine::new(executor.clone(), config.heal.clone()),
            jobs: JobStore::new(gateway, config.jobs_graph.clone()),
            results: ResultStore::new(config.share_dir.clone()),
            executor,
            config,
            sink,
            synced_once: false,
        }
    }

    /// Spawn the worker onto the runtime.
    pub fn spawn(self) -> StreamHandle {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let join = tokio::spawn(self.run(rx));
        StreamHandle { tx, join }
    }

    /// Consume commands until the queue closes.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Reconcile(kind) => self.run_reconciliation(kind).await,
                Command::Deltas(payload) => {
                    // Collect the backlog: a reconciliation trigger anywhere
                    // in it supersedes every queued payload, this one
                    // included.
                    let mut payloads = vec![payload];
                    let mut reconcile: Option<JobKind> = None;
                    while let Ok(queued) = rx.try_recv() {
                        match queued {
                            Command::Deltas(p) => payloads.push(p),
                            Command::Reconcile(kind) => {
                                reconcile = Some(merge_kinds(reconcile, kind));
                            }
                        }
                    }
                    match reconcile {
                        Some(kind) => {
                            tracing::warn!(
                                discarded = payloads.len(),
                                "reconciliation supersedes queued changesets"
                            );
                            self.run_reconciliation(kind).await;
                        }
                        None => {
                            for payload in payloads {
                                self.process_deltas(payload).await;
                            }
                        }
                    }
                }
            }
        }
        tracing::debug!(
            graph = %self.config.export.publication_graph,
            "stream worker stopped"
        );
    }

    async fn gate_state(&mut self, opts: &RequestOptions) -> Result<GateState> {
        if self.jobs.blocking_job_exists(opts).await? {
            return Ok(GateState::BlockedByJob);
        }
        if self.config.require_initial_sync && !self.synced_once {
            if self.jobs.initial_sync_succeeded(opts).await? {
                self.synced_once = true;
            } else {
                return Ok(GateState::AwaitingInitialSync);
            }
        }
        Ok(GateState::Idle)
    }

    async fn process_deltas(&mut self, payload: DeltaPayload) {
        let opts = RequestOptions::retryable();
        match self.gate_state(&opts).await {
            Ok(GateState::Idle) => {}
            Ok(state) => {
                // Deliberate skip; the next reconciliation pass absorbs the
                // missed change.
                tracing::warn!(?state, changesets = payload.len(), "changesets not admitted");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "gate check failed, dropping payload");
                return;
            }
        }

        for changeset in payload {
            if changeset.is_empty() {
                continue;
            }
            if let Err(e) = self.process_changeset(&changeset, &opts).await {
                tracing::error!(error = %e, "changeset processing failed");
                let _ = self
                    .jobs
                    .record_error(
                        &self.config.export.publication_graph,
                        &e.to_string(),
                        &opts,
                    )
                    .await;
                // Later changesets must not leapfrog a failed one; the rest
                // of the payload is abandoned for the next healing pass.
                return;
            }
        }
    }

    async fn process_changeset(
        &self,
        changeset: &ChangeSet,
        opts: &RequestOptions,
    ) -> Result<()> {
        let graph = &self.config.export.publication_graph;
        let gross = self
            .propagator
            .propagate(changeset, &self.config.export, opts)
            .await?;
        let folded = self.folder.fold(&gross, graph, opts).await?;
        if folded.is_empty() {
            return Ok(());
        }
        self.executor
            .batched_update(&folded.deletes, graph, UpdateOp::Delete, opts)
            .await?;
        self.executor
            .batched_update(&folded.inserts, graph, UpdateOp::Insert, opts)
            .await?;
        self.sink.publish(graph, &folded).await?;
        tracing::info!(
            inserts = folded.inserts.len(),
            deletes = folded.deletes.len(),
            graph = %graph,
            "changeset applied"
        );
        Ok(())
    }

    async fn run_reconciliation(&mut self, kind: JobKind) {
        let opts = match kind {
            JobKind::InitialSync => RequestOptions::initial_sync(),
            JobKind::Healing => RequestOptions::retryable(),
        };
        let scheduled = match self.jobs.find_scheduled(kind, &opts).await {
            Ok(Some(scheduled)) => scheduled,
            Ok(None) => {
                tracing::warn!(?kind, "reconciliation triggered but no scheduled job found");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "job lookup failed");
                return;
            }
        };

        match self.execute_job(&scheduled, kind, &opts).await {
            Ok(stats) => {
                tracing::info!(
                    job = %scheduled.job,
                    inserted = stats.inserted,
                    removed = stats.removed,
                    "reconciliation finished"
                );
            }
            Err(e) => {
                tracing::error!(job = %scheduled.job, error = %e, "reconciliation failed");
                let _ = self
                    .jobs
                    .record_error(&scheduled.job, &e.to_string(), &opts)
                    .await;
                if let Some(task) = &scheduled.task {
                    let _ = self.jobs.set_status(task, JobStatus::Failed, &opts).await;
                }
                let _ = self
                    .jobs
                    .set_status(&scheduled.job, JobStatus::Failed, &opts)
                    .await;
            }
        }
    }

    async fn execute_job(
        &mut self,
        scheduled: &ScheduledJob,
        kind: JobKind,
        opts: &RequestOptions,
    ) -> Result<HealStats> {
        self.jobs
            .set_status(&scheduled.job, JobStatus::Busy, opts)
            .await?;
        if let Some(task) = &scheduled.task {
            self.jobs.set_status(task, JobStatus::Busy, opts).await?;
        }

        let (outcome, stats) = self.heal.reconcile(&self.config.export, opts).await?;
        let container = self.results.write(&outcome)?;
        if let Some(task) = &scheduled.task {
            self.jobs.attach_results(task, &container, opts).await?;
            self.jobs.set_status(task, JobStatus::Success, opts).await?;
        }
        self.jobs
            .set_status(&scheduled.job, JobStatus::Success, opts)
            .await?;

        if kind == JobKind::InitialSync {
            self.synced_once = true;
        }
        Ok(stats)
    }
}

/// Collapse queued reconciliation kinds into one execution; a bootstrap
/// wins over a drift repair.
fn merge_kinds(current: Option<JobKind>, next: JobKind) -> JobKind {
    match (current, next) {
        (Some(JobKind::InitialSync), _) | (_, JobKind::InitialSync) => JobKind::InitialSync,
        _ => JobKind::Healing,
    }
}
