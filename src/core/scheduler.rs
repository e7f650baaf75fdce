//! In-process scheduler for recurring jobs
//!
//! Every job runs at most one instance at a time. A fire that lands while the
//! previous run is still in flight is dropped, and a fire later than the job's
//! grace window is skipped in favor of the next regular occurrence.

use crate::core::trigger::Trigger;
use crate::error::{AppResult, SchedulerError};
use crate::metrics::Metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Longest idle sleep of the scheduling loop; bounds the effect of wall clock jumps
const MAX_IDLE: Duration = Duration::from_secs(30);

/// Smallest lateness tolerated for any job
const MIN_GRACE: Duration = Duration::from_secs(1);

/// Unit of work run by the scheduler
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self) -> AppResult<()>;
}

/// Adapts a closure returning a boxed future into a [`JobHandler`]
pub struct FnJob<F>(F);

#[async_trait]
impl<F> JobHandler for FnJob<F>
where
    F: Fn() -> BoxFuture<'static, AppResult<()>> + Send + Sync,
{
    async fn run(&self) -> AppResult<()> {
        (self.0)().await
    }
}

pub fn job_fn<F, Fut>(f: F) -> Arc<dyn JobHandler>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    Arc::new(FnJob(move || -> BoxFuture<'static, AppResult<()>> { Box::pin(f()) }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FireKind {
    Scheduled,
    Manual,
}

/// Result of asking a job to fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FireOutcome {
    Started,
    /// Dropped because an instance is already running
    Coalesced,
    /// Dropped because the fire was later than the grace window
    Misfired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum RunResult {
    Succeeded,
    Failed(String),
    Panicked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub kind: FireKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub result: RunResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub trigger: String,
    pub next_fire: Option<DateTime<Utc>>,
    pub state: JobRunState,
    pub paused: bool,
    pub max_instances: u32,
    pub coalesce: bool,
    pub grace_seconds: u64,
    pub last_run: Option<RunSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub total_jobs: usize,
    pub jobs: Vec<JobStatus>,
}

struct Schedule {
    anchor: DateTime<Utc>,
    next_fire: Option<DateTime<Utc>>,
    paused: bool,
    last_run: Option<RunSummary>,
}

struct JobEntry {
    name: String,
    trigger: Trigger,
    grace: Duration,
    handler: Arc<dyn JobHandler>,
    running: AtomicBool,
    schedule: Mutex<Schedule>,
}

impl JobEntry {
    fn schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the single execution slot
    fn try_acquire(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Releases the execution slot on every exit path of a run
struct SlotGuard(Arc<JobEntry>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

struct LoopHandle {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

struct Inner {
    jobs: RwLock<BTreeMap<String, Arc<JobEntry>>>,
    handle: RwLock<Option<LoopHandle>>,
    wake: Notify,
    metrics: Option<Arc<Metrics>>,
}

/// Cloneable handle to the job scheduler
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self::build(Some(metrics))
    }

    fn build(metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(BTreeMap::new()),
                handle: RwLock::new(None),
                wake: Notify::new(),
                metrics,
            }),
        }
    }

    /// Register a job
    ///
    /// # Arguments
    /// * `name` - Unique job id
    /// * `trigger` - When the job fires
    /// * `grace` - How late a fire may run before it is skipped
    /// * `handler` - The job body
    pub async fn register(
        &self,
        name: &str,
        trigger: Trigger,
        grace: Duration,
        handler: Arc<dyn JobHandler>,
    ) -> Result<(), SchedulerError> {
        let mut jobs = self.inner.jobs.write().await;
        if jobs.contains_key(name) {
            return Err(SchedulerError::DuplicateJob(name.to_string()));
        }

        let now = Utc::now();
        let next_fire = trigger.first_fire(now);
        info!(
            job = %name,
            trigger = %trigger,
            grace_secs = grace.as_secs(),
            next_fire = ?next_fire,
            "JobScheduler: registered job {}",
            name
        );

        jobs.insert(
            name.to_string(),
            Arc::new(JobEntry {
                name: name.to_string(),
                trigger,
                grace: grace.max(MIN_GRACE),
                handler,
                running: AtomicBool::new(false),
                schedule: Mutex::new(Schedule {
                    anchor: now,
                    next_fire,
                    paused: false,
                    last_run: None,
                }),
            }),
        );
        drop(jobs);

        self.inner.wake.notify_one();
        Ok(())
    }

    /// Start the scheduling loop. Interval jobs are re-anchored to the start time.
    pub async fn start(&self) {
        let mut handle = self.inner.handle.write().await;
        if handle.is_some() {
            warn!("JobScheduler: start requested but scheduler is already running");
            return;
        }

        let now = Utc::now();
        for entry in self.inner.jobs.read().await.values() {
            let mut schedule = entry.schedule();
            schedule.anchor = now;
            if !schedule.paused {
                schedule.next_fire = entry.trigger.first_fire(now);
            }
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let scheduler = self.clone();
        let task = tokio::spawn(async move {
            scheduler.run_loop(shutdown_rx).await;
        });

        *handle = Some(LoopHandle { task, shutdown });
        info!("JobScheduler: started");
    }

    /// Stop the scheduling loop. In-flight job bodies run to completion.
    pub async fn stop(&self) {
        let loop_handle = self.inner.handle.write().await.take();
        match loop_handle {
            Some(LoopHandle { task, shutdown }) => {
                let _ = shutdown.send(true);
                if let Err(e) = task.await {
                    error!(error = %e, "JobScheduler: scheduling loop ended abnormally");
                }
                info!("JobScheduler: stopped");
            }
            None => warn!("JobScheduler: stop requested but scheduler is not running"),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.handle.read().await.is_some()
    }

    /// Fire a job immediately, outside its schedule. The concurrency cap still applies
    /// and the next scheduled fire is left unchanged.
    pub async fn run_now(&self, name: &str) -> Result<FireOutcome, SchedulerError> {
        let entry = self.entry(name).await?;
        info!(job = %name, "JobScheduler: manual run requested for {}", name);
        Ok(self.fire(entry, FireKind::Manual))
    }

    /// Stop firing a job until resumed
    pub async fn pause(&self, name: &str) -> Result<(), SchedulerError> {
        let entry = self.entry(name).await?;
        {
            let mut schedule = entry.schedule();
            schedule.paused = true;
            schedule.next_fire = None;
        }
        info!(job = %name, "JobScheduler: paused {}", name);
        Ok(())
    }

    /// Resume a paused job from its next regular occurrence
    pub async fn resume(&self, name: &str) -> Result<(), SchedulerError> {
        let entry = self.entry(name).await?;
        let next_fire = {
            let mut schedule = entry.schedule();
            schedule.paused = false;
            schedule.next_fire = entry.trigger.next_after(Utc::now(), schedule.anchor);
            schedule.next_fire
        };
        info!(job = %name, next_fire = ?next_fire, "JobScheduler: resumed {}", name);
        self.inner.wake.notify_one();
        Ok(())
    }

    pub async fn status(&self) -> SchedulerStatus {
        let running = self.is_running().await;
        let jobs = self.inner.jobs.read().await;
        let jobs: Vec<JobStatus> = jobs
            .values()
            .map(|entry| {
                let schedule = entry.schedule();
                JobStatus {
                    name: entry.name.clone(),
                    trigger: entry.trigger.to_string(),
                    next_fire: schedule.next_fire,
                    state: if entry.running.load(Ordering::Acquire) {
                        JobRunState::Running
                    } else {
                        JobRunState::Idle
                    },
                    paused: schedule.paused,
                    max_instances: 1,
                    coalesce: true,
                    grace_seconds: entry.grace.as_secs(),
                    last_run: schedule.last_run.clone(),
                }
            })
            .collect();

        SchedulerStatus {
            running,
            total_jobs: jobs.len(),
            jobs,
        }
    }

    pub async fn job_names(&self) -> Vec<String> {
        self.inner.jobs.read().await.keys().cloned().collect()
    }

    async fn entry(&self, name: &str) -> Result<Arc<JobEntry>, SchedulerError> {
        self.inner
            .jobs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))
    }

    async fn run_loop(&self, mut shutdown: watch::Receiver<bool>) {
        info!("JobScheduler: scheduling loop running");
        loop {
            let now = Utc::now();
            self.tick(now).await;

            let idle = self.idle_duration(Utc::now()).await;
            tokio::select! {
                _ = tokio::time::sleep(idle) => {}
                _ = self.inner.wake.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("JobScheduler: scheduling loop exited");
    }

    /// Time until the earliest pending fire, capped at [`MAX_IDLE`]
    async fn idle_duration(&self, now: DateTime<Utc>) -> Duration {
        let jobs = self.inner.jobs.read().await;
        jobs.values()
            .filter_map(|entry| entry.schedule().next_fire)
            .min()
            .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO))
            .unwrap_or(MAX_IDLE)
            .min(MAX_IDLE)
    }

    /// Evaluate every job against `now` and fire the due ones.
    ///
    /// Several missed occurrences collapse into a single decision: the next
    /// fire always moves to the first occurrence after `now`.
    pub(crate) async fn tick(&self, now: DateTime<Utc>) -> Vec<(String, FireOutcome)> {
        let entries: Vec<Arc<JobEntry>> = self.inner.jobs.read().await.values().cloned().collect();
        let mut outcomes = Vec::new();

        for entry in entries {
            let lateness = {
                let mut schedule = entry.schedule();
                let mut due = match schedule.next_fire {
                    Some(next) if !schedule.paused && next <= now => next,
                    _ => continue,
                };
                // Lateness counts from the most recent missed occurrence
                while let Some(next) = entry.trigger.next_after(due, schedule.anchor) {
                    if next > now {
                        break;
                    }
                    due = next;
                }
                schedule.next_fire = entry.trigger.next_after(now, schedule.anchor);
                (now - due).to_std().unwrap_or(Duration::ZERO)
            };

            let outcome = if lateness > entry.grace {
                warn!(
                    job = %entry.name,
                    late_secs = lateness.as_secs(),
                    grace_secs = entry.grace.as_secs(),
                    "JobScheduler: {} missed its fire by {}s, skipping to next occurrence",
                    entry.name,
                    lateness.as_secs()
                );
                self.record_skip(&entry.name, "misfired");
                FireOutcome::Misfired
            } else {
                self.fire(entry.clone(), FireKind::Scheduled)
            };
            outcomes.push((entry.name.clone(), outcome));
        }

        outcomes
    }

    fn fire(&self, entry: Arc<JobEntry>, kind: FireKind) -> FireOutcome {
        if !entry.try_acquire() {
            info!(
                job = %entry.name,
                "JobScheduler: {} is still running, dropping fire",
                entry.name
            );
            self.record_skip(&entry.name, "coalesced");
            return FireOutcome::Coalesced;
        }

        let guard = SlotGuard(entry.clone());
        let metrics = self.inner.metrics.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let started_at = Utc::now();
            let clock = Instant::now();
            info!(job = %entry.name, kind = ?kind, "JobScheduler: running {}", entry.name);

            // The body runs on its own task so a panic is contained here
            let handler = entry.handler.clone();
            let result = match tokio::spawn(async move { handler.run().await }).await {
                Ok(Ok(())) => RunResult::Succeeded,
                Ok(Err(e)) => RunResult::Failed(e.to_string()),
                Err(join_error) if join_error.is_panic() => RunResult::Panicked,
                Err(join_error) => RunResult::Failed(join_error.to_string()),
            };
            let elapsed = clock.elapsed();

            match &result {
                RunResult::Succeeded => info!(
                    job = %entry.name,
                    duration_ms = elapsed.as_millis() as u64,
                    "JobScheduler: {} completed",
                    entry.name
                ),
                RunResult::Failed(message) => error!(
                    job = %entry.name,
                    error = %message,
                    duration_ms = elapsed.as_millis() as u64,
                    "JobScheduler: {} failed",
                    entry.name
                ),
                RunResult::Panicked => error!(
                    job = %entry.name,
                    duration_ms = elapsed.as_millis() as u64,
                    "JobScheduler: {} panicked",
                    entry.name
                ),
            }

            if let Some(metrics) = metrics {
                let outcome = match result {
                    RunResult::Succeeded => "success",
                    RunResult::Failed(_) => "failure",
                    RunResult::Panicked => "panic",
                };
                metrics
                    .job_runs_total
                    .with_label_values(&[entry.name.as_str(), outcome])
                    .inc();
                metrics
                    .job_duration_seconds
                    .with_label_values(&[entry.name.as_str()])
                    .observe(elapsed.as_secs_f64());
            }

            entry.schedule().last_run = Some(RunSummary {
                kind,
                started_at,
                finished_at: Utc::now(),
                result,
            });
        });

        FireOutcome::Started
    }

    fn record_skip(&self, job: &str, reason: &str) {
        if let Some(metrics) = &self.inner.metrics {
            metrics
                .job_fires_skipped_total
                .with_label_values(&[job, reason])
                .inc();
        }
    }
}
