//! The worker pool: long-lived threads that each own one execution context.
//!
//! Every worker creates its context on its own thread, runs the engine
//! prelude and the optional init script, then services a single shared
//! FIFO queue. Jobs report through a bounded(1) reply channel held by the
//! caller's [`TaskHandle`].
//!
//! # Worker lifecycle
//!
//! ```text
//! Starting ──▶ Ready ──▶ Idle ⇄ Executing ──▶ Stopping ──▶ Stopped
//!     └──────── init failure ─────────────────────────────────▲
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use blockwork_core::{ConfigError, Engine, EngineError, ExecutionContext, TaskError};
use blockwork_script::ScriptEngine;

use crate::block::Block;
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::task::{FnJob, Job, TaskHandle};

// ── WorkerState ────────────────────────────────────────────────────

/// Lifecycle state of one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Creating its context and running the prelude and init script.
    Starting = 0,
    /// Initialized; about to wait for work.
    Ready = 1,
    /// Waiting on the queue.
    Idle = 2,
    /// Running a job.
    Executing = 3,
    /// Leaving its loop after shutdown.
    Stopping = 4,
    /// Exited; its context is gone.
    Stopped = 5,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Starting,
            1 => Self::Ready,
            2 => Self::Idle,
            3 => Self::Executing,
            4 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

// ── ShutdownReport ─────────────────────────────────────────────────

/// Report from [`WorkerPool::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Total time spent shutting down.
    pub total_ms: u64,
    /// Number of worker threads joined without having panicked.
    pub workers_joined: usize,
    /// Queued jobs completed with [`TaskError::PoolShutDown`].
    pub drained: usize,
}

// ── Worker ─────────────────────────────────────────────────────────

type Report = (usize, Result<(), EngineError>);

struct Worker {
    index: usize,
    engine: Arc<dyn Engine>,
    init: Option<String>,
    poll_interval: Duration,
    jobs: Receiver<Box<dyn Job>>,
    shutdown: Arc<AtomicBool>,
    states: Arc<[AtomicU8]>,
}

impl Worker {
    fn set(&self, state: WorkerState) {
        self.states[self.index].store(state as u8, Ordering::Release);
    }

    fn init_context(&self) -> Result<Box<dyn ExecutionContext>, EngineError> {
        let mut ctx = self.engine.create_context()?;
        ctx.exec(self.engine.prelude())?;
        if let Some(code) = &self.init {
            ctx.exec(code)?;
        }
        Ok(ctx)
    }

    fn run(self, ready: Sender<Report>) {
        self.set(WorkerState::Starting);
        let mut ctx = match self.init_context() {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::error!(worker = self.index, error = %e, "worker failed to initialize");
                self.set(WorkerState::Stopped);
                let _ = ready.send((self.index, Err(e)));
                return;
            }
        };
        self.set(WorkerState::Ready);
        tracing::debug!(worker = self.index, engine = self.engine.name(), "worker ready");
        let _ = ready.send((self.index, Ok(())));
        drop(ready);

        self.set(WorkerState::Idle);
        while !self.shutdown.load(Ordering::Acquire) {
            match self.jobs.recv_timeout(self.poll_interval) {
                Ok(job) => {
                    self.set(WorkerState::Executing);
                    tracing::trace!(worker = self.index, "executing job");
                    job.run(ctx.as_mut());
                    self.set(WorkerState::Idle);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.set(WorkerState::Stopping);
        drop(ctx);
        self.set(WorkerState::Stopped);
        tracing::debug!(worker = self.index, "worker stopped");
    }
}

// ── WorkerPool ─────────────────────────────────────────────────────

/// A fixed set of workers sharing one FIFO queue.
///
/// The pool is `Sync`; share it behind an `Arc` to submit from many
/// threads. Dropping the pool shuts it down.
pub struct WorkerPool {
    engine: Arc<dyn Engine>,
    config: PoolConfig,
    sender: RwLock<Option<Sender<Box<dyn Job>>>>,
    receiver: Receiver<Box<dyn Job>>,
    shutdown: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    states: Arc<[AtomicU8]>,
}

impl WorkerPool {
    /// Start `config.resolved_worker_count()` workers on `engine` and wait
    /// until every one has initialized.
    ///
    /// If any worker fails to initialize, every worker is stopped and
    /// joined before the error is returned.
    pub fn new(engine: Arc<dyn Engine>, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let count = config.resolved_worker_count();
        let (sender, receiver) = crossbeam_channel::unbounded::<Box<dyn Job>>();
        let (ready_tx, ready_rx) = crossbeam_channel::unbounded::<Report>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let states: Arc<[AtomicU8]> = (0..count)
            .map(|_| AtomicU8::new(WorkerState::Starting as u8))
            .collect();

        let mut threads = Vec::with_capacity(count);
        for index in 0..count {
            let worker = Worker {
                index,
                engine: Arc::clone(&engine),
                init: config.init.clone(),
                poll_interval: config.poll_interval,
                jobs: receiver.clone(),
                shutdown: Arc::clone(&shutdown),
                states: Arc::clone(&states),
            };
            let ready = ready_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("blockwork-worker-{index}"))
                .spawn(move || worker.run(ready));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    shutdown.store(true, Ordering::Release);
                    join_all(threads);
                    return Err(ConfigError::ThreadSpawnFailed {
                        reason: format!("blockwork-worker-{index}: {e}"),
                    }
                    .into());
                }
            }
        }
        drop(ready_tx);

        let mut failure = None;
        for _ in 0..count {
            match ready_rx.recv() {
                Ok((_, Ok(()))) => {}
                Ok((worker, Err(source))) => {
                    failure.get_or_insert(PoolError::InitFailed { worker, source });
                }
                Err(_) => {
                    // A worker died without reporting.
                    failure.get_or_insert(PoolError::InitFailed {
                        worker: count,
                        source: EngineError::Context {
                            reason: "worker exited during startup".into(),
                        },
                    });
                    break;
                }
            }
        }
        if let Some(error) = failure {
            shutdown.store(true, Ordering::Release);
            join_all(threads);
            return Err(error);
        }

        tracing::debug!(workers = count, engine = engine.name(), "worker pool started");
        Ok(Self {
            engine,
            config,
            sender: RwLock::new(Some(sender)),
            receiver,
            shutdown,
            threads: Mutex::new(threads),
            states,
        })
    }

    /// A pool running the built-in kernel-script engine.
    pub fn script(config: PoolConfig) -> Result<Self, PoolError> {
        Self::new(Arc::new(ScriptEngine::new()), config)
    }

    /// The engine every worker's context came from.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// The configuration the pool was started with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of workers.
    pub fn worker_count(&self) -> usize {
        self.states.len()
    }

    /// Current state of every worker.
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.states
            .iter()
            .map(|s| WorkerState::from_u8(s.load(Ordering::Acquire)))
            .collect()
    }

    /// Jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Queue `f` to run on the next free worker's context.
    ///
    /// After shutdown the handle completes immediately with
    /// [`TaskError::PoolShutDown`].
    pub fn submit<T, F>(&self, f: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn ExecutionContext) -> Result<T, EngineError> + Send + 'static,
    {
        let (reply, handle) = TaskHandle::channel();
        self.enqueue(Box::new(FnJob::new(f, reply)));
        handle
    }

    /// Queue `block` to run `code`, with the block bound as `block`.
    pub fn submit_block(&self, block: Block, code: impl Into<String>) -> TaskHandle<()> {
        let statement = self.engine.block_statement().to_string();
        let code = code.into();
        self.submit(move |ctx| block.execute(ctx, &statement, &code))
    }

    fn enqueue(&self, job: Box<dyn Job>) {
        let sender = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(tx) => {
                if let Err(crossbeam_channel::SendError(job)) = tx.send(job) {
                    job.abandon(TaskError::PoolShutDown);
                }
            }
            None => job.abandon(TaskError::PoolShutDown),
        }
    }

    /// Stop accepting work, let every worker finish its in-flight job, join
    /// them, and complete every job still queued with
    /// [`TaskError::PoolShutDown`]. Idempotent.
    pub fn shutdown(&self) -> ShutdownReport {
        let start = Instant::now();
        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.shutdown.store(true, Ordering::Release);
        drop(sender);

        let handles = std::mem::take(&mut *self.threads.lock().unwrap_or_else(PoisonError::into_inner));
        let workers_joined = join_all(handles);

        let mut drained = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job.abandon(TaskError::PoolShutDown);
            drained += 1;
        }
        if drained > 0 {
            tracing::debug!(drained, "completed queued jobs with PoolShutDown");
        }
        ShutdownReport {
            total_ms: start.elapsed().as_millis() as u64,
            workers_joined,
            drained,
        }
    }
}

fn join_all(handles: Vec<JoinHandle<()>>) -> usize {
    let mut joined = 0;
    for handle in handles {
        let name = handle.thread().name().unwrap_or("worker").to_string();
        match handle.join() {
            Ok(()) => joined += 1,
            Err(_) => tracing::error!(thread = %name, "worker thread panicked"),
        }
    }
    joined
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("engine", &self.engine.name())
            .field("workers", &self.worker_count())
            .field("queued", &self.queued())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(workers: usize) -> WorkerPool {
        WorkerPool::script(PoolConfig::with_workers(workers)).unwrap()
    }

    #[test]
    fn workers_come_up_idle() {
        let p = pool(2);
        assert_eq!(p.worker_count(), 2);
        let start = Instant::now();
        while p.worker_states().iter().any(|s| *s != WorkerState::Idle) {
            assert!(start.elapsed() < Duration::from_secs(5));
            thread::yield_now();
        }
    }

    #[test]
    fn shutdown_stops_every_worker() {
        let p = pool(3);
        let report = p.shutdown();
        assert_eq!(report.workers_joined, 3);
        assert!(p.worker_states().iter().all(|s| *s == WorkerState::Stopped));
        assert_eq!(p.shutdown().workers_joined, 0);
    }

    #[test]
    fn submissions_after_shutdown_fail_fast() {
        let p = pool(1);
        p.shutdown();
        let handle = p.submit(|_| Ok(1));
        assert_eq!(handle.wait(), Err(TaskError::PoolShutDown));
    }

    #[test]
    fn contexts_persist_between_jobs() {
        let p = pool(1);
        p.submit(|ctx| ctx.exec("counter = 41")).wait().unwrap();
        let v = p
            .submit(|ctx| {
                ctx.exec("counter = counter + 1")?;
                Ok(ctx.lookup("counter").and_then(|b| b.as_f64()))
            })
            .wait()
            .unwrap();
        assert_eq!(v, Some(42.0));
    }
}
