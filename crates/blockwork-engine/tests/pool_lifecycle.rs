//! Worker pool startup, task protocol, and shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use blockwork_core::{
    Binding, CellGrid, ElementKind, Engine, EngineError, ExecutionContext, Halo, TaskError,
};
use blockwork_engine::{Block, PoolConfig, PoolError, WorkerPool, WorkerState};
use blockwork_script::ScriptEngine;
use blockwork_test_utils::{init_test_logging, script_pool};

// ── Tracking engine ────────────────────────────────────────────────

/// Kernel script, counting contexts that are still alive.
struct TrackingEngine {
    script: ScriptEngine,
    live: Arc<AtomicUsize>,
}

impl TrackingEngine {
    fn new(live: &Arc<AtomicUsize>) -> Arc<Self> {
        Arc::new(Self {
            script: ScriptEngine::new(),
            live: Arc::clone(live),
        })
    }
}

struct Tracked {
    inner: Box<dyn ExecutionContext>,
    live: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ExecutionContext for Tracked {
    fn exec(&mut self, code: &str) -> Result<(), EngineError> {
        self.inner.exec(code)
    }
    fn bind(&mut self, name: &str, value: Binding) -> Result<(), EngineError> {
        self.inner.bind(name, value)
    }
    fn unbind(&mut self, name: &str) {
        self.inner.unbind(name)
    }
    fn lookup(&self, name: &str) -> Option<Binding> {
        self.inner.lookup(name)
    }
    fn names(&self) -> Vec<String> {
        self.inner.names()
    }
}

impl Engine for TrackingEngine {
    fn name(&self) -> &str {
        "tracking"
    }
    fn create_context(&self) -> Result<Box<dyn ExecutionContext>, EngineError> {
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Tracked {
            inner: self.script.create_context()?,
            live: Arc::clone(&self.live),
        }))
    }
    fn prelude(&self) -> &str {
        self.script.prelude()
    }
    fn block_statement(&self) -> &str {
        self.script.block_statement()
    }
}

fn wait_until(pool: &WorkerPool, state: WorkerState) {
    let start = Instant::now();
    while !pool.worker_states().contains(&state) {
        assert!(start.elapsed() < Duration::from_secs(5), "no worker reached {state:?}");
        thread::sleep(Duration::from_millis(1));
    }
}

// ── Startup ────────────────────────────────────────────────────────

#[test]
fn failing_init_script_fails_construction_and_stops_every_worker() {
    init_test_logging();
    let live = Arc::new(AtomicUsize::new(0));
    let engine = TrackingEngine::new(&live);
    let err = WorkerPool::new(engine, PoolConfig::with_workers(4).init("1/0")).unwrap_err();
    match err {
        PoolError::InitFailed { source, .. } => {
            assert_eq!(source.runtime_kind(), Some("ZeroDivisionError"));
        }
        other => panic!("expected InitFailed, got {other:?}"),
    }
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn invalid_configuration_is_rejected_before_spawning() {
    let err = WorkerPool::script(PoolConfig::with_workers(0)).unwrap_err();
    assert!(matches!(
        err,
        PoolError::Config(blockwork_core::ConfigError::ZeroWorkers)
    ));
}

#[test]
fn contexts_live_exactly_as_long_as_the_pool() {
    let live = Arc::new(AtomicUsize::new(0));
    let engine = TrackingEngine::new(&live);
    let pool = WorkerPool::new(engine, PoolConfig::with_workers(3)).unwrap();
    assert_eq!(live.load(Ordering::SeqCst), 3);
    drop(pool);
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn init_script_and_block_record_are_visible() {
    let pool = WorkerPool::script(PoolConfig::with_workers(2).init("scale = 3")).unwrap();
    let names = pool.submit(|ctx| Ok(ctx.names())).wait().unwrap();
    assert_eq!(names, vec!["Block".to_string(), "scale".to_string()]);
}

// ── Task protocol ──────────────────────────────────────────────────

#[test]
fn block_tasks_leave_the_name_surface_unchanged() {
    let pool = script_pool(1);
    let before = pool.submit(|ctx| Ok(ctx.names())).wait().unwrap();

    let grid = CellGrid::new(&[4], &[2]).unwrap();
    let ok = Block::assemble(&grid, 0, ElementKind::F64, &Halo::empty(1), &[]).unwrap();
    pool.submit_block(ok, "block.data[...] = 1").wait().unwrap();
    let failing = Block::assemble(&grid, 1, ElementKind::F64, &Halo::empty(1), &[]).unwrap();
    let err = pool.submit_block(failing, "undefined + 1").wait().unwrap_err();
    assert!(matches!(err, TaskError::Execution(EngineError::Runtime { .. })));

    let after = pool.submit(|ctx| Ok(ctx.names())).wait().unwrap();
    assert_eq!(before, after);
}

#[test]
fn execution_errors_surface_from_generic_jobs() {
    let pool = script_pool(1);
    let err = pool.submit(|ctx| ctx.exec("missing * 2")).wait().unwrap_err();
    match err {
        TaskError::Execution(e) => assert_eq!(e.runtime_kind(), Some("NameError")),
        other => panic!("expected an execution error, got {other:?}"),
    }
}

#[test]
fn a_panicking_job_does_not_take_the_worker_down() {
    let pool = script_pool(1);
    let err = pool
        .submit(|_| -> Result<(), EngineError> { panic!("kernel bug") })
        .wait()
        .unwrap_err();
    assert_eq!(
        err,
        TaskError::Panicked {
            message: "kernel bug".into()
        }
    );
    assert_eq!(pool.submit(|_| Ok(7)).wait(), Ok(7));
}

#[test]
fn timeouts_do_not_cancel_the_job() {
    let pool = script_pool(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let handle = pool.submit(move |_| {
        let _ = release_rx.recv();
        Ok("done")
    });
    let err = handle.wait_timeout(Duration::from_millis(20)).unwrap_err();
    assert!(matches!(err, TaskError::Timeout { .. }));
    release_tx.send(()).unwrap();
    assert_eq!(handle.wait(), Ok("done"));
}

// ── Shutdown ───────────────────────────────────────────────────────

#[test]
fn shutdown_drains_queued_tasks() {
    let pool = script_pool(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let running = pool.submit(move |_| {
        let _ = release_rx.recv();
        Ok(())
    });
    wait_until(&pool, WorkerState::Executing);
    let queued: Vec<_> = (0..3).map(|i| pool.submit(move |_| Ok(i))).collect();

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let _ = release_tx.send(());
    });
    let report = pool.shutdown();
    releaser.join().unwrap();

    assert_eq!(report.workers_joined, 1);
    assert_eq!(report.drained, 3);
    assert_eq!(running.wait(), Ok(()));
    for handle in queued {
        assert_eq!(handle.wait(), Err(TaskError::PoolShutDown));
    }
    assert_eq!(pool.worker_states(), vec![WorkerState::Stopped]);
}

#[test]
fn shared_pool_shuts_down_once() {
    let pool = script_pool(2);
    let other = Arc::clone(&pool);
    let report = thread::spawn(move || other.shutdown()).join().unwrap();
    assert_eq!(report.workers_joined, 2);
    assert!(pool.is_shut_down());
    assert_eq!(pool.shutdown().workers_joined, 0);
    assert_eq!(
        pool.submit(|_| Ok(())).wait_timeout(Duration::from_secs(1)),
        Err(TaskError::PoolShutDown)
    );
}
