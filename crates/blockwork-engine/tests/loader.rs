//! End-to-end cell loading: kernels, inputs, failures, and caching.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use blockwork_cache::{ConstantSource, DenseArray};
use blockwork_core::{CellGrid, DataError, ElementKind, Halo, Interval, LoadError, TaskError};
use blockwork_engine::{CacheLoader, CopyInput, DataView, FailurePolicy, PoolConfig, WorkerPool};
use blockwork_test_utils::{
    coordinate_sum_source, coordinate_sums, init_test_logging, script_pool, CountingGenerator,
};

fn counting_input(dims: &[usize]) -> (CountingGenerator<CopyInput>, Arc<std::sync::atomic::AtomicUsize>) {
    CountingGenerator::new(CopyInput::new(coordinate_sum_source(dims, ElementKind::I32)))
}

// ── Kernels ────────────────────────────────────────────────────────

#[test]
fn cell_means_of_a_dense_input() {
    let values: Vec<f64> = (0..10u32).map(f64::from).collect();
    let source = DenseArray::from_values(&[5, 2], ElementKind::F64, &values).unwrap();
    let grid = CellGrid::new(&[5, 2], &[3, 1]).unwrap();
    let array = CacheLoader::builder(grid, script_pool(2), "block.data[...] = mean(block.inputs[0])")
        .input(CopyInput::new(source))
        .build()
        .unwrap()
        .into_array(4)
        .unwrap();
    assert_eq!(
        array.to_f64_vec().unwrap(),
        vec![1.0, 1.0, 1.0, 3.5, 3.5, 6.0, 6.0, 6.0, 8.5, 8.5]
    );
}

#[test]
fn generators_may_add_dimensions() {
    // Element (i, j) is 1 + i + 3j; the worker sees it as rows over j.
    let generator = |interval: &Interval| {
        let mut shape = interval.dims().to_vec();
        shape.push(2);
        DataView::from_values(ElementKind::F64, &shape, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
    };
    let grid = CellGrid::new(&[3], &[3]).unwrap();
    let loader = CacheLoader::builder(grid, script_pool(1), "block.data[...] = max(block.inputs[0], axis=0)")
        .input(generator)
        .build()
        .unwrap();
    assert_eq!(loader.load(0).unwrap().to_f64_vec(), vec![4.0, 5.0, 6.0]);
}

#[test]
fn inputs_bind_in_the_order_they_were_added() {
    let grid = CellGrid::new(&[2, 2], &[2, 2]).unwrap();
    let loader = CacheLoader::builder(
        grid,
        script_pool(1),
        "block.data[...] = block.inputs[0] * 10 + block.inputs[1]",
    )
    .element_kind(ElementKind::I64)
    .input(CopyInput::new(ConstantSource::new(2, ElementKind::I64, 2i64)))
    .input(CopyInput::new(ConstantSource::new(2, ElementKind::I64, 5i64)))
    .build()
    .unwrap();
    assert_eq!(loader.load(0).unwrap().to_f64_vec(), vec![25.0; 4]);
}

#[test]
fn init_script_definitions_are_usable_from_kernels() {
    let pool = Arc::new(WorkerPool::script(PoolConfig::with_workers(2).init("offset = 100")).unwrap());
    let grid = CellGrid::new(&[4], &[2]).unwrap();
    let loader = CacheLoader::builder(grid, pool, "block.data[...] = block.index + offset")
        .element_kind(ElementKind::U8)
        .build()
        .unwrap();
    assert_eq!(loader.load(1).unwrap().to_f64_vec(), vec![101.0, 101.0]);
}

// ── Failures ───────────────────────────────────────────────────────

#[test]
fn failing_kernels_follow_the_failure_policy() {
    init_test_logging();
    let grid = CellGrid::new(&[4], &[2]).unwrap();
    let pool = script_pool(1);

    let lenient = CacheLoader::builder(grid.clone(), Arc::clone(&pool), "block.data[...] = 1 / 0")
        .build()
        .unwrap();
    let cell = lenient.load(0).unwrap();
    assert!(!cell.is_valid());
    assert_eq!(cell.dims(), &[2]);

    let strict = CacheLoader::builder(grid, pool, "block.data[...] = 1 / 0")
        .failure_policy(FailurePolicy::Propagate)
        .build()
        .unwrap();
    match strict.load(1) {
        Err(LoadError::Task {
            index: 1,
            source: TaskError::Execution(e),
        }) => assert_eq!(e.runtime_kind(), Some("ZeroDivisionError")),
        other => panic!("expected an execution failure, got {other:?}"),
    }
}

#[test]
fn unreadable_inputs_fail_the_cell_without_running_it() {
    // The halo reaches one element past both ends of a bounded source.
    let grid = CellGrid::new(&[3], &[3]).unwrap();
    let loader = CacheLoader::builder(grid, script_pool(1), "block.data[...] = 1")
        .halo(Halo::symmetric(&[1]))
        .input(CopyInput::new(coordinate_sum_source(&[3], ElementKind::I32)))
        .failure_policy(FailurePolicy::Propagate)
        .build()
        .unwrap();
    let err = loader.load(0).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Task {
            source: TaskError::DataUnavailable(DataError::OutOfBounds { .. }),
            ..
        }
    ));
}

#[test]
fn timeouts_are_errors_under_every_policy() {
    let pool = script_pool(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let blocker = pool.submit(move |_| {
        let _ = release_rx.recv();
        Ok(())
    });

    let grid = CellGrid::new(&[2], &[1]).unwrap();
    let loader = CacheLoader::builder(grid, Arc::clone(&pool), "block.data[...] = 1")
        .failure_policy(FailurePolicy::MarkInvalid)
        .build()
        .unwrap();
    let err = loader.load_timeout(0, Duration::from_millis(20)).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Task {
            index: 0,
            source: TaskError::Timeout { .. }
        }
    ));

    release_tx.send(()).unwrap();
    blocker.wait().unwrap();
    assert!(loader.load(1).unwrap().is_valid());
}

#[test]
fn loads_after_shutdown_report_it() {
    let pool = script_pool(1);
    pool.shutdown();
    let grid = CellGrid::new(&[2], &[1]).unwrap();
    let loader = CacheLoader::builder(grid, pool, "block.data[...] = 1")
        .failure_policy(FailurePolicy::Propagate)
        .build()
        .unwrap();
    assert!(matches!(
        loader.load(0),
        Err(LoadError::Task {
            source: TaskError::PoolShutDown,
            ..
        })
    ));
}

// ── Caching ────────────────────────────────────────────────────────

#[test]
fn concurrent_fetches_match_sequential_ones() {
    let dims = [12, 9];
    let grid = CellGrid::new(&dims, &[4, 3]).unwrap();
    let code = "block.data[...] = block.inputs[0] * 2 + block.index";
    let build = |workers| {
        CacheLoader::builder(grid.clone(), script_pool(workers), code)
            .element_kind(ElementKind::I32)
            .input(CopyInput::new(coordinate_sum_source(&dims, ElementKind::I32)))
            .build()
            .unwrap()
            .into_array(4)
            .unwrap()
    };

    let sequential = build(1);
    let expected: Vec<Vec<f64>> = (0..grid.cell_count())
        .map(|i| sequential.cell(i).unwrap().to_f64_vec())
        .collect();

    let concurrent = build(4);
    let count = grid.cell_count();
    thread::scope(|s| {
        for t in 0..6u64 {
            let concurrent = &concurrent;
            let expected = &expected;
            s.spawn(move || {
                for step in 0..count {
                    let index = (step + t * 5) % count;
                    let cell = concurrent.cell(index).unwrap();
                    assert_eq!(cell.to_f64_vec(), expected[index as usize]);
                }
            });
        }
    });

    // Cell 0 covers [0, 4) x [0, 3).
    let first = Interval::new(&[0, 0], &[3, 2]).unwrap();
    let doubled: Vec<f64> = coordinate_sums(&first).iter().map(|v| v * 2.0).collect();
    assert_eq!(expected[0], doubled);
}

#[test]
fn each_resident_cell_is_computed_once() {
    let (input, calls) = counting_input(&[8]);
    let grid = CellGrid::new(&[8], &[2]).unwrap();
    let array = CacheLoader::builder(grid, script_pool(2), "block.data[...] = block.inputs[0]")
        .element_kind(ElementKind::I32)
        .input(input)
        .build()
        .unwrap()
        .into_array(2)
        .unwrap();

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| array.cell(0).unwrap());
        }
    });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(array.stats().loads, 1);
    assert_eq!(array.stats().hits, 7);

    array.cell(1).unwrap();
    array.cell(2).unwrap();
    assert_eq!(array.stats().evictions, 1);
    assert!(array.cache().peek(0).is_none());

    // Evicted cells are recomputed on demand.
    assert_eq!(array.cell(0).unwrap().to_f64_vec(), vec![0.0, 1.0]);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
