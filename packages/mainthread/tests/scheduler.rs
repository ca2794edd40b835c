use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cubicle_mainthread::{
    ExecutorState, MainThread, MainThreadConfig, Metric, MetricsObserver, NoopMetrics,
    WorkMonitor, MAX_TASKS,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn config(global_ms: u64, computer_ms: u64) -> MainThreadConfig {
    MainThreadConfig {
        max_global_time: Duration::from_millis(global_ms),
        max_computer_time: Duration::from_millis(computer_ms),
    }
}

#[derive(Default)]
struct CountingMetrics {
    total: AtomicU64,
}

impl MetricsObserver for CountingMetrics {
    fn observe(&self, metric: Metric, value: u64) {
        assert_eq!(metric, Metric::ServerTasks);
        self.total.fetch_add(value, Ordering::SeqCst);
    }
}

#[test]
fn tick_stops_once_budget_is_spent() {
    init_logging();
    let main = MainThread::new(config(20, 1000));
    let executed = Arc::new(AtomicUsize::new(0));
    let executors: Vec<_> = (0..3)
        .map(|_| main.create_executor(Arc::new(NoopMetrics)))
        .collect();
    for executor in &executors {
        for _ in 0..50 {
            let executed = executed.clone();
            assert!(executor.enqueue(move || {
                thread::sleep(Duration::from_millis(1));
                executed.fetch_add(1, Ordering::SeqCst);
            }));
        }
    }

    let start = Instant::now();
    main.tick();
    let elapsed = start.elapsed();

    // Every task takes at least a millisecond, and the loop checks the
    // deadline after each one.
    let executed = executed.load(Ordering::SeqCst);
    assert!(executed >= 1);
    assert!(executed <= 20, "ran {executed} tasks");
    assert!(elapsed >= Duration::from_millis(20));

    // Executors take turns.
    let served = executors.iter().filter(|e| e.queued_tasks() < 50).count();
    assert_eq!(served, executed.min(3));
}

#[test]
fn overrun_skips_later_ticks() {
    let main = MainThread::new(config(10, 1000));
    let worker = main.create_executor(Arc::new(NoopMetrics));
    let waiting = main.create_executor(Arc::new(NoopMetrics));

    main.tick();
    assert!(main.can_execute());

    // Five ticks worth of external work.
    worker.track_work(Duration::from_millis(50));
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    waiting.enqueue(move || flag.store(true, Ordering::SeqCst));

    for tick in 2..=5 {
        main.tick();
        assert!(!main.can_execute(), "tick {tick} should be skipped");
        assert!(!worker.can_work());
        assert!(!ran.load(Ordering::SeqCst));
    }

    main.tick();
    assert!(main.can_execute());
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn hot_executor_cools_after_budget_restored() {
    init_logging();
    let main = MainThread::new(config(1000, 5));
    let executor = main.create_executor(Arc::new(NoopMetrics));
    let ran = Arc::new(AtomicBool::new(false));

    main.tick();
    // 12ms against a 5ms budget leaves it 7ms in debt.
    executor.track_work(Duration::from_millis(12));
    assert_eq!(executor.state(), ExecutorState::Hot);
    assert!(executor.can_work(), "hot executors may still do external work");
    assert!(!executor.should_work());

    let flag = ran.clone();
    assert!(executor.enqueue(move || flag.store(true, Ordering::SeqCst)));
    assert_eq!(main.queued_executors(), 0, "hot executors are not queued");

    // -7 + 5 = -2
    main.tick();
    assert_eq!(executor.state(), ExecutorState::Cooling);
    assert!(!executor.can_work());
    assert!(!ran.load(Ordering::SeqCst));

    // -2 + 5 = 3
    main.tick();
    assert_eq!(executor.state(), ExecutorState::Cooling);
    assert!(!ran.load(Ordering::SeqCst));

    // 3 + 5 clamps to 5: a full budget.
    main.tick();
    assert_eq!(executor.state(), ExecutorState::Cool);
    assert!(ran.load(Ordering::SeqCst));
    assert!(executor.should_work());
}

#[test]
fn cooled_executor_without_work_is_not_queued() {
    let main = MainThread::new(config(1000, 5));
    let executor = main.create_executor(Arc::new(NoopMetrics));
    main.tick();
    executor.track_work(Duration::from_millis(6));
    main.tick();
    main.tick();
    assert_eq!(executor.state(), ExecutorState::Cool);
    assert_eq!(main.queued_executors(), 0);
}

#[test]
fn task_queue_is_bounded() {
    let main = MainThread::new(MainThreadConfig::default());
    let executor = main.create_executor(Arc::new(NoopMetrics));
    for _ in 0..MAX_TASKS {
        assert!(executor.enqueue(|| {}));
    }
    assert!(!executor.enqueue(|| {}));
    assert_eq!(executor.queued_tasks(), MAX_TASKS);
}

#[test]
fn late_executors_start_at_the_minimum_time() {
    let main = MainThread::new(config(1000, 100));
    let first = main.create_executor(Arc::new(NoopMetrics));
    first.enqueue(|| thread::sleep(Duration::from_millis(2)));
    main.tick();
    let first_time = first.virtual_time();
    assert!(first_time >= Duration::from_millis(102));

    let second = main.create_executor(Arc::new(NoopMetrics));
    second.enqueue(|| {});
    assert!(second.virtual_time() >= first_time + Duration::from_millis(100));
}

#[test]
fn metrics_observe_task_and_tracked_time() {
    let main = MainThread::new(MainThreadConfig::default());
    let metrics = Arc::new(CountingMetrics::default());
    let executor = main.create_executor(metrics.clone());

    main.tick();
    executor.track_work(Duration::from_millis(1));
    assert_eq!(metrics.total.load(Ordering::SeqCst), 1_000_000);

    executor.enqueue(|| thread::sleep(Duration::from_millis(1)));
    main.tick();
    assert!(metrics.total.load(Ordering::SeqCst) >= 2_000_000);
}

#[test]
fn enqueue_from_other_threads() {
    let main = MainThread::new(config(1000, 1000));
    let executed = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let executor = main.create_executor(Arc::new(NoopMetrics));
            let executed = executed.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let executed = executed.clone();
                    assert!(executor.enqueue(move || {
                        executed.fetch_add(1, Ordering::SeqCst);
                    }));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    while main.queued_executors() > 0 {
        main.tick();
    }
    assert_eq!(executed.load(Ordering::SeqCst), 400);
}
