use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use agentvisor::{
    BaseTask, Bus, ControlSignal, EventKind, OnceTask, RestartPolicy, Runner, RunnerConfig,
    RunnerStatus, RuntimeError, Task, TaskError, TaskFactory, TaskRef, TaskStatus, WorkerConfig,
    WorkerStatus,
};
use async_trait::async_trait;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn worker_cfg() -> WorkerConfig {
    WorkerConfig {
        max_tasks: 8,
        task_timeout: Duration::ZERO,
        shutdown_timeout: Duration::from_secs(1),
        stop_on_error: false,
        status_interval: Duration::ZERO,
    }
}

fn runner_cfg(restart: RestartPolicy) -> RunnerConfig {
    RunnerConfig {
        shutdown_timeout: Duration::from_secs(1),
        restart,
    }
}

fn idle_factory() -> TaskFactory {
    Arc::new(|| {
        let task: TaskRef = BaseTask::arc("idle");
        vec![task]
    })
}

/// Factory whose single task fails immediately; counts how many workers were built.
fn failing_factory(built: Arc<AtomicU32>) -> TaskFactory {
    Arc::new(move || {
        built.fetch_add(1, Ordering::SeqCst);
        let task: TaskRef = OnceTask::arc("crashy", |_ctx: CancellationToken| async {
            Err::<(), _>(TaskError::execution("crashed"))
        });
        vec![task]
    })
}

async fn wait_for(runner: &Runner, what: &str, done: impl Fn(RunnerStatus, u32) -> bool) {
    timeout(Duration::from_secs(5), async {
        while !done(runner.status().await, runner.restart_count().await) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn start_and_stop() {
    let runner = Runner::builder(worker_cfg(), runner_cfg(RestartPolicy::default()), idle_factory())
        .build()
        .expect("runner");
    assert_eq!(runner.status().await, RunnerStatus::Idle);

    runner.start().await.expect("start");
    let info = runner.info().await;
    assert_eq!(info.status, RunnerStatus::Running);
    assert_eq!(info.worker_status, Some(WorkerStatus::Running));
    assert_eq!(info.worker_tasks.len(), 1);

    runner.stop().await.expect("stop");
    assert_eq!(runner.status().await, RunnerStatus::Stopped);
    timeout(Duration::from_millis(100), runner.wait())
        .await
        .expect("wait resolves after stop");

    let info = runner.info().await;
    assert_eq!(info.worker_status, Some(WorkerStatus::Stopped));
    assert_eq!(info.worker_tasks[0].status, TaskStatus::Stopped);
    assert_eq!(info.last_error, None);
}

#[tokio::test]
async fn lifecycle_calls_in_wrong_phase_fail() {
    let runner = Runner::builder(worker_cfg(), runner_cfg(RestartPolicy::default()), idle_factory())
        .build()
        .expect("runner");

    let err = runner.stop().await.unwrap_err();
    assert_eq!(
        err,
        RuntimeError::Stop("runner is not running, current status: idle".into())
    );
    assert!(matches!(runner.restart().await, Err(RuntimeError::Restart(_))));

    runner.start().await.expect("start");
    assert!(matches!(runner.start().await, Err(RuntimeError::Start(_))));
    runner.stop().await.expect("stop");
}

#[tokio::test]
async fn build_rejects_zero_timeouts() {
    let zero_runner = RunnerConfig {
        shutdown_timeout: Duration::ZERO,
        ..RunnerConfig::default()
    };
    assert!(matches!(
        Runner::builder(worker_cfg(), zero_runner, idle_factory()).build(),
        Err(RuntimeError::Init(_))
    ));

    let zero_cap = WorkerConfig {
        max_tasks: 0,
        ..worker_cfg()
    };
    assert!(matches!(
        Runner::builder(zero_cap, RunnerConfig::default(), idle_factory()).build(),
        Err(RuntimeError::Init(_))
    ));
}

#[tokio::test]
async fn start_failure_marks_runner_failed() {
    let empty: TaskFactory = Arc::new(Vec::<TaskRef>::new);
    let runner = Runner::builder(worker_cfg(), runner_cfg(RestartPolicy::default()), empty)
        .build()
        .expect("runner");

    let err = runner.start().await.unwrap_err();
    assert!(matches!(err, RuntimeError::Start(ref msg) if msg.contains("no tasks registered")));
    assert_eq!(runner.status().await, RunnerStatus::Failed);
    assert_eq!(runner.last_error().await, Some(err));
    timeout(Duration::from_millis(100), runner.wait())
        .await
        .expect("wait resolves after failed start");
}

#[tokio::test]
async fn restarts_exactly_max_times_then_stops() {
    let built = Arc::new(AtomicU32::new(0));
    let policy = RestartPolicy {
        enabled: true,
        max_restarts: 3,
        delay: Duration::from_millis(10),
        exponential: false,
    };
    let bus = Bus::new(1024);
    let mut events = bus.subscribe();
    let runner = Runner::builder(
        WorkerConfig {
            stop_on_error: true,
            ..worker_cfg()
        },
        runner_cfg(policy),
        failing_factory(built.clone()),
    )
    .with_bus(bus)
    .build()
    .expect("runner");

    runner.start().await.expect("start");
    timeout(Duration::from_secs(5), runner.wait())
        .await
        .expect("runner stops after exhausting restarts");

    assert_eq!(runner.status().await, RunnerStatus::Stopped);
    assert_eq!(runner.restart_count().await, 3);
    assert_eq!(built.load(Ordering::SeqCst), 4);

    let mut scheduled = 0;
    let mut exhausted = false;
    while let Ok(ev) = events.try_recv() {
        match ev.kind {
            EventKind::RestartScheduled => scheduled += 1,
            EventKind::RestartsExhausted => {
                assert_eq!(ev.attempt, Some(3));
                exhausted = true;
            }
            _ => {}
        }
    }
    assert_eq!(scheduled, 3);
    assert!(exhausted);
}

#[tokio::test]
async fn worker_exit_without_restart_policy_stops_runner() {
    let built = Arc::new(AtomicU32::new(0));
    let runner = Runner::builder(
        WorkerConfig {
            stop_on_error: true,
            ..worker_cfg()
        },
        runner_cfg(RestartPolicy::default()),
        failing_factory(built.clone()),
    )
    .build()
    .expect("runner");

    runner.start().await.expect("start");
    timeout(Duration::from_secs(2), runner.wait())
        .await
        .expect("runner stops");

    assert_eq!(runner.status().await, RunnerStatus::Stopped);
    assert_eq!(runner.restart_count().await, 0);
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_restart_request_is_coalesced() {
    let built = Arc::new(AtomicU32::new(0));
    let counter = built.clone();
    let factory: TaskFactory = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        let task: TaskRef = BaseTask::arc("idle");
        vec![task]
    });
    let policy = RestartPolicy {
        delay: Duration::from_millis(100),
        ..RestartPolicy::default()
    };
    let runner = Runner::builder(worker_cfg(), runner_cfg(policy), factory)
        .build()
        .expect("runner");
    runner.start().await.expect("start");

    runner.restart().await.expect("first restart queued");
    let err = runner.restart().await.unwrap_err();
    assert_eq!(err, RuntimeError::Restart("restart already in progress".into()));

    wait_for(&runner, "restart to finish", |status, count| {
        status == RunnerStatus::Running && count == 1
    })
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(runner.restart_count().await, 1);
    assert_eq!(built.load(Ordering::SeqCst), 2);

    // Once the cycle is over, a new restart is accepted again.
    runner.restart().await.expect("restart after completion");
    wait_for(&runner, "second restart", |_, count| count == 2).await;

    runner.stop().await.expect("stop");
}

#[tokio::test]
async fn signal_restart_blocks_api_restart_until_it_finishes() {
    let policy = RestartPolicy {
        delay: Duration::from_millis(300),
        ..RestartPolicy::default()
    };
    let runner = Runner::builder(worker_cfg(), runner_cfg(policy), idle_factory())
        .build()
        .expect("runner");
    runner.start().await.expect("start");

    assert!(runner.control().deliver("SIGUSR1", ControlSignal::Restart));
    wait_for(&runner, "restarting", |status, _| status == RunnerStatus::Restarting).await;

    let err = runner.restart().await.unwrap_err();
    assert_eq!(err, RuntimeError::Restart("restart already in progress".into()));
    assert!(!runner.control().send(ControlSignal::Restart));

    wait_for(&runner, "restart to finish", |status, count| {
        status == RunnerStatus::Running && count == 1
    })
    .await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(runner.restart_count().await, 1);

    runner.restart().await.expect("gate reopens after the cycle");
    runner.stop().await.expect("stop");
}

#[tokio::test]
async fn exponential_delays_are_applied() {
    let policy = RestartPolicy {
        enabled: true,
        max_restarts: 0,
        delay: Duration::from_millis(40),
        exponential: true,
    };
    let bus = Bus::new(256);
    let mut events = bus.subscribe();
    let runner = Runner::builder(worker_cfg(), runner_cfg(policy), idle_factory())
        .with_bus(bus)
        .build()
        .expect("runner");
    runner.start().await.expect("start");

    for expected in [40u32, 80] {
        runner.restart().await.expect("restart");
        let ev = timeout(Duration::from_secs(2), async {
            loop {
                let ev = events.recv().await.expect("bus open");
                if ev.kind == EventKind::RestartScheduled {
                    return ev;
                }
            }
        })
        .await
        .expect("restart scheduled");
        assert_eq!(ev.delay_ms, Some(expected));
        wait_for(&runner, "restart to finish", |status, _| {
            status == RunnerStatus::Running
        })
        .await;
    }

    runner.stop().await.expect("stop");
}

#[tokio::test]
async fn stop_during_restart_delay_is_prompt() {
    let policy = RestartPolicy {
        delay: Duration::from_secs(30),
        ..RestartPolicy::default()
    };
    let runner = Runner::builder(worker_cfg(), runner_cfg(policy), idle_factory())
        .build()
        .expect("runner");
    runner.start().await.expect("start");
    runner.restart().await.expect("restart");

    wait_for(&runner, "restarting", |status, _| status == RunnerStatus::Restarting).await;
    timeout(Duration::from_secs(2), runner.stop())
        .await
        .expect("stop does not wait out the restart delay")
        .expect("stop");
    assert_eq!(runner.status().await, RunnerStatus::Stopped);
}

/// Ignores cancellation entirely.
struct Stubborn;

#[async_trait]
impl Task for Stubborn {
    fn name(&self) -> &str {
        "stubborn"
    }

    async fn run(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn stuck_shutdown_is_recorded_as_last_error() {
    let factory: TaskFactory = Arc::new(|| {
        let task: TaskRef = Arc::new(Stubborn);
        vec![task]
    });
    let runner = Runner::builder(
        WorkerConfig {
            shutdown_timeout: Duration::from_millis(100),
            ..worker_cfg()
        },
        runner_cfg(RestartPolicy::default()),
        factory,
    )
    .build()
    .expect("runner");
    runner.start().await.expect("start");
    runner.stop().await.expect("stop");

    assert_eq!(
        runner.last_error().await,
        Some(RuntimeError::GraceExceeded {
            grace: Duration::from_millis(100),
            stuck: vec!["stubborn".into()],
        })
    );
}

#[tokio::test]
async fn control_handle_drives_reload_and_shutdown() {
    let bus = Bus::new(256);
    let mut events = bus.subscribe();
    let runner = Runner::builder(worker_cfg(), runner_cfg(RestartPolicy::default()), idle_factory())
        .with_bus(bus)
        .build()
        .expect("runner");
    runner.start().await.expect("start");

    let control = runner.control();
    assert!(control.deliver("SIGHUP", ControlSignal::Reload));
    timeout(Duration::from_secs(2), async {
        loop {
            if events.recv().await.expect("bus open").kind == EventKind::ReloadRequested {
                return;
            }
        }
    })
    .await
    .expect("reload handled");
    assert_eq!(runner.status().await, RunnerStatus::Running);

    assert!(control.deliver("SIGTERM", ControlSignal::Shutdown));
    timeout(Duration::from_secs(2), runner.wait())
        .await
        .expect("runner stops on shutdown signal");
    assert_eq!(runner.status().await, RunnerStatus::Stopped);
}
