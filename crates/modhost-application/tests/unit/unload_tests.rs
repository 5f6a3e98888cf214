//! Unload coordinator tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use modhost_application::lifecycle::UnloadState;
use modhost_application::{TaskOutcome, UnloadCoordinator};
use modhost_domain::{ErrorKind, ModuleId};

use crate::support::noop;

fn coordinator() -> UnloadCoordinator {
    UnloadCoordinator::new(
        ModuleId::new("unload"),
        Handle::current(),
        Duration::from_millis(25),
    )
}

// ============================================================================
// Drain
// ============================================================================

/// After signal and drain nothing is pending and every callback has run
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_drain_empties_task_set() {
    let coordinator = coordinator();
    let finished = Arc::new(AtomicUsize::new(0));
    let callbacks = Arc::new(AtomicUsize::new(0));
    let ran_after_signal = Arc::new(AtomicBool::new(true));

    for i in 0..8_u64 {
        let finished = Arc::clone(&finished);
        coordinator
            .observe(format!("task-{i}"), async move {
                tokio::time::sleep(Duration::from_millis(5 * i)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("observe");
    }
    for i in 0..4 {
        let callbacks = Arc::clone(&callbacks);
        let ran_after_signal = Arc::clone(&ran_after_signal);
        let token = coordinator.token();
        coordinator
            .register_for_unload(format!("callback-{i}"), move || {
                if !token.is_cancelled() {
                    ran_after_signal.store(false, Ordering::SeqCst);
                }
                callbacks.fetch_add(1, Ordering::SeqCst);
            })
            .expect("register");
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(callbacks.load(Ordering::SeqCst), 0, "callbacks wait for the signal");

    assert!(coordinator.signal());
    coordinator.drain().await.expect("drain");

    assert_eq!(coordinator.state(), UnloadState::Drained);
    assert_eq!(coordinator.active_tasks(), 0);
    assert!(coordinator.pending_tasks().is_empty());
    assert_eq!(finished.load(Ordering::SeqCst), 8);
    assert_eq!(callbacks.load(Ordering::SeqCst), 4);
    assert!(ran_after_signal.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_drain_waits_for_slow_task() {
    let coordinator = coordinator();
    let release = CancellationToken::new();
    let gate = release.clone();
    coordinator
        .observe("slow", async move {
            gate.cancelled().await;
            Ok(())
        })
        .expect("observe");

    coordinator.signal();
    let draining = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.drain().await })
    };

    // Several warn intervals pass without the drain returning.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!draining.is_finished());
    assert_eq!(coordinator.pending_tasks(), vec!["slow".to_string()]);

    release.cancel();
    draining.await.expect("join").expect("drain");
    assert_eq!(coordinator.active_tasks(), 0);
}

#[tokio::test]
async fn test_drain_is_idempotent() {
    let coordinator = coordinator();
    coordinator.signal();
    coordinator.drain().await.expect("first drain");
    let again = coordinator.drain().await.expect("second drain");
    assert_eq!(again.disposed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_drain_blocking_from_sync_path() {
    let coordinator = coordinator();
    coordinator.observe("quick", noop()).expect("observe");
    coordinator.signal();

    let report = {
        let coordinator = coordinator.clone();
        tokio::task::spawn_blocking(move || coordinator.drain_blocking())
            .await
            .expect("join")
            .expect("drain")
    };
    assert_eq!(report.disposed, 0);
    assert_eq!(coordinator.state(), UnloadState::Drained);
}

// ============================================================================
// Rejection after signal
// ============================================================================

/// Late observation is rejected and leaves tracked work intact
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_observe_after_signal_rejected() {
    let coordinator = coordinator();
    let release = CancellationToken::new();
    let gate = release.clone();
    let tracked = coordinator
        .observe("long", async move {
            gate.cancelled().await;
            Ok(())
        })
        .expect("observe");

    coordinator.signal();
    let err = coordinator.observe("late", noop()).expect_err("rejected");
    assert_eq!(err.kind(), ErrorKind::AlreadyUnloaded);
    assert_eq!(coordinator.pending_tasks(), vec!["long".to_string()]);
    assert_eq!(coordinator.active_tasks(), 1);

    release.cancel();
    coordinator.drain().await.expect("drain");
    assert_eq!(tracked.outcome(), Some(TaskOutcome::Succeeded));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unload_callback_allowed_until_drained() {
    let coordinator = coordinator();
    coordinator.signal();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    coordinator
        .register_for_unload("late-callback", move || flag.store(true, Ordering::SeqCst))
        .expect("callbacks are accepted after the signal");
    coordinator.drain().await.expect("drain");
    assert!(ran.load(Ordering::SeqCst));

    let err = coordinator
        .register_for_unload("too-late", || {})
        .expect_err("rejected after drain");
    assert_eq!(err.kind(), ErrorKind::AlreadyUnloaded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_signals_transition_once() {
    let coordinator = coordinator();
    let signals: Vec<_> = (0..16)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.signal() })
        })
        .collect();

    let mut transitions = 0;
    for signal in signals {
        if signal.await.expect("join") {
            transitions += 1;
        }
    }
    assert_eq!(transitions, 1);
}

// ============================================================================
// Failures and disposers
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_tasks_do_not_block_drain() {
    let coordinator = coordinator();
    let failed = coordinator
        .observe("failing", async { Err(anyhow::anyhow!("lost connection")) })
        .expect("observe");
    coordinator.signal();
    coordinator.drain().await.expect("drain");
    assert_eq!(
        failed.outcome(),
        Some(TaskOutcome::Failed("lost connection".to_string()))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disposers_run_in_reverse_order_after_drain() {
    let coordinator = coordinator();
    let order = Arc::new(Mutex::new(Vec::new()));
    let release = CancellationToken::new();
    let gate = release.clone();
    let task_done = Arc::new(AtomicBool::new(false));
    let done = Arc::clone(&task_done);

    coordinator
        .observe("worker", async move {
            gate.cancelled().await;
            done.store(true, Ordering::SeqCst);
            Ok(())
        })
        .expect("observe");

    for name in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        let task_done = Arc::clone(&task_done);
        coordinator
            .register_disposer(name, move || {
                assert!(task_done.load(Ordering::SeqCst), "disposer ran before drain");
                order.lock().expect("order").push(name);
            })
            .expect("register");
    }
    coordinator
        .register_disposer("panicking", || panic!("dispose failed"))
        .expect("register");

    coordinator.signal();
    release.cancel();
    let report = coordinator.drain().await.expect("drain");

    assert_eq!(report.disposed, 4);
    assert_eq!(*order.lock().expect("order"), vec!["third", "second", "first"]);
}
