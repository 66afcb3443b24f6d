//! Update state machine tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mapiod::device::state::{DeviceStateMachine, UpdateState};
use mapiod::errors::AgentError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_installs_admit_exactly_one() {
    let machine = Arc::new(DeviceStateMachine::new());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let machine = machine.clone();
            tokio::spawn(async move { machine.begin_firmware_install() })
        })
        .collect();

    let mut admitted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(AgentError::AlreadyUpdating) => rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(rejected, 15);
    assert_eq!(machine.current_state(), UpdateState::Updating);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mutation_lock_serializes_operations() {
    let machine = Arc::new(DeviceStateMachine::new());
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let machine = machine.clone();
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            tokio::spawn(async move {
                machine
                    .with_mutation_lock(|| async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        i
                    })
                    .await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results.sort_unstable();

    assert_eq!(results, (0..8).collect::<Vec<_>>());
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mutation_lock_does_not_change_update_state() {
    let machine = DeviceStateMachine::new();
    machine.with_mutation_lock(|| async {}).await;
    assert_eq!(machine.current_state(), UpdateState::Idle);

    tokio_test::assert_ok!(machine.begin_firmware_install());
    tokio_test::assert_err!(machine.begin_firmware_install());
}
