//! Property tests for breaker thresholds and fleet totals.

use std::time::Duration;

use fleetscope_resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryPolicy};
use fleetscope_types::{
    ContainerSnapshot, ContainerStatus, FleetTotals, HostId, HostSnapshot, NodeSnapshot,
    NodeStatus,
};
use proptest::prelude::*;

fn breaker(threshold: u32) -> CircuitBreaker {
    CircuitBreaker::new(
        "host:prop",
        CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_threshold: 1,
            open_timeout: Duration::from_secs(3600),
        },
    )
}

/// (failed, node count, running containers, stopped containers)
fn host_strategy() -> impl Strategy<Value = (bool, usize, usize, usize)> {
    (any::<bool>(), 0usize..4, 0usize..6, 0usize..6)
}

fn build_host(index: usize, shape: (bool, usize, usize, usize)) -> HostSnapshot {
    let (failed, nodes, running, stopped) = shape;
    let id = HostId::new(format!("h{index}"));
    if failed {
        return HostSnapshot::failed(id, "unreachable");
    }

    let nodes = (0..nodes)
        .map(|n| {
            let mut node = NodeSnapshot::listed(format!("n{n}"), NodeStatus::Online);
            node.memory_total = Some(100);
            node
        })
        .collect();
    let containers = (0..running + stopped)
        .map(|i| {
            let status = if i < running {
                ContainerStatus::Running
            } else {
                ContainerStatus::Stopped
            };
            ContainerSnapshot::listed(i as u32, "ct", "n0", status)
        })
        .collect();
    HostSnapshot::success(id, nodes, containers)
}

proptest! {
    #[test]
    fn breaker_opens_at_threshold(threshold in 1u32..20, extra in 0u32..5) {
        let cb = breaker(threshold);

        for i in 0..threshold - 1 {
            prop_assert!(cb.try_acquire().is_ok());
            cb.record_failure();
            prop_assert_eq!(cb.state(), CircuitState::Closed, "opened early at {}", i + 1);
        }

        prop_assert!(cb.try_acquire().is_ok());
        cb.record_failure();
        prop_assert_eq!(cb.state(), CircuitState::Open);

        for _ in 0..extra {
            prop_assert!(cb.try_acquire().is_err());
        }
    }

    #[test]
    fn success_resets_consecutive_failures(threshold in 2u32..20, failures in 1u32..19) {
        let failures = failures.min(threshold - 1);
        let cb = breaker(threshold);

        for _ in 0..failures {
            cb.record_failure();
        }
        cb.record_success();
        for _ in 0..threshold - 1 {
            cb.record_failure();
        }

        prop_assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn retry_delay_is_bounded_and_monotonic(
        base_ms in 1u64..2_000,
        multiplier in 1.0f64..4.0,
        max_ms in 1u64..60_000,
        attempt in 1u32..30,
    ) {
        let policy = RetryPolicy::new(10, Duration::from_millis(base_ms), multiplier)
            .with_max_delay(Duration::from_millis(max_ms));

        let delay = policy.delay_for(attempt);
        prop_assert!(delay <= Duration::from_millis(max_ms));
        prop_assert!(policy.delay_for(attempt + 1) >= delay);
    }

    #[test]
    fn totals_count_only_healthy_hosts(shapes in prop::collection::vec(host_strategy(), 0..10)) {
        let hosts: Vec<_> = shapes
            .iter()
            .enumerate()
            .map(|(i, shape)| build_host(i, *shape))
            .collect();
        let totals = FleetTotals::from_hosts(&hosts);

        let healthy = shapes.iter().filter(|(failed, ..)| !failed);
        let nodes: usize = healthy.clone().map(|(_, n, _, _)| n).sum();
        let running: usize = healthy.clone().map(|(_, _, r, _)| r).sum();
        let containers: usize = healthy.map(|(_, _, r, s)| r + s).sum();

        prop_assert_eq!(totals.hosts_total, shapes.len());
        prop_assert_eq!(
            totals.hosts_failed,
            shapes.iter().filter(|(failed, ..)| *failed).count()
        );
        prop_assert_eq!(totals.nodes_total, nodes);
        prop_assert_eq!(totals.nodes_online, nodes);
        prop_assert_eq!(totals.containers_total, containers);
        prop_assert_eq!(totals.containers_running, running);
        prop_assert_eq!(totals.memory_total, 100 * nodes as u64);
    }
}
