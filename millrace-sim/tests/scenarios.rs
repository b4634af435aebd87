//! End-to-end scenarios for the simulation engine.

use std::time::Duration;

use millrace_core::{QueueId, Route, SimulationConfig, StationId, TimeRange};
use millrace_sim::Simulation;

fn run(config: SimulationConfig) -> (Simulation, millrace_core::SimulationStats) {
    let mut sim = Simulation::new(config).unwrap();
    let stats = sim.run().unwrap();
    (sim, stats)
}

#[test]
fn test_default_scenario() {
    // Base system: arrivals every 7-13 s, 2 s primary, 16-20 s final,
    // 3 s channel, even split, 400 requests, unbounded intake.
    let (_, stats) = run(SimulationConfig::default());

    assert_eq!(stats.generated, 400);
    assert_eq!(stats.processed + stats.lost, 400);
    assert_eq!(stats.lost, 0);
    assert_eq!(stats.loss_probability, 0.0);

    // Even split within sampling noise.
    assert!(
        (35.0..=65.0).contains(&stats.routes.local_percent),
        "local share {} outside sampling-noise band",
        stats.routes.local_percent
    );
    assert_eq!(stats.routes.local + stats.routes.remote, stats.processed);

    // Every station worked and none was saturated the whole run.
    for id in StationId::ALL {
        let station = &stats.stations[&id];
        assert!(
            station.utilization > 0.0 && station.utilization < 1.0,
            "{id} utilization {} out of (0, 1)",
            station.utilization
        );
        assert!(station.processed > 0, "{id} processed nothing");
    }

    // A request cannot finish faster than one primary plus one final pass.
    assert!(stats.sojourn.min >= Duration::from_secs(18));
    assert_eq!(stats.sojourn.count, stats.processed);
    assert!(stats.total_time > Duration::ZERO);
}

#[test]
fn test_forced_local_route_never_touches_second_stage() {
    let config = SimulationConfig {
        p_local: 1.0,
        ..Default::default()
    };
    let (sim, stats) = run(config);

    assert_eq!(stats.processed, 400);
    assert_eq!(stats.routes.local, 400);
    assert_eq!(stats.routes.remote, 0);
    assert_eq!(stats.routes.local_percent, 100.0);

    for id in [
        StationId::Channel,
        StationId::SecondPrimary,
        StationId::SecondFinal,
    ] {
        let station = &stats.stations[&id];
        assert_eq!(station.processed, 0, "{id} saw admissions on a local-only run");
        assert_eq!(station.utilization, 0.0);
    }

    assert_eq!(stats.queues[&QueueId::Q3].max_len, 0);
    assert_eq!(stats.queues[&QueueId::Channel].wait.count, 0);

    assert!(
        sim.finished_requests()
            .iter()
            .all(|request| request.route() == Some(Route::Local))
    );
}

#[test]
fn test_forced_remote_route() {
    let config = SimulationConfig {
        p_local: 0.0,
        ..Default::default()
    };
    let (sim, stats) = run(config);

    assert_eq!(stats.routes.local, 0);
    assert_eq!(stats.routes.remote, 400);
    assert_eq!(stats.routes.local_percent, 0.0);

    // Primary, channel, second primary, second final: 2 + 3 + 2 + 16.
    assert!(stats.sojourn.min >= Duration::from_secs(23));

    assert!(
        sim.finished_requests()
            .iter()
            .all(|request| request.route() == Some(Route::Remote))
    );
}

#[test]
fn test_accounting_identity_across_seeds() {
    for seed in 1..=5 {
        let config = SimulationConfig {
            seed,
            total_requests: 100,
            ..Default::default()
        };
        let (_, stats) = run(config);

        assert_eq!(stats.generated, 100, "seed {seed}");
        assert_eq!(stats.processed + stats.lost, stats.generated, "seed {seed}");
    }
}

#[test]
fn test_same_seed_reproduces_identical_statistics() {
    let config = SimulationConfig {
        seed: 12345,
        ..Default::default()
    };

    let (_, first) = run(config.clone());
    let (_, second) = run(config);

    assert_eq!(first, second);
}

#[test]
fn test_different_seeds_diverge() {
    let (_, first) = run(SimulationConfig {
        seed: 1,
        ..Default::default()
    });
    let (_, second) = run(SimulationConfig {
        seed: 2,
        ..Default::default()
    });

    assert_ne!(first.sojourn.mean, second.sojourn.mean);
}

#[test]
fn test_statistics_snapshot_is_idempotent() {
    let config = SimulationConfig {
        total_requests: 50,
        ..Default::default()
    };
    let mut sim = Simulation::new(config).unwrap();
    let from_run = sim.run().unwrap();

    let first = sim.statistics();
    let second = sim.statistics();

    assert_eq!(first, second);
    assert_eq!(first, from_run);
}

#[test]
fn test_bounded_intake_under_burst_counts_losses() {
    let config = SimulationConfig {
        interarrival: TimeRange::from_secs(0, 0),
        q1_capacity: Some(1),
        total_requests: 50,
        seed: 7,
        ..Default::default()
    };
    let (_, stats) = run(config);

    assert!(stats.lost > 0);
    assert_eq!(stats.processed + stats.lost, 50);

    let expected = stats.lost as f64 / (stats.processed + stats.lost) as f64;
    assert_eq!(stats.loss_probability, expected);

    // The bound was never breached.
    assert!(stats.queues[&QueueId::Q1].max_len <= 1);
}

#[test]
fn test_roomy_bounded_intake_loses_nothing() {
    let config = SimulationConfig {
        q1_capacity: Some(50),
        ..Default::default()
    };
    let (_, stats) = run(config);

    assert_eq!(stats.lost, 0);
    assert_eq!(stats.processed, 400);
}

#[test]
fn test_improved_pool_shortens_first_final_queue() {
    // All-local traffic saturates the single first-final server; the
    // two-server configuration keeps the queue visibly shorter.
    let base_config = SimulationConfig {
        p_local: 1.0,
        ..Default::default()
    };
    let improved_config = SimulationConfig {
        improved: true,
        ..base_config.clone()
    };

    let (_, base) = run(base_config);
    let (_, improved) = run(improved_config);

    assert_eq!(improved.processed, 400);
    assert!(
        improved.queues[&QueueId::Q2].max_len < base.queues[&QueueId::Q2].max_len,
        "two servers should shorten the final-processing queue ({} vs {})",
        improved.queues[&QueueId::Q2].max_len,
        base.queues[&QueueId::Q2].max_len
    );
    assert!(improved.sojourn.mean < base.sojourn.mean);
}

#[test]
fn test_snapshot_serializes_for_external_reporting() {
    let config = SimulationConfig {
        total_requests: 25,
        ..Default::default()
    };
    let (_, stats) = run(config);

    let value = serde_json::to_value(&stats).unwrap();

    assert!(value["queues"]["q1"]["max_len"].is_u64());
    assert!(value["queues"]["second-final"]["wait"]["count"].is_u64());
    assert!(value["stations"]["first-primary"]["utilization"].is_f64());
    assert!(value["routes"]["local_percent"].is_f64());
    assert!(value["sojourn"]["mean"]["secs"].is_u64());
    assert_eq!(value["generated"], 25);
}
