//! # Physics Properties
//!
//! Properties that must hold for any population:
//!
//! 1. **Pair symmetry**: resolving (A, B) or (B, A) gives the same bodies
//! 2. **Coincident centers**: skipped, never NaN
//! 3. **Bounds**: after every cycle each body lies inside the arena
//! 4. **Statistics**: parallel and serial reductions agree
//! 5. **Backend independence**: the bulk backend does not change the result
//!
//! Run with: cargo test -p ricochet --test physics_properties

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use ricochet::config::PopulationConfig;
use ricochet::core::{ArenaBounds, ArenaParams, ArenaSize, Body, StateStore, StatsAggregate};
use ricochet::physics::{self, PairOutcome};
use ricochet::{
    spawn, BackendConfig, BackendSet, BulkBackendKind, ExecutionBackend, ParallelBackend,
    PhysicsPipeline, SerialBackend, StageId,
};

fn pipeline(size: ArenaSize, params: ArenaParams, backends: BackendSet) -> PhysicsPipeline {
    let bounds = Arc::new(ArenaBounds::new(size, 30.0).unwrap());
    PhysicsPipeline::new(params, bounds, backends)
}

fn random_body(rng: &mut ChaCha8Rng, size: ArenaSize) -> Body {
    let r = rng.gen_range(5.0..=15.0);
    Body::new(
        rng.gen_range(r..=size.width - r),
        rng.gen_range(r..=size.height - r),
        r,
        [200; 4],
    )
    .with_velocity(rng.gen_range(-300.0..=300.0), rng.gen_range(-300.0..=300.0))
}

// ============================================================================
// PAIRWISE PHASE
// ============================================================================

#[test]
fn pair_order_does_not_change_result() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let size = ArenaSize::new(60.0, 60.0);
    let mut overlapping = 0;

    for _ in 0..2_000 {
        let a0 = random_body(&mut rng, size);
        let b0 = random_body(&mut rng, size);

        let (mut a1, mut b1) = (a0, b0);
        let forward = physics::resolve_pair(&mut a1, &mut b1, 0.8);

        let (mut a2, mut b2) = (a0, b0);
        let backward = physics::resolve_pair(&mut b2, &mut a2, 0.8);

        assert_eq!(forward, backward);
        assert_eq!(a1, a2, "body A differs between (A,B) and (B,A)");
        assert_eq!(b1, b2, "body B differs between (A,B) and (B,A)");
        if forward == PairOutcome::Resolved {
            overlapping += 1;
        }
    }

    // A 60x60 box with radii up to 15 overlaps often.
    assert!(overlapping > 100, "only {overlapping} overlapping pairs sampled");
}

#[test]
fn head_on_pair_through_integrate_stage() {
    let size = ArenaSize::new(200.0, 200.0);
    let params = ArenaParams {
        gravity: 0.0,
        wall_dampening: 0.8,
        collision_restitution: 0.8,
        max_speed: 1_000.0,
    };
    let pipeline = pipeline(size, params, BackendSet::serial());
    let a = Body::new(40.0, 50.0, 10.0, [0; 4]).with_velocity(5.0, 0.0);
    let b = Body::new(55.0, 50.0, 10.0, [0; 4]).with_velocity(-5.0, 0.0);

    for order in [[a, b], [b, a]] {
        let mut generation = ricochet::core::Generation::from_bodies(order.to_vec()).unwrap();
        let (walls, counts) = pipeline.integrate(&mut generation, size, 0.0).unwrap();

        assert_eq!(walls, 0);
        assert_eq!(counts.resolved, 1);
        let (left, right) = if generation[0].x < generation[1].x {
            (generation[0], generation[1])
        } else {
            (generation[1], generation[0])
        };
        // j = (1 + 0.8) * 10 / (1/100 + 1/100) = 900; Δv = j / m = 9
        assert!((left.vx + 4.0).abs() < 1e-4);
        assert!((right.vx - 4.0).abs() < 1e-4);
        assert!((left.x - 37.5).abs() < 1e-4);
        assert!((right.x - 57.5).abs() < 1e-4);
        assert!(left.vy.abs() < 1e-4 && right.vy.abs() < 1e-4);
    }
}

#[test]
fn approaching_pair_conserves_momentum() {
    let mut a = Body::new(100.0, 100.0, 10.0, [0; 4]).with_velocity(30.0, 5.0);
    let mut b = Body::new(112.0, 106.0, 14.0, [0; 4]).with_velocity(-20.0, -10.0);
    let before = (
        a.mass() * a.vx + b.mass() * b.vx,
        a.mass() * a.vy + b.mass() * b.vy,
    );

    assert_eq!(physics::resolve_pair(&mut a, &mut b, 0.8), PairOutcome::Resolved);

    let after = (
        a.mass() * a.vx + b.mass() * b.vx,
        a.mass() * a.vy + b.mass() * b.vy,
    );
    assert!((before.0 - after.0).abs() < 1e-2);
    assert!((before.1 - after.1).abs() < 1e-2);
}

#[test]
fn coincident_bodies_stay_finite_through_cycles() {
    let size = ArenaSize::new(200.0, 200.0);
    let bodies = vec![
        Body::new(100.0, 100.0, 10.0, [0; 4]),
        Body::new(100.0, 100.0, 10.0, [0; 4]),
        Body::new(100.0, 100.0, 12.0, [0; 4]),
    ];
    let store = StateStore::new(bodies).unwrap();
    let mut params = ArenaParams::default();
    params.gravity = 0.0;
    let pipeline = pipeline(size, params, BackendSet::serial());

    let report = pipeline.run_cycle(&store, 1.0 / 60.0).unwrap();
    store.swap().unwrap();

    assert_eq!(report.coincident_pairs, 3);
    assert_eq!(report.collisions, 0);
    assert!(store.acquire_read().iter().all(Body::is_finite));

    for _ in 0..10 {
        pipeline.run_cycle(&store, 1.0 / 60.0).unwrap();
        store.swap().unwrap();
    }
    assert!(store.acquire_read().iter().all(Body::is_finite));
}

// ============================================================================
// BOUNDS
// ============================================================================

#[test]
fn bodies_stay_in_bounds() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xB0B0);

    for trial in 0..8 {
        let size = ArenaSize::new(rng.gen_range(60.0..=400.0), rng.gen_range(60.0..=400.0));
        let count = rng.gen_range(2..=80);
        let bodies: Vec<Body> = (0..count).map(|_| random_body(&mut rng, size)).collect();
        let store = StateStore::new(bodies).unwrap();
        let params = ArenaParams {
            gravity: rng.gen_range(-800.0..=800.0),
            wall_dampening: rng.gen_range(0.1..=1.0),
            collision_restitution: rng.gen_range(0.1..=1.0),
            max_speed: 1_000.0,
        };
        let pipeline = pipeline(size, params, BackendSet::serial());

        for cycle in 0..300 {
            pipeline.run_cycle(&store, 1.0 / 60.0).unwrap();
            store.swap().unwrap();

            let read = store.acquire_read();
            for (i, body) in read.iter().enumerate() {
                assert!(
                    size.contains(body),
                    "trial {trial} cycle {cycle}: body {i} at ({}, {}) r={} outside {size:?}",
                    body.x,
                    body.y,
                    body.radius()
                );
            }
        }
    }
}

#[test]
fn shrinking_arena_pulls_bodies_inside() {
    let size = ArenaSize::new(800.0, 600.0);
    let population = PopulationConfig {
        count: 50,
        ..PopulationConfig::default()
    };
    let store = StateStore::new(spawn::populate(&population, size)).unwrap();
    let pipeline = pipeline(size, ArenaParams::default(), BackendSet::serial());

    pipeline.run_cycle(&store, 1.0 / 60.0).unwrap();
    store.swap().unwrap();

    pipeline.bounds().resize(200.0, 150.0).unwrap();
    pipeline.run_cycle(&store, 1.0 / 60.0).unwrap();
    store.swap().unwrap();

    let small = pipeline.bounds().size();
    assert!(store.acquire_read().iter().all(|b| small.contains(b)));
}

// ============================================================================
// STATISTICS
// ============================================================================

#[test]
fn parallel_and_serial_statistics_agree() {
    let size = ArenaSize::new(1_000.0, 1_000.0);
    let population = PopulationConfig {
        count: 20_000,
        ..PopulationConfig::default()
    };
    let bodies = spawn::populate(&population, size);
    let params = ArenaParams::default();
    let kernel = |_: usize, body: &Body| physics::sample_body(body, &params, size);

    let serial = SerialBackend::validating()
        .run_reduction(StageId::Statistics, &bodies, &kernel)
        .unwrap();
    let parallel = ParallelBackend::new(4)
        .unwrap()
        .run_reduction(StageId::Statistics, &bodies, &kernel)
        .unwrap();

    assert_eq!(serial.count, 20_000);
    assert!(
        serial.approx_eq(&parallel, 1e-4),
        "serial {serial:?} vs parallel {parallel:?}"
    );

    for body in &bodies {
        assert!(serial.max_speed >= f64::from(body.speed()));
    }
}

#[test]
fn published_statistics_describe_published_generation() {
    let size = ArenaSize::new(800.0, 600.0);
    let store = StateStore::new(spawn::populate(&PopulationConfig::default(), size)).unwrap();
    let params = ArenaParams::default();
    let pipeline = pipeline(size, params, BackendSet::serial());

    for _ in 0..20 {
        pipeline.run_cycle(&store, 1.0 / 60.0).unwrap();
        store.swap().unwrap();
    }

    let read = store.acquire_read();
    let recomputed: StatsAggregate = read
        .iter()
        .map(|b| physics::sample_body(b, &params, size))
        .sum();
    assert_eq!(read.meta().cycle, 20);
    assert!(read.meta().stats.approx_eq(&recomputed, 1e-9));
}

// ============================================================================
// BACKEND INDEPENDENCE
// ============================================================================

#[test]
fn bulk_backend_does_not_change_result() {
    let size = ArenaSize::new(400.0, 300.0);
    let population = PopulationConfig {
        count: 120,
        seed: 99,
        ..PopulationConfig::default()
    };

    let run = |bulk: BulkBackendKind| {
        let backends = BackendSet::from_config(&BackendConfig { bulk, threads: 3 }).unwrap();
        let store = StateStore::new(spawn::populate(&population, size)).unwrap();
        let pipeline = pipeline(size, ArenaParams::default(), backends);
        for _ in 0..60 {
            pipeline.run_cycle(&store, 1.0 / 60.0).unwrap();
            store.swap().unwrap();
        }
        let read = store.acquire_read();
        (read.bodies().to_vec(), *read.meta())
    };

    let (serial_bodies, serial_meta) = run(BulkBackendKind::Serial);
    let (parallel_bodies, parallel_meta) = run(BulkBackendKind::Parallel);

    assert_eq!(serial_bodies, parallel_bodies);
    assert_eq!(serial_meta, parallel_meta);
}

#[test]
fn same_seed_same_trajectory() {
    let size = ArenaSize::new(800.0, 600.0);
    let run = || {
        let store = StateStore::new(spawn::populate(&PopulationConfig::default(), size)).unwrap();
        let pipeline = pipeline(size, ArenaParams::default(), BackendSet::serial());
        for _ in 0..30 {
            pipeline.run_cycle(&store, 1.0 / 60.0).unwrap();
            store.swap().unwrap();
        }
        let bodies = store.acquire_read().bodies().to_vec();
        bodies
    };

    assert_eq!(run(), run());
}
