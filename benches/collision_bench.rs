use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use particle_collision::{
    core::collider::ColliderShape, Collider, CollisionWorld, DynamicTree, GJKAlgorithm,
    NarrowPhase, ProxyId, Quat, Transform, TreeSettings, Vec3, WorldSettings,
};
use std::hint::black_box;

const DT: f32 = 1.0 / 60.0;

fn grid_position(i: usize, spacing: f32) -> Vec3 {
    let side = 16;
    Vec3::new(
        (i % side) as f32 * spacing,
        ((i / side) % side) as f32 * spacing,
        (i / (side * side)) as f32 * spacing,
    )
}

fn collider(i: usize, spacing: f32) -> Collider {
    let shape = if i % 2 == 0 {
        ColliderShape::sphere(0.5)
    } else {
        ColliderShape::cuboid(Vec3::splat(0.45))
    };
    Collider::builder()
        .shape(shape.expect("valid shape"))
        .position(grid_position(i, spacing))
        .rotation(Quat::from_rotation_y(i as f32 * 0.07))
        .velocity(Vec3::new(0.0, -1.0, 0.0), Vec3::ZERO)
        .build()
}

fn prepare_world(count: usize, multithreaded: bool) -> CollisionWorld {
    let mut world = CollisionWorld::new(WorldSettings {
        multithreaded,
        ..WorldSettings::default()
    });
    for i in 0..count {
        world.add_collider(collider(i, 0.95)).expect("add collider");
    }
    world
}

fn bench_tree_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_update");
    for &count in &[512usize, 4096] {
        let mut tree = DynamicTree::new(TreeSettings::default());
        let ids: Vec<ProxyId> = (0..count)
            .map(|i| tree.add_proxy(collider(i, 1.5), true).expect("add proxy"))
            .collect();
        tree.update(false, DT);

        let mut frame = 0usize;
        group.bench_with_input(BenchmarkId::new("moving", count), &count, |b, _| {
            b.iter(|| {
                frame += 1;
                let offset = Vec3::new(0.0, (frame % 50) as f32 * 0.01, 0.0);
                for (i, &id) in ids.iter().enumerate().step_by(4) {
                    if let Some(proxy) = tree.get_mut(id) {
                        proxy.transform.position = grid_position(i, 1.5) + offset;
                    }
                }
                tree.update(black_box(false), DT);
            })
        });
    }
    group.finish();
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for &count in &[256usize, 2048] {
        for (label, multithreaded) in [("sequential", false), ("parallel", true)] {
            let mut world = prepare_world(count, multithreaded);
            group.bench_with_input(BenchmarkId::new(label, count), &count, |b, _| {
                b.iter(|| black_box(world.step(DT).len()))
            });
        }
    }
    group.finish();
}

fn bench_narrow_phase(c: &mut Criterion) {
    let sphere = ColliderShape::sphere(0.5).expect("valid sphere");
    let cube = ColliderShape::cuboid(Vec3::splat(0.5)).expect("valid box");
    let ta = Transform::default();
    let tb = Transform::new(Vec3::new(0.8, 0.3, 0.1), Quat::from_rotation_z(0.4));
    let mut narrow = NarrowPhase::new();

    c.bench_function("gjk_overlap", |b| {
        b.iter(|| NarrowPhase::overlap(black_box(&sphere), &ta, black_box(&cube), &tb))
    });
    c.bench_function("gjk_distance", |b| {
        let far = Transform::new(Vec3::new(2.5, 0.3, 0.1), Quat::from_rotation_z(0.4));
        b.iter(|| NarrowPhase::distance(black_box(&sphere), &ta, black_box(&cube), &far))
    });
    c.bench_function("mpr_epa", |b| {
        b.iter(|| narrow.mpr_epa(black_box(&cube), &ta, black_box(&cube), &tb))
    });
    c.bench_function("ray_cast", |b| {
        b.iter(|| {
            GJKAlgorithm::ray_cast(
                black_box(&cube),
                Vec3::new(-5.0, 0.1, 0.2),
                black_box(Vec3::X),
            )
        })
    });
}

criterion_group!(benches, bench_tree_update, bench_world_step, bench_narrow_phase);
criterion_main!(benches);
