use approx::assert_abs_diff_eq;
use particle_collision::{
    core::collider::ColliderShape, Collider, CollisionWorld, Transform, Vec3, Velocity,
};

/// A unit box lowered onto a static floor, one small step at a time.
#[test]
fn box_sinking_into_floor() {
    let mut world = CollisionWorld::default();
    world.set_multithreaded(false);

    let floor = world
        .add_static_collider(
            Collider::builder()
                .shape(ColliderShape::cuboid(Vec3::new(10.0, 0.5, 10.0)).expect("valid box"))
                .position(Vec3::new(0.0, -0.5, 0.0))
                .build(),
        )
        .expect("add floor");

    let start = 0.51;
    let drop = 0.005;
    let cube = world
        .add_collider(
            Collider::builder()
                .shape(ColliderShape::cuboid(Vec3::splat(0.5)).expect("valid box"))
                .position(Vec3::new(0.0, start, 0.0))
                .build(),
        )
        .expect("add cube");
    world
        .set_velocity(cube, Velocity::linear(Vec3::new(0.0, -drop * 60.0, 0.0)))
        .expect("known id");

    // Still hovering: the expanded boxes overlap but the shapes do not.
    assert!(world.step(1.0 / 60.0).is_empty());
    assert_eq!(world.tree().potential_pairs().len(), 1);

    let mut previous = 0.0f32;
    let mut touching_steps = 0;
    for k in 1..=12 {
        let y = start - drop * k as f32;
        world
            .set_pose(cube, Transform::from_position(Vec3::new(0.0, y, 0.0)))
            .expect("known id");

        let contacts = world.step(1.0 / 60.0);
        let expected = 0.5 - y;
        if expected <= 1e-3 {
            continue;
        }

        assert_eq!(contacts.len(), 1, "step {k}");
        touching_steps += 1;
        let pair = &contacts[0];
        // Normal points from the second collider toward the first.
        let up = if pair.a == cube {
            assert_eq!(pair.b, floor);
            pair.contact.normal
        } else {
            assert_eq!(pair.a, floor);
            -pair.contact.normal
        };
        assert!(up.dot(Vec3::Y) > 0.99, "step {k}: normal {up:?}");
        assert_abs_diff_eq!(pair.contact.penetration, expected, epsilon = 2e-3);
        assert!(pair.contact.penetration > previous, "step {k}");
        previous = pair.contact.penetration;

        let manifold = pair.manifold.expect("manifold built");
        assert!(manifold.len() >= 4);
    }

    assert!(touching_steps >= 9);
    assert_eq!(world.tree().potential_pairs().len(), 1);
}
