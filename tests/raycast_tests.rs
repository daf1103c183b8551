use approx::assert_abs_diff_eq;
use particle_collision::{
    core::collider::ColliderShape, Collider, CollisionWorld, ProxyId, Quat, RaycastQuery, Vec3,
};

fn sphere_at(world: &mut CollisionWorld, position: Vec3, layer: u32) -> ProxyId {
    world
        .add_static_collider(
            Collider::builder()
                .shape(ColliderShape::sphere(0.5).expect("valid sphere"))
                .position(position)
                .filter(layer, u32::MAX)
                .build(),
        )
        .expect("add sphere")
}

#[test]
fn ray_reports_nearest_collider() {
    let mut world = CollisionWorld::default();
    let far = sphere_at(&mut world, Vec3::new(0.0, 0.0, 10.0), 1);
    let near = sphere_at(&mut world, Vec3::new(0.0, 0.0, 5.0), 1);
    sphere_at(&mut world, Vec3::new(3.0, 0.0, 2.0), 1);

    let hit = world
        .raycast(&RaycastQuery::new(Vec3::ZERO, Vec3::Z))
        .expect("ray hits near sphere");
    assert_eq!(hit.collider, near);
    assert_ne!(hit.collider, far);
    assert_abs_diff_eq!(hit.lambda, 4.5, epsilon = 1e-3);
    assert!((hit.point - Vec3::new(0.0, 0.0, 4.5)).length() < 1e-3);
    assert!(hit.normal.dot(-Vec3::Z) > 0.999);
}

#[test]
fn lambda_is_measured_in_direction_units() {
    let mut world = CollisionWorld::default();
    sphere_at(&mut world, Vec3::new(0.0, 0.0, 5.0), 1);

    let hit = world
        .raycast(&RaycastQuery::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0)))
        .expect("hit");
    assert_abs_diff_eq!(hit.lambda, 2.25, epsilon = 1e-3);
    assert_abs_diff_eq!(hit.point.z, 4.5, epsilon = 1e-3);
}

#[test]
fn max_lambda_bounds_the_ray() {
    let mut world = CollisionWorld::default();
    let near = sphere_at(&mut world, Vec3::new(0.0, 0.0, 5.0), 1);

    let short = RaycastQuery::new(Vec3::ZERO, Vec3::Z).with_max_lambda(4.0);
    assert!(world.raycast(&short).is_none());

    let long = RaycastQuery::new(Vec3::ZERO, Vec3::Z).with_max_lambda(5.0);
    assert_eq!(world.raycast(&long).map(|hit| hit.collider), Some(near));
}

#[test]
fn filter_skips_rejected_colliders() {
    let mut world = CollisionWorld::default();
    let _near = sphere_at(&mut world, Vec3::new(0.0, 0.0, 5.0), 0b10);
    let far = sphere_at(&mut world, Vec3::new(0.0, 0.0, 10.0), 0b01);

    let query = RaycastQuery::new(Vec3::ZERO, Vec3::Z);
    let hit = world
        .raycast_with_filter(&query, |_, collider| collider.collision_filter.layer & 0b01 != 0)
        .expect("far sphere passes the filter");
    assert_eq!(hit.collider, far);
    assert_abs_diff_eq!(hit.lambda, 9.5, epsilon = 1e-3);

    assert!(world.raycast_with_filter(&query, |_, _| false).is_none());
}

#[test]
fn rotated_box_is_hit_on_its_edge() {
    let mut world = CollisionWorld::default();
    let id = world
        .add_static_collider(
            Collider::builder()
                .shape(ColliderShape::cuboid(Vec3::ONE).expect("valid box"))
                .position(Vec3::new(0.0, 0.0, 5.0))
                .rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_4))
                .build(),
        )
        .expect("add box");

    let hit = world
        .raycast(&RaycastQuery::new(Vec3::new(0.0, 0.3, 0.0), Vec3::Z))
        .expect("ray hits box");
    assert_eq!(hit.collider, id);
    assert_abs_diff_eq!(hit.lambda, 5.0 - std::f32::consts::SQRT_2, epsilon = 2e-3);

    // Passes beside the box.
    assert!(world
        .raycast(&RaycastQuery::new(Vec3::new(1.5, 0.0, 0.0), Vec3::Z))
        .is_none());
}

#[test]
fn ray_starting_inside_hits_at_zero() {
    let mut world = CollisionWorld::default();
    let id = sphere_at(&mut world, Vec3::ZERO, 1);

    let hit = world
        .raycast(&RaycastQuery::new(Vec3::new(0.1, 0.0, 0.0), Vec3::X))
        .expect("inside origin hits");
    assert_eq!(hit.collider, id);
    assert_eq!(hit.lambda, 0.0);
}
