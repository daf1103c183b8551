use approx::assert_abs_diff_eq;
use particle_collision::{
    core::{collider::ColliderShape, types::Transform},
    DepthRefinement, NarrowPhase, Quat, Vec3,
};

const R1: f32 = 1.0;
const R2: f32 = 0.5;

fn directions() -> Vec<Vec3> {
    vec![
        Vec3::X,
        Vec3::new(0.0, -1.0, 0.0),
        Vec3::new(1.0, 2.0, 3.0).normalize(),
        Vec3::new(-0.3, 0.4, -0.866).normalize(),
    ]
}

#[test]
fn spheres_agree_with_analytic_results() {
    let a = ColliderShape::sphere(R1).expect("valid sphere");
    let b = ColliderShape::sphere(R2).expect("valid sphere");
    let mut narrow = NarrowPhase::new();

    for dir in directions() {
        for d in [0.5f32, 1.0, 1.4, 1.6, 2.0, 3.0] {
            let center_a = Vec3::new(0.3, -0.2, 1.0);
            let ta = Transform::from_position(center_a);
            let tb = Transform::from_position(center_a + dir * d);

            let overlapping = d < R1 + R2;
            assert_eq!(NarrowPhase::overlap(&a, &ta, &b, &tb), overlapping, "d = {d}");

            if overlapping {
                let contact = narrow.mpr_epa(&a, &ta, &b, &tb).expect("contact");
                assert_abs_diff_eq!(contact.penetration, R1 + R2 - d, epsilon = 1e-3);
                // From B's center toward A's center.
                assert!(contact.normal.dot(-dir) > 0.999, "normal {:?}", contact.normal);
                assert!(NarrowPhase::distance(&a, &ta, &b, &tb).is_none());
            } else {
                assert!(narrow.mpr_epa(&a, &ta, &b, &tb).is_none());
                let closest = NarrowPhase::distance(&a, &ta, &b, &tb).expect("separated");
                assert_abs_diff_eq!(closest.distance, d - (R1 + R2), epsilon = 1e-3);
                assert!(closest.normal.dot(-dir) > 0.999);
                assert_abs_diff_eq!((closest.point_a - center_a).length(), R1, epsilon = 1e-3);
            }
        }
    }
}

#[test]
fn results_follow_rigid_motion_of_both_shapes() {
    let a = ColliderShape::capsule(0.4, 1.0).expect("valid capsule");
    let b = ColliderShape::sphere(0.6).expect("valid sphere");
    let mut narrow = NarrowPhase::new();

    let ta = Transform::new(Vec3::ZERO, Quat::from_rotation_z(0.3));
    // Shallow enough that MPR's estimate is kept.
    let tb = Transform::from_position(Vec3::new(0.85, 0.5, 0.24));
    let base = narrow.mpr_epa(&a, &ta, &b, &tb).expect("overlap");

    let shift = Vec3::new(10.0, -4.0, 2.5);
    let moved = narrow
        .mpr_epa(
            &a,
            &Transform::new(ta.position + shift, ta.rotation),
            &b,
            &Transform::new(tb.position + shift, tb.rotation),
        )
        .expect("overlap");
    assert!((moved.point_a - (base.point_a + shift)).length() < 1e-3);
    assert!((moved.point_b - (base.point_b + shift)).length() < 1e-3);
    assert!((moved.normal - base.normal).length() < 1e-3);
    assert_abs_diff_eq!(moved.penetration, base.penetration, epsilon = 1e-4);

    let rotation = Quat::from_axis_angle(Vec3::new(1.0, 1.0, 0.0).normalize(), 1.1);
    let rotated = narrow
        .mpr_epa(
            &a,
            &Transform::new(rotation * ta.position, rotation * ta.rotation),
            &b,
            &Transform::new(rotation * tb.position, rotation * tb.rotation),
        )
        .expect("overlap");
    assert!((rotated.normal - rotation * base.normal).length() < 1e-3);
    assert!((rotated.point_a - rotation * base.point_a).length() < 1e-3);
    assert!((rotated.point_b - rotation * base.point_b).length() < 1e-3);
}

#[test]
fn touching_boxes_do_not_overlap() {
    let shape = ColliderShape::cuboid(Vec3::splat(0.5)).expect("valid box");
    let ta = Transform::default();
    let tb = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));

    assert!(!NarrowPhase::overlap(&shape, &ta, &shape, &tb));
    // Touching faces have no positive separation to report.
    assert!(NarrowPhase::distance(&shape, &ta, &shape, &tb).is_none());

    let apart = Transform::from_position(Vec3::new(1.001, 0.0, 0.0));
    let gap = NarrowPhase::distance(&shape, &ta, &shape, &apart).expect("separated boxes");
    assert_abs_diff_eq!(gap.distance, 0.001, epsilon = 1e-4);
    assert!(gap.normal.x < -0.99);
}

#[test]
fn deep_box_overlap_is_refined_by_epa() {
    let shape = ColliderShape::cuboid(Vec3::splat(0.5)).expect("valid box");
    let mut narrow = NarrowPhase::new();
    let contact = narrow
        .mpr_epa(
            &shape,
            &Transform::default(),
            &shape,
            &Transform::from_position(Vec3::new(0.0, 0.7, 0.0)),
        )
        .expect("overlap");
    assert_ne!(contact.refinement, DepthRefinement::Mpr);
    assert_abs_diff_eq!(contact.penetration, 0.3, epsilon = 1e-2);
    assert!(contact.normal.dot(-Vec3::Y) > 0.99);

    // Below the threshold MPR's estimate stands.
    let shallow = narrow
        .mpr_epa(
            &shape,
            &Transform::default(),
            &shape,
            &Transform::from_position(Vec3::new(0.0, 0.99, 0.0)),
        )
        .expect("overlap");
    assert_eq!(shallow.refinement, DepthRefinement::Mpr);
    assert!(shallow.penetration > 0.0 && shallow.penetration <= 0.02);
}

#[test]
fn ray_parallel_to_triangle_misses() {
    let triangle = ColliderShape::triangle(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(1.0, 0.0, -1.0),
        Vec3::new(0.0, 0.0, 1.0),
    )
    .expect("valid triangle");

    let hit = NarrowPhase::ray_cast(
        &triangle,
        &Transform::default(),
        Vec3::new(-5.0, 1.0, 0.0),
        Vec3::X,
    );
    assert!(hit.is_none());

    let down = NarrowPhase::ray_cast(
        &triangle,
        &Transform::default(),
        Vec3::new(0.0, 2.0, 0.0),
        -Vec3::Y,
    )
    .expect("hits the face");
    assert_abs_diff_eq!(down.lambda, 2.0, epsilon = 1e-3);
}

#[test]
fn degenerate_hull_terminates() {
    // All vertices on one segment: zero volume.
    let needle = ColliderShape::convex_hull(vec![
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
    ])
    .expect("valid hull");
    let block = ColliderShape::cuboid(Vec3::splat(0.5)).expect("valid box");
    let mut narrow = NarrowPhase::new();

    let ta = Transform::default();
    let tb = Transform::from_position(Vec3::new(0.3, 0.2, 0.0));

    assert!(NarrowPhase::overlap(&needle, &ta, &block, &tb));
    assert!(NarrowPhase::distance(&needle, &ta, &block, &tb).is_none());

    // The needle sits 0.3 inside the bottom face of the block.
    let contact = narrow.mpr_epa(&needle, &ta, &block, &tb).expect("overlap");
    assert_abs_diff_eq!(contact.penetration, 0.3, epsilon = 1e-2);
    assert!(contact.normal.dot(-Vec3::Y) > 0.99);
    assert_eq!(contact.refinement, DepthRefinement::Epa);

    let contact = narrow.collision(&needle, &ta, &block, &tb).expect("overlap");
    assert_abs_diff_eq!(contact.penetration, 0.3, epsilon = 1e-2);
    assert!(contact.normal.dot(-Vec3::Y) > 0.99);

    assert!(NarrowPhase::point_test(&needle, &ta, Vec3::ZERO));
    assert!(NarrowPhase::point_test(&needle, &ta, Vec3::new(0.5, 0.0, 0.0)));
    assert!(!NarrowPhase::point_test(&needle, &ta, Vec3::new(0.0, 0.1, 0.0)));
}

#[test]
fn local_and_world_variants_agree() {
    let a = ColliderShape::cuboid(Vec3::new(0.5, 0.4, 0.3)).expect("valid box");
    let b = ColliderShape::cuboid(Vec3::new(0.3, 0.3, 0.6)).expect("valid box");
    let mut narrow = NarrowPhase::new();

    let ta = Transform::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_x(0.4));
    let tb = Transform::new(Vec3::new(1.3, 2.5, 3.1), Quat::from_rotation_y(-0.7));
    let relative = ta.relative(&tb);

    let world = narrow.collision(&a, &ta, &b, &tb).expect("world result");
    let local = narrow
        .collision_local(&a, &b, relative.rotation, relative.position)
        .expect("local result");

    assert_abs_diff_eq!(world.penetration, local.penetration, epsilon = 1e-4);
    assert!((world.normal - ta.rotation * local.normal).length() < 1e-4);
    assert!((world.point_a - ta.transform_point(local.point_a)).length() < 1e-4);
}
