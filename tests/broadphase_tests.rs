use std::collections::HashSet;

use particle_collision::{
    collision::broadphase::{DynamicTree, NULL_NODE},
    config::TreeSettings,
    core::collider::{Collider, ColliderShape},
    utils::{allocator::ProxyId, math::XorShift64},
    CollisionError, Vec3,
};

fn random_point(rng: &mut XorShift64, extent: f32) -> Vec3 {
    Vec3::new(
        (rng.next_f64() as f32 - 0.5) * extent,
        (rng.next_f64() as f32 - 0.5) * extent,
        (rng.next_f64() as f32 - 0.5) * extent,
    )
}

fn random_collider(rng: &mut XorShift64) -> Collider {
    let shape = if rng.next_index(2) == 0 {
        ColliderShape::sphere(0.3 + rng.next_f64() as f32).expect("valid sphere")
    } else {
        ColliderShape::cuboid(Vec3::splat(0.2 + rng.next_f64() as f32)).expect("valid box")
    };
    Collider::builder()
        .shape(shape)
        .position(random_point(rng, 20.0))
        .build()
}

fn ordered(a: ProxyId, b: ProxyId) -> (ProxyId, ProxyId) {
    if (a.index(), a.generation()) < (b.index(), b.generation()) {
        (a, b)
    } else {
        (b, a)
    }
}

fn brute_force_pairs(tree: &DynamicTree<Collider>) -> HashSet<(ProxyId, ProxyId)> {
    let all: Vec<_> = tree.iter().collect();
    let mut pairs = HashSet::new();
    for (i, (id_a, a)) in all.iter().enumerate() {
        for (id_b, b) in &all[i + 1..] {
            if a.world_box().intersects(&b.world_box()) {
                pairs.insert(ordered(*id_a, *id_b));
            }
        }
    }
    pairs
}

fn tree_pairs(tree: &DynamicTree<Collider>) -> HashSet<(ProxyId, ProxyId)> {
    tree.overlapping_pairs()
        .into_iter()
        .map(|(a, b)| ordered(a, b))
        .collect()
}

fn assert_tree_sound(tree: &DynamicTree<Collider>) {
    for (id, collider) in tree.iter() {
        let node = tree.node_index(id).expect("registered proxy has a leaf");
        let leaf = tree.node(node).expect("leaf node");
        assert_eq!(leaf.proxy, Some(id));
        assert!(leaf.expanded_box.encompasses(&collider.world_box()));
    }

    let root = tree.root();
    if root == NULL_NODE {
        return;
    }
    let mut stack = vec![root];
    let mut leaves = 0;
    while let Some(index) = stack.pop() {
        let node = tree.node(index).expect("node");
        if node.is_leaf() {
            leaves += 1;
            continue;
        }
        let left = tree.node(node.left).expect("left child");
        let right = tree.node(node.right).expect("right child");
        assert_eq!(left.parent, index);
        assert_eq!(right.parent, index);
        assert!(node.expanded_box.encompasses(&left.expanded_box.merged(&right.expanded_box)));
        stack.push(node.left);
        stack.push(node.right);
    }
    assert_eq!(leaves, tree.len());
}

#[test]
fn random_add_move_remove_keeps_tree_sound() {
    let mut rng = XorShift64::new(1234);
    let mut tree = DynamicTree::new(TreeSettings::default());
    let mut ids = Vec::new();

    for _ in 0..200 {
        ids.push(tree.add_proxy(random_collider(&mut rng), true).expect("add"));
    }
    assert_tree_sound(&tree);
    assert_eq!(tree_pairs(&tree), brute_force_pairs(&tree));

    for step in 0..30 {
        for &id in &ids {
            if rng.next_f64() < 0.3 {
                let offset = random_point(&mut rng, 1.0);
                tree.get_mut(id).expect("live proxy").transform.position += offset;
            }
        }

        if step % 5 == 4 {
            for _ in 0..10 {
                let victim = ids.swap_remove(rng.next_index(ids.len()));
                tree.remove_proxy(victim).expect("remove");
            }
            for _ in 0..10 {
                ids.push(tree.add_proxy(random_collider(&mut rng), true).expect("add"));
            }
        }

        tree.update(false, 1.0 / 60.0);
        assert_tree_sound(&tree);
        assert_eq!(tree_pairs(&tree), brute_force_pairs(&tree), "step {step}");
    }
}

#[test]
fn multithreaded_update_matches_sequential() {
    let mut rng = XorShift64::new(99);
    let colliders: Vec<_> = (0..300).map(|_| random_collider(&mut rng)).collect();
    let offsets: Vec<_> = (0..300).map(|_| random_point(&mut rng, 2.0)).collect();

    let run = |multithreaded: bool| {
        let mut tree = DynamicTree::new(TreeSettings::default());
        let ids: Vec<_> = colliders
            .iter()
            .cloned()
            .map(|c| tree.add_proxy(c, true).expect("add"))
            .collect();
        for (id, offset) in ids.iter().zip(&offsets) {
            tree.get_mut(*id).expect("proxy").transform.position += *offset;
        }
        tree.update(multithreaded, 1.0 / 60.0);
        assert_tree_sound(&tree);
        tree_pairs(&tree)
    };

    let sequential = run(false);
    let parallel = run(true);
    assert_eq!(sequential, parallel);
}

#[test]
fn removed_proxy_leaves_no_pairs_behind() {
    let mut tree = DynamicTree::new(TreeSettings::default());
    let sphere = |x: f32| {
        Collider::builder()
            .shape(ColliderShape::sphere(1.0).expect("valid sphere"))
            .position(Vec3::new(x, 0.0, 0.0))
            .build()
    };
    let center = tree.add_proxy(sphere(0.0), true).expect("add");
    let left = tree.add_proxy(sphere(-1.5), true).expect("add");
    let right = tree.add_proxy(sphere(1.5), true).expect("add");

    assert_eq!(tree.overlapping_pairs().len(), 2);
    let center_node = tree.node_index(center).expect("leaf");

    tree.remove_proxy(center).expect("remove");
    tree.potential_pairs()
        .for_each(|pair| assert!(!pair.contains(center_node)));
    assert!(tree.overlapping_pairs().is_empty());

    assert!(matches!(
        tree.activate(center),
        Err(CollisionError::UnknownProxy(_))
    ));
    assert!(tree.contains(left) && tree.contains(right));
}

#[test]
fn pruning_eventually_drops_separated_pairs() {
    let mut tree = DynamicTree::new(TreeSettings::default());
    let a = tree
        .add_proxy(
            Collider::builder()
                .shape(ColliderShape::sphere(1.0).expect("valid sphere"))
                .build(),
            true,
        )
        .expect("add");
    tree.add_proxy(
        Collider::builder()
            .shape(ColliderShape::sphere(1.0).expect("valid sphere"))
            .position(Vec3::new(1.0, 0.0, 0.0))
            .build(),
        true,
    )
    .expect("add");
    assert_eq!(tree.pair_table_info().1, 1);

    tree.get_mut(a).expect("proxy").transform.position = Vec3::new(-50.0, 0.0, 0.0);
    tree.update(false, 1.0 / 60.0);
    assert!(tree.overlapping_pairs().is_empty());

    let fraction = tree.settings().pruning_fraction;
    for _ in 0..fraction {
        tree.update(false, 1.0 / 60.0);
    }
    assert_eq!(tree.pair_table_info().1, 0);
}

#[test]
fn optimize_reduces_or_keeps_cost() {
    let mut rng = XorShift64::new(7);
    let mut tree = DynamicTree::new(TreeSettings::default());
    // Sorted insertion produces a poor tree.
    for i in 0..256 {
        let collider = Collider::builder()
            .shape(ColliderShape::sphere(0.5).expect("valid sphere"))
            .position(Vec3::new(i as f32, (rng.next_f64() as f32) * 0.1, 0.0))
            .build();
        tree.add_proxy(collider, true).expect("add");
    }
    let pairs = tree_pairs(&tree);

    tree.optimize(1, 1.0, false).expect("full rebuild");
    let rebuilt = tree.calculate_cost();
    tree.optimize(20, 0.1, true).expect("incremental");

    assert!(tree.calculate_cost().is_finite());
    assert!(rebuilt > 0.0);
    assert_tree_sound(&tree);
    assert_eq!(tree_pairs(&tree), pairs);
}
