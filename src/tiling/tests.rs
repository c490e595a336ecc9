//! Unit tests for the binary-tree tiling engine.

use proptest::prelude::*;

use super::*;
use crate::scene::Rect;
use crate::toplevel::ToplevelId;

const AREA: Rect = Rect {
    x: 0,
    y: 0,
    width: 1920,
    height: 1080,
};

fn t(id: u64) -> ToplevelId {
    ToplevelId(id)
}

#[test]
fn first_insert_fills_usable_area() {
    let mut tree = TilingTree::new();
    tree.insert(t(1), None, AREA, 0.5);
    tree.verify_invariants();

    assert_eq!(tree.leaf_count(), 1);
    assert_eq!(tree.leaf_rect(t(1)), Some(AREA));
}

#[test]
fn second_insert_splits_along_width() {
    let mut tree = TilingTree::new();
    tree.insert(t(1), None, AREA, 0.5);
    tree.insert(t(2), Some(t(1)), AREA, 0.5);
    tree.verify_invariants();

    // 1920 > 1080, so the root split runs along the width axis.
    assert_eq!(tree.leaf_rect(t(1)), Some(Rect::new(0, 0, 960, 1080)));
    assert_eq!(tree.leaf_rect(t(2)), Some(Rect::new(960, 0, 960, 1080)));
}

#[test]
fn removal_collapses_to_single_leaf() {
    let mut tree = TilingTree::new();
    tree.insert(t(1), None, AREA, 0.5);
    tree.insert(t(2), Some(t(1)), AREA, 0.5);

    tree.remove(t(1), 0.5);
    tree.verify_invariants();

    assert_eq!(tree.leaf_count(), 1);
    assert_eq!(tree.leaf_rect(t(2)), Some(AREA));

    tree.remove(t(2), 0.5);
    assert!(tree.is_empty());
}

#[test]
fn third_insert_splits_attachment_leaf_vertically() {
    let mut tree = TilingTree::new();
    tree.insert(t(1), None, AREA, 0.5);
    tree.insert(t(2), Some(t(1)), AREA, 0.5);
    // Attach at t(2): its 960x1080 box is taller than wide, so the new
    // split runs along the height axis.
    tree.insert(t(3), Some(t(2)), AREA, 0.5);
    tree.verify_invariants();

    assert_eq!(tree.leaf_rect(t(1)), Some(Rect::new(0, 0, 960, 1080)));
    assert_eq!(tree.leaf_rect(t(2)), Some(Rect::new(960, 0, 960, 540)));
    assert_eq!(tree.leaf_rect(t(3)), Some(Rect::new(960, 540, 960, 540)));
}

#[test]
fn tie_breaks_toward_width_split() {
    let square = Rect::new(0, 0, 800, 800);
    let mut tree = TilingTree::new();
    tree.insert(t(1), None, square, 0.5);
    tree.insert(t(2), Some(t(1)), square, 0.5);
    tree.verify_invariants();

    assert_eq!(tree.leaf_rect(t(1)), Some(Rect::new(0, 0, 400, 800)));
    assert_eq!(tree.leaf_rect(t(2)), Some(Rect::new(400, 0, 400, 800)));
}

#[test]
fn configured_ratio_applies_on_insert_and_recompute() {
    let mut tree = TilingTree::new();
    tree.insert(t(1), None, AREA, 0.6);
    tree.insert(t(2), Some(t(1)), AREA, 0.6);
    tree.verify_invariants();

    assert_eq!(tree.leaf_rect(t(1)), Some(Rect::new(0, 0, 1152, 1080)));
    assert_eq!(tree.leaf_rect(t(2)), Some(Rect::new(1152, 0, 768, 1080)));

    // Recompute with a different ratio re-derives every box.
    tree.recompute(AREA, 0.5);
    tree.verify_invariants();
    assert_eq!(tree.leaf_rect(t(1)), Some(Rect::new(0, 0, 960, 1080)));
}

#[test]
fn recompute_follows_new_usable_area() {
    let mut tree = TilingTree::new();
    tree.insert(t(1), None, AREA, 0.5);
    tree.insert(t(2), Some(t(1)), AREA, 0.5);

    let shrunk = Rect::new(0, 30, 1920, 1050);
    tree.recompute(shrunk, 0.5);
    tree.verify_invariants();

    assert_eq!(tree.leaf_rect(t(1)), Some(Rect::new(0, 30, 960, 1050)));
    assert_eq!(tree.leaf_rect(t(2)), Some(Rect::new(960, 30, 960, 1050)));
}

#[test]
fn insert_remove_round_trip_empties_tree() {
    // Insert T1..T6, then remove in a scrambled order; the tree must stay
    // structurally valid at every step and end empty.
    let mut tree = TilingTree::new();
    let mut attach = None;
    for id in 1..=6 {
        tree.insert(t(id), attach, AREA, 0.5);
        attach = Some(t(id));
        tree.verify_invariants();
        assert_eq!(tree.leaf_count(), id as usize);
    }

    for (step, id) in [4, 1, 6, 3, 5, 2].into_iter().enumerate() {
        tree.remove(t(id), 0.5);
        tree.verify_invariants();
        assert_eq!(tree.leaf_count(), 6 - step - 1);
    }
    assert!(tree.is_empty());
}

proptest! {
    // Drive the tree through an arbitrary interleaving of inserts (at an
    // arbitrary live attachment leaf) and removals; the structural
    // invariants must hold after every step and full removal must end
    // with an empty tree.
    #[test]
    fn arbitrary_insert_remove_sequences_keep_the_tree_valid(
        ops in proptest::collection::vec((any::<bool>(), 0usize..8), 1..64)
    ) {
        let mut tree = TilingTree::new();
        let mut live: Vec<u64> = Vec::new();
        let mut next = 0u64;

        for (insert, pick) in ops {
            if insert {
                next += 1;
                let attach = if live.is_empty() {
                    None
                } else {
                    Some(t(live[pick % live.len()]))
                };
                tree.insert(t(next), attach, AREA, 0.5);
                live.push(next);
            } else if !live.is_empty() {
                let victim = live.remove(pick % live.len());
                tree.remove(t(victim), 0.5);
            }
            tree.verify_invariants();
            prop_assert_eq!(tree.leaf_count(), live.len());
        }

        for id in live {
            tree.remove(t(id), 0.5);
            tree.verify_invariants();
        }
        prop_assert!(tree.is_empty());
    }
}

#[test]
fn removing_unknown_toplevel_is_a_noop() {
    let mut tree = TilingTree::new();
    tree.insert(t(1), None, AREA, 0.5);
    tree.remove(t(99), 0.5);
    tree.verify_invariants();
    assert_eq!(tree.leaf_count(), 1);
}

#[test]
fn duplicate_insert_is_a_noop() {
    let mut tree = TilingTree::new();
    tree.insert(t(1), None, AREA, 0.5);
    tree.insert(t(1), None, AREA, 0.5);
    tree.verify_invariants();
    assert_eq!(tree.leaf_count(), 1);
}

#[test]
fn arena_slots_are_reused_after_removal() {
    let mut tree = TilingTree::new();
    for id in 1..=4 {
        tree.insert(t(id), Some(t(id - 1)), AREA, 0.5);
    }
    let high_water = tree.nodes.len();
    for id in [2, 3] {
        tree.remove(t(id), 0.5);
    }
    for id in [5, 6] {
        tree.insert(t(id), Some(t(4)), AREA, 0.5);
    }
    tree.verify_invariants();
    assert_eq!(tree.nodes.len(), high_water);
}

#[test]
fn leaf_to_geometry_applies_gaps_and_decorations() {
    let usable = AREA;
    let leaf = Rect::new(0, 0, 960, 1080);

    // Outer gap on the usable-area edges, half the inner gap against the
    // sibling edge.
    let geo = leaf_to_geometry(leaf, usable, 10, 20, 0, 0);
    assert_eq!(geo, Rect::new(20, 20, 960 - 20 - 5, 1080 - 40));

    // Decoration offsets shrink the content box further.
    let geo = leaf_to_geometry(leaf, usable, 0, 0, 2, 24);
    assert_eq!(geo, Rect::new(2, 24, 960 - 4, 1080 - 24 - 2));
}

#[test]
fn leaf_to_geometry_never_collapses_below_one_pixel() {
    let usable = Rect::new(0, 0, 30, 30);
    let geo = leaf_to_geometry(usable, usable, 0, 40, 0, 0);
    assert!(geo.width >= 1);
    assert!(geo.height >= 1);
}
