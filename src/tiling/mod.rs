//! Binary-tree tiling engine
//!
//! Computes window geometry for tiled toplevels per workspace. The tree is
//! strictly binary: Split nodes own exactly two children, Leaf nodes own
//! exactly one toplevel. Child boxes of a Split exactly partition the
//! Split's own box; gaps and decoration offsets are applied only when a
//! Leaf box is mapped onto an actual toplevel geometry, never in the tree
//! itself.
//!
//! Nodes live in a free-list arena addressed by index, with parent/child
//! links as indices. Deletion returns the slot to the free list, so tree
//! surgery can never leave a dangling parent pointer behind.

use std::collections::HashMap;

use log::trace;

use crate::scene::Rect;
use crate::toplevel::ToplevelId;

/// Index of a node inside one tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TilingNodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Split {
        first: TilingNodeId,
        second: TilingNodeId,
    },
    Leaf {
        toplevel: ToplevelId,
    },
}

#[derive(Debug)]
struct TilingNode {
    parent: Option<TilingNodeId>,
    kind: NodeKind,
    rect: Rect,
}

/// One workspace's tiling tree.
pub struct TilingTree {
    nodes: Vec<Option<TilingNode>>,
    free: Vec<usize>,
    root: Option<TilingNodeId>,
    leaves: HashMap<ToplevelId, TilingNodeId>,
}

impl TilingTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            leaves: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn contains(&self, toplevel: ToplevelId) -> bool {
        self.leaves.contains_key(&toplevel)
    }

    fn alloc(&mut self, node: TilingNode) -> TilingNodeId {
        if let Some(index) = self.free.pop() {
            self.nodes[index] = Some(node);
            TilingNodeId(index)
        } else {
            self.nodes.push(Some(node));
            TilingNodeId(self.nodes.len() - 1)
        }
    }

    fn dealloc(&mut self, id: TilingNodeId) {
        self.nodes[id.0] = None;
        self.free.push(id.0);
    }

    fn node(&self, id: TilingNodeId) -> &TilingNode {
        self.nodes[id.0].as_ref().expect("live tiling node")
    }

    fn node_mut(&mut self, id: TilingNodeId) -> &mut TilingNode {
        self.nodes[id.0].as_mut().expect("live tiling node")
    }

    /// Insert a toplevel.
    ///
    /// An empty tree gains a sole leaf covering `area`. Otherwise the new
    /// leaf is attached at `attach` (the focused tiled toplevel, chosen by
    /// the caller): a new Split replaces the attachment leaf at its
    /// position, keeping the same parent and box, with the old leaf and the
    /// new leaf as children. The Split's box is divided along its longer
    /// axis at `ratio`, ties toward a width-axis split.
    pub fn insert(
        &mut self,
        toplevel: ToplevelId,
        attach: Option<ToplevelId>,
        area: Rect,
        ratio: f64,
    ) {
        if self.leaves.contains_key(&toplevel) {
            return;
        }

        let Some(root) = self.root else {
            let leaf = self.alloc(TilingNode {
                parent: None,
                kind: NodeKind::Leaf { toplevel },
                rect: area,
            });
            self.root = Some(leaf);
            self.leaves.insert(toplevel, leaf);
            trace!("tiling: {:?} becomes sole leaf", toplevel);
            return;
        };

        let attach_leaf = attach
            .and_then(|t| self.leaves.get(&t).copied())
            .unwrap_or_else(|| self.first_leaf(root));

        let attach_parent = self.node(attach_leaf).parent;
        let attach_rect = self.node(attach_leaf).rect;

        let new_leaf = self.alloc(TilingNode {
            parent: None,
            kind: NodeKind::Leaf { toplevel },
            rect: attach_rect,
        });
        let split = self.alloc(TilingNode {
            parent: attach_parent,
            kind: NodeKind::Split {
                first: attach_leaf,
                second: new_leaf,
            },
            rect: attach_rect,
        });

        self.node_mut(attach_leaf).parent = Some(split);
        self.node_mut(new_leaf).parent = Some(split);
        match attach_parent {
            Some(parent) => self.replace_child(parent, attach_leaf, split),
            None => self.root = Some(split),
        }
        self.leaves.insert(toplevel, new_leaf);

        self.recompute_node(split, ratio);
        trace!("tiling: {:?} split off {:?}", toplevel, attach_leaf);
    }

    /// Remove a toplevel's leaf. The sibling inherits the removed leaf's
    /// parent's box and parent slot, collapsing the now-unary Split.
    pub fn remove(&mut self, toplevel: ToplevelId, ratio: f64) {
        let Some(leaf) = self.leaves.remove(&toplevel) else {
            return;
        };

        let Some(parent) = self.node(leaf).parent else {
            self.dealloc(leaf);
            self.root = None;
            trace!("tiling: {:?} removed, tree empty", toplevel);
            return;
        };

        let NodeKind::Split { first, second } = self.node(parent).kind else {
            unreachable!("leaf parent is always a split");
        };
        let sibling = if first == leaf { second } else { first };

        let parent_rect = self.node(parent).rect;
        let grandparent = self.node(parent).parent;

        self.node_mut(sibling).parent = grandparent;
        self.node_mut(sibling).rect = parent_rect;
        match grandparent {
            Some(gp) => self.replace_child(gp, parent, sibling),
            None => self.root = Some(sibling),
        }

        self.dealloc(leaf);
        self.dealloc(parent);

        self.recompute_node(sibling, ratio);
        trace!("tiling: {:?} removed, sibling collapsed up", toplevel);
    }

    fn replace_child(&mut self, parent: TilingNodeId, old: TilingNodeId, new: TilingNodeId) {
        let NodeKind::Split { first, second } = self.node(parent).kind else {
            unreachable!("child replacement on a leaf");
        };
        let kind = if first == old {
            NodeKind::Split { first: new, second }
        } else {
            NodeKind::Split { first, second: new }
        };
        self.node_mut(parent).kind = kind;
    }

    fn first_leaf(&self, from: TilingNodeId) -> TilingNodeId {
        let mut node = from;
        loop {
            match self.node(node).kind {
                NodeKind::Leaf { .. } => return node,
                NodeKind::Split { first, .. } => node = first,
            }
        }
    }

    /// Recompute the whole tree for a new usable area.
    pub fn recompute(&mut self, area: Rect, ratio: f64) {
        if let Some(root) = self.root {
            self.node_mut(root).rect = area;
            self.recompute_node(root, ratio);
        }
    }

    /// Re-derive child boxes top-down from `node`'s own box: each Split is
    /// divided along its longer axis at `ratio`, ties toward width.
    fn recompute_node(&mut self, node: TilingNodeId, ratio: f64) {
        let rect = self.node(node).rect;
        let NodeKind::Split { first, second } = self.node(node).kind else {
            return;
        };

        let (first_rect, second_rect) = split_rect(rect, ratio);
        self.node_mut(first).rect = first_rect;
        self.node_mut(second).rect = second_rect;
        self.recompute_node(first, ratio);
        self.recompute_node(second, ratio);
    }

    /// Leaf boxes in tree order (first child before second, depth first).
    pub fn leaf_rects(&self) -> Vec<(ToplevelId, Rect)> {
        let mut out = Vec::with_capacity(self.leaves.len());
        if let Some(root) = self.root {
            self.collect_leaves(root, &mut out);
        }
        out
    }

    fn collect_leaves(&self, node: TilingNodeId, out: &mut Vec<(ToplevelId, Rect)>) {
        match self.node(node).kind {
            NodeKind::Leaf { toplevel } => out.push((toplevel, self.node(node).rect)),
            NodeKind::Split { first, second } => {
                self.collect_leaves(first, out);
                self.collect_leaves(second, out);
            }
        }
    }

    pub fn leaf_rect(&self, toplevel: ToplevelId) -> Option<Rect> {
        self.leaves.get(&toplevel).map(|&leaf| self.node(leaf).rect)
    }

    /// Check the structural invariants: strict binarity, correct parent
    /// links, and child boxes exactly partitioning every Split box.
    /// Used by tests after every mutation.
    pub fn verify_invariants(&self) {
        let Some(root) = self.root else {
            assert!(self.leaves.is_empty());
            return;
        };
        assert!(self.node(root).parent.is_none(), "root has no parent");
        let mut leaf_count = 0;
        self.verify_node(root, &mut leaf_count);
        assert_eq!(leaf_count, self.leaves.len());
    }

    fn verify_node(&self, node: TilingNodeId, leaf_count: &mut usize) {
        let rect = self.node(node).rect;
        match self.node(node).kind {
            NodeKind::Leaf { toplevel } => {
                assert_eq!(self.leaves.get(&toplevel), Some(&node));
                *leaf_count += 1;
            }
            NodeKind::Split { first, second } => {
                let a = self.node(first).rect;
                let b = self.node(second).rect;
                assert_eq!(self.node(first).parent, Some(node));
                assert_eq!(self.node(second).parent, Some(node));
                // The two children partition the parent exactly: no gap, no
                // overlap at the partition line.
                if a.y == b.y {
                    assert_eq!(a.height, rect.height);
                    assert_eq!(b.height, rect.height);
                    assert_eq!(a.x, rect.x);
                    assert_eq!(a.x + a.width, b.x);
                    assert_eq!(b.x + b.width, rect.x + rect.width);
                } else {
                    assert_eq!(a.width, rect.width);
                    assert_eq!(b.width, rect.width);
                    assert_eq!(a.y, rect.y);
                    assert_eq!(a.y + a.height, b.y);
                    assert_eq!(b.y + b.height, rect.y + rect.height);
                }
                self.verify_node(first, leaf_count);
                self.verify_node(second, leaf_count);
            }
        }
    }
}

impl Default for TilingTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Divide `rect` along its longer axis at `ratio`. Ties (square boxes)
/// split along the width axis.
fn split_rect(rect: Rect, ratio: f64) -> (Rect, Rect) {
    if rect.width >= rect.height {
        let first_width = (rect.width as f64 * ratio).round() as i32;
        (
            Rect::new(rect.x, rect.y, first_width, rect.height),
            Rect::new(
                rect.x + first_width,
                rect.y,
                rect.width - first_width,
                rect.height,
            ),
        )
    } else {
        let first_height = (rect.height as f64 * ratio).round() as i32;
        (
            Rect::new(rect.x, rect.y, rect.width, first_height),
            Rect::new(
                rect.x,
                rect.y + first_height,
                rect.width,
                rect.height - first_height,
            ),
        )
    }
}

/// Map a leaf box onto final toplevel content geometry: outer gap against
/// the usable-area edge, half the inner gap against sibling edges, then the
/// decoration offsets.
pub fn leaf_to_geometry(
    leaf: Rect,
    usable: Rect,
    gap_inner: i32,
    gap_outer: i32,
    border_width: i32,
    top_border: i32,
) -> Rect {
    let half = gap_inner / 2;

    let left = if leaf.x == usable.x { gap_outer } else { half };
    let top = if leaf.y == usable.y { gap_outer } else { half };
    let right = if leaf.x + leaf.width == usable.x + usable.width {
        gap_outer
    } else {
        half
    };
    let bottom = if leaf.y + leaf.height == usable.y + usable.height {
        gap_outer
    } else {
        half
    };

    let x = leaf.x + left + border_width;
    let y = leaf.y + top + top_border;
    let width = (leaf.width - left - right - 2 * border_width).max(1);
    let height = (leaf.height - top - bottom - top_border - border_width).max(1);
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests;
