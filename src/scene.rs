//! Scene-graph boundary
//!
//! The rendering library owns the real scene graph; this module is the seam
//! the window-management core talks to: create/destroy subtree nodes, set
//! position and size, enable/disable, raise-to-top, hit-test at a point, and
//! a destroy notification signal. A headless node arena stands in where no
//! real renderer is wired up, the same way the minimal fallback backend does
//! for toplevels.

use std::collections::HashMap;

use log::{debug, trace};

/// Axis-aligned rectangle in layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    /// Shrink the rectangle by `inset` on every edge. Collapses to a
    /// zero-size rectangle at the center rather than going negative.
    pub fn inset(&self, inset: i32) -> Self {
        let width = (self.width - 2 * inset).max(0);
        let height = (self.height - 2 * inset).max(0);
        Self {
            x: self.x + (self.width - width) / 2,
            y: self.y + (self.height - height) / 2,
            width,
            height,
        }
    }
}

/// Stable handle to a scene node. Ids are never reused, so a stale handle
/// simply fails the presence check instead of resolving to a new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Identifier for a subscriber record on a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// What a subscriber wants done with its own record after a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Keep,
    Detach,
}

struct Subscriber<T> {
    id: SubscriptionId,
    callback: Box<dyn FnMut(&T) -> SignalAction>,
}

/// Ordered synchronous publish/subscribe primitive.
///
/// Emitting invokes every live subscriber in registration order. A
/// subscriber detaches its own record by returning [`SignalAction::Detach`]
/// from the callback; the emit loop is index-based and treats removed
/// records as tombstones, so removal mid-emit never skips or repeats a
/// subscriber.
pub struct Signal<T> {
    subscribers: Vec<Option<Subscriber<T>>>,
    next_id: u64,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 1,
        }
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&T) -> SignalAction + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Some(Subscriber {
            id,
            callback: Box::new(callback),
        }));
        id
    }

    /// Remove a subscriber record. Idempotent: unsubscribing an already
    /// removed record is a no-op.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        for slot in self.subscribers.iter_mut() {
            if slot.as_ref().map(|s| s.id) == Some(id) {
                *slot = None;
            }
        }
        self.subscribers.retain(|slot| slot.is_some());
    }

    pub fn emit(&mut self, value: &T) {
        let mut index = 0;
        // Index-based walk: records detached mid-emit become tombstones and
        // records appended mid-emit are picked up by the same pass.
        while index < self.subscribers.len() {
            if let Some(subscriber) = self.subscribers[index].as_mut() {
                if (subscriber.callback)(value) == SignalAction::Detach {
                    self.subscribers[index] = None;
                }
            }
            index += 1;
        }
        self.subscribers.retain(|slot| slot.is_some());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|s| s.is_some()).count()
    }
}

/// One node of the headless scene graph.
#[derive(Debug)]
struct SceneNode {
    parent: Option<NodeId>,
    /// Render order, back to front: the last child is topmost.
    children: Vec<NodeId>,
    /// Position relative to the parent node.
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    enabled: bool,
    /// Weak back-reference into the object registry; `None` marks the node
    /// transparent to object resolution.
    object: Option<u64>,
}

/// Headless scene graph: a tree of positioned nodes with z-order and
/// point queries. Mirrors the node operations the real renderer exposes.
pub struct Scene {
    nodes: HashMap<NodeId, SceneNode>,
    root: NodeId,
    next_id: u64,
    /// Fired once per node destroyed, children before parents.
    pub destroyed: Signal<NodeId>,
}

impl Scene {
    pub fn new() -> Self {
        let root = NodeId(1);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            SceneNode {
                parent: None,
                children: Vec::new(),
                x: 0,
                y: 0,
                width: 0,
                height: 0,
                enabled: true,
                object: None,
            },
        );
        Self {
            nodes,
            root,
            next_id: 2,
            destroyed: Signal::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Create a node parented under `parent`, initially topmost among its
    /// siblings. Falls back to the root if the parent handle is stale.
    pub fn create_node(&mut self, parent: NodeId) -> NodeId {
        let parent = if self.nodes.contains_key(&parent) {
            parent
        } else {
            debug!("create_node: stale parent {:?}, attaching to root", parent);
            self.root
        };
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            SceneNode {
                parent: Some(parent),
                children: Vec::new(),
                x: 0,
                y: 0,
                width: 0,
                height: 0,
                enabled: true,
                object: None,
            },
        );
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        trace!("created scene node {:?} under {:?}", id, parent);
        id
    }

    /// Destroy a node and its entire subtree. Emits the `destroyed` signal
    /// for every removed node, children before parents, and returns the
    /// removed ids in that order.
    pub fn destroy_subtree(&mut self, node: NodeId) -> Vec<NodeId> {
        if !self.nodes.contains_key(&node) || node == self.root {
            return Vec::new();
        }
        if let Some(parent) = self.nodes[&node].parent {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|&c| c != node);
            }
        }
        let mut removed = Vec::new();
        self.collect_subtree(node, &mut removed);
        // Children first so owners can tear down leaves before containers.
        removed.reverse();
        for &id in &removed {
            self.nodes.remove(&id);
            self.destroyed.emit(&id);
        }
        removed
    }

    fn collect_subtree(&self, node: NodeId, out: &mut Vec<NodeId>) {
        out.push(node);
        if let Some(n) = self.nodes.get(&node) {
            for &child in &n.children {
                self.collect_subtree(child, out);
            }
        }
    }

    pub fn set_position(&mut self, node: NodeId, x: i32, y: i32) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.x = x;
            n.y = y;
        }
    }

    pub fn set_size(&mut self, node: NodeId, width: i32, height: i32) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.width = width;
            n.height = height;
        }
    }

    pub fn set_enabled(&mut self, node: NodeId, enabled: bool) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.enabled = enabled;
        }
    }

    /// Move `node` to the top of its sibling stack.
    pub fn raise_to_top(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get(&node).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|&c| c != node);
            p.children.push(node);
        }
    }

    /// Reparent a subtree, placing it topmost under the new parent.
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId) {
        if !self.nodes.contains_key(&new_parent) || node == self.root {
            return;
        }
        let Some(old_parent) = self.nodes.get(&node).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&old_parent) {
            p.children.retain(|&c| c != node);
        }
        if let Some(p) = self.nodes.get_mut(&new_parent) {
            p.children.push(node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = Some(new_parent);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn set_object(&mut self, node: NodeId, object: Option<u64>) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.object = object;
        }
    }

    pub fn object(&self, node: NodeId) -> Option<u64> {
        self.nodes.get(&node).and_then(|n| n.object)
    }

    /// Topmost enabled node containing the point, in layout coordinates.
    pub fn node_at(&self, x: i32, y: i32) -> Option<NodeId> {
        self.node_at_from(self.root, 0, 0, x, y)
    }

    fn node_at_from(&self, node: NodeId, off_x: i32, off_y: i32, x: i32, y: i32) -> Option<NodeId> {
        let n = self.nodes.get(&node)?;
        if !n.enabled {
            return None;
        }
        let abs_x = off_x + n.x;
        let abs_y = off_y + n.y;
        // Topmost child wins, so walk the stack front to back.
        for &child in n.children.iter().rev() {
            if let Some(hit) = self.node_at_from(child, abs_x, abs_y, x, y) {
                return Some(hit);
            }
        }
        let rect = Rect::new(abs_x, abs_y, n.width, n.height);
        if node != self.root && rect.contains(x, y) {
            Some(node)
        } else {
            None
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
