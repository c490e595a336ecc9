//! Object model
//!
//! Every domain entity the compositor can hit-test or focus (outputs,
//! workspaces, toplevels, popups, layer surfaces, widgets) is represented
//! by exactly one Object: a typed handle pairing a scene-graph subtree with
//! a weak back-reference to its owner. Scene nodes store the object id, not
//! a pointer, so destruction order can never dangle: a stale id simply
//! fails the presence check.

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::output::OutputId;
use crate::scene::{NodeId, Scene};
use crate::shell::WorkspaceId;
use crate::toplevel::{SurfaceId, ToplevelId};

/// Stable handle to an object. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// What kind of domain entity an object represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Output,
    Workspace,
    Toplevel,
    Popup,
    LayerSurface,
    Widget,
    LockOutput,
    Unmanaged,
    DndIcon,
}

/// Non-owning reference back to the owning domain entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerRef {
    None,
    Output(OutputId),
    Workspace(WorkspaceId),
    Toplevel(ToplevelId),
    Surface(SurfaceId),
}

#[derive(Debug)]
pub struct Object {
    pub id: ObjectId,
    pub node: NodeId,
    pub kind: ObjectKind,
    pub owner: OwnerRef,
    /// Cached size, updated when the owner resizes its subtree.
    pub width: i32,
    pub height: i32,
    pub dirty: bool,
    /// Set before teardown begins; accessor paths must treat the object as
    /// absent once this is set.
    pub destroying: bool,
}

/// Process-wide registry of live objects plus the dirty set drained once
/// per recomposition pass.
pub struct ObjectRegistry {
    objects: HashMap<ObjectId, Object>,
    by_node: HashMap<NodeId, ObjectId>,
    dirty: Vec<ObjectId>,
    next_id: u64,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            by_node: HashMap::new(),
            dirty: Vec::new(),
            next_id: 1,
        }
    }

    /// Create an object with a fresh scene subtree under `parent`.
    pub fn create(
        &mut self,
        scene: &mut Scene,
        parent: NodeId,
        kind: ObjectKind,
        owner: OwnerRef,
    ) -> ObjectId {
        let node = scene.create_node(parent);
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        scene.set_object(node, Some(id.0));
        self.objects.insert(
            id,
            Object {
                id,
                node,
                kind,
                owner,
                width: 0,
                height: 0,
                dirty: false,
                destroying: false,
            },
        );
        self.by_node.insert(node, id);
        trace!("created object {:?} ({:?}) on node {:?}", id, kind, node);
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id).filter(|o| !o.destroying)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(&id).filter(|o| !o.destroying)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Resolve the object owning the topmost scene node at a point.
    ///
    /// Scene nodes without an object back-reference are transparent to
    /// resolution: the walk continues upward through ancestors, so
    /// decorative sub-nodes can sit above their owning object without
    /// breaking hit-testing.
    pub fn hit_test(&self, scene: &Scene, x: i32, y: i32) -> Option<ObjectId> {
        let mut node = scene.node_at(x, y);
        while let Some(n) = node {
            if let Some(raw) = scene.object(n) {
                let id = ObjectId(raw);
                if self.contains(id) {
                    return Some(id);
                }
                warn!("scene node {:?} carries stale object id {}", n, raw);
            }
            node = scene.parent(n);
        }
        None
    }

    /// Insert the object into the dirty set. Idempotent: an object already
    /// queued is not queued twice.
    pub fn mark_dirty(&mut self, id: ObjectId) {
        let Some(object) = self.objects.get_mut(&id) else {
            return;
        };
        if object.destroying || object.dirty {
            return;
        }
        object.dirty = true;
        self.dirty.push(id);
    }

    /// Drain the dirty set, clearing flags. Called once per recomposition
    /// pass.
    pub fn drain_dirty(&mut self) -> Vec<ObjectId> {
        let drained = std::mem::take(&mut self.dirty);
        for id in &drained {
            if let Some(object) = self.objects.get_mut(id) {
                object.dirty = false;
            }
        }
        drained
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    /// Tear down an object: detach it from the dirty set and invalidate the
    /// node back-reference before the subtree is released. Returns the
    /// owner reference so the caller can tear down the domain entity.
    pub fn destroy(&mut self, scene: &mut Scene, id: ObjectId) -> Option<OwnerRef> {
        let object = self.objects.get_mut(&id)?;
        if object.destroying {
            return None;
        }
        object.destroying = true;
        let node = object.node;
        let owner = object.owner;
        self.dirty.retain(|&d| d != id);
        scene.set_object(node, None);

        let removed = scene.destroy_subtree(node);
        for n in removed {
            self.by_node.remove(&n);
        }
        self.objects.remove(&id);
        debug!("destroyed object {:?}", id);
        Some(owner)
    }

    /// React to the scene library notifying that a node went away out from
    /// under us (e.g. the renderer dropped the subtree). Returns the owner
    /// of the torn-down object, if any.
    pub fn on_node_destroyed(&mut self, node: NodeId) -> Option<OwnerRef> {
        let id = self.by_node.remove(&node)?;
        let object = self.objects.get_mut(&id)?;
        if object.destroying {
            return None;
        }
        object.destroying = true;
        let owner = object.owner;
        self.dirty.retain(|&d| d != id);
        self.objects.remove(&id);
        debug!("object {:?} torn down by node destruction", id);
        Some(owner)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
