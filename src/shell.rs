//! Shell orchestrator
//!
//! Owns the whole window-management core: scene graph, object registry,
//! outputs, workspaces with their tiling trees, toplevels, the transaction
//! queue, the animation scheduler, and the seat. Everything below talks
//! only to its own state; cross-cutting operations (map a window, focus,
//! fullscreen, interactive grabs, layout transactions) are composed here.
//!
//! The event loop is calloop-based and single-threaded: backend sources
//! dispatch into `&mut Shell`, and the two internal timers (transaction
//! sweep, animation tick) are folded into the dispatch timeout from their
//! queues' deadlines, so an idle shell blocks without waking.

use std::collections::HashMap;
use std::time::Instant;

use anyhow::{Context, Result};
use calloop::EventLoop;
use log::{debug, info, trace, warn};

use crate::animation::{self, AnimationId, AnimationScheduler, EasingCurve};
use crate::config::Config;
use crate::object::{ObjectId, ObjectKind, ObjectRegistry, OwnerRef};
use crate::output::{OutputId, Outputs};
use crate::scene::{NodeId, Rect, Scene};
use crate::seat::{KeyboardFocus, MoveGrab, PointerMode, ResizeEdges, ResizeGrab, Seat};
use crate::tiling::{leaf_to_geometry, TilingTree};
use crate::toplevel::{
    MapState, Serial, SurfaceId, TilingMode, Toplevel, ToplevelBackend, ToplevelId,
};
use crate::transaction::{self, RunReason, TransactionId, TransactionQueue};

/// Layout area used when no output is known at all (headless runs).
const FALLBACK_AREA: Rect = Rect {
    x: 0,
    y: 0,
    width: 1920,
    height: 1080,
};

/// Stable handle to a workspace. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkspaceId(pub u64);

/// One workspace: a tiling tree plus the focus-ordered list of its
/// toplevels, bound to an output (or the fallback output when `None`).
pub struct Workspace {
    pub id: WorkspaceId,
    pub output: Option<OutputId>,
    pub node: NodeId,
    pub object: ObjectId,
    pub tree: TilingTree,
    /// Focus order, head first; floating and tiled alike.
    pub order: Vec<ToplevelId>,
    /// Toplevel currently covering this workspace, if any.
    pub fullscreen: Option<ToplevelId>,
}

struct ToplevelEntry {
    toplevel: Toplevel,
    object: ObjectId,
    workspace: WorkspaceId,
}

pub struct Shell {
    pub config: Config,
    pub scene: Scene,
    pub objects: ObjectRegistry,
    pub outputs: Outputs,
    pub seat: Seat,

    workspaces: HashMap<WorkspaceId, Workspace>,
    next_workspace_id: u64,
    active_workspace: WorkspaceId,

    toplevels: HashMap<ToplevelId, ToplevelEntry>,
    next_toplevel_id: u64,

    transactions: TransactionQueue<Shell>,
    animations: AnimationScheduler<Shell>,
    /// The in-flight geometry transaction per toplevel, so a re-layout
    /// re-queues instead of piling up.
    pending_geometry: HashMap<ToplevelId, TransactionId>,
    /// The running map-fade per toplevel, cancelled on unmap.
    fades: HashMap<ToplevelId, AnimationId>,

    /// Scene layers, bottom to top.
    workspace_layer: NodeId,
    fullscreen_layer: NodeId,
    overlay_layer: NodeId,

    running: bool,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        let mut scene = Scene::new();
        let root = scene.root();
        let workspace_layer = scene.create_node(root);
        let fullscreen_layer = scene.create_node(root);
        let overlay_layer = scene.create_node(root);

        let mut shell = Self {
            transactions: TransactionQueue::new(&config.transaction),
            animations: AnimationScheduler::new(),
            config,
            scene,
            objects: ObjectRegistry::new(),
            outputs: Outputs::new(),
            seat: Seat::new(),
            workspaces: HashMap::new(),
            next_workspace_id: 1,
            active_workspace: WorkspaceId(0),
            toplevels: HashMap::new(),
            next_toplevel_id: 1,
            pending_geometry: HashMap::new(),
            fades: HashMap::new(),
            workspace_layer,
            fullscreen_layer,
            overlay_layer,
            running: true,
        };
        let initial = shell.create_workspace(None);
        shell.active_workspace = initial;
        shell
    }

    fn transactions_mut(shell: &mut Shell) -> &mut TransactionQueue<Shell> {
        &mut shell.transactions
    }

    fn animations_mut(shell: &mut Shell) -> &mut AnimationScheduler<Shell> {
        &mut shell.animations
    }

    // ---- workspaces -----------------------------------------------------

    pub fn create_workspace(&mut self, output: Option<OutputId>) -> WorkspaceId {
        let id = WorkspaceId(self.next_workspace_id);
        self.next_workspace_id += 1;
        let object = self.objects.create(
            &mut self.scene,
            self.workspace_layer,
            ObjectKind::Workspace,
            OwnerRef::Workspace(id),
        );
        let node = self.objects.get(object).expect("object just created").node;
        self.workspaces.insert(
            id,
            Workspace {
                id,
                output,
                node,
                object,
                tree: TilingTree::new(),
                order: Vec::new(),
                fullscreen: None,
            },
        );
        debug!("workspace {:?} created on output {:?}", id, output);
        id
    }

    pub fn workspace(&self, id: WorkspaceId) -> Option<&Workspace> {
        self.workspaces.get(&id)
    }

    pub fn active_workspace(&self) -> WorkspaceId {
        self.active_workspace
    }

    pub fn set_active_workspace(&mut self, id: WorkspaceId) {
        if self.workspaces.contains_key(&id) {
            self.active_workspace = id;
        } else {
            warn!("activating unknown workspace {:?}", id);
        }
    }

    fn usable_area(&self, workspace: WorkspaceId) -> Rect {
        let output = self.workspaces.get(&workspace).and_then(|w| w.output);
        self.outputs
            .resolve(output)
            .map(|o| o.usable_area)
            .unwrap_or(FALLBACK_AREA)
    }

    fn output_area(&self, workspace: WorkspaceId) -> Rect {
        let output = self.workspaces.get(&workspace).and_then(|w| w.output);
        self.outputs
            .resolve(output)
            .map(|o| o.area)
            .unwrap_or(FALLBACK_AREA)
    }

    /// Queue a workspace for re-layout on the next recomposition pass.
    pub fn mark_workspace_dirty(&mut self, id: WorkspaceId) {
        if let Some(workspace) = self.workspaces.get(&id) {
            self.objects.mark_dirty(workspace.object);
        }
    }

    /// Drain the dirty set and re-layout every dirty workspace.
    pub fn recompose(&mut self) {
        for object in self.objects.drain_dirty() {
            let owner = self.objects.get(object).map(|o| o.owner);
            if let Some(OwnerRef::Workspace(ws)) = owner {
                self.relayout_workspace(ws);
            }
        }
    }

    /// Push an output's new usable area (layer-shell exclusive zones) into
    /// every workspace that resolves to it.
    pub fn update_usable_area(&mut self, output: OutputId, usable: Rect) {
        self.outputs.set_usable_area(output, usable);
        let affected: Vec<WorkspaceId> = self
            .workspaces
            .values()
            .filter(|w| w.output == Some(output) || w.output.is_none())
            .map(|w| w.id)
            .collect();
        for ws in affected {
            self.mark_workspace_dirty(ws);
        }
        self.recompose();
    }

    // ---- toplevel lifecycle ---------------------------------------------

    /// Map a new toplevel onto a workspace (the active one by default).
    /// Tileable windows enter the tiling tree split off the focused tiled
    /// toplevel; fixed-size and child windows stay floating at their
    /// client-chosen geometry. The new toplevel takes keyboard focus.
    pub fn map_toplevel(
        &mut self,
        backend: Box<dyn ToplevelBackend>,
        workspace: Option<WorkspaceId>,
    ) -> ToplevelId {
        let id = ToplevelId(self.next_toplevel_id);
        self.next_toplevel_id += 1;
        let ws = workspace.unwrap_or(self.active_workspace);

        let mut toplevel = Toplevel::new(id, backend);
        toplevel.state = MapState::Mapped;
        let tiled = !toplevel.forced_floating();
        toplevel.tiling_mode = if tiled {
            TilingMode::Tiled
        } else {
            TilingMode::Floating
        };
        toplevel.backend.set_tiled(tiled);
        toplevel.current.workspace = Some(ws);
        toplevel.pending.workspace = Some(ws);

        let ws_node = self
            .workspaces
            .get(&ws)
            .map(|w| w.node)
            .unwrap_or_else(|| self.scene.root());
        let object = self.objects.create(
            &mut self.scene,
            ws_node,
            ObjectKind::Toplevel,
            OwnerRef::Toplevel(id),
        );
        let node = self.objects.get(object).expect("object just created").node;

        if !tiled {
            // Floating windows keep their client-chosen geometry and are
            // placed immediately; there is nothing to negotiate.
            let rect = toplevel.backend.geometry();
            toplevel.current.rect = rect;
            toplevel.pending.rect = rect;
            self.scene.set_position(node, rect.x, rect.y);
            self.scene.set_size(node, rect.width, rect.height);
        }

        self.toplevels.insert(
            id,
            ToplevelEntry {
                toplevel,
                object,
                workspace: ws,
            },
        );

        if tiled {
            let attach = self.tiling_attach_target(ws, id);
            let usable = self.usable_area(ws);
            let ratio = self.config.tiling.split_ratio;
            if let Some(w) = self.workspaces.get_mut(&ws) {
                w.tree.insert(id, attach, usable, ratio);
            }
        }
        if let Some(w) = self.workspaces.get_mut(&ws) {
            w.order.push(id);
        }

        info!(
            "mapped toplevel {:?} on {:?} ({})",
            id,
            ws,
            if tiled { "tiled" } else { "floating" }
        );
        self.relayout_workspace(ws);
        self.focus_toplevel(id);
        self.start_map_fade(id);
        id
    }

    /// Unmap and destroy a toplevel: its pending transaction and running
    /// fade are cancelled, its leaf collapses out of the tiling tree, focus
    /// hands off to the most recently used survivor, and the scene subtree
    /// is torn down.
    pub fn unmap_toplevel(&mut self, id: ToplevelId) {
        if let Some(fade) = self.fades.remove(&id) {
            animation::cancel(self, Self::animations_mut, fade);
        }
        if let Some(txn) = self.pending_geometry.remove(&id) {
            self.transactions.cancel(txn);
        }
        let Some(entry) = self.toplevels.get_mut(&id) else {
            return;
        };
        entry.toplevel.state = MapState::Destroyed;
        let ws = entry.workspace;
        let object = entry.object;

        let ratio = self.config.tiling.split_ratio;
        if let Some(w) = self.workspaces.get_mut(&ws) {
            w.tree.remove(id, ratio);
            w.order.retain(|&t| t != id);
            if w.fullscreen == Some(id) {
                w.fullscreen = None;
            }
        }

        // Hand off focus before the MRU entry disappears; the dying
        // toplevel is excluded so it can never be re-selected.
        if self.seat.focused_toplevel() == Some(id) {
            self.refocus(Some(id));
        }
        self.seat.mru_remove(id);

        self.objects.destroy(&mut self.scene, object);
        self.toplevels.remove(&id);
        info!("unmapped toplevel {:?}", id);
        self.relayout_workspace(ws);
    }

    /// Ask the client to close; actual teardown happens when the surface
    /// goes away and the backend reports the unmap.
    pub fn close_toplevel(&mut self, id: ToplevelId) {
        if let Some(entry) = self.toplevels.get_mut(&id) {
            entry.toplevel.backend.close();
        }
    }

    pub fn toplevel(&self, id: ToplevelId) -> Option<&Toplevel> {
        self.toplevels.get(&id).map(|e| &e.toplevel)
    }

    pub fn toplevel_mut(&mut self, id: ToplevelId) -> Option<&mut Toplevel> {
        self.toplevels.get_mut(&id).map(|e| &mut e.toplevel)
    }

    pub fn toplevel_workspace(&self, id: ToplevelId) -> Option<WorkspaceId> {
        self.toplevels.get(&id).map(|e| e.workspace)
    }

    pub fn toplevel_count(&self) -> usize {
        self.toplevels.len()
    }

    // ---- layout ---------------------------------------------------------

    /// Attachment leaf for a tiling insert: the focused toplevel when it
    /// is a tiled member of this workspace's tree, else the first tiled
    /// toplevel in the workspace's focus order.
    fn tiling_attach_target(&self, ws: WorkspaceId, inserting: ToplevelId) -> Option<ToplevelId> {
        let workspace = self.workspaces.get(&ws)?;
        self.seat
            .focused_toplevel()
            .filter(|&f| f != inserting && workspace.tree.contains(f))
            .or_else(|| {
                workspace
                    .order
                    .iter()
                    .copied()
                    .find(|&t| t != inserting && workspace.tree.contains(t))
            })
    }

    /// Recompute the workspace's tiling tree and propose the resulting
    /// geometry to every tiled toplevel, one transaction each. While a
    /// fullscreen toplevel covers the workspace nothing is proposed; the
    /// fullscreen exit path relayouts and catches up.
    fn relayout_workspace(&mut self, ws: WorkspaceId) {
        let usable = self.usable_area(ws);
        let ratio = self.config.tiling.split_ratio;
        let Some(workspace) = self.workspaces.get_mut(&ws) else {
            return;
        };
        if workspace.fullscreen.is_some() {
            return;
        }
        workspace.tree.recompute(usable, ratio);
        let leaves = workspace.tree.leaf_rects();
        trace!("relayout {:?}: {} leaves in {:?}", ws, leaves.len(), usable);

        for (tid, leaf) in leaves {
            self.propose_leaf(tid, leaf, usable, ws);
        }
    }

    fn propose_leaf(&mut self, id: ToplevelId, leaf: Rect, usable: Rect, ws: WorkspaceId) {
        let gap_inner = self.config.tiling.gap_inner;
        let gap_outer = self.config.tiling.gap_outer;
        let Some(entry) = self.toplevels.get_mut(&id) else {
            return;
        };
        if !entry.toplevel.is_mapped() {
            return;
        }
        let (border, top) = if entry.toplevel.decorated {
            (
                self.config.decoration.border_width,
                self.config.decoration.top_border,
            )
        } else {
            (0, 0)
        };
        let geometry = leaf_to_geometry(leaf, usable, gap_inner, gap_outer, border, top);
        if geometry == entry.toplevel.current.rect && entry.toplevel.current.workspace == Some(ws)
        {
            return;
        }
        let serial = entry.toplevel.propose_geometry(geometry, Some(ws));
        self.queue_geometry_transaction(id, serial);
    }

    fn propose_floating(&mut self, id: ToplevelId, rect: Rect) {
        let Some(entry) = self.toplevels.get_mut(&id) else {
            return;
        };
        let ws = entry.workspace;
        let serial = entry.toplevel.propose_geometry(rect, Some(ws));
        self.queue_geometry_transaction(id, serial);
    }

    /// Queue (or re-queue) the geometry transaction for a toplevel: wait
    /// for the client to acknowledge `serial`, then commit the pending
    /// geometry into the scene. Re-layout while one is already pending
    /// replaces it, resetting the retry count.
    fn queue_geometry_transaction(&mut self, id: ToplevelId, serial: Serial) {
        let txn = match self.pending_geometry.get(&id) {
            Some(&txn) => txn,
            None => self.transactions.allocate(),
        };
        self.pending_geometry.insert(id, txn);
        self.transactions
            .queue(txn, move |shell: &mut Shell, reason| {
                let (rect, object) = {
                    let Some(entry) = shell.toplevels.get_mut(&id) else {
                        return true;
                    };
                    let ready = reason == RunReason::Forced
                        || entry.toplevel.backend.should_run_transaction(serial);
                    if !ready {
                        return false;
                    }
                    entry.toplevel.commit_pending();
                    (entry.toplevel.current.rect, entry.object)
                };
                if let Some(node) = shell.objects.get(object).map(|o| o.node) {
                    shell.scene.set_position(node, rect.x, rect.y);
                    shell.scene.set_size(node, rect.width, rect.height);
                }
                if let Some(obj) = shell.objects.get_mut(object) {
                    obj.width = rect.width;
                    obj.height = rect.height;
                }
                shell.pending_geometry.remove(&id);
                trace!("geometry committed for {:?}: {:?}", id, rect);
                true
            });
    }

    /// The client committed a buffer; evaluate its pending geometry
    /// transaction right away instead of waiting for the next sweep. The
    /// serial check still applies, so a commit for an older configure
    /// leaves the transaction queued.
    pub fn handle_commit(&mut self, id: ToplevelId) -> bool {
        let Some(&txn) = self.pending_geometry.get(&id) else {
            return false;
        };
        transaction::run_now(self, Self::transactions_mut, txn)
    }

    pub fn has_pending_geometry(&self, id: ToplevelId) -> bool {
        self.pending_geometry.contains_key(&id)
    }

    // ---- tiling mode and fullscreen -------------------------------------

    /// Switch a toplevel between tiled and floating. Entering the tree
    /// splits off the focused tiled toplevel, as on map; leaving collapses
    /// its leaf and keeps the committed geometry.
    pub fn set_tiling_mode(&mut self, id: ToplevelId, mode: TilingMode) {
        let Some(entry) = self.toplevels.get_mut(&id) else {
            return;
        };
        if entry.toplevel.tiling_mode == mode || !entry.toplevel.is_mapped() {
            return;
        }
        if mode == TilingMode::Tiled && entry.toplevel.forced_floating() {
            debug!("toplevel {:?} cannot tile (fixed size or child)", id);
            return;
        }
        entry.toplevel.tiling_mode = mode;
        entry.toplevel.backend.set_tiled(mode == TilingMode::Tiled);
        let ws = entry.workspace;

        let usable = self.usable_area(ws);
        let ratio = self.config.tiling.split_ratio;
        match mode {
            TilingMode::Floating => {
                if let Some(w) = self.workspaces.get_mut(&ws) {
                    w.tree.remove(id, ratio);
                }
            }
            TilingMode::Tiled => {
                let attach = self.tiling_attach_target(ws, id);
                if let Some(w) = self.workspaces.get_mut(&ws) {
                    w.tree.insert(id, attach, usable, ratio);
                }
            }
        }
        debug!("toplevel {:?} now {:?}", id, mode);
        self.relayout_workspace(ws);
    }

    /// Enter or leave fullscreen. Entering snapshots the committed
    /// geometry, reparents the scene subtree onto the fullscreen layer and
    /// proposes the full output area; leaving restores both. A tiled
    /// toplevel keeps its leaf while fullscreen and reclaims it on exit.
    pub fn set_fullscreen(&mut self, id: ToplevelId, fullscreen: bool) {
        let Some(entry) = self.toplevels.get_mut(&id) else {
            return;
        };
        if entry.toplevel.fullscreen == fullscreen || !entry.toplevel.is_mapped() {
            return;
        }
        let ws = entry.workspace;
        let object = entry.object;

        if fullscreen {
            entry.toplevel.saved = Some(entry.toplevel.current);
            entry.toplevel.fullscreen = true;
            entry.toplevel.backend.set_fullscreen(true);
            if let Some(w) = self.workspaces.get_mut(&ws) {
                w.fullscreen = Some(id);
            }
            if let Some(node) = self.objects.get(object).map(|o| o.node) {
                self.scene.reparent(node, self.fullscreen_layer);
            }
            let area = self.output_area(ws);
            self.propose_floating(id, area);
            info!("toplevel {:?} fullscreen on {:?}", id, ws);
        } else {
            let saved = entry.toplevel.saved.take();
            entry.toplevel.fullscreen = false;
            entry.toplevel.backend.set_fullscreen(false);
            if let Some(w) = self.workspaces.get_mut(&ws) {
                if w.fullscreen == Some(id) {
                    w.fullscreen = None;
                }
            }
            let ws_node = self.workspaces.get(&ws).map(|w| w.node);
            if let (Some(node), Some(parent)) =
                (self.objects.get(object).map(|o| o.node), ws_node)
            {
                self.scene.reparent(node, parent);
            }
            if let Some(state) = saved {
                self.propose_floating(id, state.rect);
            }
            info!("toplevel {:?} left fullscreen", id);
            // Tiled geometry may have moved underneath while covered.
            self.relayout_workspace(ws);
        }
    }

    // ---- focus ----------------------------------------------------------

    /// Give a toplevel keyboard focus: deactivate the old holder, activate
    /// and raise the new one, promote it in the MRU order. Refused while a
    /// session lock or an exclusive layer surface holds the keyboard.
    pub fn focus_toplevel(&mut self, id: ToplevelId) -> bool {
        if !self.seat.may_focus_regular() || self.seat.exclusive_layer.is_some() {
            return false;
        }
        let Some(entry) = self.toplevels.get(&id) else {
            return false;
        };
        if !entry.toplevel.is_mapped() {
            return false;
        }
        let object = entry.object;

        let old = self.seat.focused_toplevel();
        if old != Some(id) {
            if let Some(old_id) = old {
                if let Some(e) = self.toplevels.get_mut(&old_id) {
                    e.toplevel.backend.set_activated(false);
                }
            }
        }

        let Some(entry) = self.toplevels.get_mut(&id) else {
            return false;
        };
        entry.toplevel.backend.set_activated(true);
        let surface = entry.toplevel.backend.surface();

        let ws = entry.workspace;

        if let Some(node) = self.objects.get(object).map(|o| o.node) {
            self.scene.raise_to_top(node);
        }
        self.seat.keyboard_focus = Some(KeyboardFocus::Toplevel { id, surface });
        self.seat.mru_promote(id);
        // Workspace order is a focus order too.
        if let Some(w) = self.workspaces.get_mut(&ws) {
            w.order.retain(|&t| t != id);
            w.order.insert(0, id);
        }
        trace!("focus -> {:?}", id);
        true
    }

    fn deactivate_focused(&mut self) {
        if let Some(old) = self.seat.focused_toplevel() {
            if let Some(e) = self.toplevels.get_mut(&old) {
                e.toplevel.backend.set_activated(false);
            }
        }
    }

    /// Re-run focus arbitration: lock surface first, then an exclusive
    /// layer surface, then the first other mapped toplevel in the
    /// workspace's focus order, then the seat's global MRU order.
    /// `exclude` is never selected (the surface currently being unfocused
    /// or unmapped).
    fn refocus(&mut self, exclude: Option<ToplevelId>) {
        if self.seat.lock_active() {
            self.deactivate_focused();
            self.seat.keyboard_focus = self
                .seat
                .lock_surface
                .map(|(object, surface)| KeyboardFocus::LockSurface { object, surface });
            return;
        }
        if let Some((object, surface)) = self.seat.exclusive_layer {
            self.deactivate_focused();
            self.seat.keyboard_focus = Some(KeyboardFocus::LayerSurface { object, surface });
            return;
        }
        let toplevels = &self.toplevels;
        let mapped = |t: ToplevelId| toplevels.get(&t).map_or(false, |e| e.toplevel.is_mapped());
        let ws = exclude
            .and_then(|t| toplevels.get(&t))
            .map(|e| e.workspace);
        let candidate = ws
            .and_then(|ws| self.workspaces.get(&ws))
            .and_then(|w| {
                w.order
                    .iter()
                    .copied()
                    .find(|&t| Some(t) != exclude && mapped(t))
            })
            .or_else(|| self.seat.mru_candidate(exclude, mapped));
        match candidate {
            Some(t) => {
                self.focus_toplevel(t);
            }
            None => {
                self.deactivate_focused();
                self.seat.keyboard_focus = None;
            }
        }
    }

    /// Engage the session lock with its surface; it takes keyboard focus
    /// unconditionally and holds it until unlock.
    pub fn lock_session(&mut self, surface: SurfaceId) -> ObjectId {
        self.deactivate_focused();
        let object = self.objects.create(
            &mut self.scene,
            self.overlay_layer,
            ObjectKind::LockOutput,
            OwnerRef::Surface(surface),
        );
        self.seat.set_lock_active(true);
        self.seat.lock_surface = Some((object, surface));
        self.seat.keyboard_focus = Some(KeyboardFocus::LockSurface { object, surface });
        object
    }

    pub fn unlock_session(&mut self) {
        if let Some((object, _)) = self.seat.lock_surface {
            self.objects.destroy(&mut self.scene, object);
        }
        self.seat.set_lock_active(false);
        self.seat.keyboard_focus = None;
        self.refocus(None);
    }

    /// Grant or revoke exclusive keyboard interactivity to a layer
    /// surface. Revoking returns focus to the MRU toplevel.
    pub fn set_exclusive_layer(&mut self, layer: Option<(ObjectId, SurfaceId)>) {
        self.seat.exclusive_layer = layer;
        self.refocus(None);
    }

    // ---- pointer --------------------------------------------------------

    pub fn object_at(&self, x: i32, y: i32) -> Option<ObjectId> {
        self.objects.hit_test(&self.scene, x, y)
    }

    pub fn toplevel_at(&self, x: i32, y: i32) -> Option<ToplevelId> {
        let object = self.object_at(x, y)?;
        match self.objects.get(object)?.owner {
            OwnerRef::Toplevel(id) => Some(id),
            _ => None,
        }
    }

    /// Pointer motion: while a grab is active the motion drives it and the
    /// hovered surface sees nothing; otherwise focus-follows-mouse applies
    /// if configured.
    pub fn pointer_motion(&mut self, x: f64, y: f64) {
        self.seat.pointer_position = (x, y);
        match self.seat.pointer_mode {
            PointerMode::Move(grab) => {
                let rect = grab.geometry_at(x, y);
                self.apply_move(grab.toplevel, rect);
            }
            PointerMode::Resize(grab) => {
                let rect = grab.geometry_at(x, y);
                self.propose_floating(grab.toplevel, rect);
            }
            PointerMode::Passthrough => {
                if self.config.focus.focus_follows_mouse {
                    if let Some(t) = self.toplevel_at(x as i32, y as i32) {
                        self.focus_toplevel(t);
                    }
                }
            }
        }
    }

    /// A move changes position only, so it applies immediately with no
    /// configure round-trip.
    fn apply_move(&mut self, id: ToplevelId, rect: Rect) {
        let Some(entry) = self.toplevels.get_mut(&id) else {
            return;
        };
        entry.toplevel.current.rect = rect;
        entry.toplevel.pending.rect = rect;
        let object = entry.object;
        if let Some(node) = self.objects.get(object).map(|o| o.node) {
            self.scene.set_position(node, rect.x, rect.y);
        }
    }

    pub fn pointer_button(&mut self, pressed: bool) {
        if !pressed {
            self.seat.end_grab();
        }
    }

    /// Start an interactive move of a floating toplevel from the current
    /// pointer position.
    pub fn begin_move(&mut self, id: ToplevelId) -> bool {
        let Some(entry) = self.toplevels.get(&id) else {
            return false;
        };
        if entry.toplevel.is_tiled() || entry.toplevel.fullscreen || !entry.toplevel.is_mapped() {
            return false;
        }
        self.seat.pointer_mode = PointerMode::Move(MoveGrab {
            toplevel: id,
            start_pointer: self.seat.pointer_position,
            start_geometry: entry.toplevel.current.rect,
        });
        debug!("move grab on {:?}", id);
        true
    }

    /// Start an interactive resize of a floating toplevel by `edges`.
    pub fn begin_resize(&mut self, id: ToplevelId, edges: ResizeEdges) -> bool {
        let Some(entry) = self.toplevels.get(&id) else {
            return false;
        };
        if entry.toplevel.is_tiled() || entry.toplevel.fullscreen || !entry.toplevel.is_mapped() {
            return false;
        }
        self.seat.pointer_mode = PointerMode::Resize(ResizeGrab {
            toplevel: id,
            edges,
            start_pointer: self.seat.pointer_position,
            start_geometry: entry.toplevel.current.rect,
        });
        debug!("resize grab on {:?} ({:?})", id, edges);
        true
    }

    // ---- animation ------------------------------------------------------

    fn start_map_fade(&mut self, id: ToplevelId) {
        if !self.config.animation.enabled {
            return;
        }
        let curve = EasingCurve::from_name(&self.config.animation.curve);
        let duration = self.config.animation.duration_ms;
        if let Some(entry) = self.toplevels.get_mut(&id) {
            entry.toplevel.effects.opacity = 0.0;
        }
        let anim = self.animations.start(
            duration,
            curve,
            move |shell: &mut Shell, progress| {
                if let Some(e) = shell.toplevels.get_mut(&id) {
                    e.toplevel.effects.opacity = progress;
                }
            },
            move |shell: &mut Shell, _cancelled| {
                if let Some(e) = shell.toplevels.get_mut(&id) {
                    e.toplevel.effects.opacity = 1.0;
                }
                shell.fades.remove(&id);
            },
        );
        self.fades.insert(id, anim);
    }

    /// Register an arbitrary animation client against the shell.
    pub fn animation_start<U, D>(
        &mut self,
        duration_ms: u32,
        easing: EasingCurve,
        update: U,
        done: D,
    ) -> AnimationId
    where
        U: FnMut(&mut Shell, f32) + 'static,
        D: FnOnce(&mut Shell, bool) + 'static,
    {
        self.animations.start(duration_ms, easing, update, done)
    }

    pub fn animation_cancel(&mut self, id: AnimationId) -> bool {
        animation::cancel(self, Self::animations_mut, id)
    }

    /// Queue an arbitrary transaction against the shell.
    pub fn transaction_add<F>(&mut self, op: F) -> TransactionId
    where
        F: FnMut(&mut Shell, RunReason) -> bool + 'static,
    {
        self.transactions.add(op)
    }

    pub fn transaction_run_now(&mut self, id: TransactionId) -> bool {
        transaction::run_now(self, Self::transactions_mut, id)
    }

    // ---- timers and event loop ------------------------------------------

    /// Run one transaction sweep. Exposed so callers driving the shell
    /// without the event loop (tests, nested compositors) can pump it.
    pub fn sweep_transactions(&mut self) -> usize {
        transaction::sweep(self, Self::transactions_mut)
    }

    /// Advance every animation by one tick of the fastest active output's
    /// refresh interval.
    pub fn tick_animations(&mut self) -> usize {
        let interval = self.outputs.refresh_interval();
        animation::tick(self, Self::animations_mut, interval)
    }

    fn fire_timers(&mut self) {
        let now = Instant::now();
        if self.transactions.deadline().is_some_and(|d| d <= now) {
            self.sweep_transactions();
        }
        if self.animations.deadline().is_some_and(|d| d <= now) {
            self.tick_animations();
        }
        self.recompose();
    }

    /// Next internal timer deadline, if either queue is armed.
    fn next_deadline(&self) -> Option<Instant> {
        [self.transactions.deadline(), self.animations.deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Drive the shell until [`Shell::stop`]. Backend event sources are
    /// registered on the loop by the embedding layer; the internal timers
    /// fold into the dispatch timeout, so an idle shell parks in poll.
    pub fn run(mut self) -> Result<()> {
        let mut event_loop: EventLoop<'_, Shell> =
            EventLoop::try_new().context("failed to create event loop")?;
        info!("shell running");
        while self.running {
            self.fire_timers();
            let timeout = self
                .next_deadline()
                .map(|d| d.saturating_duration_since(Instant::now()));
            event_loop
                .dispatch(timeout, &mut self)
                .context("event loop dispatch failed")?;
        }
        info!("shell stopped");
        Ok(())
    }
}
