//! Toplevel windows
//!
//! A toplevel is a client's top-level window, independent of the protocol
//! family it arrived through. The core never inspects backend-specific
//! state: everything window-system-specific goes through the
//! [`ToplevelBackend`] operation table, implemented once per protocol
//! family (XDG shell, XWayland). A headless implementation stands in where
//! no real adapter is wired up.

use std::cell::Cell;
use std::rc::Rc;

use log::{debug, trace};

use crate::scene::Rect;
use crate::shell::WorkspaceId;

/// Stable handle to a toplevel. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToplevelId(pub u64);

/// Handle to a backend surface, used for keyboard focus bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Monotonically issued identifier correlating a configure with the
/// client's acknowledgement of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Serial(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilingMode {
    Floating,
    Tiled,
}

/// Map-state half of the toplevel lifecycle. Tiling mode and fullscreen
/// are orthogonal flags layered on `Mapped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    Unmapped,
    Mapped,
    Destroyed,
}

/// Size constraints reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Constraints {
    pub min_width: Option<i32>,
    pub min_height: Option<i32>,
    pub max_width: Option<i32>,
    pub max_height: Option<i32>,
}

impl Constraints {
    /// A window whose minimum equals its maximum on either axis cannot be
    /// meaningfully tiled.
    pub fn fixed_size(&self) -> bool {
        (self.min_width.is_some() && self.min_width == self.max_width)
            || (self.min_height.is_some() && self.min_height == self.max_height)
    }

    pub fn clamp(&self, width: i32, height: i32) -> (i32, i32) {
        let mut w = width;
        let mut h = height;
        if let Some(min) = self.min_width {
            w = w.max(min);
        }
        if let Some(min) = self.min_height {
            h = h.max(min);
        }
        if let Some(max) = self.max_width {
            w = w.min(max);
        }
        if let Some(max) = self.max_height {
            h = h.min(max);
        }
        (w, h)
    }
}

/// Geometry plus the workspace it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometryState {
    pub rect: Rect,
    pub workspace: Option<WorkspaceId>,
}

/// Per-toplevel visual effect parameters, mutated by animation clients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    pub opacity: f32,
    pub corner_radius: i32,
    pub shadow: bool,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            corner_radius: 0,
            shadow: true,
        }
    }
}

/// The backend operation table: the seam where XDG-shell- or
/// XWayland-specific code plugs in.
pub trait ToplevelBackend {
    fn geometry(&self) -> Rect;
    fn constraints(&self) -> Constraints;
    fn surface(&self) -> SurfaceId;
    fn title(&self) -> String;
    fn app_id(&self) -> String;
    fn pid(&self) -> i32;
    /// Size-constrained windows, or any window with a parent, are forced
    /// floating.
    fn always_floating(&self) -> bool;
    /// Propose a geometry to the client; returns the serial the client
    /// must acknowledge.
    fn configure(&mut self, rect: Rect) -> Serial;
    fn set_activated(&mut self, activated: bool);
    fn set_fullscreen(&mut self, fullscreen: bool);
    fn set_tiled(&mut self, tiled: bool);
    fn close(&mut self);
    /// Whether the client has acknowledged up to `serial`, i.e. a
    /// transaction waiting on it may commit.
    fn should_run_transaction(&self, serial: Serial) -> bool;
}

/// A client window, polymorphic over its backend.
pub struct Toplevel {
    pub id: ToplevelId,
    pub backend: Box<dyn ToplevelBackend>,
    pub state: MapState,
    pub tiling_mode: TilingMode,
    pub fullscreen: bool,
    /// Committed geometry.
    pub current: GeometryState,
    /// Proposed geometry, not yet committed.
    pub pending: GeometryState,
    /// Pre-fullscreen snapshot, for restore.
    pub saved: Option<GeometryState>,
    pub pid: i32,
    title: String,
    app_id: String,
    pub effects: EffectParams,
    pub decorated: bool,
}

impl Toplevel {
    pub fn new(id: ToplevelId, backend: Box<dyn ToplevelBackend>) -> Self {
        let title = backend.title();
        let app_id = backend.app_id();
        let pid = backend.pid();
        debug!("toplevel {:?} created (\"{}\", pid {})", id, title, pid);
        Self {
            id,
            backend,
            state: MapState::Unmapped,
            tiling_mode: TilingMode::Floating,
            fullscreen: false,
            current: GeometryState::default(),
            pending: GeometryState::default(),
            saved: None,
            pid,
            title,
            app_id,
            effects: EffectParams::default(),
            decorated: true,
        }
    }

    /// Cached title; empty once the toplevel is being destroyed.
    pub fn title(&self) -> &str {
        if self.state == MapState::Destroyed {
            ""
        } else {
            &self.title
        }
    }

    /// Cached app id (window class); empty once destroyed.
    pub fn app_id(&self) -> &str {
        if self.state == MapState::Destroyed {
            ""
        } else {
            &self.app_id
        }
    }

    /// Refresh caches from the backend (title/app-id change events).
    pub fn refresh_identity(&mut self) {
        if self.state == MapState::Destroyed {
            return;
        }
        self.title = self.backend.title();
        self.app_id = self.backend.app_id();
    }

    pub fn is_mapped(&self) -> bool {
        self.state == MapState::Mapped
    }

    pub fn is_tiled(&self) -> bool {
        self.tiling_mode == TilingMode::Tiled
    }

    /// Whether this window may be tiled at all: fixed-size clients and
    /// windows with a parent are forced floating.
    pub fn forced_floating(&self) -> bool {
        self.backend.always_floating() || self.backend.constraints().fixed_size()
    }

    /// Propose a new geometry through the backend, recording it as pending
    /// and returning the configure serial to wait on.
    pub fn propose_geometry(&mut self, rect: Rect, workspace: Option<WorkspaceId>) -> Serial {
        let (width, height) = self.backend.constraints().clamp(rect.width, rect.height);
        let rect = Rect::new(rect.x, rect.y, width, height);
        self.pending = GeometryState { rect, workspace };
        let serial = self.backend.configure(rect);
        trace!(
            "toplevel {:?} configured to {}x{}{:+}{:+} (serial {:?})",
            self.id,
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            serial
        );
        serial
    }

    /// Commit the pending geometry as current.
    pub fn commit_pending(&mut self) {
        self.current = self.pending;
    }
}

/// Minimal fallback backend used when no protocol adapter is wired up:
/// headless runs, demos, and tests. Serial state is shared with any
/// [`HeadlessHandle`], so acknowledgement can be simulated after the boxed
/// backend has been handed off.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    pub surface: SurfaceId,
    pub title: String,
    pub app_id: String,
    pub pid: i32,
    pub geometry: Rect,
    pub constraints: Constraints,
    pub parent: Option<SurfaceId>,
    pub activated: bool,
    pub fullscreen: bool,
    pub tiled: bool,
    pub closed: bool,
    serials: Rc<HeadlessSerials>,
}

#[derive(Debug, Default)]
struct HeadlessSerials {
    next: Cell<u32>,
    acked: Cell<u32>,
}

/// Cloneable view onto a [`HeadlessBackend`]'s serial state, playing the
/// client's role.
#[derive(Debug, Clone)]
pub struct HeadlessHandle {
    serials: Rc<HeadlessSerials>,
}

impl HeadlessHandle {
    /// Acknowledge a configure.
    pub fn ack(&self, serial: Serial) {
        let acked = self.serials.acked.get();
        self.serials.acked.set(acked.max(serial.0));
    }

    /// Acknowledge everything issued so far.
    pub fn ack_all(&self) {
        self.serials.acked.set(self.serials.next.get());
    }

    pub fn last_serial(&self) -> Serial {
        Serial(self.serials.next.get())
    }
}

impl HeadlessBackend {
    pub fn new(surface: SurfaceId, title: &str) -> Self {
        Self {
            surface,
            title: title.to_string(),
            app_id: String::new(),
            pid: 0,
            geometry: Rect::new(0, 0, 800, 600),
            constraints: Constraints::default(),
            parent: None,
            activated: false,
            fullscreen: false,
            tiled: false,
            closed: false,
            serials: Rc::new(HeadlessSerials::default()),
        }
    }

    pub fn handle(&self) -> HeadlessHandle {
        HeadlessHandle {
            serials: Rc::clone(&self.serials),
        }
    }

    /// Simulate the client acknowledging a configure.
    pub fn ack(&mut self, serial: Serial) {
        self.handle().ack(serial);
    }

    /// Simulate the client acknowledging everything issued so far.
    pub fn ack_all(&mut self) {
        self.handle().ack_all();
    }

    pub fn last_serial(&self) -> Serial {
        self.handle().last_serial()
    }
}

impl ToplevelBackend for HeadlessBackend {
    fn geometry(&self) -> Rect {
        self.geometry
    }

    fn constraints(&self) -> Constraints {
        self.constraints
    }

    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn app_id(&self) -> String {
        self.app_id.clone()
    }

    fn pid(&self) -> i32 {
        self.pid
    }

    fn always_floating(&self) -> bool {
        self.parent.is_some()
    }

    fn configure(&mut self, rect: Rect) -> Serial {
        self.geometry = rect;
        let next = self.serials.next.get() + 1;
        self.serials.next.set(next);
        Serial(next)
    }

    fn set_activated(&mut self, activated: bool) {
        self.activated = activated;
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }

    fn set_tiled(&mut self, tiled: bool) {
        self.tiled = tiled;
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn should_run_transaction(&self, serial: Serial) -> bool {
        self.serials.acked.get() >= serial.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toplevel(id: u64) -> Toplevel {
        let backend = HeadlessBackend::new(SurfaceId(id), "term");
        Toplevel::new(ToplevelId(id), Box::new(backend))
    }

    #[test]
    fn identity_is_cached_and_guarded() {
        let mut top = toplevel(1);
        assert_eq!(top.title(), "term");
        top.state = MapState::Destroyed;
        assert_eq!(top.title(), "");
        assert_eq!(top.app_id(), "");
    }

    #[test]
    fn propose_geometry_clamps_to_constraints() {
        let mut top = toplevel(1);
        let mut backend = HeadlessBackend::new(SurfaceId(1), "term");
        backend.constraints.min_width = Some(400);
        backend.constraints.max_height = Some(500);
        top.backend = Box::new(backend);

        let serial = top.propose_geometry(Rect::new(0, 0, 100, 900), None);
        assert_eq!(serial, Serial(1));
        assert_eq!(top.pending.rect.width, 400);
        assert_eq!(top.pending.rect.height, 500);

        // Pending becomes current only on commit.
        assert_eq!(top.current.rect, Rect::default());
        top.commit_pending();
        assert_eq!(top.current.rect.width, 400);
    }

    #[test]
    fn fixed_size_clients_are_forced_floating() {
        let mut top = toplevel(1);
        assert!(!top.forced_floating());

        let mut backend = HeadlessBackend::new(SurfaceId(1), "dialog");
        backend.constraints.min_width = Some(320);
        backend.constraints.max_width = Some(320);
        top.backend = Box::new(backend);
        assert!(top.forced_floating());
    }

    #[test]
    fn child_windows_are_forced_floating() {
        let mut top = toplevel(1);
        let mut backend = HeadlessBackend::new(SurfaceId(2), "popup");
        backend.parent = Some(SurfaceId(1));
        top.backend = Box::new(backend);
        assert!(top.forced_floating());
    }

    #[test]
    fn headless_backend_tracks_acknowledgement() {
        let mut backend = HeadlessBackend::new(SurfaceId(1), "term");
        let serial = backend.configure(Rect::new(0, 0, 640, 480));
        assert!(!backend.should_run_transaction(serial));
        backend.ack(serial);
        assert!(backend.should_run_transaction(serial));

        // Older serials stay acknowledged after newer configures.
        let newer = backend.configure(Rect::new(0, 0, 800, 600));
        assert!(backend.should_run_transaction(serial));
        assert!(!backend.should_run_transaction(newer));
    }
}
