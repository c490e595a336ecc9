//! Seat state: keyboard focus arbitration and interactive grabs
//!
//! Keyboard focus priority, highest first: the session-lock surface (while
//! a lock is active nothing else may receive focus), then an exclusive
//! layer-shell surface, then the most-recently-used toplevel. The focus
//! operations that touch the scene graph and toplevel backends live on the
//! shell; this module owns the seat-local state they arbitrate over, plus
//! the geometry math for interactive move/resize grabs.

use log::debug;

use crate::object::ObjectId;
use crate::scene::Rect;
use crate::toplevel::{SurfaceId, ToplevelId};

/// What currently holds keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardFocus {
    LockSurface { object: ObjectId, surface: SurfaceId },
    LayerSurface { object: ObjectId, surface: SurfaceId },
    Toplevel { id: ToplevelId, surface: SurfaceId },
}

impl KeyboardFocus {
    pub fn surface(&self) -> SurfaceId {
        match *self {
            Self::LockSurface { surface, .. }
            | Self::LayerSurface { surface, .. }
            | Self::Toplevel { surface, .. } => surface,
        }
    }
}

/// Edges initiating an interactive resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeEdges {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveGrab {
    pub toplevel: ToplevelId,
    pub start_pointer: (f64, f64),
    pub start_geometry: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeGrab {
    pub toplevel: ToplevelId,
    pub edges: ResizeEdges,
    pub start_pointer: (f64, f64),
    pub start_geometry: Rect,
}

/// Two-state grab overlay on top of normal dispatch: while a grab is
/// active, pointer motion recomputes geometry directly instead of going to
/// the hovered surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PointerMode {
    #[default]
    Passthrough,
    Move(MoveGrab),
    Resize(ResizeGrab),
}

impl MoveGrab {
    /// Geometry for the grabbed toplevel at the given pointer position:
    /// the initial cursor offset into the window is preserved.
    pub fn geometry_at(&self, x: f64, y: f64) -> Rect {
        let dx = (x - self.start_pointer.0).round() as i32;
        let dy = (y - self.start_pointer.1).round() as i32;
        Rect::new(
            self.start_geometry.x + dx,
            self.start_geometry.y + dy,
            self.start_geometry.width,
            self.start_geometry.height,
        )
    }
}

impl ResizeGrab {
    /// Geometry for the grabbed toplevel at the given pointer position.
    /// Only the initiating edges move; the opposite edges stay anchored.
    pub fn geometry_at(&self, x: f64, y: f64) -> Rect {
        let dx = (x - self.start_pointer.0).round() as i32;
        let dy = (y - self.start_pointer.1).round() as i32;
        let g = self.start_geometry;

        let mut rect = g;
        if self.edges.left {
            let width = (g.width - dx).max(1);
            rect.x = g.x + (g.width - width);
            rect.width = width;
        } else if self.edges.right {
            rect.width = (g.width + dx).max(1);
        }
        if self.edges.top {
            let height = (g.height - dy).max(1);
            rect.y = g.y + (g.height - height);
            rect.height = height;
        } else if self.edges.bottom {
            rect.height = (g.height + dy).max(1);
        }
        rect
    }
}

/// Per-seat focus and grab state.
pub struct Seat {
    pub keyboard_focus: Option<KeyboardFocus>,
    /// Global most-recently-used order, head first.
    mru: Vec<ToplevelId>,
    /// Active session lock surface; while set, nothing else may focus.
    pub lock_surface: Option<(ObjectId, SurfaceId)>,
    lock_active: bool,
    /// Layer-shell surface holding exclusive keyboard interactivity.
    pub exclusive_layer: Option<(ObjectId, SurfaceId)>,
    pub pointer_mode: PointerMode,
    pub pointer_position: (f64, f64),
}

impl Seat {
    pub fn new() -> Self {
        Self {
            keyboard_focus: None,
            mru: Vec::new(),
            lock_surface: None,
            lock_active: false,
            exclusive_layer: None,
            pointer_mode: PointerMode::Passthrough,
            pointer_position: (0.0, 0.0),
        }
    }

    pub fn lock_active(&self) -> bool {
        self.lock_active
    }

    pub fn set_lock_active(&mut self, active: bool) {
        self.lock_active = active;
        if !active {
            self.lock_surface = None;
        }
        debug!("session lock {}", if active { "engaged" } else { "released" });
    }

    /// Whether a focus request for something other than the lock surface
    /// may be honored right now.
    pub fn may_focus_regular(&self) -> bool {
        !self.lock_active
    }

    /// Move a toplevel to the head of the MRU order.
    pub fn mru_promote(&mut self, id: ToplevelId) {
        self.mru.retain(|&t| t != id);
        self.mru.insert(0, id);
    }

    pub fn mru_remove(&mut self, id: ToplevelId) {
        self.mru.retain(|&t| t != id);
    }

    /// Most-recently-used toplevel, skipping `exclude` and anything the
    /// filter rejects (unmapped, other workspace).
    pub fn mru_candidate<F>(&self, exclude: Option<ToplevelId>, mut eligible: F) -> Option<ToplevelId>
    where
        F: FnMut(ToplevelId) -> bool,
    {
        self.mru
            .iter()
            .copied()
            .find(|&id| Some(id) != exclude && eligible(id))
    }

    pub fn mru_order(&self) -> &[ToplevelId] {
        &self.mru
    }

    pub fn focused_toplevel(&self) -> Option<ToplevelId> {
        match self.keyboard_focus {
            Some(KeyboardFocus::Toplevel { id, .. }) => Some(id),
            _ => None,
        }
    }

    /// Any button release ends a grab unconditionally.
    pub fn end_grab(&mut self) {
        if self.pointer_mode != PointerMode::Passthrough {
            debug!("pointer grab ended");
            self.pointer_mode = PointerMode::Passthrough;
        }
    }
}

impl Default for Seat {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mru_promote_moves_to_head() {
        let mut seat = Seat::new();
        seat.mru_promote(ToplevelId(1));
        seat.mru_promote(ToplevelId(2));
        seat.mru_promote(ToplevelId(3));
        assert_eq!(seat.mru_order(), &[ToplevelId(3), ToplevelId(2), ToplevelId(1)]);

        seat.mru_promote(ToplevelId(1));
        assert_eq!(seat.mru_order(), &[ToplevelId(1), ToplevelId(3), ToplevelId(2)]);
    }

    #[test]
    fn mru_candidate_excludes_and_filters() {
        let mut seat = Seat::new();
        for id in [1, 2, 3] {
            seat.mru_promote(ToplevelId(id));
        }
        // Head is 3; excluded, so 2 wins.
        let next = seat.mru_candidate(Some(ToplevelId(3)), |_| true);
        assert_eq!(next, Some(ToplevelId(2)));

        // Filter can reject candidates too.
        let next = seat.mru_candidate(Some(ToplevelId(3)), |id| id != ToplevelId(2));
        assert_eq!(next, Some(ToplevelId(1)));

        // The excluded toplevel is never returned even when it is the only
        // entry left.
        seat.mru_remove(ToplevelId(1));
        seat.mru_remove(ToplevelId(2));
        let next = seat.mru_candidate(Some(ToplevelId(3)), |_| true);
        assert_eq!(next, None);
    }

    #[test]
    fn move_grab_preserves_cursor_offset() {
        let grab = MoveGrab {
            toplevel: ToplevelId(1),
            start_pointer: (150.0, 120.0),
            start_geometry: Rect::new(100, 100, 640, 480),
        };
        assert_eq!(grab.geometry_at(150.0, 120.0), Rect::new(100, 100, 640, 480));
        assert_eq!(grab.geometry_at(180.0, 90.0), Rect::new(130, 70, 640, 480));
    }

    #[test]
    fn resize_grab_anchors_opposite_edges() {
        let grab = ResizeGrab {
            toplevel: ToplevelId(1),
            edges: ResizeEdges {
                right: true,
                bottom: true,
                ..Default::default()
            },
            start_pointer: (740.0, 580.0),
            start_geometry: Rect::new(100, 100, 640, 480),
        };
        let rect = grab.geometry_at(800.0, 600.0);
        assert_eq!(rect, Rect::new(100, 100, 700, 500));

        let grab = ResizeGrab {
            edges: ResizeEdges {
                left: true,
                top: true,
                ..Default::default()
            },
            ..grab
        };
        let rect = grab.geometry_at(760.0, 560.0);
        // Left/top edges move; right/bottom stay anchored at 740/580.
        assert_eq!(rect, Rect::new(120, 80, 620, 500));
    }

    #[test]
    fn resize_never_collapses_below_one_pixel() {
        let grab = ResizeGrab {
            toplevel: ToplevelId(1),
            edges: ResizeEdges {
                right: true,
                ..Default::default()
            },
            start_pointer: (740.0, 580.0),
            start_geometry: Rect::new(100, 100, 640, 480),
        };
        let rect = grab.geometry_at(-2000.0, 580.0);
        assert_eq!(rect.width, 1);
    }

    #[test]
    fn lock_gates_regular_focus() {
        let mut seat = Seat::new();
        assert!(seat.may_focus_regular());
        seat.set_lock_active(true);
        assert!(!seat.may_focus_regular());
        seat.set_lock_active(false);
        assert!(seat.may_focus_regular());
        assert!(seat.lock_surface.is_none());
    }

    #[test]
    fn button_release_always_returns_to_passthrough() {
        let mut seat = Seat::new();
        seat.pointer_mode = PointerMode::Move(MoveGrab {
            toplevel: ToplevelId(1),
            start_pointer: (0.0, 0.0),
            start_geometry: Rect::new(0, 0, 100, 100),
        });
        seat.end_grab();
        assert_eq!(seat.pointer_mode, PointerMode::Passthrough);
        seat.end_grab();
        assert_eq!(seat.pointer_mode, PointerMode::Passthrough);
    }
}
