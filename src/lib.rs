//! # Velum Compositor Core Library
//!
//! The window-management core of a tiling Wayland compositor: object model,
//! binary-tree tiling, transactional geometry application, and timer-driven
//! animations, independent of any particular protocol backend or renderer.
//!
//! ## Architecture
//!
//! Velum is built on a modular architecture:
//! - `shell`: orchestrator owning all subsystems and the event loop
//! - `scene`: scene-graph boundary and the ordered signal primitive
//! - `object`: typed handles unifying everything hit-testable or focusable
//! - `toplevel`: client windows behind the backend operation table
//! - `tiling`: binary-tree layout engine
//! - `transaction`: two-phase geometry application with bounded retries
//! - `animation`: shared timer-driven interpolation engine
//! - `seat`: keyboard focus arbitration and interactive grabs
//! - `output`: usable areas and refresh timing
//! - `config`: configuration parsing and validation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use velum::{Config, Shell};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let shell = Shell::new(config);
//!     shell.run()
//! }
//! ```

pub mod animation;
pub mod config;
pub mod logging;
pub mod object;
pub mod output;
pub mod scene;
pub mod seat;
pub mod shell;
pub mod tiling;
pub mod toplevel;
pub mod transaction;

// Re-export main types for easy access
pub use config::Config;
pub use object::{ObjectId, ObjectKind, ObjectRegistry};
pub use scene::{Rect, Scene};
pub use shell::{Shell, Workspace, WorkspaceId};
pub use toplevel::{Toplevel, ToplevelBackend, ToplevelId};

// Re-export common error types
pub use anyhow::{Context, Error, Result};

/// Version information for Velum
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
