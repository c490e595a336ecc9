//! Output boundary
//!
//! The output subsystem proper (modesetting, hotplug) lives outside this
//! core; what the core consumes is each output's usable area for tiling and
//! its refresh interval for animation timing, plus a fallback output when a
//! workspace's own output goes away.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};

use crate::scene::Rect;

/// Refresh interval used when no real output is active (60 Hz equivalent).
pub const FALLBACK_REFRESH: Duration = Duration::from_micros(16_667);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub u64);

#[derive(Debug, Clone)]
pub struct Output {
    pub id: OutputId,
    pub name: String,
    /// Full output area in layout coordinates.
    pub area: Rect,
    /// Area left over after layer-shell exclusive zones.
    pub usable_area: Rect,
    /// Refresh rate in millihertz, as reported on the wire.
    pub refresh_mhz: i32,
    pub active: bool,
}

impl Output {
    pub fn refresh_interval(&self) -> Duration {
        if self.refresh_mhz <= 0 {
            return FALLBACK_REFRESH;
        }
        Duration::from_secs_f64(1000.0 / self.refresh_mhz as f64)
    }
}

/// Registry of known outputs with fallback selection.
pub struct Outputs {
    outputs: HashMap<OutputId, Output>,
    next_id: u64,
}

impl Outputs {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, name: &str, area: Rect, refresh_mhz: i32) -> OutputId {
        let id = OutputId(self.next_id);
        self.next_id += 1;
        debug!(
            "output {} added: {}x{} @ {} mHz",
            name, area.width, area.height, refresh_mhz
        );
        self.outputs.insert(
            id,
            Output {
                id,
                name: name.to_string(),
                area,
                usable_area: area,
                refresh_mhz,
                active: true,
            },
        );
        id
    }

    pub fn remove(&mut self, id: OutputId) {
        if self.outputs.remove(&id).is_none() {
            warn!("removing unknown output {:?}", id);
        }
    }

    pub fn get(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(&id)
    }

    pub fn set_active(&mut self, id: OutputId, active: bool) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.active = active;
        }
    }

    pub fn set_usable_area(&mut self, id: OutputId, usable: Rect) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.usable_area = usable;
        }
    }

    /// Resolve an output reference, falling back to the designated fallback
    /// output when the referenced one is missing or disabled.
    pub fn resolve(&self, id: Option<OutputId>) -> Option<&Output> {
        if let Some(output) = id.and_then(|id| self.outputs.get(&id)) {
            if output.active {
                return Some(output);
            }
        }
        self.fallback()
    }

    /// The designated fallback: the lowest-id active output.
    pub fn fallback(&self) -> Option<&Output> {
        self.outputs
            .values()
            .filter(|o| o.active)
            .min_by_key(|o| o.id)
    }

    /// Refresh interval of the fastest active output, or the 60 Hz fallback
    /// when nothing is active.
    pub fn refresh_interval(&self) -> Duration {
        self.outputs
            .values()
            .filter(|o| o.active && o.refresh_mhz > 0)
            .map(|o| o.refresh_interval())
            .min()
            .unwrap_or(FALLBACK_REFRESH)
    }
}

impl Default for Outputs {
    fn default() -> Self {
        Self::new()
    }
}
