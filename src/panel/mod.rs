//! Panel capability and registry.
//!
//! ARCHITECTURE
//! ============
//! A panel is anything that can produce a short tab summary and, when the
//! summary is non-blank, a full HTML body. Panels are registered once on the
//! shared `DebugBar` and invoked on every live request with a read-only view
//! of that request (`RequestInfo`).
//!
//! Registration order is render order, so the registry is a `Vec` rather
//! than a map; lookups are linear but registries hold a handful of panels.

pub mod info;

use std::sync::Arc;
use std::time::Duration;

use crate::error::PanelError;

// =============================================================================
// REQUEST INFO
// =============================================================================

/// What a panel may know about the request it is rendering for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: String,
    /// Path and query as received.
    pub uri: String,
    /// Response status, once the host handler has produced one.
    pub status: Option<u16>,
    /// Time spent in the host handler.
    pub elapsed: Duration,
    /// AJAX correlation id, if the request carried one.
    pub ajax_id: Option<String>,
    pub has_session: bool,
}

// =============================================================================
// PANEL
// =============================================================================

/// A diagnostic source shown on the bar.
///
/// Both methods may fail, and may even panic; the renderer isolates either
/// case so one broken panel never blanks the bar.
pub trait Panel: Send + Sync {
    /// Short tab summary (HTML). Blank means "nothing to show this request".
    fn tab(&self, cx: &RequestInfo) -> Result<String, PanelError>;

    /// Full panel body (HTML). Only called when `tab` was non-blank.
    fn panel(&self, cx: &RequestInfo) -> Result<String, PanelError>;

    /// Concrete type name, used to derive a registry id.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Clone)]
pub struct PanelEntry {
    pub id: String,
    pub panel: Arc<dyn Panel>,
}

#[derive(Clone, Default)]
pub struct PanelRegistry {
    entries: Vec<PanelEntry>,
}

impl PanelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a panel and return the id it was stored under.
    ///
    /// Without an explicit id, the id is the panel's short type name, with
    /// `-2`, `-3`, ... appended until it is unused. An explicit id that is
    /// already taken replaces the old panel in place.
    pub fn add_panel(&mut self, panel: Arc<dyn Panel>, id: Option<&str>) -> String {
        let id = match id {
            Some(id) => id.to_owned(),
            None => self.derive_id(short_type_name(panel.type_name())),
        };

        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.panel = panel;
        } else {
            self.entries.push(PanelEntry { id: id.clone(), panel });
        }
        id
    }

    #[must_use]
    pub fn get_panel(&self, id: &str) -> Option<Arc<dyn Panel>> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| Arc::clone(&e.panel))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PanelEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    fn derive_id(&self, base: &str) -> String {
        let mut candidate = base.to_owned();
        let mut n = 1;
        while self.contains(&candidate) {
            n += 1;
            candidate = format!("{base}-{n}");
        }
        candidate
    }
}

/// `my_app::panels::Timer<u8>` -> `Timer`.
pub(crate) fn short_type_name(full: &str) -> &str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
