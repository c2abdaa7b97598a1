//! Shared debug bar state.
//!
//! DESIGN
//! ======
//! `DebugBar` is injected into the middleware via `from_fn_with_state`.
//! It holds the panel registry, the relay policy and the prebuilt asset
//! bundle. Clone is required by Axum; everything lives behind one `Arc`.
//!
//! Panels may be added after the bar is shared. The registry sits behind a
//! `std::sync::RwLock` because rendering is synchronous and never holds the
//! lock across an await point.

use std::sync::{Arc, PoisonError, RwLock};

use axum::Router;

use crate::assets::AssetBundle;
use crate::config::BarConfig;
use crate::dispatch::debug_bar_middleware;
use crate::error::BarError;
use crate::panel::info::InfoPanel;
use crate::panel::{Panel, PanelRegistry, RequestInfo};
use crate::relay::Relay;
use crate::render::{BarPartial, PassKind, render_partial};

struct Inner {
    config: BarConfig,
    relay: Relay,
    assets: AssetBundle,
    registry: RwLock<PanelRegistry>,
}

#[derive(Clone)]
pub struct DebugBar {
    inner: Arc<Inner>,
}

impl DebugBar {
    /// Build a bar with no panels.
    ///
    /// # Errors
    ///
    /// Returns `BarError::Asset` if a configured custom CSS/JS file cannot
    /// be read.
    pub fn new(config: BarConfig) -> Result<Self, BarError> {
        let assets = AssetBundle::load(&config)?;
        let relay = Relay::from_config(&config);
        Ok(Self {
            inner: Arc::new(Inner { config, relay, assets, registry: RwLock::new(PanelRegistry::new()) }),
        })
    }

    /// Build a bar with the built-in request panel registered.
    ///
    /// # Errors
    ///
    /// See [`DebugBar::new`].
    pub fn with_default_panels(config: BarConfig) -> Result<Self, BarError> {
        let bar = Self::new(config)?;
        bar.add_panel(Arc::new(InfoPanel), Some("info"));
        Ok(bar)
    }

    /// Register a panel; see [`PanelRegistry::add_panel`] for id rules.
    pub fn add_panel(&self, panel: Arc<dyn Panel>, id: Option<&str>) -> String {
        let mut registry = self.inner.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.add_panel(panel, id)
    }

    /// Ids of the registered panels, in render order.
    #[must_use]
    pub fn panel_ids(&self) -> Vec<String> {
        let registry = self.inner.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.iter().map(|entry| entry.id.clone()).collect()
    }

    /// Run one render pass over the current registry.
    #[must_use]
    pub fn render(&self, cx: &RequestInfo, kind: PassKind, suffix: &str) -> BarPartial {
        let registry = self.inner.registry.read().unwrap_or_else(PoisonError::into_inner);
        render_partial(&registry, cx, kind, suffix)
    }

    /// Wrap `router` in the debug bar middleware.
    ///
    /// The router must also carry a session layer outside this one
    /// (e.g. `session_middleware`) for the bar to be active.
    pub fn wrap<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(axum::middleware::from_fn_with_state(self.clone(), debug_bar_middleware))
    }

    #[must_use]
    pub fn config(&self) -> &BarConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn relay(&self) -> &Relay {
        &self.inner.relay
    }

    #[must_use]
    pub fn assets(&self) -> &AssetBundle {
        &self.inner.assets
    }
}

impl std::fmt::Debug for DebugBar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugBar")
            .field("config", &self.inner.config)
            .field("panels", &self.panel_ids())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
