//! Debug bar for axum applications.
//!
//! SYSTEM CONTEXT
//! ==============
//! Panels contribute a tab and a body for every request. The bar renders
//! them, relays the markup through the user's session when it cannot be
//! shown in the same response (AJAX calls, redirects, async loaders), and
//! serves its own script bundle and content over `?_debug_bar=` requests.
//!
//! ```no_run
//! use axum::{Router, routing::get};
//! use debugbar::{BarConfig, DebugBar, MemorySessionStore, session_middleware};
//!
//! # fn build() -> Result<Router, debugbar::BarError> {
//! let bar = DebugBar::with_default_panels(BarConfig::from_env())?;
//! let app = bar
//!     .wrap(Router::new().route("/", get(|| async { "hi" })))
//!     .layer(axum::middleware::from_fn_with_state(MemorySessionStore::new(), session_middleware));
//! # Ok(app)
//! # }
//! ```

pub mod assets;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod html;
pub mod loader;
pub mod panel;
pub mod relay;
pub mod render;
pub mod session;
pub mod state;

pub use config::BarConfig;
pub use dispatch::{RequestBar, debug_bar_middleware};
pub use error::{BarError, ErrorCode, PanelError};
pub use panel::{Panel, PanelRegistry, RequestInfo};
pub use relay::{Payload, Relay};
pub use session::{MemorySessionStore, Session, SessionData, SessionHandle, session_middleware};
pub use state::DebugBar;
