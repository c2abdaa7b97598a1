//! Error types for the debug bar.
//!
//! DESIGN
//! ======
//! Two families. `PanelError` is what a panel hands back when it cannot
//! render; the renderer swallows it into an error fragment and it never
//! leaves a render pass. `BarError` covers host-facing failures: usage
//! errors (no session) and infrastructure failures (asset files, body
//! buffering).

use std::path::PathBuf;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured log fields.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

// =============================================================================
// BAR ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BarError {
    /// The bootstrap loader was requested on a request without a session.
    #[error("start a session before the debug bar is enabled")]
    SessionNotStarted,

    /// A configured custom asset file could not be read.
    #[error("failed to read asset {}: {source}", path.display())]
    Asset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The response body could not be read for rewriting.
    #[error("response body read failed: {0}")]
    Body(String),

    /// The response body exceeds the rewrite limit.
    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

impl ErrorCode for BarError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SessionNotStarted => "E_SESSION_NOT_STARTED",
            Self::Asset { .. } => "E_ASSET",
            Self::Body(_) => "E_BODY",
            Self::BodyTooLarge { .. } => "E_BODY_TOO_LARGE",
        }
    }
}

// =============================================================================
// PANEL ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// The panel reported a failure of its own.
    #[error("{0}")]
    Render(String),

    /// Writing into the panel's output buffer failed.
    #[error("formatting failed: {0}")]
    Fmt(#[from] std::fmt::Error),

    /// The panel panicked while rendering.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl PanelError {
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }
}

impl ErrorCode for PanelError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Render(_) => "E_PANEL_RENDER",
            Self::Fmt(_) => "E_PANEL_FMT",
            Self::Panicked(_) => "E_PANEL_PANIC",
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
