//! Panel renderer: turns the registry into tab/body fragments and markup.
//!
//! DESIGN
//! ======
//! Every panel call runs inside `catch_unwind`, and its output is an owned
//! value that only reaches the fragment list when the whole panel succeeded.
//! A failing panel (error or panic) therefore leaves nothing half-written
//! behind; it is replaced by a synthetic `error-` fragment and the pass
//! moves on to the next panel.
//!
//! While a pass runs, `PanicBridge` marks the thread so the process panic
//! hook reports panel panics through `tracing` instead of stderr. The mark
//! is cleared in `Drop`, so it is restored even if the pass unwinds.

use std::any::Any;
use std::cell::Cell;
use std::fmt::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Once;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ErrorCode, PanelError};
use crate::html::{escape_html, nl2br, sanitize_id};
use crate::panel::{Panel, PanelEntry, PanelRegistry, RequestInfo};

// =============================================================================
// TYPES
// =============================================================================

/// One panel's contribution to a render pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedFragment {
    /// HTML-safe DOM id, including the pass suffix.
    pub id: String,
    pub tab: String,
    /// `None` when the tab was blank.
    pub panel: Option<String>,
}

/// Markup of one render pass: the tab strip and the panel bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarPartial {
    pub bar: String,
    pub panels: String,
}

impl BarPartial {
    /// Append another pass's markup after this one.
    pub fn extend(&mut self, other: &BarPartial) {
        self.bar.push_str(&other.bar);
        self.panels.push_str(&other.panels);
    }
}

/// Which kind of response a pass renders for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Main,
    Ajax,
    Redirect,
}

impl PassKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Ajax => "ajax",
            Self::Redirect => "redirect",
        }
    }
}

// =============================================================================
// PANIC BRIDGE
// =============================================================================

thread_local! {
    static RENDERING_PANELS: Cell<bool> = const { Cell::new(false) };
}

static INSTALL_HOOK: Once = Once::new();

/// Scoped marker routing panel panics to `tracing` for the current thread.
struct PanicBridge {
    previous: bool,
}

impl PanicBridge {
    fn enter() -> Self {
        INSTALL_HOOK.call_once(|| {
            let fallback = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                if RENDERING_PANELS.with(Cell::get) {
                    debug!(panic = %info, "panic inside debug bar panel");
                } else {
                    fallback(info);
                }
            }));
        });
        let previous = RENDERING_PANELS.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for PanicBridge {
    fn drop(&mut self) {
        RENDERING_PANELS.with(|flag| flag.set(self.previous));
    }
}

// =============================================================================
// RENDERING
// =============================================================================

/// Render every registered panel, in registration order.
///
/// `suffix` is appended to each sanitized id so fragments relayed from
/// AJAX calls or redirect hops never collide with the page's own DOM ids.
#[must_use]
pub fn render_panels(registry: &PanelRegistry, cx: &RequestInfo, suffix: &str) -> Vec<RenderedFragment> {
    let _bridge = PanicBridge::enter();
    registry
        .iter()
        .map(|entry| render_entry(entry, cx, suffix))
        .collect()
}

fn render_entry(entry: &PanelEntry, cx: &RequestInfo, suffix: &str) -> RenderedFragment {
    let id_html = format!("{}{suffix}", sanitize_id(&entry.id));
    match invoke_isolated(entry.panel.as_ref(), cx) {
        Ok((tab, panel)) => RenderedFragment { id: id_html, tab, panel },
        Err(err) => {
            warn!(panel = %entry.id, code = err.error_code(), error = %err, "debug bar panel failed");
            error_fragment(&entry.id, &id_html, &err)
        }
    }
}

fn invoke_isolated(panel: &dyn Panel, cx: &RequestInfo) -> Result<(String, Option<String>), PanelError> {
    catch_unwind(AssertUnwindSafe(|| invoke(panel, cx)))
        .unwrap_or_else(|payload| Err(PanelError::Panicked(panic_message(&*payload))))
}

fn invoke(panel: &dyn Panel, cx: &RequestInfo) -> Result<(String, Option<String>), PanelError> {
    let tab = panel.tab(cx)?;
    if tab.trim().is_empty() {
        return Ok((String::new(), None));
    }
    let body = panel.panel(cx)?;
    Ok((tab, Some(body)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

fn error_fragment(id: &str, id_html: &str, err: &PanelError) -> RenderedFragment {
    let id_escaped = escape_html(id);
    let detail = nl2br(&escape_html(&format!("{}: {err}", err.error_code())));
    RenderedFragment {
        id: format!("error-{id_html}"),
        tab: format!("Error in {id_escaped}"),
        panel: Some(format!(
            "<h1>Error: {id_escaped}</h1><div class='debug-bar-inner'>{detail}</div>"
        )),
    }
}

// =============================================================================
// MARKUP
// =============================================================================

/// Render all panels and assemble the tab strip and panel bodies.
#[must_use]
pub fn render_partial(registry: &PanelRegistry, cx: &RequestInfo, kind: PassKind, suffix: &str) -> BarPartial {
    let fragments = render_panels(registry, cx, suffix);
    BarPartial { bar: bar_markup(&fragments, kind), panels: panels_markup(&fragments, kind) }
}

/// Full page markup: the bar container followed by the panel bodies.
#[must_use]
pub fn wrap_bar(partial: &BarPartial) -> String {
    format!("<div id=debug-bar>{}</div>{}", partial.bar, partial.panels)
}

fn bar_markup(fragments: &[RenderedFragment], kind: PassKind) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write!(out, "<ul class=\"debug-bar-row\" data-debug-bar-group=\"{}\">", kind.as_str());
    match kind {
        PassKind::Main => out.push_str("<li id=\"debug-bar-logo\" title=\"Debug bar\">&#9881;</li>"),
        PassKind::Ajax => out.push_str("<li class=\"debug-bar-label\">ajax</li>"),
        PassKind::Redirect => out.push_str("<li class=\"debug-bar-label\">redirect</li>"),
    }
    for fragment in fragments.iter().filter(|f| !f.tab.is_empty()) {
        let tab = fragment.tab.trim();
        if fragment.panel.is_some() {
            let _ = write!(out, "<li><a href=\"#\" rel=\"debug-bar-panel-{}\">{tab}</a></li>", fragment.id);
        } else {
            let _ = write!(out, "<li><span>{tab}</span></li>");
        }
    }
    if kind == PassKind::Main {
        out.push_str("<li><a href=\"#\" data-debug-bar-action=\"close\" title=\"close debug bar\">&times;</a></li>");
    }
    out.push_str("</ul>");
    out
}

fn panels_markup(fragments: &[RenderedFragment], kind: PassKind) -> String {
    let persist = if kind == PassKind::Ajax { "" } else { " debug-bar-panel-persist" };
    let mut out = String::new();
    for fragment in fragments {
        let Some(body) = &fragment.panel else {
            continue;
        };
        let _ = write!(
            out,
            "<div class=\"debug-bar-panel{persist}\" id=\"debug-bar-panel-{}\">{body}</div>",
            fragment.id
        );
    }
    out
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
