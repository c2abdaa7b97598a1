//! Built-in request summary panel.

use std::fmt::Write;

use super::{Panel, RequestInfo};
use crate::error::PanelError;
use crate::html::escape_html;

/// Shows method, URI, status and handler time for the current request.
#[derive(Debug, Default, Clone, Copy)]
pub struct InfoPanel;

impl Panel for InfoPanel {
    fn tab(&self, cx: &RequestInfo) -> Result<String, PanelError> {
        let millis = cx.elapsed.as_secs_f64() * 1000.0;
        let mut tab = String::new();
        write!(tab, "<span title=\"Handler time\">{millis:.1} ms</span>")?;
        if let Some(status) = cx.status {
            write!(tab, " <span class=\"debug-bar-label\">{status}</span>")?;
        }
        Ok(tab)
    }

    fn panel(&self, cx: &RequestInfo) -> Result<String, PanelError> {
        let mut rows = Vec::with_capacity(5);
        rows.push(("Method", escape_html(&cx.method)));
        rows.push(("URI", escape_html(&cx.uri)));
        rows.push((
            "Status",
            cx.status.map_or_else(|| "-".to_owned(), |s| s.to_string()),
        ));
        rows.push(("Handler time", format!("{:.3} ms", cx.elapsed.as_secs_f64() * 1000.0)));
        rows.push(("Session", if cx.has_session { "active" } else { "none" }.to_owned()));
        if let Some(ajax_id) = &cx.ajax_id {
            rows.push(("AJAX id", escape_html(ajax_id)));
        }

        let mut html = String::from("<h1>Request</h1><div class=\"debug-bar-inner\"><table>");
        for (label, value) in rows {
            write!(html, "<tr><th>{label}</th><td>{value}</td></tr>")?;
        }
        html.push_str("</table></div>");
        Ok(html)
    }
}
