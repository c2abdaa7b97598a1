//! Demo server: a page, a redirect, an AJAX endpoint and a failing panel.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{Html, Json, Redirect};
use axum::routing::get;
use debugbar::config::env_bool;
use debugbar::{
    BarConfig, DebugBar, MemorySessionStore, Panel, PanelError, RequestBar, RequestInfo, session_middleware,
};
use tower_http::trace::TraceLayer;

/// Always fails; shows how the bar isolates broken panels.
struct BrokenPanel;

impl Panel for BrokenPanel {
    fn tab(&self, cx: &RequestInfo) -> Result<String, PanelError> {
        if cx.uri.contains("panic") {
            panic!("panel panicked on purpose");
        }
        Err(PanelError::render("this panel always fails\nsee the second line"))
    }

    fn panel(&self, _cx: &RequestInfo) -> Result<String, PanelError> {
        Ok(String::new())
    }
}

const PAGE: &str = r#"<!doctype html>
<html>
<head><title>debugbar demo</title></head>
<body>
<h1>debugbar demo</h1>
<ul>
<li><a href="/redirect">follow a redirect</a></li>
<li><a href="/async">async loader</a></li>
<li><a href="/?panic=1">panicking panel</a></li>
<li><button id="ajax">AJAX call</button> <button id="fail">failing AJAX call</button></li>
</ul>
<pre id="out"></pre>
<script>
document.getElementById('ajax').onclick = function () {
	fetch('/api/data').then(function (r) { return r.json(); }).then(function (d) {
		document.getElementById('out').textContent = JSON.stringify(d);
	});
};
document.getElementById('fail').onclick = function () { fetch('/api/fail'); };
</script>
</body>
</html>
"#;

async fn index() -> Html<&'static str> {
    Html(PAGE)
}

async fn async_page(bar: RequestBar) -> Result<Html<String>, StatusCode> {
    let loader = bar.render_loader().map_err(|e| {
        tracing::warn!(error = %e, "debug bar loader unavailable");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Html(format!("<!doctype html><html><body><h1>async loader</h1>{loader}</body></html>")))
}

async fn redirect() -> Redirect {
    Redirect::to("/")
}

async fn data() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "items": [1, 2, 3] }))
}

async fn fail() -> (StatusCode, Html<&'static str>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Internal Server Error</h1><p>demo failure</p>"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let routes = Router::new()
        .route("/", get(index))
        .route("/async", get(async_page))
        .route("/redirect", get(redirect))
        .route("/api/data", get(data))
        .route("/api/fail", get(fail));

    let routes = if env_bool("DEBUG_BAR_ENABLED").unwrap_or(true) {
        let bar = DebugBar::with_default_panels(BarConfig::from_env()).expect("debug bar init failed");
        bar.add_panel(Arc::new(BrokenPanel), None);
        tracing::info!(panels = ?bar.panel_ids(), "debug bar enabled");
        bar.wrap(routes)
    } else {
        tracing::info!("debug bar disabled");
        routes
    };

    let app = routes
        .layer(axum::middleware::from_fn_with_state(MemorySessionStore::new(), session_middleware))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "debugbar demo listening");
    axum::serve(listener, app).await.expect("server failed");
}
