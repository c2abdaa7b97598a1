//! Transport dispatcher: the middleware that decides, per request, how
//! debug bar content travels to the browser.
//!
//! ARCHITECTURE
//! ============
//! Incoming side, before the host handler runs:
//! 1. `?_debug_bar=js` is an asset request, answered from the bundle.
//! 2. Without a session the bar is inactive and the request passes through.
//! 3. `?_debug_bar=content[-ajax].<id>` is a content request, answered from
//!    the relay.
//!
//! Outgoing side, after the handler, at most one of (first match wins):
//! - AJAX (valid `X-Debug-Bar-Ajax` request header): render, store under
//!   the client's id, and store a bluescreen too if the response is a 5xx.
//! - Redirect (3xx with `Location`): render and queue the hop.
//! - HTML: render, splice queued redirect hops ahead of it (oldest first),
//!   then either store for a loader the handler already emitted or inject
//!   an inline loader.
//!
//! TRADE-OFFS
//! ==========
//! Rewriting a body means buffering it. Bodies announced larger than
//! `max_body_bytes` are passed through untouched. A streamed body that
//! turns out larger, or fails mid-read, is handed back as the bytes read
//! so far chained with the rest of the stream, so the host page always
//! reaches the browser as the handler produced it. The splice itself is
//! byte-level; the page's charset is never reinterpreted.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::Instant;

use axum::body::{Body, BodyDataStream, Bytes, HttpBody};
use axum::extract::{FromRequestParts, Query, Request, State};
use axum::http::header::{
    CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_SECURITY_POLICY, CONTENT_TYPE, LOCATION, PRAGMA,
    SET_COOKIE,
};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use regex::Regex;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{BarError, ErrorCode};
use crate::loader::{
    QUERY_PARAM, async_loader, create_id, generate_nonce, inject_before_body_end, inline_loader, nonce_from_csp,
    payload_call,
};
use crate::panel::RequestInfo;
use crate::relay::Payload;
use crate::render::{BarPartial, PassKind, wrap_bar};
use crate::session::{Session, SessionHandle};
use crate::state::DebugBar;

/// Request header carrying the client's AJAX correlation id, and the
/// response header confirming content was stored for it.
pub const AJAX_HEADER: &str = "x-debug-bar-ajax";

const JS_CONTENT_TYPE: &str = "application/javascript; charset=UTF-8";

static AJAX_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{10,15}$").expect("valid regex"));
static CONTENT_REQUEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^content(-ajax)?\.([A-Za-z0-9_]+)$").expect("valid regex"));

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// What the request asks of the debug bar itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Asset,
    Content { ajax: bool, id: String },
    /// Anything else; the host handler runs.
    Page,
}

#[must_use]
pub fn classify_request(uri: &Uri) -> Incoming {
    let Ok(Query(params)) = Query::<HashMap<String, String>>::try_from_uri(uri) else {
        return Incoming::Page;
    };
    let Some(value) = params.get(QUERY_PARAM) else {
        return Incoming::Page;
    };
    if value == "js" {
        return Incoming::Asset;
    }
    match CONTENT_REQUEST.captures(value) {
        Some(caps) => Incoming::Content { ajax: caps.get(1).is_some(), id: caps[2].to_owned() },
        None => Incoming::Page,
    }
}

/// How the finished response is delivered to the bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Ajax(String),
    Redirect,
    Html,
    Other,
}

impl Outgoing {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Ajax(_) => "ajax",
            Self::Redirect => "redirect",
            Self::Html => "html",
            Self::Other => "other",
        }
    }
}

#[must_use]
pub fn classify_response(ajax_id: Option<&str>, method: &Method, status: StatusCode, headers: &HeaderMap) -> Outgoing {
    if let Some(id) = ajax_id {
        return Outgoing::Ajax(id.to_owned());
    }
    if status.is_redirection() && headers.contains_key(LOCATION) {
        return Outgoing::Redirect;
    }
    if *method == Method::HEAD
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
        || headers.contains_key(CONTENT_ENCODING)
    {
        return Outgoing::Other;
    }
    let is_html = headers.get(CONTENT_TYPE).is_none_or(|value| {
        value
            .to_str()
            .is_ok_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
    });
    if is_html { Outgoing::Html } else { Outgoing::Other }
}

/// A well-formed AJAX correlation id from the request headers.
fn ajax_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AJAX_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| AJAX_ID.is_match(value))
        .map(str::to_owned)
}

// =============================================================================
// REQUEST BAR
// =============================================================================

struct RequestBarInner {
    uri: String,
    nonce: String,
    has_session: bool,
    content_id: Mutex<Option<String>>,
}

/// Per-request handle given to host handlers through request extensions.
///
/// Handlers that want the async loader call [`RequestBar::render_loader`]
/// and place the markup in their page; the middleware then stores the
/// bar under the same content id instead of inlining it.
#[derive(Clone)]
pub struct RequestBar {
    inner: Arc<RequestBarInner>,
}

impl RequestBar {
    fn new(uri: String, nonce: String, has_session: bool) -> Self {
        Self { inner: Arc::new(RequestBarInner { uri, nonce, has_session, content_id: Mutex::new(None) }) }
    }

    /// Nonce the bar puts on its script tags. Hosts with a CSP should
    /// allow it.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.inner.nonce
    }

    /// Content id established by `render_loader`, if it was called.
    #[must_use]
    pub fn content_id(&self) -> Option<String> {
        self.inner.content_id.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Bootstrap `<script>` that loads this request's bar asynchronously.
    ///
    /// # Errors
    ///
    /// Returns `BarError::SessionNotStarted` when the request has no
    /// session; the bar cannot relay content without one.
    pub fn render_loader(&self) -> Result<String, BarError> {
        if !self.inner.has_session {
            return Err(BarError::SessionNotStarted);
        }
        let id = {
            let mut slot = self.inner.content_id.lock().unwrap_or_else(PoisonError::into_inner);
            slot.get_or_insert_with(create_id).clone()
        };
        debug!(content_id = %id, "debug bar async loader emitted");
        Ok(async_loader(&self.inner.uri, &id, &self.inner.nonce))
    }
}

impl<S> FromRequestParts<S> for RequestBar
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestBar>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

pub async fn debug_bar_middleware(State(bar): State<DebugBar>, mut req: Request, next: Next) -> Response {
    let incoming = classify_request(req.uri());
    if incoming == Incoming::Asset {
        debug!("debug bar asset request");
        return asset_response(&bar);
    }

    let uri = req.uri().path_and_query().map_or_else(|| req.uri().path().to_owned(), |pq| pq.as_str().to_owned());
    let session = req.extensions().get::<SessionHandle>().cloned();
    let Some(session) = session else {
        debug!(%uri, "no session, debug bar inactive");
        req.extensions_mut().insert(RequestBar::new(uri, generate_nonce(), false));
        return next.run(req).await;
    };

    if let Incoming::Content { ajax, id } = incoming {
        debug!(content_id = %id, ajax, "debug bar content request");
        return content_response(&bar, &session, ajax, &id).await;
    }

    let method = req.method().clone();
    let ajax_id = ajax_id(req.headers());
    let request_bar = RequestBar::new(uri.clone(), generate_nonce(), true);
    req.extensions_mut().insert(request_bar.clone());

    let started = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = started.elapsed();

    if ajax_id.is_some() {
        response.headers_mut().insert(AJAX_HEADER, HeaderValue::from_static("1"));
    }

    let outgoing = classify_response(ajax_id.as_deref(), &method, response.status(), response.headers());
    debug!(%uri, outgoing = outgoing.as_str(), status = response.status().as_u16(), "debug bar response classified");

    let cx = RequestInfo {
        method: method.to_string(),
        uri,
        status: Some(response.status().as_u16()),
        elapsed,
        ajax_id: ajax_id.clone(),
        has_session: true,
    };

    match outgoing {
        Outgoing::Ajax(id) => finish_ajax(&bar, &session, &cx, &id, response).await,
        Outgoing::Redirect => {
            finish_redirect(&bar, &session, &cx).await;
            response
        }
        Outgoing::Html => finish_html(&bar, &session, &cx, &request_bar, response).await,
        Outgoing::Other => response,
    }
}

fn asset_response(bar: &DebugBar) -> Response {
    let mut response = script_response(bar.assets().script().to_owned(), bar.config().asset_max_age_secs);
    response.headers_mut().remove(SET_COOKIE);
    response.headers_mut().remove(PRAGMA);
    response
}

async fn content_response(bar: &DebugBar, session: &SessionHandle, ajax: bool, id: &str) -> Response {
    let mut script = String::new();
    if !ajax {
        script.push_str(bar.assets().script());
    }

    let mut session = session.lock().await;
    let relay = bar.relay();
    if let Some(content) = relay.consume_bar(&mut *session, id) {
        let method = if ajax { "loadAjax" } else { "init" };
        script.push_str(&payload_call("Debug", method, &content.to_json()));
        script.push('\n');
    }
    if let Some(content) = relay.consume_bluescreen(&mut *session, id) {
        script.push_str(&payload_call("BlueScreen", "loadAjax", &content.to_json()));
        script.push('\n');
    }
    drop(session);

    script_response(script, bar.config().content_max_age_secs)
}

fn script_response(body: String, max_age_secs: u64) -> Response {
    (
        [
            (CONTENT_TYPE, JS_CONTENT_TYPE.to_owned()),
            (CACHE_CONTROL, format!("max-age={max_age_secs}")),
        ],
        body,
    )
        .into_response()
}

async fn finish_ajax(bar: &DebugBar, session: &SessionHandle, cx: &RequestInfo, id: &str, response: Response) -> Response {
    let (response, bluescreen) = if response.status().is_server_error() {
        let status = response.status().as_u16();
        let (parts, body) = response.into_parts();
        let (body, html) = match read_body(body, bar.config().max_body_bytes).await {
            Ok(bytes) => {
                let html = String::from_utf8_lossy(&bytes).into_owned();
                (Body::from(bytes), Some(html))
            }
            Err((err, body)) => {
                warn!(code = err.error_code(), error = %err, "debug bar could not capture error page");
                (body, None)
            }
        };
        let bluescreen = Payload::Opaque(json!({ "status": status, "html": html }));
        (Response::from_parts(parts, body), Some(bluescreen))
    } else {
        (response, None)
    };

    let partial = bar.render(cx, PassKind::Ajax, &format!("-ajax:{id}"));
    let mut session = session.lock().await;
    let relay = bar.relay();
    relay.trim_all(&mut *session);
    relay.store_bar(&mut *session, id, Payload::Partial(partial));
    if let Some(content) = bluescreen {
        relay.store_bluescreen(&mut *session, id, content);
    }
    response
}

async fn finish_redirect(bar: &DebugBar, session: &SessionHandle, cx: &RequestInfo) {
    let mut session = session.lock().await;
    let relay = bar.relay();
    relay.trim_all(&mut *session);
    let hop = relay.redirect_len(&*session);
    let partial = bar.render(cx, PassKind::Redirect, &format!("-r{hop}"));
    relay.append_redirect(&mut *session, partial);
}

async fn finish_html(
    bar: &DebugBar,
    session: &SessionHandle,
    cx: &RequestInfo,
    request_bar: &RequestBar,
    response: Response,
) -> Response {
    if let Some(content_id) = request_bar.content_id() {
        let mut session = session.lock().await;
        let content = page_content(bar, &mut *session, cx);
        bar.relay().store_bar(&mut *session, &content_id, Payload::Markup(content));
        debug!(%content_id, "debug bar stored for async loader");
        return response;
    }

    let nonce = response
        .headers()
        .get(CONTENT_SECURITY_POLICY)
        .and_then(|value| value.to_str().ok())
        .and_then(nonce_from_csp)
        .unwrap_or_else(|| request_bar.nonce().to_owned());

    let (mut parts, body) = response.into_parts();
    let bytes = match read_body(body, bar.config().max_body_bytes).await {
        Ok(bytes) => bytes,
        Err((err, body)) => {
            warn!(code = err.error_code(), error = %err, "debug bar skipped page");
            return Response::from_parts(parts, body);
        }
    };

    let content = page_content(bar, &mut *session.lock().await, cx);
    let snippet = inline_loader(&cx.uri, &create_id(), &nonce, &content);
    let html = inject_before_body_end(&bytes, &snippet);
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Queued redirect hops followed by the main pass, as full bar markup.
///
/// Hops drain newest-first and each is spliced ahead of what is already
/// there, so the oldest hop comes first and the current page comes last.
fn page_content<S: Session + ?Sized>(bar: &DebugBar, session: &mut S, cx: &RequestInfo) -> String {
    let relay = bar.relay();
    relay.trim_all(session);
    let main = bar.render(cx, PassKind::Main, "");
    let mut partial = BarPartial::default();
    for hop in relay.drain_redirects(session).into_iter().rev() {
        match hop {
            Payload::Partial(hop) => partial.extend(&hop),
            other => debug!(?other, "ignoring non-partial redirect entry"),
        }
    }
    partial.extend(&main);
    wrap_bar(&partial)
}

/// Buffer a body for rewriting, chunk by chunk, up to `limit` bytes.
///
/// On failure the caller gets back a body that replays exactly what the
/// original would have produced: the bytes read so far, then the chunk or
/// error that stopped the read, then the unread rest.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, (BarError, Body)> {
    let limit_u64 = u64::try_from(limit).unwrap_or(u64::MAX);
    if body.size_hint().lower() > limit_u64 {
        return Err((BarError::BodyTooLarge { limit }, body));
    }

    let mut stream = body.into_data_stream();
    let mut buffered: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) if buffered.len() + bytes.len() > limit => {
                let head = vec![Ok(Bytes::from(buffered)), Ok(bytes)];
                return Err((BarError::BodyTooLarge { limit }, replay(head, stream)));
            }
            Ok(bytes) => buffered.extend_from_slice(&bytes),
            Err(e) => {
                let err = BarError::Body(e.to_string());
                let head = vec![Ok(Bytes::from(buffered)), Err(e)];
                return Err((err, replay(head, stream)));
            }
        }
    }
    Ok(Bytes::from(buffered))
}

fn replay(head: Vec<Result<Bytes, axum::Error>>, rest: BodyDataStream) -> Body {
    Body::from_stream(futures::stream::iter(head).chain(rest))
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
