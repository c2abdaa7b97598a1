//! Bootstrap markup and the client-side payload wire format.
//!
//! Content travels to the browser as one executable statement,
//! `DebugBar.<Target>.<method>(<json>);`. The JSON is produced by
//! `serde_json`, which leaves `/` and non-ASCII characters unescaped;
//! byte sources are decoded lossily before they get here, so encoding
//! never fails.

use rand::Rng;
use serde_json::Value;

use crate::html::{escape_html, escape_inline_script};
use crate::session::bytes_to_hex;

/// Query parameter selecting asset and content requests.
pub const QUERY_PARAM: &str = "_debug_bar";

/// Global object the bundled script defines.
pub const JS_NAMESPACE: &str = "DebugBar";

/// Fresh content id: 10 lowercase hex chars.
#[must_use]
pub fn create_id() -> String {
    let bytes: [u8; 5] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Fresh CSP nonce for inline scripts.
#[must_use]
pub fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Extract the first `'nonce-…'` source from a `Content-Security-Policy`
/// header value.
#[must_use]
pub fn nonce_from_csp(policy: &str) -> Option<String> {
    let start = policy.find("'nonce-")? + "'nonce-".len();
    let rest = &policy[start..];
    let end = rest.find('\'')?;
    let nonce = &rest[..end];
    (!nonce.is_empty()).then(|| nonce.to_owned())
}

/// JSON for the client. Never fails; an unserializable value becomes `null`.
#[must_use]
pub fn encode_payload(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_owned())
}

/// `DebugBar.<target>.<method>(<json>);`
#[must_use]
pub fn payload_call(target: &str, method: &str, value: &Value) -> String {
    format!("{JS_NAMESPACE}.{target}.{method}({});", encode_payload(value))
}

/// `uri` with a separator ready for one more query parameter.
fn base_url(uri: &str) -> String {
    let sep = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{sep}")
}

/// Script URL for a content request.
#[must_use]
pub fn content_url(uri: &str, content_id: &str, ajax: bool) -> String {
    let variant = if ajax { "content-ajax" } else { "content" };
    format!("{}{QUERY_PARAM}={variant}.{content_id}", base_url(uri))
}

/// Script URL for the asset bundle.
#[must_use]
pub fn asset_url(uri: &str) -> String {
    format!("{}{QUERY_PARAM}=js&v={}", base_url(uri), env!("CARGO_PKG_VERSION"))
}

/// Loader that fetches its content asynchronously through a content request.
#[must_use]
pub fn async_loader(uri: &str, content_id: &str, nonce: &str) -> String {
    format!(
        "<script src=\"{}\" data-id=\"{}\" nonce=\"{}\" async></script>",
        escape_html(&content_url(uri, content_id, false)),
        escape_html(content_id),
        escape_html(nonce),
    )
}

/// Loader with the bar markup embedded inline; no extra round trip.
#[must_use]
pub fn inline_loader(uri: &str, content_id: &str, nonce: &str, content: &str) -> String {
    let nonce = escape_html(nonce);
    let init = payload_call("Debug", "init", &Value::String(content.to_owned()));
    format!(
        "<!-- Debug Bar -->\n<script src=\"{}\" data-id=\"{}\" nonce=\"{nonce}\"></script>\n<script nonce=\"{nonce}\">\n{}\n</script>\n",
        escape_html(&asset_url(uri)),
        escape_html(content_id),
        escape_inline_script(&init),
    )
}

/// Insert `snippet` before the last `</body>` (ASCII case-insensitive), or
/// append it. The page bytes are copied as-is, whatever their charset.
#[must_use]
pub fn inject_before_body_end(html: &[u8], snippet: &str) -> Vec<u8> {
    const BODY_END: &[u8] = b"</body>";
    let pos = html
        .windows(BODY_END.len())
        .rposition(|window| window.eq_ignore_ascii_case(BODY_END))
        .unwrap_or(html.len());

    let mut out = Vec::with_capacity(html.len() + snippet.len());
    out.extend_from_slice(&html[..pos]);
    out.extend_from_slice(snippet.as_bytes());
    out.extend_from_slice(&html[pos..]);
    out
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
