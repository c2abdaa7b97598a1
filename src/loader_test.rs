use serde_json::json;

use super::*;

#[test]
fn create_id_is_ten_hex_chars() {
    let id = create_id();
    assert_eq!(id.len(), 10);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(create_id(), id);
}

#[test]
fn nonce_from_csp_finds_first_nonce() {
    let policy = "default-src 'self'; script-src 'nonce-abc123' 'nonce-zzz' 'strict-dynamic'";
    assert_eq!(nonce_from_csp(policy).as_deref(), Some("abc123"));
    assert_eq!(nonce_from_csp("script-src 'self'"), None);
    assert_eq!(nonce_from_csp("script-src 'nonce-'"), None);
    assert_eq!(nonce_from_csp("script-src 'nonce-unterminated"), None);
}

#[test]
fn payload_call_wire_format() {
    assert_eq!(
        payload_call("Debug", "loadAjax", &json!({"bar": "<li>x</li>"})),
        r#"DebugBar.Debug.loadAjax({"bar":"<li>x</li>"});"#
    );
    assert_eq!(payload_call("BlueScreen", "loadAjax", &json!("ok")), r#"DebugBar.BlueScreen.loadAjax("ok");"#);
}

#[test]
fn encode_payload_keeps_slashes_and_unicode() {
    assert_eq!(encode_payload(&json!("a/b ž")), r#""a/b ž""#);
}

#[test]
fn urls_pick_the_right_separator() {
    assert_eq!(content_url("/page", "0123456789", false), "/page?_debug_bar=content.0123456789");
    assert_eq!(content_url("/page?x=1", "abc", true), "/page?x=1&_debug_bar=content-ajax.abc");
    assert!(asset_url("/").starts_with("/?_debug_bar=js&v="));
}

#[test]
fn async_loader_carries_id_and_nonce() {
    let html = async_loader("/p?a=1", "deadbeef00", "n0nce");
    assert_eq!(
        html,
        "<script src=\"/p?a=1&amp;_debug_bar=content.deadbeef00\" data-id=\"deadbeef00\" nonce=\"n0nce\" async></script>"
    );
}

#[test]
fn inline_loader_embeds_content_safely() {
    let html = inline_loader("/", "id1", "n", "<div id=debug-bar></div><script>x</script>");
    assert!(html.contains("nonce=\"n\""));
    assert!(html.contains("DebugBar.Debug.init("));
    assert!(html.contains("<\\/script>"));
    assert!(!html.contains("x</script>"));
    assert_eq!(html.matches("</script>").count(), 2);
}

#[test]
fn inject_before_last_body_close() {
    assert_eq!(
        inject_before_body_end(b"<body>a</BODY>tail</body>", "X"),
        b"<body>a</BODY>tailX</body>"
    );
    assert_eq!(inject_before_body_end(b"<body>a</BODY>", "X"), b"<body>aX</BODY>");
    assert_eq!(inject_before_body_end(b"fragment", "X"), b"fragmentX");
    assert_eq!(inject_before_body_end(b"", "X"), b"X");
}

#[test]
fn inject_keeps_non_utf8_page_bytes() {
    let page: &[u8] = b"<html><body>\x9e\xe8\xb9</body></html>";
    let out = inject_before_body_end(page, "<script>\u{17e}</script>");
    let mut expected = b"<html><body>\x9e\xe8\xb9".to_vec();
    expected.extend_from_slice("<script>\u{17e}</script>".as_bytes());
    expected.extend_from_slice(b"</body></html>");
    assert_eq!(out, expected);
}
