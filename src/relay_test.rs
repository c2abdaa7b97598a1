use serde_json::json;

use super::*;
use crate::session::SessionData;

const T0: u64 = 1_700_000_000;

fn relay() -> Relay {
    Relay::new(10, Duration::from_secs(60))
}

fn partial(tag: &str) -> BarPartial {
    BarPartial { bar: format!("<li>{tag}</li>"), panels: format!("<div>{tag}</div>") }
}

fn stored(session: &SessionData) -> RelayState {
    load(session)
}

// =============================================================================
// trim_and_expire
// =============================================================================

#[test]
fn trim_caps_queue_at_capacity_keeping_newest() {
    let relay = relay();
    let mut session = SessionData::new();
    for i in 0..15 {
        relay.store_bar_at(&mut session, &format!("id{i}"), Payload::Markup(i.to_string()), T0);
    }
    assert_eq!(stored(&session).bar.len(), 15);

    relay.trim_and_expire_at(&mut session, QueueName::Bar, T0);
    let keys: Vec<String> = stored(&session).bar.into_iter().map(|e| e.key).collect();
    assert_eq!(keys.len(), 10);
    assert_eq!(keys.first().map(String::as_str), Some("id5"));
    assert_eq!(keys.last().map(String::as_str), Some("id14"));
}

#[test]
fn trim_drops_entries_at_or_past_ttl() {
    let relay = relay();
    let mut session = SessionData::new();
    relay.store_bar_at(&mut session, "old", Payload::Markup("o".into()), T0);
    relay.store_bar_at(&mut session, "edge", Payload::Markup("e".into()), T0 + 1);
    relay.store_bar_at(&mut session, "new", Payload::Markup("n".into()), T0 + 30);

    relay.trim_all_at(&mut session, T0 + 61);
    let state = stored(&session);
    let keys: Vec<&str> = state.bar.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, ["new"]);
    for entry in &state.bar {
        assert!(T0 + 61 - entry.time < 60);
    }
}

#[test]
fn trim_all_touches_every_queue() {
    let relay = Relay::new(2, Duration::from_secs(60));
    let mut session = SessionData::new();
    for i in 0..4 {
        relay.store_bar_at(&mut session, &format!("b{i}"), Payload::Markup(String::new()), T0);
        relay.store_bluescreen_at(&mut session, &format!("s{i}"), Payload::Opaque(json!(i)), T0);
    }
    relay.trim_all_at(&mut session, T0);
    let state = stored(&session);
    assert_eq!(state.bar.len(), 2);
    assert_eq!(state.bluescreen.len(), 2);
    assert!(state.redirect.is_empty());
}

#[test]
fn trim_on_empty_session_does_not_create_state() {
    let relay = relay();
    let mut session = SessionData::new();
    relay.trim_all_at(&mut session, T0);
    assert!(session.is_empty());
}

// =============================================================================
// store / consume
// =============================================================================

#[test]
fn consume_bar_is_read_once() {
    let relay = relay();
    let mut session = SessionData::new();
    let content = Payload::Partial(partial("a"));
    relay.store_bar_at(&mut session, "abc", content.clone(), T0);

    assert_eq!(relay.consume_bar_at(&mut session, "abc", T0 + 1), Some(content));
    assert_eq!(relay.consume_bar_at(&mut session, "abc", T0 + 1), None);
}

#[test]
fn consume_bluescreen_is_read_once() {
    let relay = relay();
    let mut session = SessionData::new();
    relay.store_bluescreen_at(&mut session, "err1", Payload::Opaque(json!({"html": "<h1>500</h1>"})), T0);

    assert!(relay.consume_bluescreen_at(&mut session, "err1", T0).is_some());
    assert!(relay.consume_bluescreen_at(&mut session, "err1", T0).is_none());
}

#[test]
fn consume_missing_id_is_none() {
    let relay = relay();
    let mut session = SessionData::new();
    assert_eq!(relay.consume_bar_at(&mut session, "nope", T0), None);
    assert!(session.is_empty());
}

#[test]
fn consume_expired_entry_is_none_and_removed() {
    let relay = relay();
    let mut session = SessionData::new();
    relay.store_bar_at(&mut session, "late", Payload::Markup("x".into()), T0);

    assert_eq!(relay.consume_bar_at(&mut session, "late", T0 + 60), None);
    assert!(stored(&session).bar.is_empty());
}

#[test]
fn store_bar_replaces_same_id() {
    let relay = relay();
    let mut session = SessionData::new();
    relay.store_bar_at(&mut session, "k", Payload::Markup("first".into()), T0);
    relay.store_bar_at(&mut session, "other", Payload::Markup("o".into()), T0);
    relay.store_bar_at(&mut session, "k", Payload::Markup("second".into()), T0);

    let state = stored(&session);
    assert_eq!(state.bar.len(), 2);
    assert_eq!(state.bar[1].key, "k");
    assert_eq!(relay.consume_bar_at(&mut session, "k", T0), Some(Payload::Markup("second".into())));
}

#[test]
fn bar_and_bluescreen_ids_are_independent() {
    let relay = relay();
    let mut session = SessionData::new();
    relay.store_bar_at(&mut session, "same", Payload::Markup("bar".into()), T0);
    relay.store_bluescreen_at(&mut session, "same", Payload::Markup("blue".into()), T0);

    assert_eq!(relay.consume_bluescreen_at(&mut session, "same", T0), Some(Payload::Markup("blue".into())));
    assert_eq!(relay.consume_bar_at(&mut session, "same", T0), Some(Payload::Markup("bar".into())));
}

// =============================================================================
// redirect queue
// =============================================================================

#[test]
fn drain_returns_newest_first_and_empties_queue() {
    let relay = relay();
    let mut session = SessionData::new();
    for i in 0..3 {
        relay.append_redirect_at(&mut session, partial(&format!("hop{i}")), T0);
    }
    assert_eq!(relay.redirect_len(&session), 3);

    let drained = relay.drain_redirects_at(&mut session, T0);
    assert_eq!(
        drained,
        vec![Payload::Partial(partial("hop2")), Payload::Partial(partial("hop1")), Payload::Partial(partial("hop0"))]
    );
    assert_eq!(relay.redirect_len(&session), 0);
    assert!(relay.drain_redirects_at(&mut session, T0).is_empty());
}

#[test]
fn append_beyond_capacity_keeps_last_ten() {
    let relay = relay();
    let mut session = SessionData::new();
    for i in 0..13 {
        let len = relay.append_redirect_at(&mut session, partial(&i.to_string()), T0);
        assert!(len <= 10);
    }

    let drained = relay.drain_redirects_at(&mut session, T0);
    assert_eq!(drained.len(), 10);
    assert_eq!(drained.first(), Some(&Payload::Partial(partial("12"))));
    assert_eq!(drained.last(), Some(&Payload::Partial(partial("3"))));
}

#[test]
fn redirect_keys_stay_unique_after_eviction() {
    let relay = Relay::new(2, Duration::from_secs(60));
    let mut session = SessionData::new();
    for i in 0..5 {
        relay.append_redirect_at(&mut session, partial(&i.to_string()), T0);
    }
    let keys: Vec<String> = stored(&session).redirect.into_iter().map(|e| e.key).collect();
    assert_eq!(keys, ["3", "4"]);
}

#[test]
fn drain_skips_expired_hops() {
    let relay = relay();
    let mut session = SessionData::new();
    relay.append_redirect_at(&mut session, partial("stale"), T0);
    relay.append_redirect_at(&mut session, partial("fresh"), T0 + 50);

    let drained = relay.drain_redirects_at(&mut session, T0 + 70);
    assert_eq!(drained, vec![Payload::Partial(partial("fresh"))]);
    assert_eq!(relay.redirect_len(&session), 0);
}

// =============================================================================
// session state handling
// =============================================================================

#[test]
fn corrupt_state_is_discarded() {
    let relay = relay();
    let mut session = SessionData::new();
    session.insert(SESSION_KEY, json!("not a relay state"));

    assert_eq!(relay.consume_bar_at(&mut session, "x", T0), None);
    relay.store_bar_at(&mut session, "x", Payload::Markup("ok".into()), T0);
    assert_eq!(relay.consume_bar_at(&mut session, "x", T0), Some(Payload::Markup("ok".into())));
}

#[test]
fn state_lives_under_one_session_key() {
    let relay = relay();
    let mut session = SessionData::new();
    relay.store_bar_at(&mut session, "abc", Payload::Markup("m".into()), T0);
    let raw = session.get(SESSION_KEY).unwrap();
    assert_eq!(raw["bar"][0]["key"], "abc");
    assert_eq!(raw["bar"][0]["content"]["kind"], "markup");
    assert_eq!(raw["bar"][0]["time"], T0);
}

#[test]
fn payload_to_json_shapes() {
    assert_eq!(
        Payload::Partial(partial("p")).to_json(),
        json!({"bar": "<li>p</li>", "panels": "<div>p</div>"})
    );
    assert_eq!(Payload::Markup("<div/>".into()).to_json(), json!("<div/>"));
    assert_eq!(Payload::Opaque(json!([1, 2])).to_json(), json!([1, 2]));
}

#[test]
fn zero_capacity_is_clamped_to_one() {
    let relay = Relay::new(0, Duration::from_secs(60));
    let mut session = SessionData::new();
    relay.append_redirect_at(&mut session, partial("a"), T0);
    relay.append_redirect_at(&mut session, partial("b"), T0);
    assert_eq!(relay.drain_redirects_at(&mut session, T0), vec![Payload::Partial(partial("b"))]);
}
