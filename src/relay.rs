//! Content relay: session-backed queues that carry rendered bar content
//! from the request that produced it to the request that displays it.
//!
//! DESIGN
//! ======
//! Three queues live in the user session under one key:
//! - `bar`: content keyed by content id, fetched by the loader script of a
//!   page or by the client after an AJAX call completes.
//! - `redirect`: an ordered append log of bars from responses that
//!   redirected; the next HTML page drains it and shows them.
//! - `bluescreen`: error pages of failed AJAX calls, keyed like `bar`.
//!
//! Each queue is capped and every entry has a TTL. Eviction happens only
//! when a queue is trimmed: at the start of every render pass, and after a
//! redirect append. There is no background sweep.
//!
//! Consumption is destructive (`take`): a content id delivers at most once,
//! which bounds queue growth and prevents replay.
//!
//! TRADE-OFFS
//! ==========
//! The relay does no locking. Concurrent requests of one user are expected
//! to be serialized by the session store; without that, trims and consumes
//! can lose updates. Corrupt session state is discarded with a warning
//! rather than failing the host response.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::BarConfig;
use crate::render::BarPartial;
use crate::session::Session;

/// Session key holding all relay queues.
pub const SESSION_KEY: &str = "_debug_bar";

// =============================================================================
// TYPES
// =============================================================================

/// Content carried by a queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Bar and panel markup of one pass, merged by the client.
    Partial(BarPartial),
    /// A complete bar for a page.
    Markup(String),
    /// Anything else the client knows how to load.
    Opaque(Value),
}

impl Payload {
    /// The value handed to the client-side loader.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Partial(partial) => serde_json::json!({ "bar": partial.bar, "panels": partial.panels }),
            Self::Markup(html) => Value::String(html.clone()),
            Self::Opaque(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub key: String,
    pub content: Payload,
    /// Unix seconds at which the entry was written.
    pub time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueName {
    Bar,
    Redirect,
    Bluescreen,
}

impl QueueName {
    pub const ALL: [QueueName; 3] = [QueueName::Bar, QueueName::Redirect, QueueName::Bluescreen];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct RelayState {
    #[serde(default)]
    bar: Vec<QueueEntry>,
    #[serde(default)]
    redirect: Vec<QueueEntry>,
    #[serde(default)]
    bluescreen: Vec<QueueEntry>,
}

impl RelayState {
    fn queue_mut(&mut self, name: QueueName) -> &mut Vec<QueueEntry> {
        match name {
            QueueName::Bar => &mut self.bar,
            QueueName::Redirect => &mut self.redirect,
            QueueName::Bluescreen => &mut self.bluescreen,
        }
    }

    fn is_empty(&self) -> bool {
        self.bar.is_empty() && self.redirect.is_empty() && self.bluescreen.is_empty()
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

// =============================================================================
// RELAY
// =============================================================================

/// Eviction policy plus queue operations over a caller-supplied session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relay {
    capacity: usize,
    ttl: Duration,
}

impl Relay {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity: capacity.max(1), ttl }
    }

    #[must_use]
    pub fn from_config(config: &BarConfig) -> Self {
        Self::new(config.queue_capacity, config.entry_ttl)
    }

    fn is_fresh(&self, entry: &QueueEntry, now: u64) -> bool {
        now.saturating_sub(entry.time) < self.ttl.as_secs()
    }

    fn trim(&self, queue: &mut Vec<QueueEntry>, now: u64) {
        if queue.len() > self.capacity {
            let excess = queue.len() - self.capacity;
            queue.drain(..excess);
        }
        queue.retain(|entry| self.is_fresh(entry, now));
    }

    // -------------------------------------------------------------------------
    // trimming
    // -------------------------------------------------------------------------

    /// Keep the newest `capacity` entries of one queue and drop stale ones.
    pub fn trim_and_expire<S: Session + ?Sized>(&self, session: &mut S, queue: QueueName) {
        self.trim_and_expire_at(session, queue, unix_now());
    }

    pub fn trim_and_expire_at<S: Session + ?Sized>(&self, session: &mut S, queue: QueueName, now: u64) {
        self.update(session, |state| self.trim(state.queue_mut(queue), now));
    }

    /// Trim all three queues. Run at the start of every render pass.
    pub fn trim_all<S: Session + ?Sized>(&self, session: &mut S) {
        self.trim_all_at(session, unix_now());
    }

    pub fn trim_all_at<S: Session + ?Sized>(&self, session: &mut S, now: u64) {
        self.update(session, |state| {
            for name in QueueName::ALL {
                self.trim(state.queue_mut(name), now);
            }
        });
    }

    // -------------------------------------------------------------------------
    // writes
    // -------------------------------------------------------------------------

    /// Store content under `content_id`, replacing an older entry with the
    /// same id.
    pub fn store_bar<S: Session + ?Sized>(&self, session: &mut S, content_id: &str, content: Payload) {
        self.store_bar_at(session, content_id, content, unix_now());
    }

    pub fn store_bar_at<S: Session + ?Sized>(&self, session: &mut S, content_id: &str, content: Payload, now: u64) {
        self.store_keyed(session, QueueName::Bar, content_id, content, now);
    }

    /// Store an error page for a failed AJAX call under its correlation id.
    pub fn store_bluescreen<S: Session + ?Sized>(&self, session: &mut S, content_id: &str, content: Payload) {
        self.store_bluescreen_at(session, content_id, content, unix_now());
    }

    pub fn store_bluescreen_at<S: Session + ?Sized>(
        &self,
        session: &mut S,
        content_id: &str,
        content: Payload,
        now: u64,
    ) {
        self.store_keyed(session, QueueName::Bluescreen, content_id, content, now);
    }

    fn store_keyed<S: Session + ?Sized>(
        &self,
        session: &mut S,
        queue: QueueName,
        content_id: &str,
        content: Payload,
        now: u64,
    ) {
        self.update(session, |state| {
            let entries = state.queue_mut(queue);
            entries.retain(|e| e.key != content_id);
            entries.push(QueueEntry { key: content_id.to_owned(), content, time: now });
        });
        debug!(?queue, content_id, "debug bar content stored");
    }

    /// Append a redirect hop's content. Returns the queue length afterwards.
    pub fn append_redirect<S: Session + ?Sized>(&self, session: &mut S, partial: BarPartial) -> usize {
        self.append_redirect_at(session, partial, unix_now())
    }

    pub fn append_redirect_at<S: Session + ?Sized>(&self, session: &mut S, partial: BarPartial, now: u64) -> usize {
        let len = self.update(session, |state| {
            let next_index = state
                .redirect
                .iter()
                .filter_map(|e| e.key.parse::<u64>().ok())
                .max()
                .map_or(0, |max| max + 1);
            state.redirect.push(QueueEntry {
                key: next_index.to_string(),
                content: Payload::Partial(partial),
                time: now,
            });
            self.trim(&mut state.redirect, now);
            state.redirect.len()
        });
        debug!(queued = len, "debug bar redirect hop queued");
        len
    }

    // -------------------------------------------------------------------------
    // reads
    // -------------------------------------------------------------------------

    /// Number of redirect hops currently queued.
    #[must_use]
    pub fn redirect_len<S: Session + ?Sized>(&self, session: &S) -> usize {
        load(session).redirect.len()
    }

    /// Read-once fetch from the `bar` queue.
    pub fn consume_bar<S: Session + ?Sized>(&self, session: &mut S, content_id: &str) -> Option<Payload> {
        self.consume_bar_at(session, content_id, unix_now())
    }

    pub fn consume_bar_at<S: Session + ?Sized>(&self, session: &mut S, content_id: &str, now: u64) -> Option<Payload> {
        self.take(session, QueueName::Bar, content_id, now)
    }

    /// Read-once fetch from the `bluescreen` queue.
    pub fn consume_bluescreen<S: Session + ?Sized>(&self, session: &mut S, content_id: &str) -> Option<Payload> {
        self.consume_bluescreen_at(session, content_id, unix_now())
    }

    pub fn consume_bluescreen_at<S: Session + ?Sized>(
        &self,
        session: &mut S,
        content_id: &str,
        now: u64,
    ) -> Option<Payload> {
        self.take(session, QueueName::Bluescreen, content_id, now)
    }

    fn take<S: Session + ?Sized>(&self, session: &mut S, queue: QueueName, key: &str, now: u64) -> Option<Payload> {
        let mut state = load(session);
        let entries = state.queue_mut(queue);
        let pos = entries.iter().position(|e| e.key == key)?;
        let entry = entries.remove(pos);
        save(session, &state);

        if self.is_fresh(&entry, now) {
            Some(entry.content)
        } else {
            debug!(?queue, key, "debug bar content expired before delivery");
            None
        }
    }

    /// Empty the redirect queue, returning its live entries newest-first.
    ///
    /// Splicing each entry ahead of the page's own bar in this order leaves
    /// the oldest hop first; callers building a sequence directly walk the
    /// result in reverse.
    pub fn drain_redirects<S: Session + ?Sized>(&self, session: &mut S) -> Vec<Payload> {
        self.drain_redirects_at(session, unix_now())
    }

    pub fn drain_redirects_at<S: Session + ?Sized>(&self, session: &mut S, now: u64) -> Vec<Payload> {
        let mut state = load(session);
        if state.redirect.is_empty() {
            return Vec::new();
        }
        let drained = std::mem::take(&mut state.redirect);
        save(session, &state);

        drained
            .into_iter()
            .rev()
            .filter(|e| self.is_fresh(e, now))
            .map(|e| e.content)
            .collect()
    }

    fn update<S, R>(&self, session: &mut S, f: impl FnOnce(&mut RelayState) -> R) -> R
    where
        S: Session + ?Sized,
    {
        let mut state = load(session);
        let result = f(&mut state);
        if !(state.is_empty() && session.get(SESSION_KEY).is_none()) {
            save(session, &state);
        }
        result
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::from_config(&BarConfig::default())
    }
}

fn load<S: Session + ?Sized>(session: &S) -> RelayState {
    let Some(raw) = session.get(SESSION_KEY) else {
        return RelayState::default();
    };
    match serde_json::from_value(raw.clone()) {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, "discarding unreadable debug bar session state");
            RelayState::default()
        }
    }
}

fn save<S: Session + ?Sized>(session: &mut S, state: &RelayState) {
    match serde_json::to_value(state) {
        Ok(value) => session.insert(SESSION_KEY, value),
        Err(e) => warn!(error = %e, "failed to serialize debug bar session state"),
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
