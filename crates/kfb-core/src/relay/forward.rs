use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    domain::{ChatId, MessageId},
    errors::Error,
    ports::ChatPort,
    relay::state::{NotReady, RelayState, StatusSnapshot},
};

/// Terminal outcome of a single forward attempt.
///
/// Reported to the triggering chat as a notice; never fatal to the process.
/// `RateLimited` is the only failure that leaves the cursor in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    NotReady(NotReady),
    Exhausted,
    Forwarded(MessageId),
    Skipped(MessageId),
    RateLimited { id: MessageId, wait: Duration },
    Failed { id: MessageId, detail: String },
}

impl ForwardOutcome {
    /// User-facing notice text for the triggering chat.
    pub fn notice(&self) -> String {
        match self {
            ForwardOutcome::NotReady(why) => format!("⚠️ Not ready to forward: {why}"),
            ForwardOutcome::Exhausted => {
                "✅ All messages in the range have already been forwarded.".to_string()
            }
            ForwardOutcome::Forwarded(id) => format!("➡️ Forwarded message {}", id.0),
            ForwardOutcome::Skipped(id) => {
                format!("⚠️ Skipping missing message ID {}", id.0)
            }
            ForwardOutcome::RateLimited { id, wait } => {
                format!("⏳ Rate limited on ID {}: waiting {}s", id.0, wait.as_secs())
            }
            ForwardOutcome::Failed { id, detail } => {
                format!("❌ Forward error on ID {}: {detail}", id.0)
            }
        }
    }
}

/// The relay: configuration state plus the locks that make concurrent
/// triggers safe.
///
/// Two locks, deliberately separate:
/// - the state lock protects every field and is held only for synchronous
///   sections, so `/status` and the config commands stay responsive even
///   while a forward attempt is sleeping out a rate limit;
/// - the forward guard serializes [`Relay::attempt_forward`] end-to-end
///   (validate, fetch, copy, advance), which is what guarantees each id in
///   the range is forwarded at most once and in increasing order.
pub struct Relay {
    state: Mutex<RelayState>,
    forward_guard: Mutex<()>,
    default_keyword: String,
}

impl Relay {
    pub fn new(default_keyword: &str) -> Self {
        let mut state = RelayState::default();
        // Blank config value keeps the built-in default.
        state.set_keyword(default_keyword);
        let default_keyword = state.keyword().to_string();

        Self {
            state: Mutex::new(state),
            forward_guard: Mutex::new(()),
            default_keyword,
        }
    }

    pub async fn set_source(&self, chat: ChatId) {
        self.state.lock().await.set_source(chat);
    }

    pub async fn set_target(&self, chat: ChatId) {
        self.state.lock().await.set_target(chat);
    }

    pub async fn set_range(&self, first: MessageId, last: MessageId) -> (MessageId, MessageId) {
        self.state.lock().await.set_range(first, last)
    }

    pub async fn set_keyword(&self, keyword: &str) -> bool {
        self.state.lock().await.set_keyword(keyword)
    }

    /// Clears all settings and restores the configured default keyword.
    pub async fn reset(&self) {
        let mut st = self.state.lock().await;
        st.reset();
        st.set_keyword(&self.default_keyword);
    }

    pub async fn status(&self) -> StatusSnapshot {
        self.state.lock().await.status()
    }

    /// Entry point for every inbound text message.
    ///
    /// Returns `None` when the text is not a trigger: no keyword match, or
    /// the message came from a chat other than the configured target.
    pub async fn on_trigger_text(
        &self,
        origin: ChatId,
        text: &str,
        chats: &dyn ChatPort,
    ) -> Option<ForwardOutcome> {
        {
            let st = self.state.lock().await;
            if !st.keyword_matches(text) {
                return None;
            }
            if st.target() != Some(origin) {
                return None;
            }
        }
        Some(self.attempt_forward(origin, chats).await)
    }

    /// Attempts to relay exactly one message and advance the cursor.
    ///
    /// Outcomes are sent as notices to `reply_to` (the chat the trigger came
    /// from) as well as returned.
    pub async fn attempt_forward(&self, reply_to: ChatId, chats: &dyn ChatPort) -> ForwardOutcome {
        // At most one forward in flight; a second trigger waits here and then
        // re-evaluates the (possibly now-exhausted) state fresh.
        let _guard = self.forward_guard.lock().await;

        // Re-validate under the guard: state may have changed between the
        // trigger arriving and the guard being acquired. The state lock is
        // released before any notice goes out.
        let snapshot = {
            let st = self.state.lock().await;
            match st.readiness() {
                Err(why) => Err(ForwardOutcome::NotReady(why)),
                Ok(()) => match (st.source(), st.target(), st.cursor(), st.range_end()) {
                    (Some(source), Some(target), Some(cursor), Some(end)) => {
                        if cursor > end {
                            Err(ForwardOutcome::Exhausted)
                        } else {
                            Ok((source, target, cursor))
                        }
                    }
                    // readiness() guarantees these; treat a miss as not ready.
                    _ => Err(ForwardOutcome::NotReady(NotReady::Cursor)),
                },
            }
        };
        let (source, target, cursor) = match snapshot {
            Ok(v) => v,
            Err(outcome) => {
                self.report(&outcome, reply_to, chats).await;
                return outcome;
            }
        };

        match chats.fetch_message(source, cursor).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                // Advancing past unfetchable ids is still progress; without
                // it the relay stalls on the first deleted message.
                self.state.lock().await.advance_cursor();
                warn!("skipping missing message id {}", cursor.0);
                let outcome = ForwardOutcome::Skipped(cursor);
                self.report(&outcome, reply_to, chats).await;
                return outcome;
            }
            Err(e) => return self.handle_failure(cursor, e, reply_to, chats).await,
        }

        match chats.copy_message(source, target, cursor).await {
            Ok(()) => {
                self.state.lock().await.advance_cursor();
                info!("forwarded message id {}", cursor.0);
                let outcome = ForwardOutcome::Forwarded(cursor);
                self.report(&outcome, reply_to, chats).await;
                outcome
            }
            Err(e) => self.handle_failure(cursor, e, reply_to, chats).await,
        }
    }

    async fn handle_failure(
        &self,
        id: MessageId,
        err: Error,
        reply_to: ChatId,
        chats: &dyn ChatPort,
    ) -> ForwardOutcome {
        match err {
            Error::MessageMissing => {
                self.state.lock().await.advance_cursor();
                warn!("skipping missing message id {}", id.0);
                let outcome = ForwardOutcome::Skipped(id);
                self.report(&outcome, reply_to, chats).await;
                outcome
            }
            Error::RateLimited(wait) => {
                // Notice goes out before the wait so the operator sees why
                // the relay went quiet. The cursor stays put: the next
                // trigger retries the same id. No automatic retry here.
                warn!("rate limited on id {}, waiting {}s", id.0, wait.as_secs());
                let outcome = ForwardOutcome::RateLimited { id, wait };
                self.report(&outcome, reply_to, chats).await;
                sleep(wait).await;
                outcome
            }
            other => {
                // Advance anyway: favor progress over retrying a bad id
                // forever, at the cost of possibly skipping one message on a
                // transient fault.
                self.state.lock().await.advance_cursor();
                warn!("forward error on id {}: {other}", id.0);
                let outcome = ForwardOutcome::Failed {
                    id,
                    detail: other.to_string(),
                };
                self.report(&outcome, reply_to, chats).await;
                outcome
            }
        }
    }

    async fn report(&self, outcome: &ForwardOutcome, reply_to: ChatId, chats: &dyn ChatPort) {
        if let Err(e) = chats.send_notice(reply_to, &outcome.notice()).await {
            warn!("failed to send notice to chat {}: {e}", reply_to.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        sync::{Arc, Mutex as StdMutex},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::ports::{ChatKind, ChatProfile, FetchedMessage, Membership};
    use crate::relay::DEFAULT_KEYWORD;
    use crate::Result;

    const SOURCE: ChatId = ChatId(-1001);
    const TARGET: ChatId = ChatId(-1002);

    #[derive(Default)]
    struct FakeChats {
        missing: HashSet<i32>,
        failing: HashSet<i32>,
        rate_limit_once: StdMutex<HashMap<i32, Duration>>,
        copied: StdMutex<Vec<i32>>,
        notices: StdMutex<Vec<String>>,
    }

    impl FakeChats {
        fn copied(&self) -> Vec<i32> {
            self.copied.lock().unwrap().clone()
        }

        fn notices(&self) -> Vec<String> {
            self.notices.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatPort for FakeChats {
        async fn resolve_chat(&self, ident: &str) -> Result<ChatProfile> {
            let id = ident
                .parse::<i64>()
                .map_err(|_| Error::External(format!("unknown chat: {ident}")))?;
            Ok(ChatProfile {
                id: ChatId(id),
                kind: ChatKind::Supergroup,
                title: None,
                membership: Membership::Member,
            })
        }

        async fn fetch_message(
            &self,
            _chat: ChatId,
            id: MessageId,
        ) -> Result<Option<FetchedMessage>> {
            if self.missing.contains(&id.0) {
                return Ok(None);
            }
            Ok(Some(FetchedMessage { id }))
        }

        async fn copy_message(&self, from: ChatId, to: ChatId, id: MessageId) -> Result<()> {
            assert_eq!(from, SOURCE);
            assert_eq!(to, TARGET);
            if let Some(wait) = self.rate_limit_once.lock().unwrap().remove(&id.0) {
                return Err(Error::RateLimited(wait));
            }
            if self.failing.contains(&id.0) {
                return Err(Error::External("boom".to_string()));
            }
            self.copied.lock().unwrap().push(id.0);
            Ok(())
        }

        async fn send_notice(&self, _chat: ChatId, text: &str) -> Result<()> {
            self.notices.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    async fn configured_relay() -> Relay {
        let relay = Relay::new(DEFAULT_KEYWORD);
        relay.set_source(SOURCE).await;
        relay.set_target(TARGET).await;
        relay
    }

    #[tokio::test]
    async fn forwards_range_in_order_then_exhausts() {
        let relay = configured_relay().await;
        relay.set_range(MessageId(10), MessageId(12)).await;
        let chats = FakeChats::default();

        for expected in 10..=12 {
            let outcome = relay.on_trigger_text(TARGET, "Completed", &chats).await;
            assert_eq!(outcome, Some(ForwardOutcome::Forwarded(MessageId(expected))));
        }

        let outcome = relay.on_trigger_text(TARGET, "Completed", &chats).await;
        assert_eq!(outcome, Some(ForwardOutcome::Exhausted));

        // Exactly once each, increasing order, nothing after exhaustion.
        assert_eq!(chats.copied(), vec![10, 11, 12]);
        assert!(chats
            .notices()
            .iter()
            .any(|n| n.contains("Forwarded message 10")));
    }

    #[tokio::test]
    async fn trigger_requires_keyword_substring_and_target_chat() {
        let relay = configured_relay().await;
        relay.set_range(MessageId(1), MessageId(1)).await;
        relay.set_keyword("done").await;
        let chats = FakeChats::default();

        // Wrong chat: ignored even though the keyword matches.
        let outcome = relay.on_trigger_text(ChatId(777), "All done!", &chats).await;
        assert_eq!(outcome, None);
        assert!(chats.copied().is_empty());

        // No keyword in text: ignored.
        let outcome = relay.on_trigger_text(TARGET, "still going", &chats).await;
        assert_eq!(outcome, None);

        // Substring match in the target chat fires.
        let outcome = relay.on_trigger_text(TARGET, "All DONE!", &chats).await;
        assert_eq!(outcome, Some(ForwardOutcome::Forwarded(MessageId(1))));
    }

    #[tokio::test]
    async fn not_ready_reasons_follow_setup_order() {
        let relay = Relay::new(DEFAULT_KEYWORD);
        let chats = FakeChats::default();

        let outcome = relay.attempt_forward(TARGET, &chats).await;
        assert_eq!(outcome, ForwardOutcome::NotReady(NotReady::Source));

        relay.set_source(SOURCE).await;
        let outcome = relay.attempt_forward(TARGET, &chats).await;
        assert_eq!(outcome, ForwardOutcome::NotReady(NotReady::Target));

        relay.set_target(TARGET).await;
        let outcome = relay.attempt_forward(TARGET, &chats).await;
        assert_eq!(outcome, ForwardOutcome::NotReady(NotReady::Range));

        assert!(chats.copied().is_empty());
    }

    #[tokio::test]
    async fn missing_message_skips_without_copying() {
        let relay = configured_relay().await;
        relay.set_range(MessageId(10), MessageId(11)).await;
        let chats = FakeChats {
            missing: HashSet::from([10]),
            ..Default::default()
        };

        let outcome = relay.attempt_forward(TARGET, &chats).await;
        assert_eq!(outcome, ForwardOutcome::Skipped(MessageId(10)));
        assert!(chats.copied().is_empty());

        // Cursor moved past the hole.
        let outcome = relay.attempt_forward(TARGET, &chats).await;
        assert_eq!(outcome, ForwardOutcome::Forwarded(MessageId(11)));
        assert_eq!(chats.copied(), vec![11]);
    }

    #[tokio::test]
    async fn rate_limit_keeps_cursor_and_next_trigger_retries() {
        let relay = configured_relay().await;
        relay.set_range(MessageId(10), MessageId(10)).await;
        let chats = FakeChats {
            rate_limit_once: StdMutex::new(HashMap::from([(10, Duration::from_millis(5))])),
            ..Default::default()
        };

        let outcome = relay.attempt_forward(TARGET, &chats).await;
        assert_eq!(
            outcome,
            ForwardOutcome::RateLimited {
                id: MessageId(10),
                wait: Duration::from_millis(5),
            }
        );
        assert!(chats.copied().is_empty());
        assert_eq!(
            relay.status().await.range.map(|r| r.cursor),
            Some(MessageId(10))
        );

        // Same id again on the next trigger.
        let outcome = relay.attempt_forward(TARGET, &chats).await;
        assert_eq!(outcome, ForwardOutcome::Forwarded(MessageId(10)));
        assert_eq!(chats.copied(), vec![10]);
    }

    #[tokio::test]
    async fn transient_error_advances_past_the_id() {
        let relay = configured_relay().await;
        relay.set_range(MessageId(10), MessageId(11)).await;
        let chats = FakeChats {
            failing: HashSet::from([10]),
            ..Default::default()
        };

        let outcome = relay.attempt_forward(TARGET, &chats).await;
        assert!(matches!(
            outcome,
            ForwardOutcome::Failed { id: MessageId(10), .. }
        ));

        let outcome = relay.attempt_forward(TARGET, &chats).await;
        assert_eq!(outcome, ForwardOutcome::Forwarded(MessageId(11)));
        assert_eq!(chats.copied(), vec![11]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_triggers_never_double_forward() {
        let relay = Arc::new(configured_relay().await);
        relay.set_range(MessageId(10), MessageId(11)).await;
        let chats = Arc::new(FakeChats::default());

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let relay = Arc::clone(&relay);
            let chats = Arc::clone(&chats);
            tasks.push(tokio::spawn(async move {
                relay.on_trigger_text(TARGET, "Completed", chats.as_ref()).await
            }));
        }
        for task in tasks {
            task.await.expect("trigger task panicked");
        }

        // Each id copied exactly once, in increasing order; extra triggers
        // observed exhaustion instead of re-copying.
        assert_eq!(chats.copied(), vec![10, 11]);
    }

    #[tokio::test]
    async fn setrange_mid_stream_restarts_from_new_low() {
        let relay = configured_relay().await;
        relay.set_range(MessageId(10), MessageId(12)).await;
        let chats = FakeChats::default();

        relay.attempt_forward(TARGET, &chats).await;
        relay.set_range(MessageId(20), MessageId(20)).await;

        let outcome = relay.attempt_forward(TARGET, &chats).await;
        assert_eq!(outcome, ForwardOutcome::Forwarded(MessageId(20)));
        assert_eq!(chats.copied(), vec![10, 20]);
    }

    #[tokio::test]
    async fn reset_restores_default_keyword() {
        let relay = Relay::new("ship");
        relay.set_keyword("done").await;
        relay.set_source(SOURCE).await;

        relay.reset().await;
        let snap = relay.status().await;
        assert_eq!(snap.keyword, "ship");
        assert_eq!(snap.source, None);
        assert_eq!(snap.range, None);
    }
}
