use crate::domain::{ChatId, MessageId};

/// Trigger keyword used until `/setkeyword`, and restored by `/reset`.
pub const DEFAULT_KEYWORD: &str = "Completed";

/// Mutable relay configuration and progress.
///
/// One instance per process, owned by [`super::Relay`]; all access goes
/// through its state lock. Only the forward executor mutates the cursor.
///
/// Invariant: if the cursor is set, both range bounds are set and
/// `range_start <= cursor`. The cursor may exceed `range_end`, which means
/// the range is exhausted.
#[derive(Clone, Debug)]
pub struct RelayState {
    source: Option<ChatId>,
    target: Option<ChatId>,
    range_start: Option<MessageId>,
    range_end: Option<MessageId>,
    cursor: Option<MessageId>,
    keyword: String,
}

impl Default for RelayState {
    fn default() -> Self {
        Self {
            source: None,
            target: None,
            range_start: None,
            range_end: None,
            cursor: None,
            keyword: DEFAULT_KEYWORD.to_string(),
        }
    }
}

/// Why the relay is not ready to forward, in the order a user configures it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotReady {
    Source,
    Target,
    Range,
    Cursor,
}

impl std::fmt::Display for NotReady {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotReady::Source => write!(f, "Source not set. Use /setsource"),
            NotReady::Target => write!(f, "Target not set. Use /settarget"),
            NotReady::Range => {
                write!(f, "Range not set. Use /setrange <first_id> <last_id>")
            }
            NotReady::Cursor => write!(f, "Internal: cursor not initialized"),
        }
    }
}

/// Read-only view for `/status`. Stale reads are fine; status is advisory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub source: Option<ChatId>,
    pub target: Option<ChatId>,
    pub range: Option<RangeStatus>,
    pub keyword: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeStatus {
    pub low: MessageId,
    pub high: MessageId,
    pub cursor: MessageId,
}

impl RelayState {
    pub fn set_source(&mut self, chat: ChatId) {
        self.source = Some(chat);
    }

    pub fn set_target(&mut self, chat: ChatId) {
        self.target = Some(chat);
    }

    /// Normalizes the bounds to `(min, max)` and re-seeds the cursor at the
    /// low end. Returns the normalized range.
    pub fn set_range(&mut self, first: MessageId, last: MessageId) -> (MessageId, MessageId) {
        let low = first.min(last);
        let high = first.max(last);
        self.range_start = Some(low);
        self.range_end = Some(high);
        self.cursor = Some(low);
        (low, high)
    }

    /// Sets the trigger keyword verbatim apart from trimming. Empty input is
    /// rejected so the trigger detector can rely on a non-empty keyword.
    pub fn set_keyword(&mut self, keyword: &str) -> bool {
        let trimmed = keyword.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.keyword = trimmed.to_string();
        true
    }

    /// Clears everything back to process-start state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn source(&self) -> Option<ChatId> {
        self.source
    }

    pub fn target(&self) -> Option<ChatId> {
        self.target
    }

    pub fn cursor(&self) -> Option<MessageId> {
        self.cursor
    }

    pub fn range_end(&self) -> Option<MessageId> {
        self.range_end
    }

    /// Readiness gate: pure, side-effect free, first failing check wins.
    /// Check order matches the order a user sets things up.
    pub fn readiness(&self) -> Result<(), NotReady> {
        if self.source.is_none() {
            return Err(NotReady::Source);
        }
        if self.target.is_none() {
            return Err(NotReady::Target);
        }
        if self.range_start.is_none() || self.range_end.is_none() {
            return Err(NotReady::Range);
        }
        if self.cursor.is_none() {
            return Err(NotReady::Cursor);
        }
        Ok(())
    }

    /// Case-insensitive substring match ("Completed ✅" matches "Completed").
    pub fn keyword_matches(&self, text: &str) -> bool {
        if self.keyword.is_empty() {
            return false;
        }
        text.to_lowercase().contains(&self.keyword.to_lowercase())
    }

    /// Moves the cursor forward by one id. Forward-executor use only.
    pub(crate) fn advance_cursor(&mut self) {
        if let Some(c) = self.cursor {
            self.cursor = Some(MessageId(c.0 + 1));
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let range = match (self.range_start, self.range_end, self.cursor) {
            (Some(low), Some(high), Some(cursor)) => Some(RangeStatus { low, high, cursor }),
            _ => None,
        };
        StatusSnapshot {
            source: self.source,
            target: self.target,
            range,
            keyword: self.keyword.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_range_normalizes_and_seeds_cursor() {
        let mut st = RelayState::default();
        let (low, high) = st.set_range(MessageId(42), MessageId(7));
        assert_eq!(low, MessageId(7));
        assert_eq!(high, MessageId(42));
        assert_eq!(st.cursor(), Some(MessageId(7)));
        assert_eq!(st.range_end(), Some(MessageId(42)));
    }

    #[test]
    fn set_range_again_rewinds_cursor() {
        let mut st = RelayState::default();
        st.set_range(MessageId(1), MessageId(5));
        st.advance_cursor();
        st.advance_cursor();
        assert_eq!(st.cursor(), Some(MessageId(3)));

        st.set_range(MessageId(10), MessageId(20));
        assert_eq!(st.cursor(), Some(MessageId(10)));
    }

    #[test]
    fn readiness_reports_first_failing_check() {
        let mut st = RelayState::default();
        assert_eq!(st.readiness(), Err(NotReady::Source));

        st.set_source(ChatId(-100));
        assert_eq!(st.readiness(), Err(NotReady::Target));

        st.set_target(ChatId(-200));
        assert_eq!(st.readiness(), Err(NotReady::Range));

        st.set_range(MessageId(1), MessageId(2));
        assert_eq!(st.readiness(), Ok(()));
    }

    #[test]
    fn readiness_is_pure() {
        let st = RelayState::default();
        assert_eq!(st.readiness(), st.readiness());
        assert_eq!(st.cursor(), None);
    }

    #[test]
    fn keyword_matching_is_case_insensitive_substring() {
        let mut st = RelayState::default();
        assert!(st.keyword_matches("all COMPLETED ✅"));
        assert!(!st.keyword_matches("still working"));

        assert!(st.set_keyword("  done "));
        assert_eq!(st.keyword(), "done");
        assert!(st.keyword_matches("All done!"));
    }

    #[test]
    fn empty_keyword_is_rejected() {
        let mut st = RelayState::default();
        assert!(!st.set_keyword("   "));
        assert_eq!(st.keyword(), DEFAULT_KEYWORD);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut st = RelayState::default();
        st.set_source(ChatId(1));
        st.set_target(ChatId(2));
        st.set_range(MessageId(3), MessageId(4));
        st.set_keyword("ship it");

        st.reset();
        assert_eq!(st.source(), None);
        assert_eq!(st.target(), None);
        assert_eq!(st.cursor(), None);
        assert_eq!(st.keyword(), DEFAULT_KEYWORD);
        assert_eq!(st.status().range, None);
    }
}
