use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;

use crate::Result;

/// On-disk shape: a flat JSON object of trigger -> response.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct ReplyFile(BTreeMap<String, String>);

/// Static trigger -> response table for auto-replies.
///
/// Consulted per inbound text message, independently of the forwarding path:
/// a message can both match a custom trigger and fire the forward keyword.
/// Triggers are stored lowercased; lookup is case-insensitive substring, same
/// as the forward keyword. `BTreeMap` keeps multi-match lookups deterministic.
#[derive(Clone, Debug, Default)]
pub struct ReplyTable {
    entries: BTreeMap<String, String>,
}

impl ReplyTable {
    /// Loads the table from a JSON file of `{"trigger": "response"}` pairs.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let file: ReplyFile = serde_json::from_str(&raw)?;
        Ok(Self::from_pairs(file.0))
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let entries = pairs
            .into_iter()
            .filter(|(trigger, _)| !trigger.trim().is_empty())
            .map(|(trigger, response)| (trigger.trim().to_lowercase(), response))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First trigger (in key order) contained in the lowercased text.
    pub fn lookup(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.entries
            .iter()
            .find(|(trigger, _)| lower.contains(trigger.as_str()))
            .map(|(_, response)| response.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ReplyTable {
        ReplyTable::from_pairs([
            ("GM".to_string(), "Good morning!".to_string()),
            ("rules".to_string(), "Be kind.".to_string()),
        ])
    }

    #[test]
    fn lookup_is_case_insensitive_substring() {
        let t = table();
        assert_eq!(t.lookup("gm everyone"), Some("Good morning!"));
        assert_eq!(t.lookup("What are the RULES here?"), Some("Be kind."));
        assert_eq!(t.lookup("hello"), None);
    }

    #[test]
    fn blank_triggers_are_dropped() {
        let t = ReplyTable::from_pairs([("  ".to_string(), "x".to_string())]);
        assert!(t.is_empty());
    }

    #[test]
    fn load_parses_flat_json_object() {
        let path = std::env::temp_dir().join(format!("kfb-replies-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"ping": "pong"}"#).unwrap();

        let t = ReplyTable::load(&path).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.lookup("PING?"), Some("pong"));

        let _ = std::fs::remove_file(&path);
    }
}
