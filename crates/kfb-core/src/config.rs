use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{errors::Error, relay::DEFAULT_KEYWORD, Result};

/// Typed configuration for the bot, loaded from the environment (with a
/// best-effort `.env` file fallback).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    /// User ids allowed to run configuration commands. Empty means the
    /// commands are open to everyone, matching the original bot.
    pub admin_users: Vec<i64>,
    /// Trigger keyword the relay starts with (and reverts to on `/reset`).
    pub default_keyword: String,
    /// Optional JSON file of custom trigger -> response pairs.
    pub custom_replies_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let admin_users = parse_csv_i64(env_str("TELEGRAM_ADMIN_USERS"));

        let default_keyword = env_str("DEFAULT_KEYWORD")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_KEYWORD.to_string());

        let custom_replies_file = env_str("CUSTOM_REPLIES_FILE")
            .and_then(non_empty)
            .map(PathBuf::from);

        Ok(Self {
            telegram_bot_token,
            admin_users,
            default_keyword,
            custom_replies_file,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.map(|s| {
        s.split(',')
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    })
    .unwrap_or_default()
}

/// Minimal KEY=VALUE loader; already-set environment variables win.
fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if !key.is_empty() && env::var_os(key).is_none() {
            env::set_var(key, value);
        }
    }
}
