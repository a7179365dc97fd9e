// Environment snapshot and the overrides recognized from it.

use std::collections::BTreeMap;

pub const GATEWAY_TOKEN: &str = "GATEWAY_TOKEN";
pub const DEV_MODE: &str = "DEV_MODE";
pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_DM_POLICY: &str = "TELEGRAM_DM_POLICY";
pub const DISCORD_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";
pub const DISCORD_DM_POLICY: &str = "DISCORD_DM_POLICY";
pub const SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
pub const SLACK_APP_TOKEN: &str = "SLACK_APP_TOKEN";
pub const AI_GATEWAY_BASE_URL: &str = "AI_GATEWAY_BASE_URL";
pub const AI_GATEWAY_API_KEY: &str = "AI_GATEWAY_API_KEY";
pub const ANTHROPIC_BASE_URL: &str = "ANTHROPIC_BASE_URL";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

const DEFAULT_DM_POLICY: &str = "pairing";

/// Environment captured once at startup.
///
/// Every later step reads from this snapshot instead of the live process
/// environment, which keeps the overlay a pure function of its inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Non-UTF-8 entries are skipped.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self { vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    /// Value of `key`, treating an empty string as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn is_true(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatChannel {
    pub token: String,
    pub dm_policy: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackChannel {
    pub bot_token: String,
    pub app_token: String,
}

/// The recognized configuration surface, decoded from an [`EnvSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub gateway_token: Option<String>,
    pub dev_mode: bool,
    pub telegram: Option<ChatChannel>,
    pub discord: Option<ChatChannel>,
    pub slack: Option<SlackChannel>,
    /// Provider base URL with trailing slashes removed.
    pub base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Overrides {
    pub fn from_env(env: &EnvSnapshot) -> Self {
        let owned = |key: &str| env.get(key).map(str::to_string);
        let chat = |token_key: &str, policy_key: &str| {
            env.get(token_key).map(|token| ChatChannel {
                token: token.to_string(),
                dm_policy: env.get(policy_key).unwrap_or(DEFAULT_DM_POLICY).to_string(),
            })
        };

        let slack = match (env.get(SLACK_BOT_TOKEN), env.get(SLACK_APP_TOKEN)) {
            (Some(bot), Some(app)) => {
                Some(SlackChannel { bot_token: bot.to_string(), app_token: app.to_string() })
            }
            _ => None,
        };

        let base_url = env
            .get(AI_GATEWAY_BASE_URL)
            .or_else(|| env.get(ANTHROPIC_BASE_URL))
            .map(normalize_base_url)
            .filter(|url| !url.is_empty());

        Self {
            gateway_token: owned(GATEWAY_TOKEN),
            dev_mode: env.is_true(DEV_MODE),
            telegram: chat(TELEGRAM_BOT_TOKEN, TELEGRAM_DM_POLICY),
            discord: chat(DISCORD_BOT_TOKEN, DISCORD_DM_POLICY),
            slack,
            base_url,
            anthropic_api_key: owned(AI_GATEWAY_API_KEY).or_else(|| owned(ANTHROPIC_API_KEY)),
            openai_api_key: owned(OPENAI_API_KEY),
        }
    }
}

/// Strip trailing slashes from a base URL.
pub fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
