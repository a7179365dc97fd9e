// Environment overlay: deterministic merge of overrides into the config document.
//
// The overlay is a fixed pipeline of steps, each a pure function over the
// document. Order matters: healing runs before the provider step so a corrupt
// Anthropic entry is dropped before it would be rebuilt.

use serde_json::{json, Map, Value};

use crate::document::{ConfigDocument, GATEWAY_PORT};
use crate::env::{ChatChannel, Overrides};
use crate::provider::{select_provider, ProviderKind, DEFAULT_PRIMARY_MODEL};

/// Proxies the gateway trusts for client address headers.
pub const TRUSTED_PROXIES: [&str; 1] = ["10.1.0.0"];

type Step = fn(&mut ConfigDocument, &Overrides);

const PIPELINE: [(&str, Step); 5] = [
    ("heal", heal_corrupt_providers),
    ("sections", ensure_sections),
    ("gateway", apply_gateway),
    ("channels", apply_channels),
    ("provider", apply_provider),
];

/// Apply every overlay step in order.
pub fn apply_overlay(doc: &mut ConfigDocument, overrides: &Overrides) {
    for (_, step) in PIPELINE {
        step(doc, overrides);
    }
}

/// Names of the overlay steps, in application order.
pub fn step_names() -> impl Iterator<Item = &'static str> {
    PIPELINE.iter().map(|(name, _)| *name)
}

/// Drop the Anthropic provider entry if any of its models lacks a `name`.
///
/// Older boots wrote nameless model entries that the gateway refuses to load.
pub fn heal_corrupt_providers(doc: &mut ConfigDocument, _overrides: &Overrides) {
    let corrupt = doc
        .get(&["models", "providers", ProviderKind::Anthropic.key(), "models"])
        .and_then(Value::as_array)
        .is_some_and(|models| models.iter().any(|m| m.get("name").is_none()));
    if corrupt {
        doc.remove(&["models", "providers", ProviderKind::Anthropic.key()]);
    }
}

pub fn ensure_sections(doc: &mut ConfigDocument, _overrides: &Overrides) {
    doc.object_at(&["agents", "defaults"]);
    doc.object_at(&["gateway"]);
    doc.object_at(&["channels"]);
}

pub fn apply_gateway(doc: &mut ConfigDocument, overrides: &Overrides) {
    let gateway = doc.object_at(&["gateway"]);
    gateway.insert("port".into(), Value::from(GATEWAY_PORT));
    gateway.insert("mode".into(), json!("local"));
    gateway.insert("trustedProxies".into(), json!(TRUSTED_PROXIES));

    if let Some(token) = &overrides.gateway_token {
        doc.set(&["gateway", "auth", "token"], json!(token));
    }
    if overrides.dev_mode {
        doc.set(&["gateway", "controlUi", "allowInsecureAuth"], json!(true));
    }
}

pub fn apply_channels(doc: &mut ConfigDocument, overrides: &Overrides) {
    if let Some(ChatChannel { token, dm_policy }) = &overrides.telegram {
        let telegram = doc.object_at(&["channels", "telegram"]);
        telegram.insert("enabled".into(), json!(true));
        telegram.insert("botToken".into(), json!(token));
        telegram.insert("dmPolicy".into(), json!(dm_policy));
    }

    if let Some(ChatChannel { token, dm_policy }) = &overrides.discord {
        let discord = doc.object_at(&["channels", "discord"]);
        discord.insert("enabled".into(), json!(true));
        discord.insert("token".into(), json!(token));
        doc.set(&["channels", "discord", "dm", "policy"], json!(dm_policy));
    }

    if let Some(slack) = &overrides.slack {
        let entry = doc.object_at(&["channels", "slack"]);
        entry.insert("enabled".into(), json!(true));
        entry.insert("botToken".into(), json!(slack.bot_token));
        entry.insert("appToken".into(), json!(slack.app_token));
    }
}

pub fn apply_provider(doc: &mut ConfigDocument, overrides: &Overrides) {
    let Some(kind) = select_provider(overrides.base_url.as_deref()) else {
        doc.set(&["agents", "defaults", "model", "primary"], json!(DEFAULT_PRIMARY_MODEL));
        return;
    };

    let mut provider = Map::new();
    provider.insert("baseUrl".into(), json!(overrides.base_url));
    provider.insert("api".into(), json!(kind.api()));
    provider.insert("models".into(), json!(kind.catalog()));
    let api_key = match kind {
        ProviderKind::OpenAi => &overrides.openai_api_key,
        ProviderKind::Anthropic => &overrides.anthropic_api_key,
    };
    if let Some(key) = api_key {
        provider.insert("apiKey".into(), json!(key));
    }
    doc.set(&["models", "providers", kind.key()], Value::Object(provider));

    let aliases = doc.object_at(&["agents", "defaults", "models"]);
    for model in kind.catalog() {
        aliases.insert(kind.model_ref(model), json!({ "alias": model.name }));
    }
    doc.set(&["agents", "defaults", "model", "primary"], json!(kind.primary_model()));
}
