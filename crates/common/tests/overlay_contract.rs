use gateboot_common::document::ConfigDocument;
use gateboot_common::env::{EnvSnapshot, Overrides};
use gateboot_common::overlay::apply_overlay;
use proptest::prelude::*;
use serde_json::json;

fn run_overlay(start: &str, env: &EnvSnapshot) -> String {
    let (mut doc, _) = ConfigDocument::parse_lenient(start);
    apply_overlay(&mut doc, &Overrides::from_env(env));
    doc.to_pretty_string()
}

const KNOWN_VARS: [&str; 11] = [
    "GATEWAY_TOKEN",
    "DEV_MODE",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_DM_POLICY",
    "DISCORD_BOT_TOKEN",
    "SLACK_BOT_TOKEN",
    "SLACK_APP_TOKEN",
    "AI_GATEWAY_BASE_URL",
    "ANTHROPIC_BASE_URL",
    "ANTHROPIC_API_KEY",
    "UNRELATED",
];

const STARTING_DOCS: [&str; 4] = [
    "{}",
    "not json at all",
    r#"{"gateway": {"port": 9}, "agents": {"list": [{"id": "main"}]}}"#,
    r#"{"models": {"providers": {"anthropic": {"models": [{"id": "x"}]}}}}"#,
];

fn env_strategy() -> impl Strategy<Value = Vec<(usize, String)>> {
    prop::collection::vec(
        (
            0..KNOWN_VARS.len(),
            prop_oneof![
                Just(String::new()),
                Just("true".to_string()),
                Just("https://gw.example/openai/".to_string()),
                Just("https://gw.example/anthropic".to_string()),
                "[a-z0-9]{1,12}",
            ],
        ),
        0..8,
    )
}

proptest! {
    #[test]
    fn overlay_output_is_byte_identical_across_runs(
        doc_index in 0..STARTING_DOCS.len(),
        vars in env_strategy(),
    ) {
        let env = EnvSnapshot::from_pairs(
            vars.iter().map(|(i, v)| (KNOWN_VARS[*i].to_string(), v.clone())),
        );
        let first = run_overlay(STARTING_DOCS[doc_index], &env);
        let second = run_overlay(STARTING_DOCS[doc_index], &env);
        prop_assert_eq!(first, second);
    }
}

#[test]
fn openai_suffix_creates_only_openai_provider() {
    let env = EnvSnapshot::from_pairs([("ANTHROPIC_BASE_URL", "https://x/openai")]);
    let (mut doc, _) = ConfigDocument::parse_lenient("{}");
    apply_overlay(&mut doc, &Overrides::from_env(&env));

    assert!(doc.get(&["models", "providers", "openai"]).is_some());
    assert!(doc.get(&["models", "providers", "anthropic"]).is_none());
    let primary = doc.get_str(&["agents", "defaults", "model", "primary"]).unwrap();
    assert!(primary.starts_with("openai/"), "primary was {primary}");
    let base_url = doc.get_str(&["models", "providers", "openai", "baseUrl"]);
    assert_eq!(base_url, Some("https://x/openai"));
}

#[test]
fn plain_url_creates_only_anthropic_provider() {
    let env = EnvSnapshot::from_pairs([("ANTHROPIC_BASE_URL", "https://x/anthropic/")]);
    let (mut doc, _) = ConfigDocument::parse_lenient("{}");
    apply_overlay(&mut doc, &Overrides::from_env(&env));

    assert!(doc.get(&["models", "providers", "openai"]).is_none());
    assert_eq!(
        doc.get_str(&["models", "providers", "anthropic", "baseUrl"]),
        Some("https://x/anthropic")
    );
    assert_eq!(
        doc.get_str(&["agents", "defaults", "model", "primary"]),
        Some("anthropic/claude-opus-4-5-20251101")
    );
}

#[test]
fn corrupt_anthropic_entry_is_rebuilt_with_base_url() {
    let start = r#"{"models": {"providers": {"anthropic": {
        "baseUrl": "https://old", "apiKey": "stale", "models": [{"id": "claude"}]
    }}}}"#;
    let env = EnvSnapshot::from_pairs([("ANTHROPIC_BASE_URL", "https://new")]);
    let (mut doc, _) = ConfigDocument::parse_lenient(start);
    apply_overlay(&mut doc, &Overrides::from_env(&env));

    let provider = doc.get(&["models", "providers", "anthropic"]).unwrap();
    assert_eq!(provider["baseUrl"], "https://new");
    assert!(provider.get("apiKey").is_none());
    assert!(provider["models"].as_array().unwrap().iter().all(|m| m.get("name").is_some()));
}

#[test]
fn corrupt_anthropic_entry_is_dropped_without_base_url() {
    let start = r#"{"models": {"providers": {"anthropic": {"models": [{"id": "claude"}]}}}}"#;
    let (mut doc, _) = ConfigDocument::parse_lenient(start);
    apply_overlay(&mut doc, &Overrides::from_env(&EnvSnapshot::default()));

    assert!(doc.get(&["models", "providers", "anthropic"]).is_none());
    assert_eq!(
        doc.get_str(&["agents", "defaults", "model", "primary"]),
        Some("anthropic/claude-opus-4-5")
    );
}

#[test]
fn unrelated_sections_survive_the_overlay() {
    let start = r#"{"agents": {"list": [{"id": "main", "name": "Main"}]}, "skills": {"x": 1}}"#;
    let (mut doc, _) = ConfigDocument::parse_lenient(start);
    apply_overlay(&mut doc, &Overrides::default());

    assert_eq!(doc.get(&["agents", "list"]), Some(&json!([{"id": "main", "name": "Main"}])));
    assert_eq!(doc.get(&["skills", "x"]), Some(&json!(1)));
}
