// `gateboot overlay`: preview the environment overlay without writing anything.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use gateboot_common::document::ConfigDocument;
use gateboot_common::env::{EnvSnapshot, Overrides};
use gateboot_common::overlay::apply_overlay;
use gateboot_reconciler::config::load_document;
use gateboot_reconciler::settings::BootSettings;

#[derive(Args)]
pub struct OverlayArgs {
    /// Config document to start from (defaults to the configured config path)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: OverlayArgs, settings: &BootSettings) -> Result<()> {
    let path = args.config.unwrap_or_else(|| settings.paths.config_path());
    let doc = render(load_document(&path)?, &EnvSnapshot::capture());
    std::io::stdout().lock().write_all(doc.to_pretty_string().as_bytes())?;
    Ok(())
}

fn render(doc: Option<ConfigDocument>, env: &EnvSnapshot) -> ConfigDocument {
    let mut doc = doc.unwrap_or_default();
    apply_overlay(&mut doc, &Overrides::from_env(env));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_document_renders_overlay_from_scratch() {
        let env = EnvSnapshot::from_pairs([("GATEWAY_TOKEN", "tok")]);
        let doc = render(None, &env);
        assert_eq!(doc.get_str(&["gateway", "auth", "token"]), Some("tok"));
    }

    #[test]
    fn existing_document_keeps_unrelated_keys() {
        let existing = ConfigDocument::parse(r#"{"custom": {"keep": true}}"#).unwrap();
        let doc = render(Some(existing), &EnvSnapshot::default());
        assert_eq!(doc.get(&["custom", "keep"]), Some(&serde_json::Value::Bool(true)));
    }
}
