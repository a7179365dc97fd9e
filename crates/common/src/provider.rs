// Model provider catalogs and base-URL based provider selection.

use serde::Serialize;

/// Primary model when no provider override is configured.
pub const DEFAULT_PRIMARY_MODEL: &str = "anthropic/claude-opus-4-5";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogModel {
    pub id: &'static str,
    pub name: &'static str,
    pub context_window: u32,
}

const OPENAI_MODELS: [CatalogModel; 3] = [
    CatalogModel { id: "gpt-5.2", name: "GPT-5.2", context_window: 200_000 },
    CatalogModel { id: "gpt-5", name: "GPT-5", context_window: 200_000 },
    CatalogModel { id: "gpt-4.5-preview", name: "GPT-4.5 Preview", context_window: 128_000 },
];

const ANTHROPIC_MODELS: [CatalogModel; 3] = [
    CatalogModel {
        id: "claude-opus-4-5-20251101",
        name: "Claude Opus 4.5",
        context_window: 200_000,
    },
    CatalogModel {
        id: "claude-sonnet-4-5-20250929",
        name: "Claude Sonnet 4.5",
        context_window: 200_000,
    },
    CatalogModel {
        id: "claude-haiku-4-5-20251001",
        name: "Claude Haiku 4.5",
        context_window: 200_000,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// Key under `models.providers` and namespace prefix of model refs.
    pub const fn key(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    /// Wire API the gateway should speak to this provider.
    pub const fn api(self) -> &'static str {
        match self {
            Self::OpenAi => "openai-responses",
            Self::Anthropic => "anthropic-messages",
        }
    }

    pub const fn catalog(self) -> &'static [CatalogModel] {
        match self {
            Self::OpenAi => &OPENAI_MODELS,
            Self::Anthropic => &ANTHROPIC_MODELS,
        }
    }

    /// Fully qualified reference, e.g. `openai/gpt-5.2`.
    pub fn model_ref(self, model: &CatalogModel) -> String {
        format!("{}/{}", self.key(), model.id)
    }

    /// The first catalog entry becomes the primary model.
    pub fn primary_model(self) -> String {
        self.model_ref(&self.catalog()[0])
    }
}

/// Pick the provider implied by a normalized base URL.
pub fn select_provider(base_url: Option<&str>) -> Option<ProviderKind> {
    match base_url {
        Some(url) if url.ends_with("/openai") => Some(ProviderKind::OpenAi),
        Some(url) if !url.is_empty() => Some(ProviderKind::Anthropic),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_suffix_selects_openai() {
        assert_eq!(select_provider(Some("https://gw/v1/openai")), Some(ProviderKind::OpenAi));
    }

    #[test]
    fn other_urls_select_anthropic() {
        assert_eq!(
            select_provider(Some("https://gw/v1/anthropic")),
            Some(ProviderKind::Anthropic)
        );
        assert_eq!(select_provider(Some("https://openai.example")), Some(ProviderKind::Anthropic));
    }

    #[test]
    fn no_url_selects_nothing() {
        assert_eq!(select_provider(None), None);
        assert_eq!(select_provider(Some("")), None);
    }

    #[test]
    fn primary_models_use_first_catalog_entry() {
        assert_eq!(ProviderKind::OpenAi.primary_model(), "openai/gpt-5.2");
        assert_eq!(ProviderKind::Anthropic.primary_model(), "anthropic/claude-opus-4-5-20251101");
    }

    #[test]
    fn catalog_serializes_camel_case() {
        let value = serde_json::to_value(ProviderKind::OpenAi.catalog()[2]).unwrap();
        assert_eq!(value["contextWindow"], 128_000);
        assert_eq!(value["name"], "GPT-4.5 Preview");
    }
}
