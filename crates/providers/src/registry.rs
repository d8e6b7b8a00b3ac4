//! Model discovery and capability lookup.
//!
//! Local daemons are probed with a short timeout and failures collapse
//! into a static fallback list, so the model picker always has something
//! to show. Results are cached for five minutes; `refresh()` drops the
//! cache immediately.

use crate::model_ref::{ModelRef, ProviderKind};
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use shared::settings::{MultimodalSettings, ProviderSettings};
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::debug;

const CACHE_TTL: Duration = Duration::from_secs(300);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

static PROBE_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .expect("failed to build HTTP client")
});

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LmStudioModels {
    #[serde(default)]
    data: Vec<LmStudioModel>,
}

#[derive(Debug, Deserialize)]
struct LmStudioModel {
    id: String,
}

struct CachedListing {
    models: Vec<String>,
    fetched_at: Instant,
}

pub struct ModelRegistry {
    cfg: ProviderSettings,
    multimodal: MultimodalSettings,
    cache: Mutex<Option<CachedListing>>,
}

impl ModelRegistry {
    pub fn new(cfg: ProviderSettings, multimodal: MultimodalSettings) -> Self {
        Self {
            cfg,
            multimodal,
            cache: Mutex::new(None),
        }
    }

    /// All selectable model ids, `"<provider>:<name>"` form. Served from
    /// cache when fresh.
    pub async fn available_models(&self) -> Vec<String> {
        {
            let cache = self.cache.lock();
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < CACHE_TTL {
                    return cached.models.clone();
                }
            }
        }

        let mut models = self.probe_local().await;
        models.extend(static_cloud_models(&self.cfg));

        *self.cache.lock() = Some(CachedListing {
            models: models.clone(),
            fetched_at: Instant::now(),
        });
        models
    }

    /// Drop the cached listing; the next call re-probes.
    pub fn refresh(&self) {
        *self.cache.lock() = None;
    }

    pub fn is_multimodal(&self, model: &ModelRef) -> bool {
        is_multimodal_with(&self.multimodal, model)
    }

    async fn probe_local(&self) -> Vec<String> {
        let mut models = Vec::new();

        match probe_ollama(&self.cfg.ollama_base_url).await {
            Ok(names) => models.extend(names.into_iter().map(|n| format!("ollama:{n}"))),
            Err(err) => {
                debug!("ollama probe failed, using fallback list: {err}");
                models.extend(fallback_local_models());
            }
        }

        // LM Studio is optional; a dead daemon just contributes nothing.
        if let Ok(ids) = probe_lmstudio(&self.cfg.lmstudio_base_url).await {
            models.extend(ids.into_iter().map(|id| format!("lmstudio:{id}")));
        }

        models
    }
}

async fn probe_ollama(base: &str) -> Result<Vec<String>, reqwest::Error> {
    let url = format!("{}/api/tags", base.trim_end_matches('/'));
    let tags: OllamaTags = PROBE_HTTP.get(url).send().await?.json().await?;
    Ok(tags.models.into_iter().map(|m| m.name).collect())
}

async fn probe_lmstudio(base: &str) -> Result<Vec<String>, reqwest::Error> {
    let url = format!("{}/v1/models", base.trim_end_matches('/'));
    let listing: LmStudioModels = PROBE_HTTP.get(url).send().await?.json().await?;
    Ok(listing.data.into_iter().map(|m| m.id).collect())
}

/// Shown when the local daemon cannot be reached; keeps the picker usable
/// on machines where Ollama starts later.
fn fallback_local_models() -> Vec<String> {
    vec![
        "ollama:llama3.2:latest".to_string(),
        "ollama:llama2:latest".to_string(),
    ]
}

/// Cloud entries appear only when the matching credentials are set.
fn static_cloud_models(cfg: &ProviderSettings) -> Vec<String> {
    let mut models = Vec::new();
    if cfg.openai_api_key.is_some() {
        models.extend(
            ["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"]
                .into_iter()
                .map(|m| format!("openai:{m}")),
        );
    }
    if cfg.gemini_api_key.is_some() {
        models.extend(
            ["gemini-1.5-pro", "gemini-1.5-flash", "gemini-2.0-flash"]
                .into_iter()
                .map(|m| format!("gemini:{m}")),
        );
    }
    models
}

/// Cloud models with documented image support; local models rely on the
/// configured name keywords instead.
const CLOUD_MULTIMODAL: &[&str] = &["gpt-4o", "gpt-4-turbo", "gemini-1.5", "gemini-2.0"];

fn is_multimodal_with(settings: &MultimodalSettings, model: &ModelRef) -> bool {
    let name = model.name.to_lowercase();
    if settings.deny.iter().any(|d| name.contains(&d.to_lowercase())) {
        return false;
    }
    if settings.allow.iter().any(|a| name.contains(&a.to_lowercase())) {
        return true;
    }
    if model.kind.is_local() {
        return settings
            .keywords
            .iter()
            .any(|k| name.contains(&k.to_lowercase()));
    }
    CLOUD_MULTIMODAL.iter().any(|m| name.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str) -> ModelRef {
        ModelRef::parse(id).unwrap()
    }

    #[test]
    fn cloud_models_require_credentials() {
        let cfg = ProviderSettings::default();
        assert!(static_cloud_models(&cfg).is_empty());

        let cfg = ProviderSettings {
            openai_api_key: Some("k".into()),
            ..ProviderSettings::default()
        };
        let models = static_cloud_models(&cfg);
        assert!(models.contains(&"openai:gpt-4o-mini".to_string()));
        assert!(!models.iter().any(|m| m.starts_with("gemini:")));
    }

    #[test]
    fn fallback_list_is_nonempty() {
        assert!(fallback_local_models()
            .contains(&"ollama:llama3.2:latest".to_string()));
    }

    #[test]
    fn keyword_heuristic_applies_to_local_models() {
        let settings = MultimodalSettings::default();
        assert!(is_multimodal_with(&settings, &model("ollama:llava:13b")));
        assert!(is_multimodal_with(&settings, &model("lmstudio:qwen2-vision")));
        assert!(!is_multimodal_with(&settings, &model("ollama:llama3.2:latest")));
    }

    #[test]
    fn deny_list_wins_over_everything() {
        let settings = MultimodalSettings {
            deny: vec!["llava".into()],
            ..MultimodalSettings::default()
        };
        assert!(!is_multimodal_with(&settings, &model("ollama:llava:13b")));
    }

    #[test]
    fn allow_list_overrides_missing_keywords() {
        let settings = MultimodalSettings {
            allow: vec!["my-custom-mm".into()],
            ..MultimodalSettings::default()
        };
        assert!(is_multimodal_with(&settings, &model("ollama:my-custom-mm:q4")));
    }

    #[test]
    fn known_cloud_models_are_multimodal() {
        let settings = MultimodalSettings::default();
        assert!(is_multimodal_with(&settings, &model("openai:gpt-4o")));
        assert!(is_multimodal_with(&settings, &model("gemini:gemini-1.5-flash")));
        assert!(!is_multimodal_with(&settings, &model("openai:gpt-3.5-turbo")));
    }
}
