use async_trait::async_trait;
use serde::Deserialize;

use crate::config::UpstreamCfg;
use crate::error::CoreResult;
use crate::http_client::{ByteStream, HttpClient};
use crate::model::GenerationRequest;
use crate::provider::GenerationProvider;

#[derive(Debug, Clone)]
pub struct Ollama {
    http: HttpClient,
    base: String,
    name: String,
}

impl Ollama {
    pub fn new(http: HttpClient, base: String) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            name: "ollama".into(),
        }
    }

    pub fn from_cfg(http: HttpClient, cfg: &UpstreamCfg) -> Self {
        Self::new(http, cfg.base_url.clone())
    }

    #[cfg(test)]
    pub fn new_for_tests(server_base: &str) -> Self {
        Ollama::new(HttpClient::new_default().unwrap(), server_base.to_string())
    }
}

// ---- Wire structs (minimal) ----
#[derive(Deserialize)]
struct TagsResp {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[async_trait]
impl GenerationProvider for Ollama {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_stream(&self, req: &GenerationRequest) -> CoreResult<ByteStream> {
        let url = format!("{}/api/generate", self.base);
        self.http.post_stream(&url, req).await
    }

    async fn health(&self) -> CoreResult<()> {
        let url = format!("{}/api/tags", self.base);
        let tags: TagsResp = self.http.get_json(&url).await?;
        tracing::debug!(
            models = ?tags.models.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            "ollama reachable"
        );
        Ok(())
    }
}
