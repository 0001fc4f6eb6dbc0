//! Client for the external prompt-configuration service.
//!
//! The service owns persistence; this side only fetches, saves and resets.
//! Every failure maps onto [`SaveError`] so the UI can show a transient banner
//! and keep local edits for a retry.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::preset::{FlowKind, FlowPromptSet, FlowPrompts};

/// Legacy single-graph prompt document served at `/api/prompts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub query_writer_instructions: String,
    pub web_searcher_instructions: String,
    pub reflection_instructions: String,
    pub answer_instructions: String,
    pub direct_prompt_template: String,
}

/// Legacy field name to prompt key of the `default` flow.
const LEGACY_KEYS: [(&str, &str); 5] = [
    ("query_writer_instructions", "generate_query"),
    ("web_searcher_instructions", "web_research"),
    ("reflection_instructions", "reflection"),
    ("answer_instructions", "finalize_answer"),
    ("direct_prompt_template", "direct_llm_response"),
];

impl PromptConfig {
    fn field(&self, legacy: &str) -> &String {
        match legacy {
            "query_writer_instructions" => &self.query_writer_instructions,
            "web_searcher_instructions" => &self.web_searcher_instructions,
            "reflection_instructions" => &self.reflection_instructions,
            "answer_instructions" => &self.answer_instructions,
            _ => &self.direct_prompt_template,
        }
    }

    fn field_mut(&mut self, legacy: &str) -> &mut String {
        match legacy {
            "query_writer_instructions" => &mut self.query_writer_instructions,
            "web_searcher_instructions" => &mut self.web_searcher_instructions,
            "reflection_instructions" => &mut self.reflection_instructions,
            "answer_instructions" => &mut self.answer_instructions,
            _ => &mut self.direct_prompt_template,
        }
    }

    /// Maps the legacy document onto flow prompt keys. Empty fields are skipped.
    pub fn to_flow_prompts(&self) -> FlowPrompts {
        LEGACY_KEYS
            .iter()
            .filter(|(legacy, _)| !self.field(legacy).is_empty())
            .map(|(legacy, key)| (key.to_string(), self.field(legacy).clone()))
            .collect()
    }

    /// Keys the legacy document has no slot for are dropped.
    pub fn from_flow_prompts(prompts: &FlowPrompts) -> Self {
        let mut config = Self::default();
        for (legacy, key) in LEGACY_KEYS {
            if let Some(text) = prompts.get(key) {
                *config.field_mut(legacy) = text.clone();
            }
        }
        config
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("request to {path} failed: {source}")]
    Request {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} answered {status}: {detail}")]
    Status {
        path: &'static str,
        status: reqwest::StatusCode,
        detail: String,
    },
}

impl SaveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SaveError::Status { status, .. } if *status == reqwest::StatusCode::NOT_FOUND)
    }
}

/// FastAPI error bodies look like `{"detail": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

pub struct PromptApi {
    client: Client,
    base_url: String,
}

impl PromptApi {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build configuration API client")?;
        Ok(Self {
            client,
            base_url: config.config_base_url().trim_end_matches('/').to_string(),
        })
    }

    pub async fn prompts(&self) -> Result<PromptConfig, SaveError> {
        self.get("/api/prompts").await
    }

    pub async fn save_prompts(&self, prompts: &PromptConfig) -> Result<(), SaveError> {
        let _: serde_json::Value = self.post("/api/prompts", Some(prompts)).await?;
        info!("Saved prompt configuration");
        Ok(())
    }

    /// Restores server defaults and returns them.
    pub async fn reset_prompts(&self) -> Result<PromptConfig, SaveError> {
        self.post::<(), _>("/api/prompts/reset", None).await
    }

    pub async fn flow_prompts(&self) -> Result<FlowPromptSet, SaveError> {
        self.get("/api/flow-prompts").await
    }

    pub async fn save_flow_prompts(&self, prompts: &FlowPromptSet) -> Result<(), SaveError> {
        let _: serde_json::Value = self.post("/api/flow-prompts", Some(prompts)).await?;
        info!("Saved prompts for {} flows", prompts.len());
        Ok(())
    }

    pub async fn reset_flow_prompts(&self) -> Result<FlowPromptSet, SaveError> {
        self.post::<(), _>("/api/flow-prompts/reset", None).await
    }

    /// Per-flow prompts, falling back to the legacy document on servers without
    /// `/api/flow-prompts`. The legacy fields land in the `default` flow.
    pub async fn current_flow_prompts(&self) -> Result<FlowPromptSet, SaveError> {
        match self.flow_prompts().await {
            Err(err) if err.is_not_found() => {
                warn!("Flow prompts unavailable, using legacy prompt document");
                let legacy = self.prompts().await?;
                Ok(FlowPromptSet::from([(FlowKind::Default, legacy.to_flow_prompts())]))
            }
            other => other,
        }
    }

    /// Saves per-flow prompts, or the `default` flow through the legacy endpoint.
    pub async fn store_flow_prompts(&self, prompts: &FlowPromptSet) -> Result<(), SaveError> {
        match self.save_flow_prompts(prompts).await {
            Err(err) if err.is_not_found() => {
                warn!("Flow prompts unavailable, saving the default flow as legacy prompts");
                let default = prompts.get(&FlowKind::Default).cloned().unwrap_or_default();
                self.save_prompts(&PromptConfig::from_flow_prompts(&default)).await
            }
            other => other,
        }
    }

    /// Flow key to display name, e.g. `"multi-agent" -> "Multi-Agent Research System"`.
    pub async fn flows(&self) -> Result<BTreeMap<String, String>, SaveError> {
        self.get("/api/flows").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, SaveError> {
        debug!("GET {}{}", self.base_url, path);
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|source| SaveError::Request { path, source })?;
        decode(path, response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &'static str,
        body: Option<&B>,
    ) -> Result<T, SaveError> {
        debug!("POST {}{}", self.base_url, path);
        let mut builder = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder
            .send()
            .await
            .map_err(|source| SaveError::Request { path, source })?;
        decode(path, response).await
    }
}

async fn decode<T: DeserializeOwned>(
    path: &'static str,
    response: reqwest::Response,
) -> Result<T, SaveError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.detail)
            .unwrap_or(text);
        return Err(SaveError::Status {
            path,
            status,
            detail,
        });
    }
    response
        .json()
        .await
        .map_err(|source| SaveError::Request { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_prompt_document_shape() {
        let raw = r#"{
            "query_writer_instructions": "q",
            "web_searcher_instructions": "w",
            "reflection_instructions": "r",
            "answer_instructions": "a",
            "direct_prompt_template": "d"
        }"#;
        let config: PromptConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.direct_prompt_template, "d");
        assert!(serde_json::from_str::<PromptConfig>(r#"{"query_writer_instructions": "q"}"#).is_err());
    }

    #[test]
    fn legacy_fields_map_onto_flow_keys() {
        let config = PromptConfig {
            query_writer_instructions: String::from("q"),
            answer_instructions: String::from("a"),
            ..PromptConfig::default()
        };
        let prompts = config.to_flow_prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts["generate_query"], "q");
        assert_eq!(prompts["finalize_answer"], "a");

        let mut prompts = prompts;
        prompts.insert(String::from("tone"), String::from("brief"));
        assert_eq!(PromptConfig::from_flow_prompts(&prompts), config);
    }

    #[tokio::test]
    async fn unreachable_service_is_a_save_error() {
        let config = ServerConfig {
            base_url: String::from("http://127.0.0.1:9"),
            ..ServerConfig::default()
        };
        let api = PromptApi::new(&config).unwrap();
        let err = api.flows().await.unwrap_err();
        assert!(matches!(err, SaveError::Request { path: "/api/flows", .. }));
    }
}
