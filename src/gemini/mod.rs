
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::GeminiConfig;
use crate::{KbError, Result};

/// Instruction sent with every title-normalization request.
const TITLE_PROMPT: &str = "You are a title normalizer for IT helpdesk tickets.
Create a short, clear title (4–8 words, Title Case) from a long incident description.
Examples:
- Updating Antivirus Definitions
- Printer Offline Error – Quick Fix
- Resetting VPN Access on Windows 11
Return only the title, nothing else.
";

/// Client for the remote generation and embedding services.
///
/// Both gateways are blocking calls with a configured timeout and a single
/// attempt; a failed or malformed response surfaces as `KbError::Service`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    api_key: String,
    generation_model: String,
    embedding_model: String,
    batch_size: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ContentPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    #[inline]
    pub fn new(config: &GeminiConfig, api_key: String) -> Result<Self> {
        let base_url = config
            .api_base_url()
            .map_err(|e| KbError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key,
            generation_model: config.generation_model.clone(),
            embedding_model: config.embedding_model.clone(),
            batch_size: config.batch_size,
            agent,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    /// Normalize a free-text incident description into a short title.
    ///
    /// An empty or absent model response is a valid outcome and returns an
    /// empty string; it still embeds and searches, just with weak signal.
    #[inline]
    pub fn normalize_title(&self, raw_text: &str) -> Result<String> {
        debug!(
            "Normalizing incident title (input length: {})",
            raw_text.len()
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    ContentPart {
                        text: TITLE_PROMPT.to_string(),
                    },
                    ContentPart {
                        text: format!(
                            "User incident description:\n{}\nReturn ONLY the title:",
                            raw_text.trim()
                        ),
                    },
                ],
            }],
        };

        let url = self.model_url(&self.generation_model, "generateContent");
        let response_text = self.post_json(&url, &request)?;

        let response: GenerateResponse = serde_json::from_str(&response_text).map_err(|e| {
            KbError::Service(format!("Failed to parse generation response: {}", e))
        })?;

        let title = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default()
            .trim()
            .to_string();

        debug!("Normalized title: {:?}", title);
        Ok(title)
    }

    /// Generate an embedding for a single text.
    #[inline]
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content {
                parts: vec![ContentPart {
                    text: text.to_string(),
                }],
            },
        };

        let url = self.model_url(&self.embedding_model, "embedContent");
        let response_text = self.post_json(&url, &request)?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| KbError::Service(format!("Failed to parse embedding response: {}", e)))?;

        debug!(
            "Generated embedding with {} dimensions",
            response.embedding.values.len()
        );
        Ok(response.embedding.values)
    }

    /// Generate embeddings for multiple texts, one vector per input text in
    /// input order. Inputs beyond the configured batch size are split into
    /// sequential sub-batches to bound request payload size.
    #[inline]
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_single_batch(chunk)?);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }

    /// One-shot probe used by `check` and interactive config: embeds a fixed
    /// string and reports the embedding dimension.
    #[inline]
    pub fn health_check(&self) -> Result<usize> {
        let vector = self.embed("health check")?;
        if vector.is_empty() {
            return Err(KbError::Service(
                "Embedding service returned an empty vector".to_string(),
            ));
        }
        info!(
            "Embedding service reachable, dimension {} (model {})",
            vector.len(),
            self.embedding_model
        );
        Ok(vector.len())
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.len() == 1 {
            return Ok(vec![self.embed(&texts[0])?]);
        }

        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: format!("models/{}", self.embedding_model),
                    content: Content {
                        parts: vec![ContentPart { text: text.clone() }],
                    },
                })
                .collect(),
        };

        let url = self.model_url(&self.embedding_model, "batchEmbedContents");
        let response_text = self.post_json(&url, &request)?;

        let response: BatchEmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            KbError::Service(format!("Failed to parse batch embedding response: {}", e))
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(KbError::Service(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response
            .embeddings
            .into_iter()
            .map(|e| e.values)
            .collect())
    }

    fn model_url(&self, model: &str, operation: &str) -> Url {
        let path = format!(
            "{}/models/{}:{}",
            self.base_url.path().trim_end_matches('/'),
            model,
            operation
        );
        let mut url = self.base_url.clone();
        url.set_path(&path);
        url
    }

    fn post_json<T: Serialize>(&self, url: &Url, request: &T) -> Result<String> {
        let body = serde_json::to_string(request)
            .map_err(|e| KbError::Service(format!("Failed to serialize request: {}", e)))?;

        self.agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| KbError::Service(format!("Request to {} failed: {}", url, e)))
    }
}
