#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RetrievalConfig;
use crate::dataset::{KnowledgeBase, KnowledgeEntry};
use crate::gemini::GeminiClient;
use crate::index::{FlatIndex, SearchHit};
use crate::{KbError, Result};

/// Fix text returned when no knowledge entry clears the threshold.
pub const FALLBACK_FIX: &str = "Sorry, we don't have an answer for this incident right now. \
     Please contact the IT Help Desk for more information.";

/// Structured outcome of one retrieval. `matched_entry` is absent when the
/// best score fell below the confidence threshold; `fix_text` then carries
/// the fallback message. A low-confidence outcome is a normal result, never
/// an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub normalized_title: String,
    pub confidence_score: f32,
    pub matched_entry: Option<KnowledgeEntry>,
    pub fix_text: String,
}

/// Orchestrates one retrieval: normalize the incident text into a title,
/// embed the title, search the index, and gate the best hit behind the
/// confidence threshold.
///
/// All state is read-only after construction, so concurrent `resolve` calls
/// are safe behind a shared reference.
pub struct RetrievalEngine {
    client: GeminiClient,
    index: FlatIndex,
    knowledge_base: KnowledgeBase,
    top_k: usize,
    threshold: f32,
}

/// Decision policy over the ranked hit list: consult only rank 1 and match
/// when its score clears the threshold (inclusive). The remaining hits are
/// passed through unused, a seam left for future re-ranking policies.
#[inline]
pub fn decide(hits: &[SearchHit], threshold: f32) -> Option<SearchHit> {
    hits.first().filter(|hit| hit.score >= threshold).copied()
}

impl RetrievalEngine {
    /// Wrap an already-built index. Fails unless the index is row-aligned
    /// with the knowledge base.
    #[inline]
    pub fn new(
        client: GeminiClient,
        index: FlatIndex,
        knowledge_base: KnowledgeBase,
        retrieval: &RetrievalConfig,
    ) -> Result<Self> {
        if index.len() != knowledge_base.len() {
            return Err(KbError::Config(format!(
                "Index has {} vectors but the knowledge base has {} entries",
                index.len(),
                knowledge_base.len()
            )));
        }

        Ok(Self {
            client,
            index,
            knowledge_base,
            top_k: retrieval.top_k,
            threshold: retrieval.threshold,
        })
    }

    /// Embed every short description and build the index over them, in row
    /// order. An empty knowledge base fails here, before any query is
    /// possible.
    #[inline]
    pub fn build(
        client: GeminiClient,
        knowledge_base: KnowledgeBase,
        retrieval: &RetrievalConfig,
    ) -> Result<Self> {
        let texts = knowledge_base.short_descriptions();
        info!("Embedding {} knowledge entries", texts.len());

        let vectors = client.embed_batch(&texts)?;
        let index = FlatIndex::build(vectors)?;

        Self::new(client, index, knowledge_base, retrieval)
    }

    /// Embedding dimension the engine was built with.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Number of knowledge entries behind the engine.
    #[inline]
    pub fn len(&self) -> usize {
        self.knowledge_base.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.knowledge_base.is_empty()
    }

    /// Resolve a free-text incident description to a fix.
    ///
    /// The query embedding is computed from the normalized title, not the
    /// raw text: titles are short and canonicalized, which matches the
    /// knowledge base's short descriptions. An empty title (the generation
    /// service returned nothing) still embeds and searches as-is.
    #[inline]
    pub fn resolve(&self, raw_incident_text: &str) -> Result<QueryResult> {
        let title = self.client.normalize_title(raw_incident_text)?;
        let query = self.client.embed(&title)?;
        let hits = self.index.search(&query, self.top_k)?;

        let best_score = hits.first().map_or(-1.0, |hit| hit.score);

        match decide(&hits, self.threshold) {
            Some(hit) => {
                let entry = self.knowledge_base.get(hit.position).ok_or_else(|| {
                    KbError::Config(format!(
                        "Index position {} has no knowledge entry",
                        hit.position
                    ))
                })?;

                debug!(
                    "Matched entry at position {} with score {:.3}",
                    hit.position, hit.score
                );

                Ok(QueryResult {
                    normalized_title: title,
                    confidence_score: hit.score,
                    matched_entry: Some(entry.clone()),
                    fix_text: entry.fix_text.clone(),
                })
            }
            None => {
                debug!(
                    "No confident match (best score {:.3} < threshold {:.2})",
                    best_score, self.threshold
                );

                Ok(QueryResult {
                    normalized_title: title,
                    confidence_score: best_score,
                    matched_entry: None,
                    fix_text: FALLBACK_FIX.to_string(),
                })
            }
        }
    }
}
