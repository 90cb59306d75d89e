use std::path::PathBuf;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use tracing::info;

use crate::config::Config;
use crate::dataset::KnowledgeBase;
use crate::gemini::GeminiClient;
use crate::index::FlatIndex;
use crate::retrieval::RetrievalEngine;

/// Resolve one incident description against the knowledge base and print
/// the structured result.
#[inline]
pub fn ask(text: &str, dataset_override: Option<PathBuf>) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let api_key = Config::api_key().context("Failed to read API credential")?;
    let client = GeminiClient::new(&config.gemini, api_key)
        .context("Failed to create Gemini client")?;

    let dataset_path = dataset_override.unwrap_or_else(|| config.dataset.path.clone());
    let knowledge_base =
        KnowledgeBase::load_csv(&dataset_path).context("Failed to load knowledge base")?;
    println!(
        "📚 Loaded {} knowledge entries from {}",
        knowledge_base.len(),
        dataset_path.display()
    );

    let engine = build_engine(client, knowledge_base, &config)?;
    println!(
        "🔢 Index ready ({} entries, dimension {})",
        engine.len(),
        engine.dimension()
    );

    info!("Resolving incident description ({} chars)", text.len());
    let result = engine.resolve(text).context("Failed to resolve incident")?;

    println!();
    println!("🧾 Generated Title: {}", result.normalized_title);
    match &result.matched_entry {
        Some(entry) => {
            println!("💡 Matched Short Description: {}", entry.short_description);
            println!("📈 Similarity Score: {:.3}", result.confidence_score);
            println!("🛠️  How to Fix:");
            println!("{}", result.fix_text);
        }
        None => {
            println!("📈 Similarity Score: {:.3}", result.confidence_score);
            println!("{}", result.fix_text);
        }
    }

    Ok(())
}

/// Report the health of every collaborator the retrieval pipeline depends
/// on: configuration, API credential, the remote services, and the dataset.
#[inline]
pub fn check() -> Result<()> {
    println!("📊 Incident KB Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("⚙️  Configuration:");
    let config = match Config::load_default() {
        Ok(config) => {
            println!("   ✅ Loaded ({})", config.config_file_path().display());
            println!("   📋 Generation Model: {}", config.gemini.generation_model);
            println!("   📋 Embedding Model: {}", config.gemini.embedding_model);
            println!("   🔢 Batch Size: {}", config.gemini.batch_size);
            println!(
                "   🎯 Top K: {}, Threshold: {:.2}",
                config.retrieval.top_k, config.retrieval.threshold
            );
            config
        }
        Err(e) => {
            println!("   ❌ Failed to load - {}", e);
            return Err(e);
        }
    };

    println!();
    println!("🔑 Credential:");
    let api_key = match Config::api_key() {
        Ok(key) => {
            println!("   ✅ GEMINI_API_KEY is set");
            Some(key)
        }
        Err(e) => {
            println!("   ❌ {}", e);
            None
        }
    };

    println!();
    println!("🤖 Remote Services:");
    if let Some(api_key) = api_key {
        match GeminiClient::new(&config.gemini, api_key) {
            Ok(client) => match client.health_check() {
                Ok(dimension) => {
                    println!(
                        "   ✅ Embedding service reachable (dimension {})",
                        dimension
                    );
                }
                Err(e) => {
                    println!("   ⚠️  Embedding service unhealthy - {}", e);
                }
            },
            Err(e) => {
                println!("   ❌ Failed to create client - {}", e);
            }
        }
    } else {
        println!("   ⏭️  Skipped (no credential)");
    }

    println!();
    println!("📚 Knowledge Base:");
    match KnowledgeBase::load_csv(&config.dataset.path) {
        Ok(kb) => {
            if kb.is_empty() {
                println!(
                    "   ⚠️  {} has no rows; the index cannot be built",
                    config.dataset.path.display()
                );
            } else {
                println!(
                    "   ✅ {} entries in {}",
                    kb.len(),
                    config.dataset.path.display()
                );
            }
        }
        Err(e) => {
            println!("   ❌ Failed to load - {}", e);
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'incident-kb ask \"<description>\"' to resolve an incident");
    println!("   • Use 'incident-kb config' to update settings");

    Ok(())
}

/// Embed the knowledge base and build the retrieval engine, with a progress
/// bar over the embedding sub-batches.
fn build_engine(
    client: GeminiClient,
    knowledge_base: KnowledgeBase,
    config: &Config,
) -> Result<RetrievalEngine> {
    let texts = knowledge_base.short_descriptions();
    let bar = ProgressBar::new(texts.len() as u64);
    bar.set_message("Embedding knowledge base");

    let mut vectors = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(config.gemini.batch_size) {
        vectors.extend(
            client
                .embed_batch(chunk)
                .context("Failed to embed knowledge base")?,
        );
        bar.inc(chunk.len() as u64);
    }
    bar.finish_and_clear();

    let index = FlatIndex::build(vectors).context("Failed to build vector index")?;
    let engine = RetrievalEngine::new(client, index, knowledge_base, &config.retrieval)
        .context("Failed to create retrieval engine")?;

    Ok(engine)
}

