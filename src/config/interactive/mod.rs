#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};

use super::{Config, GeminiConfig, RetrievalConfig};
use crate::config::settings::API_KEY_ENV;
use crate::gemini::GeminiClient;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Incident KB Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Gemini Configuration").bold().yellow());
    eprintln!("Configure the remote generation and embedding services.");
    eprintln!();

    configure_gemini(&mut config.gemini)?;

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;

    eprintln!();
    let dataset_path: String = Input::new()
        .with_prompt("Knowledge base CSV path")
        .default(config.dataset.path.display().to_string())
        .interact_text()?;
    config.dataset.path = dataset_path.into();

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    match test_gemini_connection(&config.gemini) {
        Some(dimension) => {
            eprintln!(
                "{}",
                style(format!(
                    "✓ Embedding service reachable (dimension {})",
                    dimension
                ))
                .green()
            );
        }
        None => {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not reach the embedding service").yellow()
            );
            eprintln!("You can continue, but queries will fail until the service is reachable.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Gemini Settings:").bold().yellow());
    eprintln!("  API Base: {}", style(&config.gemini.api_base).cyan());
    eprintln!(
        "  Generation Model: {}",
        style(&config.gemini.generation_model).cyan()
    );
    eprintln!(
        "  Embedding Model: {}",
        style(&config.gemini.embedding_model).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.gemini.batch_size).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.gemini.timeout_seconds).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!("  Threshold: {}", style(config.retrieval.threshold).cyan());

    eprintln!();
    eprintln!("{}", style("Dataset:").bold().yellow());
    eprintln!("  Path: {}", style(config.dataset.path.display()).cyan());

    eprintln!();
    match Config::api_key() {
        Ok(_) => eprintln!("  API Key: {} (from {})", style("set").green(), API_KEY_ENV),
        Err(_) => eprintln!("  API Key: {} ({} unset)", style("missing").red(), API_KEY_ENV),
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    match Config::load_default() {
        Ok(config) => {
            if config.config_file_path().exists() {
                eprintln!("{}", style("Found existing configuration.").green());
            } else {
                eprintln!(
                    "{}",
                    style("No existing configuration found. Using defaults.").yellow()
                );
            }
            Ok(config)
        }
        Err(e) => {
            eprintln!(
                "{}",
                style(format!("Existing configuration is invalid ({e}), starting over.")).yellow()
            );
            let base_dir = Config::default_config_dir()?;
            Ok(Config {
                gemini: GeminiConfig::default(),
                retrieval: RetrievalConfig::default(),
                dataset: super::DatasetConfig::default(),
                base_dir,
            })
        }
    }
}

fn configure_gemini(gemini: &mut GeminiConfig) -> Result<()> {
    let generation_model: String = Input::new()
        .with_prompt("Generation model")
        .default(gemini.generation_model.clone())
        .interact_text()?;
    gemini.set_generation_model(generation_model)?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(gemini.embedding_model.clone())
        .interact_text()?;
    gemini.set_embedding_model(embedding_model)?;

    let batch_size: usize = Input::new()
        .with_prompt("Embedding batch size")
        .default(gemini.batch_size)
        .interact_text()?;
    gemini.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Top K results")
        .default(retrieval.top_k)
        .interact_text()?;
    retrieval.set_top_k(top_k)?;

    let threshold: f32 = Input::new()
        .with_prompt("Confidence threshold")
        .default(retrieval.threshold)
        .interact_text()?;
    retrieval.set_threshold(threshold)?;

    Ok(())
}

fn test_gemini_connection(gemini: &GeminiConfig) -> Option<usize> {
    let api_key = Config::api_key().ok()?;
    let client = GeminiClient::new(gemini, api_key).ok()?;
    client.health_check().ok()
}
