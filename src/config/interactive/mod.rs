
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{
    Config, ConfigError, EmbeddingConfig, ExternalSearchConfig, ProviderKind, RetrievalConfig,
};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 kb-assist Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Embedding Configuration").bold().yellow());
    eprintln!("Choose how knowledge base entries and queries are embedded.");
    eprintln!();

    configure_embedding(&mut config.embedding)?;

    if config.embedding.provider == ProviderKind::Ollama {
        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_ollama_connection(&config.embedding) {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before asking questions.");
        }
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;

    eprintln!();
    eprintln!("{}", style("Knowledge Base").bold().yellow());
    let kb_path: String = Input::new()
        .with_prompt("Knowledge base file (.xlsx or .json)")
        .default(config.knowledge_base.path.display().to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Path cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    config.knowledge_base.path = kb_path.trim().into();

    eprintln!();
    eprintln!("{}", style("External Search").bold().yellow());
    configure_external_search(&mut config.external_search)?;

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
pub fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    let embedding = &config.embedding;
    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!("  Provider: {}", style(embedding.provider).cyan());
    match embedding.provider {
        ProviderKind::Ollama => {
            eprintln!("  Host: {}", style(&embedding.host).cyan());
            eprintln!("  Port: {}", style(embedding.port).cyan());
            eprintln!("  Model: {}", style(&embedding.model).cyan());
            eprintln!("  Batch Size: {}", style(embedding.batch_size).cyan());
            match config.ollama_url() {
                Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
                Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
            }
        }
        ProviderKind::Hashing => {
            eprintln!("  Dimension: {}", style(embedding.dimension).cyan());
        }
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!("  Threshold: {}", style(config.retrieval.threshold).cyan());

    eprintln!();
    eprintln!("{}", style("Knowledge Base:").bold().yellow());
    eprintln!(
        "  Path: {}",
        style(config.knowledge_base_path().display()).cyan()
    );
    eprintln!(
        "  Columns: {} / {}",
        style(&config.knowledge_base.title_column).cyan(),
        style(&config.knowledge_base.description_column).cyan()
    );

    eprintln!();
    eprintln!("{}", style("External Search:").bold().yellow());
    eprintln!("  Endpoint: {}", style(&config.external_search.endpoint).cyan());
    match config.external_search.masked_api_key() {
        Some(masked) => eprintln!("  API Key: {}", style(masked).cyan()),
        None => eprintln!("  API Key: {}", style("not configured").red()),
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let providers = &[ProviderKind::Ollama, ProviderKind::Hashing];
    let default_index = providers
        .iter()
        .position(|&p| p == embedding.provider)
        .unwrap_or(0);

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(providers)
        .interact()?;

    if providers[provider_index] == ProviderKind::Hashing {
        let dimension: u32 = Input::new()
            .with_prompt("Embedding dimension")
            .default(embedding.dimension)
            .validate_with(|input: &u32| -> Result<(), ConfigError> {
                EmbeddingConfig::default().set_dimension(*input)
            })
            .interact_text()?;

        embedding.provider = ProviderKind::Hashing;
        embedding.set_dimension(dimension)?;
        return Ok(());
    }

    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == embedding.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(embedding.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = EmbeddingConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..EmbeddingConfig::default()
            };
            candidate.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(embedding.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.provider = ProviderKind::Ollama;
    embedding.set_protocol(protocol)?;
    embedding.set_host(host)?;
    embedding.set_port(port)?;
    embedding.set_model(model)?;

    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Results per query (top k)")
        .default(retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            RetrievalConfig::default().set_top_k(*input)
        })
        .interact_text()?;

    let threshold: f32 = Input::new()
        .with_prompt("Distance threshold (lower is stricter)")
        .default(retrieval.threshold)
        .validate_with(|input: &f32| -> Result<(), ConfigError> {
            RetrievalConfig::default().set_threshold(*input)
        })
        .interact_text()?;

    retrieval.set_top_k(top_k)?;
    retrieval.set_threshold(threshold)?;
    Ok(())
}

fn configure_external_search(external: &mut ExternalSearchConfig) -> Result<()> {
    let prompt = match external.masked_api_key() {
        Some(masked) => format!("SerpAPI key (current {masked}, empty keeps it)"),
        None => "SerpAPI key (empty to skip)".to_string(),
    };

    let api_key: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    if !api_key.trim().is_empty() {
        external.set_api_key(Some(api_key.trim().to_string()));
    }
    Ok(())
}

fn test_ollama_connection(embedding: &EmbeddingConfig) -> bool {
    let Ok(url) = embedding.ollama_url().and_then(|base| {
        base.join("/api/version")
            .map_err(|e| ConfigError::InvalidUrl(e.to_string()))
    }) else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => (400..500).contains(&code),
        Err(_) => false,
    }
}
