
use anyhow::{Context, Result, anyhow};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::AssistError;
use crate::assistant::{Answer, SupportAssistant};
use crate::config::{Config, get_config_dir};
use crate::embeddings::{ProviderCache, load_provider};
use crate::fallback::{ExternalSearch, FAILURE_PREFIX, SerpApiSearch};
use crate::knowledge_base::{load_knowledge_base, read_table};
use crate::retrieval::{RetrievalEngine, SearchHit};

/// Characters of passage text shown per result
pub const PREVIEW_CHARS: usize = 500;

/// Load configuration from the resolved directory plus environment overrides
#[inline]
pub fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    let dir = get_config_dir(config_dir)?;
    Config::load_with_env(&dir).context("Failed to load configuration")
}

/// Build the session: load the knowledge base, load the embedding provider
/// and index every passage once.
#[inline]
pub async fn prepare_assistant(config: &Config) -> Result<Arc<SupportAssistant>> {
    let kb_config = config.knowledge_base.clone();
    let knowledge_base = tokio::task::spawn_blocking(move || load_knowledge_base(&kb_config))
        .await
        .context("Knowledge base loader panicked")?
        .context("Failed to load knowledge base")?;

    let spinner = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!(
        "Preparing search system ({} entries)...",
        knowledge_base.len()
    ));

    let embedding_config = config.embedding.clone();
    let built = tokio::task::spawn_blocking(move || -> crate::Result<Arc<RetrievalEngine>> {
        let mut providers = ProviderCache::new();
        let provider = providers.get_or_load(&embedding_config)?;
        let engine = RetrievalEngine::new(provider);
        engine.build_index(knowledge_base.passages())?;
        Ok(Arc::new(engine))
    })
    .await
    .context("Index build panicked");

    spinner.finish_and_clear();
    let engine = built?.context("Failed to build the search index")?;

    let fallback: Arc<dyn ExternalSearch> = Arc::new(SerpApiSearch::new(&config.external_search));
    Ok(Arc::new(SupportAssistant::new(engine, fallback, config)))
}

/// Answer a single query, or prompt for queries until an empty line.
#[inline]
pub async fn ask(
    config_dir: Option<&Path>,
    query: Option<String>,
    top_k: Option<usize>,
    threshold: Option<f32>,
) -> Result<()> {
    let mut config = load_config(config_dir)?;
    if let Some(top_k) = top_k {
        config.retrieval.set_top_k(top_k)?;
    }
    if let Some(threshold) = threshold {
        config.retrieval.set_threshold(threshold)?;
    }

    println!("{}", style(&config.app.title).bold().cyan());
    println!();

    let assistant = prepare_assistant(&config).await?;
    info!(
        "Serving queries with top_k={} threshold={}",
        config.retrieval.top_k, config.retrieval.threshold
    );

    if let Some(query) = query {
        let answer = answer_query(&assistant, query, &config).await?;
        print_answer(&answer);
        return Ok(());
    }

    loop {
        let query: String = Input::new()
            .with_prompt("Enter your SAP infrastructure issue/question (empty to quit)")
            .allow_empty(true)
            .interact_text()?;

        if query.trim().is_empty() {
            break;
        }

        // Per-query failures are reported and the session continues.
        match answer_query(&assistant, query, &config).await {
            Ok(answer) => print_answer(&answer),
            Err(e) => {
                error!("Query failed: {:#}", e);
                println!("{} {:#}", style("Query failed:").red(), e);
            }
        }
        println!();
    }

    println!("{}", style(&config.app.description).dim());
    Ok(())
}

/// Run one query on a blocking worker, bounded by the configured timeout.
#[inline]
pub async fn answer_query(
    assistant: &Arc<SupportAssistant>,
    query: String,
    config: &Config,
) -> Result<Answer> {
    let timeout = Duration::from_secs(config.app.query_timeout_seconds);
    let assistant = Arc::clone(assistant);
    let task = tokio::task::spawn_blocking(move || assistant.answer(&query));

    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => {
            let answer = joined.context("Query worker panicked")?;
            answer.map_err(|e| match e {
                AssistError::InvalidQuery(msg) => anyhow!("Invalid query: {}", msg),
                other => anyhow::Error::new(other),
            })
        }
        Err(_) => Err(anyhow!("Query timed out after {:?}", timeout)),
    }
}

#[inline]
pub fn print_answer(answer: &Answer) {
    match answer {
        Answer::Internal(hits) => {
            println!(
                "{}",
                style("🔍 Internal Knowledge Base Results").bold().green()
            );
            for line in render_hits(hits) {
                println!("{}", line);
            }
        }
        Answer::External(references) => {
            println!(
                "{}",
                style("No confident match found in internal KB. Redirecting to external sources...")
                    .yellow()
            );
            println!("{}", style("🌐 External Suggested Links").bold().cyan());
            for line in render_references(references) {
                println!("{}", line);
            }
        }
    }
}

/// Plain-text lines for internal results
#[inline]
pub fn render_hits(hits: &[SearchHit]) -> Vec<String> {
    let mut lines = Vec::with_capacity(hits.len() * 3);
    for (i, hit) in hits.iter().enumerate() {
        lines.push(format!(
            "Result {} - Confidence: {:.2}",
            i + 1,
            hit.confidence()
        ));
        lines.push(format!("  {}", preview(&hit.text, PREVIEW_CHARS)));
        lines.push(String::new());
    }
    lines
}

/// Bullet lines for external references
#[inline]
pub fn render_references(references: &[String]) -> Vec<String> {
    if references.is_empty() {
        return vec!["• No external references found.".to_string()];
    }
    references.iter().map(|r| format!("• {r}")).collect()
}

/// First `max_chars` characters of `text`, with `...` when truncated
#[inline]
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Outcome of one diagnostic check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub section: &'static str,
    pub status: CheckStatus,
    pub message: String,
}

impl Diagnostic {
    fn new(section: &'static str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            section,
            status,
            message: message.into(),
        }
    }
}

/// Inspect configuration, knowledge base, embedding provider and, when
/// `probe_external` is set, the external search API.
#[inline]
pub fn run_diagnostics(config: &Config, probe_external: bool) -> Vec<Diagnostic> {
    let mut report = Vec::new();

    let config_path = config.config_file_path();
    report.push(if config_path.exists() {
        Diagnostic::new(
            "config",
            CheckStatus::Pass,
            format!("Config file found: {}", config_path.display()),
        )
    } else {
        Diagnostic::new(
            "config",
            CheckStatus::Warn,
            format!(
                "No config file at {}; using defaults and environment",
                config_path.display()
            ),
        )
    });

    report.push(match config.external_search.masked_api_key() {
        Some(masked) => Diagnostic::new(
            "api key",
            CheckStatus::Pass,
            format!("API key configured: {masked}"),
        ),
        None => Diagnostic::new(
            "api key",
            CheckStatus::Warn,
            "API key not configured; set SERPAPI_KEY or external_search.api_key",
        ),
    });

    diagnose_knowledge_base(config, &mut report);

    report.push(match load_provider(&config.embedding) {
        Ok(provider) => Diagnostic::new(
            "embedding",
            CheckStatus::Pass,
            format!("Embedding provider ready: {}", provider.id()),
        ),
        Err(e) => Diagnostic::new("embedding", CheckStatus::Fail, e.to_string()),
    });

    report.push(if !probe_external {
        Diagnostic::new("external", CheckStatus::Skip, "External search probe not requested")
    } else if config.external_search.api_key().is_none() {
        Diagnostic::new("external", CheckStatus::Skip, "Skipping API test (no key configured)")
    } else {
        let results = SerpApiSearch::new(&config.external_search).search("test query", 1);
        match results.first() {
            Some(first) if first.starts_with(FAILURE_PREFIX) => {
                Diagnostic::new("external", CheckStatus::Fail, first.clone())
            }
            _ => Diagnostic::new("external", CheckStatus::Pass, "API connection successful"),
        }
    });

    report
}

fn diagnose_knowledge_base(config: &Config, report: &mut Vec<Diagnostic>) {
    let kb = &config.knowledge_base;
    let path = config.knowledge_base_path();

    if !path.exists() {
        report.push(Diagnostic::new(
            "knowledge base",
            CheckStatus::Fail,
            format!("Knowledge base file not found: {}", path.display()),
        ));
        return;
    }

    let table = match read_table(path) {
        Ok(table) => table,
        Err(e) => {
            report.push(Diagnostic::new(
                "knowledge base",
                CheckStatus::Fail,
                format!("Error reading file: {e}"),
            ));
            return;
        }
    };

    report.push(Diagnostic::new(
        "knowledge base",
        CheckStatus::Pass,
        format!("File readable, {} rows found", table.rows.len()),
    ));

    let missing = table.missing_columns(kb);
    if !missing.is_empty() {
        report.push(Diagnostic::new(
            "knowledge base",
            CheckStatus::Fail,
            format!(
                "Missing columns: {:?}; available columns: {:?}",
                missing, table.headers
            ),
        ));
        return;
    }

    report.push(Diagnostic::new(
        "knowledge base",
        CheckStatus::Pass,
        "Required columns found",
    ));

    let incomplete = table.incomplete_rows(kb);
    report.push(if incomplete > 0 {
        Diagnostic::new(
            "knowledge base",
            CheckStatus::Warn,
            format!("{incomplete} rows have empty required fields and will be skipped"),
        )
    } else {
        Diagnostic::new(
            "knowledge base",
            CheckStatus::Pass,
            "No empty required fields",
        )
    });
}

/// Print the diagnostic report. Fails when any check failed.
#[inline]
pub fn check(config_dir: Option<&Path>, probe_external: bool) -> Result<()> {
    let config = load_config(config_dir)?;

    println!("{}", style("🔍 Checking kb-assist configuration...").bold().cyan());
    println!("{}", "=".repeat(50));

    let report = run_diagnostics(&config, probe_external);
    let mut section = "";
    for diagnostic in &report {
        if diagnostic.section != section {
            section = diagnostic.section;
            println!();
            println!("{}", style(section).bold().yellow());
        }
        let marker = match diagnostic.status {
            CheckStatus::Pass => style("✅").green(),
            CheckStatus::Warn => style("⚠️ ").yellow(),
            CheckStatus::Fail => style("❌").red(),
            CheckStatus::Skip => style("⏭️ ").dim(),
        };
        println!("   {} {}", marker, diagnostic.message);
    }

    println!();
    println!("{}", "=".repeat(50));

    let failures = report
        .iter()
        .filter(|d| d.status == CheckStatus::Fail)
        .count();
    if failures > 0 {
        return Err(anyhow!("{} check(s) failed", failures));
    }

    println!("{}", style("🎯 Configuration check complete").green());
    Ok(())
}

/// Write a default `config.toml` unless one already exists.
#[inline]
pub fn init_config(config_dir: Option<&Path>) -> Result<()> {
    let dir = get_config_dir(config_dir)?;
    let config = Config {
        base_dir: dir,
        ..Config::default()
    };
    let path = config.config_file_path();

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    config.save()?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
