//! External search fallback.
//!
//! Used only when internal retrieval finds no confident match. Failures never
//! propagate: they come back as a single `External search failed: ...` line
//! so the caller can always render something.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::ExternalSearchConfig;

pub const FAILURE_PREFIX: &str = "External search failed";

/// Ranked references from a source outside the knowledge base
pub trait ExternalSearch: Send + Sync {
    /// At most `num_results` reference strings, or one diagnostic string on
    /// failure.
    fn search(&self, query: &str, num_results: usize) -> Vec<String>;
}

/// Google results through SerpAPI
#[derive(Clone)]
pub struct SerpApiSearch {
    api_key: Option<String>,
    endpoint: String,
    engine: String,
    agent: ureq::Agent,
}

impl fmt::Debug for SerpApiSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = self
            .api_key
            .as_deref()
            .map(|key| format!("{}...", key.chars().take(8).collect::<String>()));
        f.debug_struct("SerpApiSearch")
            .field("api_key", &masked)
            .field("endpoint", &self.endpoint)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    title: Option<String>,
    link: Option<String>,
}

impl SerpApiSearch {
    #[inline]
    pub fn new(config: &ExternalSearchConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Self {
            api_key: config.api_key().map(str::to_string),
            endpoint: config.endpoint.clone(),
            engine: config.engine.clone(),
            agent,
        }
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn try_search(&self, api_key: &str, query: &str, num_results: usize) -> Result<Vec<String>> {
        let url = Url::parse(&self.endpoint)
            .with_context(|| format!("invalid endpoint {}", self.endpoint))?;

        debug!("Querying {} for external references", url);

        let response_text = match self
            .agent
            .get(url.as_str())
            .query("engine", &self.engine)
            .query("q", query)
            .query("api_key", api_key)
            .query("num", num_results.to_string())
            .call()
        {
            Ok(mut response) => response
                .body_mut()
                .read_to_string()
                .context("failed to read response body")?,
            Err(ureq::Error::StatusCode(code)) => return Err(anyhow!("HTTP {}", code)),
            Err(e) => return Err(anyhow!("{}", e)),
        };

        let response: SerpResponse =
            serde_json::from_str(&response_text).context("malformed response")?;

        if let Some(error) = response.error {
            return Err(anyhow!("{}", error));
        }

        Ok(response
            .organic_results
            .into_iter()
            .filter_map(|r| match (r.title, r.link) {
                (Some(title), Some(link)) => Some(format!("{title}: {link}")),
                _ => None,
            })
            .take(num_results)
            .collect())
    }
}

impl ExternalSearch for SerpApiSearch {
    #[inline]
    fn search(&self, query: &str, num_results: usize) -> Vec<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("External search skipped: no API key configured");
            return vec![failure_message("API key not configured")];
        };

        match self.try_search(api_key, query, num_results) {
            Ok(references) => {
                debug!("External search returned {} references", references.len());
                references
            }
            Err(e) => {
                warn!("External search failed: {:#}", e);
                vec![failure_message(&format!("{e:#}"))]
            }
        }
    }
}

/// `External search failed: <reason>`
#[inline]
pub fn failure_message(reason: &str) -> String {
    format!("{FAILURE_PREFIX}: {reason}")
}
