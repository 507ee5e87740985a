// src/config.rs
//! Application configuration: watched sources, keyword filter, delivery,
//! store and run settings. Loaded once at startup and passed by reference —
//! no global config state.
//!
//! Resolution order mirrors the ingest whitelist loader this grew out of:
//! 1) $FEEDWATCH_CONFIG_PATH
//! 2) config/feedwatch.toml
//! 3) config/feedwatch.json

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::filter::{MatchFields, MatchSpec, MatchStrategy};
use crate::pipeline::RunOptions;

pub const ENV_CONFIG_PATH: &str = "FEEDWATCH_CONFIG_PATH";
pub const ENV_WEBHOOK_URL: &str = "FEEDWATCH_WEBHOOK_URL";
pub const ENV_KEYWORDS: &str = "FEEDWATCH_KEYWORDS";

const DEFAULT_TOML_PATH: &str = "config/feedwatch.toml";
const DEFAULT_JSON_PATH: &str = "config/feedwatch.json";

/// A configured feed. Owned by configuration; the pipeline only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Rss,
    Atom,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MatchConfig {
    #[serde(default)]
    pub strategy: MatchStrategy,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub fields: MatchFields,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::Any,
            case_sensitive: false,
            fields: MatchFields::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DeliveryConfig {
    /// Webhook endpoint; may instead come from $FEEDWATCH_WEBHOOK_URL.
    pub webhook_url: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FetchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Run once when absent; loop on an interval when set.
    pub interval_secs: Option<u64>,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default)]
    pub skip_deliver_if_empty: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            max_items: default_max_items(),
            skip_deliver_if_empty: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LangConfig {
    /// Latin-alphabet ratio below which a title is offered for translation.
    #[serde(default = "default_translate_threshold")]
    pub translate_threshold: f32,
}

impl Default for LangConfig {
    fn default() -> Self {
        Self {
            translate_threshold: default_translate_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(rename = "match", default)]
    pub matching: MatchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub lang: LangConfig,
}

impl AppConfig {
    /// Load from env var path or the config/ fallbacks, apply env overrides,
    /// and validate. Any problem here is fatal before the pipeline starts.
    pub fn load() -> Result<Self, PipelineError> {
        let mut cfg =
            load_from_default_locations().map_err(|e| PipelineError::Config(format!("{e:#}")))?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let mut cfg = load_from(path).map_err(|e| PipelineError::Config(format!("{e:#}")))?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_WEBHOOK_URL) {
            if !url.trim().is_empty() {
                self.delivery.webhook_url = Some(url.trim().to_string());
            }
        }
        if let Ok(raw) = std::env::var(ENV_KEYWORDS) {
            let kws: Vec<String> = raw.split(',').map(str::to_string).collect();
            if !clean_list(kws.clone()).is_empty() {
                self.keywords = kws;
            }
        }
        self.keywords = clean_list(std::mem::take(&mut self.keywords));
    }

    /// Rejects configurations the pipeline cannot run with. Note the empty
    /// keyword list is rejected *here*; the matcher itself would treat it as
    /// match-everything, which is never what a configured watch wants.
    fn validate(&self) -> Result<(), PipelineError> {
        if self.sources.is_empty() {
            return Err(PipelineError::Config("no sources configured".into()));
        }
        for s in &self.sources {
            if s.name.trim().is_empty() {
                return Err(PipelineError::Config(format!(
                    "source with url '{}' has an empty name",
                    s.url
                )));
            }
            url::Url::parse(&s.url).map_err(|e| {
                PipelineError::Config(format!("source '{}' has invalid url: {e}", s.name))
            })?;
        }
        if self.keywords.is_empty() {
            return Err(PipelineError::Config("keyword list is empty".into()));
        }
        match &self.delivery.webhook_url {
            None => {
                return Err(PipelineError::Config(format!(
                    "no webhook url (set delivery.webhook_url or ${ENV_WEBHOOK_URL})"
                )))
            }
            Some(u) => {
                url::Url::parse(u).map_err(|e| {
                    PipelineError::Config(format!("delivery webhook url is invalid: {e}"))
                })?;
            }
        }
        if self.delivery.max_attempts == 0 || self.fetch.max_attempts == 0 {
            return Err(PipelineError::Config(
                "max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn match_spec(&self) -> MatchSpec {
        MatchSpec {
            keywords: self.keywords.clone(),
            strategy: self.matching.strategy,
            case_sensitive: self.matching.case_sensitive,
            fields: self.matching.fields,
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            skip_deliver_if_empty: self.run.skip_deliver_if_empty,
            max_items: self.run.max_items,
        }
    }
}

fn load_from_default_locations() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON_PATH);
    if json_p.exists() {
        return load_from(&json_p);
    }
    Err(anyhow!(
        "no config found (set ${ENV_CONFIG_PATH} or create {DEFAULT_TOML_PATH})"
    ))
}

fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    if hint_ext == "json" || s.trim_start().starts_with('{') {
        return serde_json::from_str(s).context("parsing json config");
    }
    toml::from_str(s).context("parsing toml config")
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() {
            set.insert(t.to_string());
        }
    }
    set.into_iter().collect()
}

fn default_true() -> bool {
    true
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_secs() -> u64 {
    2
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_store_path() -> PathBuf {
    PathBuf::from("data/seen.json")
}
fn default_retention_days() -> u32 {
    30
}
fn default_max_items() -> usize {
    9
}
fn default_translate_threshold() -> f32 {
    0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
        keywords = ["rust", " Rust ", ""]

        [[sources]]
        name = "alpha"
        url = "https://example.test/feed.xml"

        [[sources]]
        name = "beta"
        url = "https://example.test/atom.xml"
        kind = "atom"
        enabled = false

        [delivery]
        webhook_url = "https://hooks.example.test/abc"
    "#;

    #[test]
    fn toml_parses_with_defaults() {
        let cfg = parse_config(MINIMAL_TOML, "toml").unwrap();
        assert_eq!(cfg.sources.len(), 2);
        assert_eq!(cfg.sources[0].kind, SourceKind::Rss);
        assert!(cfg.sources[0].enabled);
        assert_eq!(cfg.sources[1].kind, SourceKind::Atom);
        assert!(!cfg.sources[1].enabled);
        assert_eq!(cfg.fetch.max_attempts, 3);
        assert_eq!(cfg.run.max_items, 9);
        assert!(cfg.run.interval_secs.is_none());
    }

    #[test]
    fn json_parses_spec_shape() {
        let json = r#"{
            "sources": [
                {"name": "alpha", "url": "https://example.test/feed.xml", "kind": "rss", "enabled": true}
            ],
            "keywords": ["tech"],
            "delivery": {"webhook_url": "https://hooks.example.test/abc"}
        }"#;
        let cfg = parse_config(json, "json").unwrap();
        assert_eq!(cfg.sources[0].name, "alpha");
        assert_eq!(cfg.keywords, vec!["tech".to_string()]);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let json = r#"{
            "sources": [{"name": "a", "url": "https://x.test/", "kind": "jsonfeed"}],
            "keywords": ["k"]
        }"#;
        assert!(parse_config(json, "json").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn keywords_are_trimmed_and_deduped() {
        let mut cfg = parse_config(MINIMAL_TOML, "toml").unwrap();
        cfg.apply_env_overrides();
        assert_eq!(cfg.keywords, vec!["Rust".to_string(), "rust".to_string()]);
    }

    #[test]
    fn empty_keywords_fail_validation() {
        let mut cfg = parse_config(MINIMAL_TOML, "toml").unwrap();
        cfg.keywords.clear();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[serial_test::serial]
    #[test]
    fn missing_webhook_fails_validation() {
        let mut cfg = parse_config(MINIMAL_TOML, "toml").unwrap();
        cfg.apply_env_overrides();
        cfg.delivery.webhook_url = None;
        assert!(cfg.validate().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn bad_source_url_fails_validation() {
        let mut cfg = parse_config(MINIMAL_TOML, "toml").unwrap();
        cfg.apply_env_overrides();
        cfg.sources[0].url = "not a url".into();
        assert!(cfg.validate().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_webhook_and_keywords() {
        std::env::set_var(ENV_WEBHOOK_URL, "https://hooks.example.test/env");
        std::env::set_var(ENV_KEYWORDS, "go, rust ,");
        let mut cfg = parse_config(MINIMAL_TOML, "toml").unwrap();
        cfg.apply_env_overrides();
        assert_eq!(
            cfg.delivery.webhook_url.as_deref(),
            Some("https://hooks.example.test/env")
        );
        assert_eq!(cfg.keywords, vec!["go".to_string(), "rust".to_string()]);
        std::env::remove_var(ENV_WEBHOOK_URL);
        std::env::remove_var(ENV_KEYWORDS);
    }

    #[serial_test::serial]
    #[test]
    fn from_path_loads_and_validates() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("cfg.toml");
        std::fs::write(&p, MINIMAL_TOML).unwrap();
        let cfg = AppConfig::from_path(&p).unwrap();
        assert_eq!(cfg.sources.len(), 2);
        assert!(cfg.delivery.webhook_url.is_some());
    }

    #[serial_test::serial]
    #[test]
    fn default_locations_fall_back_in_order() {
        let old = std::env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();
        std::env::remove_var(ENV_CONFIG_PATH);

        // No files anywhere: loading fails.
        assert!(load_from_default_locations().is_err());

        // Env path has priority over config/ fallbacks.
        std::fs::create_dir_all("config").unwrap();
        std::fs::write("config/feedwatch.toml", MINIMAL_TOML).unwrap();
        let from_fallback = load_from_default_locations().unwrap();
        assert_eq!(from_fallback.sources.len(), 2);

        let env_p = tmp.path().join("other.toml");
        std::fs::write(
            &env_p,
            r#"
            keywords = ["x"]
            [[sources]]
            name = "env"
            url = "https://env.test/feed.xml"
            "#,
        )
        .unwrap();
        std::env::set_var(ENV_CONFIG_PATH, env_p.display().to_string());
        let from_env = load_from_default_locations().unwrap();
        assert_eq!(from_env.sources[0].name, "env");
        std::env::remove_var(ENV_CONFIG_PATH);

        std::env::set_current_dir(&old).unwrap();
    }
}
