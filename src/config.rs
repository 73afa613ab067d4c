// src/config.rs
//! Source configuration loading. Supports TOML or JSON, with an env override
//! and a built-in seed so the engine can boot with zero files present.

use crate::types::{PlatformFamily, SentimentSource};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "SENTIMENT_SOURCES_PATH";

/// Load source definitions from an explicit path. Format is picked by the
/// file extension, with a content sniff as fallback.
pub fn load_sources_from(path: &Path) -> Result<Vec<SentimentSource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load sources using env var + fallbacks:
/// 1) $SENTIMENT_SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in default seed
pub fn load_sources_default() -> Result<Vec<SentimentSource>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        }
        return Err(anyhow!("SENTIMENT_SOURCES_PATH points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(default_seed())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SentimentSource>> {
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported sources format"))
}

fn parse_toml(s: &str) -> Result<Vec<SentimentSource>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        sources: Vec<SentimentSource>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<SentimentSource>> {
    let v: Vec<SentimentSource> = serde_json::from_str(s)?;
    Ok(v)
}

/// Built-in seed: one mock source per platform family. These drive the
/// simulated adapters until real streaming/polling clients replace them.
pub fn default_seed() -> Vec<SentimentSource> {
    vec![
        SentimentSource {
            id: "twitter_api".into(),
            platform: PlatformFamily::Social,
            credential: None,
            reliability_weight: 55,
            update_frequency_secs: 15,
            hourly_request_ceiling: 240,
            active: true,
        },
        SentimentSource {
            id: "financial_news".into(),
            platform: PlatformFamily::News,
            credential: None,
            reliability_weight: 85,
            update_frequency_secs: 60,
            hourly_request_ceiling: 60,
            active: true,
        },
        SentimentSource {
            id: "sec_filings".into(),
            platform: PlatformFamily::Regulatory,
            credential: None,
            reliability_weight: 95,
            update_frequency_secs: 300,
            hourly_request_ceiling: 12,
            active: true,
        },
    ]
}
