//! Source configuration resolved from the environment.
//!
//! Mirrors how the dashboard was deployed: a database URL when one is
//! available, otherwise CSV exports under `data/processed/`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Default cache lifetime (one hour).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

const FACTS_FILE: &str = "mv_month_brand_country.csv";
const SIGNALS_FILE: &str = "google_trends.csv";

/// Everything the resolver and enricher need to locate data.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Primary relational source (SQLite path or `sqlite://` URL).
    pub database_url: Option<String>,
    /// Explicit fallback fact file. When unset, default locations are probed.
    pub facts_csv: Option<PathBuf>,
    pub brands_csv: Option<PathBuf>,
    pub countries_csv: Option<PathBuf>,
    pub signals_csv: Option<PathBuf>,
    pub cache_ttl: Duration,
    /// Never attempt the primary source.
    pub force_fallback: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            facts_csv: None,
            brands_csv: None,
            countries_csv: None,
            signals_csv: None,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            force_fallback: false,
        }
    }
}

impl SourceConfig {
    /// Load from process environment (a `.env` file is honoured).
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let cache_ttl = match get("LBI_CACHE_TTL_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|_| {
                    AppError::Config(format!("LBI_CACHE_TTL_SECS must be a whole number of seconds, got '{raw}'"))
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        };

        let force_fallback = match get("LBI_FORCE_FALLBACK") {
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| AppError::Config(format!("LBI_FORCE_FALLBACK must be a boolean, got '{raw}'")))?,
            None => false,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").or_else(|| get("POSTGRES_URL")),
            facts_csv: get("LBI_FACTS_CSV").map(PathBuf::from),
            brands_csv: get("LBI_BRANDS_CSV").map(PathBuf::from),
            countries_csv: get("LBI_COUNTRIES_CSV").map(PathBuf::from),
            signals_csv: get("LBI_SIGNALS_CSV").map(PathBuf::from),
            cache_ttl,
            force_fallback,
        })
    }

    /// Candidate fact files, in probe order.
    pub fn fact_candidates(&self) -> Vec<PathBuf> {
        match &self.facts_csv {
            Some(path) => vec![path.clone()],
            None => default_candidates(&["processed"], FACTS_FILE),
        }
    }

    /// Candidate signal files, in probe order.
    pub fn signal_candidates(&self) -> Vec<PathBuf> {
        match &self.signals_csv {
            Some(path) => vec![path.clone()],
            None => default_candidates(&["processed", "raw"], SIGNALS_FILE),
        }
    }

    /// Identifies the configured sources; a different key invalidates the cache.
    pub fn cache_key(&self) -> String {
        let show = |p: &Option<PathBuf>| p.as_deref().map(|p| p.display().to_string()).unwrap_or_default();
        format!(
            "db={}|facts={}|brands={}|countries={}|fallback_only={}",
            self.database_url.as_deref().unwrap_or(""),
            show(&self.facts_csv),
            show(&self.brands_csv),
            show(&self.countries_csv),
            self.force_fallback
        )
    }
}

/// First existing path among `candidates`.
pub fn first_existing(candidates: &[PathBuf]) -> Option<&Path> {
    candidates.iter().map(PathBuf::as_path).find(|p| p.is_file())
}

fn default_candidates(subdirs: &[&str], file: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for sub in subdirs {
        for root in [Path::new("."), Path::new("..")] {
            out.push(root.join("data").join(sub).join(file));
        }
    }
    out
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn reads_environment_keys() {
        let cfg = SourceConfig::from_lookup(lookup(&[
            ("POSTGRES_URL", "sqlite://bi.db"),
            ("LBI_FACTS_CSV", "facts.csv"),
            ("LBI_CACHE_TTL_SECS", "300"),
            ("LBI_FORCE_FALLBACK", "yes"),
        ]))
        .unwrap();
        assert_eq!(cfg.database_url.as_deref(), Some("sqlite://bi.db"));
        assert_eq!(cfg.fact_candidates(), vec![PathBuf::from("facts.csv")]);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(300));
        assert!(cfg.force_fallback);
    }

    #[test]
    fn database_url_takes_precedence() {
        let cfg = SourceConfig::from_lookup(lookup(&[("DATABASE_URL", "a.db"), ("POSTGRES_URL", "b.db")])).unwrap();
        assert_eq!(cfg.database_url.as_deref(), Some("a.db"));
    }

    #[test]
    fn rejects_bad_ttl() {
        let err = SourceConfig::from_lookup(lookup(&[("LBI_CACHE_TTL_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn defaults_probe_processed_directory() {
        let cfg = SourceConfig::default();
        let candidates = cfg.fact_candidates();
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].ends_with("data/processed/mv_month_brand_country.csv"));
        assert_eq!(cfg.cache_ttl, Duration::from_secs(DEFAULT_CACHE_TTL_SECS));
    }
}
