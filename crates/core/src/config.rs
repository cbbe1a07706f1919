//! Config file parsing for `~/.config/comicbox/config.toml`.
//!
//! Use `extract_options_from_config` to build extractor options from the loaded
//! config so the DIVINA threshold and security settings apply.

use serde::{Deserialize, Serialize};

use crate::security::SecurityLimits;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Pages of a fixed-layout EPUB with more body text than this are not
    /// image-only, which rules out reading the book as a comic.
    #[serde(default = "default_letter_count_threshold")]
    pub divina_letter_count_threshold: usize,
    #[serde(default = "default_analyze_dimensions")]
    pub analyze_dimensions: bool,
}

fn default_letter_count_threshold() -> usize {
    15
}
fn default_analyze_dimensions() -> bool {
    true
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            divina_letter_count_threshold: default_letter_count_threshold(),
            analyze_dimensions: default_analyze_dimensions(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub max_file_size_mb: Option<u64>,
    pub max_compression_ratio: Option<u64>,
    pub max_file_count: Option<u64>,
}

/// Options shared by the extractors.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub security: SecurityLimits,
    pub divina_letter_count_threshold: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            security: SecurityLimits::default(),
            divina_letter_count_threshold: default_letter_count_threshold(),
        }
    }
}

/// Load config from the default path (`~/.config/comicbox/config.toml`).
pub fn load_config() -> AppConfig {
    let Some(config_path) = config_path() else {
        return AppConfig::default();
    };

    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(_) => return AppConfig::default(),
    };

    parse_config(&content)
}

/// Parse config text; invalid TOML yields the defaults.
pub fn parse_config(content: &str) -> AppConfig {
    match toml::from_str::<AppConfig>(content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Ignoring invalid config: {}", e);
            AppConfig::default()
        }
    }
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("comicbox");
        p.push("config.toml");
        p
    })
}

/// Build security limits from config. Uses defaults for any unset values.
pub fn security_limits_from_config(c: &SecurityConfig) -> SecurityLimits {
    let mut limits = SecurityLimits::default();
    if let Some(mb) = c.max_file_size_mb {
        limits.max_resource_size_bytes = mb.saturating_mul(1024).saturating_mul(1024);
    }
    if let Some(r) = c.max_compression_ratio {
        limits.max_compression_ratio = r;
    }
    if let Some(n) = c.max_file_count {
        limits.max_file_count = n;
    }
    limits
}

/// Build extractor options from full app config.
pub fn extract_options_from_config(cfg: &AppConfig) -> ExtractOptions {
    ExtractOptions {
        security: security_limits_from_config(&cfg.security),
        divina_letter_count_threshold: cfg.extract.divina_letter_count_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = parse_config("");
        assert_eq!(cfg.extract.divina_letter_count_threshold, 15);
        assert!(cfg.extract.analyze_dimensions);
        assert!(cfg.security.max_file_size_mb.is_none());
    }

    #[test]
    fn reads_sections() {
        let cfg = parse_config(
            "[extract]\ndivina_letter_count_threshold = 40\nanalyze_dimensions = false\n\n[security]\nmax_file_size_mb = 10\nmax_file_count = 50\n",
        );
        let opts = extract_options_from_config(&cfg);
        assert_eq!(opts.divina_letter_count_threshold, 40);
        assert!(!cfg.extract.analyze_dimensions);
        assert_eq!(opts.security.max_resource_size_bytes, 10 * 1024 * 1024);
        assert_eq!(opts.security.max_file_count, 50);
        assert_eq!(opts.security.max_compression_ratio, 100);
    }

    #[test]
    fn invalid_config_falls_back() {
        let cfg = parse_config("[extract\nbroken");
        assert_eq!(cfg.extract.divina_letter_count_threshold, 15);
    }

    #[test]
    fn round_trips_through_toml() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let cfg = parse_config(&text);
        assert_eq!(cfg.extract.divina_letter_count_threshold, 15);
    }
}
