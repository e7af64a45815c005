use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Line codes dropped at import (after normalization).
    #[serde(default)]
    pub excluded_lines: Vec<String>,
    /// Numeric line codes are zero-padded to this width ("42" -> "042").
    pub line_code_width: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            excluded_lines:  vec!["900".into()],
            line_code_width: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Window used by impact queries that do not name one.
    pub default_window_days: u32,
    /// Size of the top-gain / top-loss tables.
    pub ranking_size: usize,
    /// Days on each side of the recent-vs-previous trend comparison.
    pub trend_span_days: usize,
    /// Fraction of the series total a trend change must exceed.
    pub trend_threshold_ratio: f64,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_window_days:   7,
            ranking_size:          5,
            trend_span_days:       3,
            trend_threshold_ratio: 0.05,
            ingest:                IngestConfig::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Load from the data/ directory.
    /// In tests, use AnalyticsConfig::default().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/analytics.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: AnalyticsConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.default_window_days == 0 {
            anyhow::bail!("default_window_days must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.trend_threshold_ratio) {
            anyhow::bail!(
                "trend_threshold_ratio must be within [0, 1], got {}",
                self.trend_threshold_ratio
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_file_matches_defaults() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
        let loaded = AnalyticsConfig::load(dir).expect("load data/analytics.json");
        assert_eq!(loaded, AnalyticsConfig::default());
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = AnalyticsConfig {
            default_window_days: 0,
            ..AnalyticsConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
