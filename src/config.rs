use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::Sample;

/// Replicate labels as they appear in gene table headers.
///
/// A replicate labelled `L` is read from the columns `CPK_L`, `Count_L` and
/// `L`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleLabels {
    pub rep1: String,
    pub rep2: String,
}

impl Default for SampleLabels {
    fn default() -> Self {
        Self {
            rep1: "MR01_1".to_string(),
            rep2: "MR01_2".to_string(),
        }
    }
}

impl SampleLabels {
    pub const POOLED: &'static str = "pooled";

    /// Label of the replicate at `index` (0 or 1).
    pub fn replicate(&self, index: usize) -> &str {
        if index == 0 {
            &self.rep1
        } else {
            &self.rep2
        }
    }

    pub fn label(&self, sample: Sample) -> &str {
        match sample {
            Sample::Rep1 => &self.rep1,
            Sample::Rep2 => &self.rep2,
            Sample::Pooled => Self::POOLED,
        }
    }

    pub fn cpk_column(&self, index: usize) -> String {
        format!("CPK_{}", self.replicate(index))
    }

    pub fn count_column(&self, index: usize) -> String {
        format!("Count_{}", self.replicate(index))
    }

    pub fn rate_column(&self, index: usize) -> String {
        self.replicate(index).to_string()
    }
}

/// Settings of one analysis run.
///
/// Every field has a default, so a config file only needs the values it
/// changes:
///
/// ```rust
/// use mod_rate::config::AnalysisConfig;
///
/// let config: AnalysisConfig = serde_json::from_str(r#"{"pooled": true}"#).unwrap();
/// assert!(config.pooled);
/// assert_eq!(config.labels.rep1, "MR01_1");
/// assert_eq!(config.rate_scale, 100.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub labels: SampleLabels,
    /// Also analyse the pooled view of both replicates.
    pub pooled: bool,
    /// Worker threads for gene aggregation, 0 lets rayon decide.
    pub threads: usize,
    /// Factor applied to rates before regression (100 gives percentages).
    pub rate_scale: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            labels: SampleLabels::default(),
            pooled: false,
            threads: 0,
            rate_scale: 100.0,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AnalysisConfig =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.labels.rep1.trim().is_empty() || self.labels.rep2.trim().is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        if self.labels.rep1 == self.labels.rep2 {
            return Err(ConfigError::DuplicateLabels(self.labels.rep1.clone()));
        }
        if !self.rate_scale.is_finite() || self.rate_scale <= 0.0 {
            return Err(ConfigError::InvalidRateScale(self.rate_scale));
        }
        Ok(())
    }

    /// Samples analysed in this run, in reporting order.
    pub fn samples(&self) -> Vec<Sample> {
        let mut samples = Sample::REPLICATES.to_vec();
        if self.pooled {
            samples.push(Sample::Pooled);
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_columns() {
        let labels = SampleLabels::default();
        assert_eq!(labels.cpk_column(0), "CPK_MR01_1");
        assert_eq!(labels.count_column(1), "Count_MR01_2");
        assert_eq!(labels.rate_column(1), "MR01_2");
        assert_eq!(labels.label(Sample::Pooled), "pooled");
    }

    #[test]
    fn test_samples_without_and_with_pooled() {
        let mut config = AnalysisConfig::default();
        assert_eq!(config.samples(), vec![Sample::Rep1, Sample::Rep2]);
        config.pooled = true;
        assert_eq!(
            config.samples(),
            vec![Sample::Rep1, Sample::Rep2, Sample::Pooled]
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_labels() {
        let mut config = AnalysisConfig::default();
        config.labels.rep2 = "MR01_1".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateLabels(label)) if label == "MR01_1"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        let config = AnalysisConfig {
            rate_scale: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRateScale(_))
        ));
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"labels": {{"rep1": "WT_1"}}, "threads": 4}}"#).unwrap();

        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.labels.rep1, "WT_1");
        assert_eq!(config.labels.rep2, "MR01_2");
        assert_eq!(config.threads, 4);
        assert!(!config.pooled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = AnalysisConfig::from_json_file("tests/data/does_not_exist.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
