use crate::error::{Result, SlicerError};
use crate::slicer::SliceParameters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sample encoding used when writing slices to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    #[default]
    Pcm16,
    Float32,
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleFormat::Pcm16 => write!(f, "pcm16"),
            SampleFormat::Float32 => write!(f, "float32"),
        }
    }
}

impl std::str::FromStr for SampleFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pcm16" | "int16" => Ok(SampleFormat::Pcm16),
            "float32" | "f32" => Ok(SampleFormat::Float32),
            _ => Err(format!(
                "Unknown sample format: {}. Use 'pcm16' or 'float32'",
                s
            )),
        }
    }
}

/// What the batch runner does when a single file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failing file. No report is written.
    #[default]
    Abort,
    /// Record the failure on the file's task entry and move on.
    Continue,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Abort => write!(f, "abort"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            _ => Err(format!(
                "Unknown failure policy: {}. Use 'abort' or 'continue'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Silence threshold in dB.
    pub threshold: f64,
    /// Minimum slice length in milliseconds.
    pub min_length: u32,
    /// Minimum silence length in milliseconds for a cut.
    pub min_interval: u32,
    /// RMS frame hop in milliseconds.
    pub hop_size: u32,
    /// Maximum silence kept around each slice in milliseconds.
    pub max_silence_kept: u32,
    pub sample_format: SampleFormat,
    pub failure_policy: FailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: -40.0,
            min_length: 5000,
            min_interval: 300,
            hop_size: 10,
            max_silence_kept: 500,
            sample_format: SampleFormat::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    SlicerError::Config(format!("{}: {e}", config_path.display()))
                })?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Override fields from `AUDIOSLICER_*` environment variables. Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse("AUDIOSLICER_THRESHOLD") {
            self.threshold = v;
        }
        if let Some(v) = env_parse("AUDIOSLICER_MIN_LENGTH") {
            self.min_length = v;
        }
        if let Some(v) = env_parse("AUDIOSLICER_MIN_INTERVAL") {
            self.min_interval = v;
        }
        if let Some(v) = env_parse("AUDIOSLICER_HOP_SIZE") {
            self.hop_size = v;
        }
        if let Some(v) = env_parse("AUDIOSLICER_MAX_SILENCE_KEPT") {
            self.max_silence_kept = v;
        }
        if let Some(v) = env_parse("AUDIOSLICER_SAMPLE_FORMAT") {
            self.sample_format = v;
        }
        if let Some(v) = env_parse("AUDIOSLICER_FAILURE_POLICY") {
            self.failure_policy = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(SlicerError::Config(
                "Threshold must be a finite number of dB".to_string(),
            ));
        }

        if self.hop_size == 0 {
            return Err(SlicerError::Config(
                "Hop size must be greater than 0".to_string(),
            ));
        }

        if !(self.min_length >= self.min_interval && self.min_interval >= self.hop_size) {
            return Err(SlicerError::Config(format!(
                "Expected min_length ({}) >= min_interval ({}) >= hop_size ({})",
                self.min_length, self.min_interval, self.hop_size
            )));
        }

        if self.max_silence_kept < self.hop_size {
            return Err(SlicerError::Config(format!(
                "Expected max_silence_kept ({}) >= hop_size ({})",
                self.max_silence_kept, self.hop_size
            )));
        }

        Ok(())
    }

    pub fn slice_parameters(&self) -> SliceParameters {
        SliceParameters {
            sample_rate_hint: None,
            threshold: self.threshold,
            min_length: self.min_length,
            min_interval: self.min_interval,
            hop_size: self.hop_size,
            max_silence_kept: self.max_silence_kept,
        }
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("audioslicer").join("config.toml"))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_format_parsing() {
        assert_eq!("pcm16".parse::<SampleFormat>().unwrap(), SampleFormat::Pcm16);
        assert_eq!("FLOAT32".parse::<SampleFormat>().unwrap(), SampleFormat::Float32);
        assert!("mp3".parse::<SampleFormat>().is_err());
    }

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!("abort".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
        assert_eq!("Continue".parse::<FailurePolicy>().unwrap(), FailurePolicy::Continue);
        assert!("retry".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::Continue.to_string(), "continue");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.threshold, -40.0);
        assert_eq!(config.min_length, 5000);
        assert_eq!(config.min_interval, 300);
        assert_eq!(config.hop_size, 10);
        assert_eq!(config.max_silence_kept, 500);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_hop_size() {
        let config = Config {
            hop_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_parameter_ordering() {
        let config = Config {
            min_length: 100,
            min_interval: 300,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_silence_kept: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("threshold = -30.0\nfailure_policy = \"continue\"").unwrap();
        assert_eq!(config.threshold, -30.0);
        assert_eq!(config.min_length, 5000);
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
    }

    #[test]
    fn test_slice_parameters_from_config() {
        let params = Config::default().slice_parameters();
        assert_eq!(params.hop_size, 10);
        assert_eq!(params.sample_rate_hint, None);
    }
}
