use crate::defaults;
use crate::error::DenoiseError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root pipeline configuration, constructed once at pipeline start and
/// passed by reference into every component constructor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub models: ModelConfig,
    pub queues: QueueConfig,
    pub performance: PerformanceProfile,
}

/// Model weight locations and the fixed target sample rate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Frequency-domain mask estimator (stage 1).
    pub mask_model: PathBuf,
    /// Time-domain post-filter (stage 2).
    pub postfilter_model: PathBuf,
    /// Target sample rate in Hz. The shipped weights require 16 000.
    pub sample_rate: u32,
}

/// Capacities of the three stage-boundary queues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub input_capacity: usize,
    pub output_capacity: usize,
    pub processing_capacity: usize,
}

/// Process-wide adaptive performance state.
///
/// Mutated only by the adaptive controller; other components read it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceProfile {
    /// True on constrained hardware (smaller batches, frame skipping,
    /// reduced telemetry).
    pub constrained: bool,
    /// Process every Nth hop; skipped hops replay the previous output.
    pub frame_skip_interval: u32,
    /// Probability of emitting a spectrogram sample per processed frame.
    pub spectrogram_rate: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            mask_model: PathBuf::from("models/dtln_model_1.onnx"),
            postfilter_model: PathBuf::from("models/dtln_model_2.onnx"),
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            input_capacity: defaults::INPUT_QUEUE_CAPACITY,
            output_capacity: defaults::OUTPUT_QUEUE_CAPACITY,
            processing_capacity: defaults::PROCESSING_QUEUE_CAPACITY,
        }
    }
}

impl Default for PerformanceProfile {
    fn default() -> Self {
        Self {
            constrained: false,
            frame_skip_interval: defaults::MIN_FRAME_SKIP,
            spectrogram_rate: defaults::SPECTROGRAM_RATE,
        }
    }
}

impl PerformanceProfile {
    /// Profile for constrained hardware.
    pub fn constrained() -> Self {
        Self {
            constrained: true,
            frame_skip_interval: defaults::CONSTRAINED_FRAME_SKIP,
            spectrogram_rate: defaults::CONSTRAINED_SPECTROGRAM_RATE,
        }
    }

    /// Frames the controller drains per batch under this profile.
    pub fn batch_size(&self) -> usize {
        if self.constrained {
            defaults::CONSTRAINED_BATCH_SIZE
        } else {
            defaults::BATCH_SIZE
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file is missing, contains invalid TOML, or
    /// fails validation. Missing fields use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow::Error::new(DenoiseError::ConfigFileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                anyhow::Error::new(e)
            }
        })?;
        let config: PipelineConfig = toml::from_str(&contents).map_err(DenoiseError::Config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if the file does
    /// not exist. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Err(e)
                if e.downcast_ref::<DenoiseError>()
                    .is_some_and(|d| matches!(d, DenoiseError::ConfigFileNotFound { .. })) =>
            {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Rejects values that would break the pipeline at runtime.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.models.sample_rate == 0 {
            return Err(DenoiseError::ConfigInvalidValue {
                key: "models.sample_rate".into(),
                message: "must be positive".into(),
            });
        }
        for (key, value) in [
            ("queues.input_capacity", self.queues.input_capacity),
            ("queues.output_capacity", self.queues.output_capacity),
            ("queues.processing_capacity", self.queues.processing_capacity),
        ] {
            if value == 0 {
                return Err(DenoiseError::ConfigInvalidValue {
                    key: key.into(),
                    message: "must be at least 1".into(),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.performance.spectrogram_rate) {
            return Err(DenoiseError::ConfigInvalidValue {
                key: "performance.spectrogram_rate".into(),
                message: "must be within [0, 1]".into(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - DTLN_STREAM_MASK_MODEL → models.mask_model
    /// - DTLN_STREAM_POSTFILTER_MODEL → models.postfilter_model
    /// - DTLN_STREAM_CONSTRAINED → performance (constrained profile when "1"
    ///   or "true")
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("DTLN_STREAM_MASK_MODEL")
            && !path.is_empty()
        {
            self.models.mask_model = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("DTLN_STREAM_POSTFILTER_MODEL")
            && !path.is_empty()
        {
            self.models.postfilter_model = PathBuf::from(path);
        }

        if let Ok(flag) = std::env::var("DTLN_STREAM_CONSTRAINED")
            && (flag == "1" || flag.eq_ignore_ascii_case("true"))
        {
            self.performance = PerformanceProfile::constrained();
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_matches_model_contract() {
        let config = PipelineConfig::default();
        assert_eq!(config.models.sample_rate, 16_000);
        assert_eq!(config.queues.input_capacity, 50);
        assert_eq!(config.queues.output_capacity, 50);
        assert_eq!(config.queues.processing_capacity, 30);
        assert!(!config.performance.constrained);
        assert_eq!(config.performance.frame_skip_interval, 1);
    }

    #[test]
    fn constrained_profile_defaults() {
        let profile = PerformanceProfile::constrained();
        assert!(profile.constrained);
        assert_eq!(profile.frame_skip_interval, 2);
        assert_eq!(profile.batch_size(), 2);
        assert!((profile.spectrogram_rate - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn batch_size_for_full_profile() {
        assert_eq!(PerformanceProfile::default().batch_size(), 3);
    }

    #[test]
    fn load_parses_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[queues]\ninput_capacity = 8\n\n[performance]\nconstrained = true"
        )
        .unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.queues.input_capacity, 8);
        // Unspecified fields fall back to defaults
        assert_eq!(config.queues.output_capacity, 50);
        assert!(config.performance.constrained);
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let config = PipelineConfig::load_or_default(Path::new("/nonexistent/dtln.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "queues = nonsense =").unwrap();
        assert!(PipelineConfig::load(file.path()).is_err());
        assert!(PipelineConfig::load_or_default(file.path()).is_err());
    }

    #[test]
    fn validate_rejects_zero_capacities_and_bad_rates() {
        let mut config = PipelineConfig::default();
        config.queues.input_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.performance.spectrogram_rate = 1.5;
        assert!(config.validate().is_err());

        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[queues]\noutput_capacity = 0").unwrap();
        assert!(PipelineConfig::load(file.path()).is_err());
    }

    #[test]
    fn toml_round_trip() {
        let mut config = PipelineConfig::default();
        config.performance = PerformanceProfile::constrained();
        let text = toml::to_string(&config).unwrap();
        let parsed: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
