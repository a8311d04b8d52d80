//! Configuration management for channel denoising

use crate::filters::DEFAULT_BASELINE_WINDOWS;
use crate::wavelet::Wavelet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vitals_core::{VitalsError, VitalsResult};

/// Default noise level for ECG recordings in raw sample units
pub const DEFAULT_NOISE_SIGMA: f64 = 14.0;

/// Denoising configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenoiseConfig {
    /// Configuration name/profile
    pub name: String,
    /// Wavelet basis
    pub wavelet: Wavelet,
    /// Noise standard deviation used by the universal threshold
    pub noise_sigma: f64,
    /// Decomposition depth cap; `None` uses `floor(log2(n))`
    pub levels: Option<usize>,
    /// Cascaded median windows of the baseline estimate, applied in order
    pub baseline_windows: Vec<usize>,
    /// Error handling strategy
    pub error_handling: ErrorHandling,
    /// Maximum channels denoised concurrently
    pub max_workers: usize,
}

/// What to do when a channel cannot be denoised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorHandling {
    /// Abort the whole batch, reporting the failing channel
    StrictMode,
    /// Keep the original samples for the failing channel and report it
    BypassMode,
}

impl DenoiseConfig {
    /// ECG denoising: Symlet-8, sigma 14, 201/601 median cascade, strict
    pub fn ecg() -> Self {
        Self {
            name: "ECG".to_string(),
            wavelet: Wavelet::Sym8,
            noise_sigma: DEFAULT_NOISE_SIGMA,
            levels: None,
            baseline_windows: DEFAULT_BASELINE_WINDOWS.to_vec(),
            error_handling: ErrorHandling::StrictMode,
            max_workers: default_workers(),
        }
    }

    /// Fast preview: Haar basis, shallow decomposition, failures bypassed
    pub fn quick_look() -> Self {
        Self {
            name: "Quick look".to_string(),
            wavelet: Wavelet::Haar,
            levels: Some(4),
            error_handling: ErrorHandling::BypassMode,
            ..Self::ecg()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> VitalsResult<()> {
        if !self.noise_sigma.is_finite() || self.noise_sigma < 0.0 {
            return Err(config_error(format!(
                "Noise sigma must be finite and non-negative, got {}",
                self.noise_sigma
            )));
        }

        if self.baseline_windows.is_empty() {
            return Err(config_error("At least one baseline window is required".to_string()));
        }

        for &window in &self.baseline_windows {
            if window == 0 || window % 2 == 0 {
                return Err(config_error(format!(
                    "Baseline window must be odd and non-zero, got {}",
                    window
                )));
            }
        }

        if self.max_workers == 0 {
            return Err(config_error("Worker count must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> VitalsResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error(format!("Failed to serialize configuration: {}", e)))
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> VitalsResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| config_error(format!("Failed to deserialize configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> VitalsResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self::ecg()
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn config_error(message: String) -> VitalsError {
    VitalsError::InvalidConfig { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecg_config() {
        let config = DenoiseConfig::ecg();
        assert_eq!(config.wavelet, Wavelet::Sym8);
        assert_eq!(config.noise_sigma, 14.0);
        assert_eq!(config.baseline_windows, vec![201, 601]);
        assert_eq!(config.error_handling, ErrorHandling::StrictMode);
        assert!(config.max_workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_quick_look_config() {
        let config = DenoiseConfig::quick_look();
        assert_eq!(config.wavelet, Wavelet::Haar);
        assert_eq!(config.error_handling, ErrorHandling::BypassMode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = DenoiseConfig::default();
        config.noise_sigma = -1.0;
        assert!(config.validate().is_err());

        let mut config = DenoiseConfig::default();
        config.baseline_windows = vec![201, 600];
        assert!(config.validate().is_err());

        let mut config = DenoiseConfig::default();
        config.baseline_windows.clear();
        assert!(config.validate().is_err());

        let mut config = DenoiseConfig::default();
        config.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_serialization() {
        let mut config = DenoiseConfig::ecg();
        config.levels = Some(6);
        config.error_handling = ErrorHandling::BypassMode;

        let json = config.to_json().unwrap();
        let restored = DenoiseConfig::from_json(&json).unwrap();
        assert_eq!(restored.levels, Some(6));
        assert_eq!(restored.error_handling, ErrorHandling::BypassMode);
        assert_eq!(restored.wavelet, Wavelet::Sym8);
    }

    #[test]
    fn test_from_json_validates() {
        let mut config = DenoiseConfig::ecg();
        config.baseline_windows = vec![0];
        let json = serde_json::to_string(&config).unwrap();
        assert!(DenoiseConfig::from_json(&json).is_err());
    }
}
