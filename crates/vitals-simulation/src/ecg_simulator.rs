//! Multi-rate vital-sign simulator with noise and baseline wander

use crate::signal_patterns::SignalPattern;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use vitals_core::{ChannelSignal, VitalsError, VitalsResult};

/// One simulated channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// Waveform
    pub pattern: SignalPattern,
    /// DC level added to the waveform (ADC mid-scale for unsigned recordings)
    pub offset: f64,
}

/// Noise configuration for realistic simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation (0.0 = no noise)
    pub gaussian_std: f64,
    /// Baseline wander amplitude
    pub baseline_wander: f64,
    /// Baseline wander frequency in Hz
    pub wander_frequency: f64,
    /// Spike artifact probability per sample (0.0 to 1.0)
    pub spike_prob: f64,
    /// Spike artifact amplitude
    pub spike_amp: f64,
}

/// Configuration of a simulated recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Main (tick) sampling rate in Hz
    pub main_sampling_rate: f64,
    /// Channels in index order
    pub channels: Vec<ChannelSpec>,
    /// Noise configuration
    pub noise: NoiseConfig,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 14.0,
            baseline_wander: 150.0,
            wander_frequency: 0.25,
            spike_prob: 0.0,
            spike_amp: 0.0,
        }
    }
}

impl NoiseConfig {
    /// No noise of any kind
    pub fn clean() -> Self {
        Self {
            gaussian_std: 0.0,
            baseline_wander: 0.0,
            wander_frequency: 0.0,
            spike_prob: 0.0,
            spike_amp: 0.0,
        }
    }
}

impl SimulationConfig {
    /// Bedside monitor layout: two ECG leads at 500 Hz, respiration at 125 Hz
    pub fn bedside_monitor() -> Self {
        let ecg = SignalPattern::Ecg {
            heart_rate_bpm: 72.0,
            r_amplitude: 400.0,
        };
        Self {
            main_sampling_rate: 500.0,
            channels: vec![
                ChannelSpec { sampling_rate: 500.0, pattern: ecg, offset: 2048.0 },
                ChannelSpec { sampling_rate: 500.0, pattern: ecg, offset: 2048.0 },
                ChannelSpec {
                    sampling_rate: 125.0,
                    pattern: SignalPattern::Respiration { rate_bpm: 14.0, amplitude: 200.0 },
                    offset: 2048.0,
                },
            ],
            noise: NoiseConfig::default(),
            seed: Some(42),
        }
    }

    /// Per-channel sampling rates
    pub fn sampling_rates(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.sampling_rate).collect()
    }
}

/// Seeded generator of multi-rate channel signals
pub struct VitalsSimulator {
    config: SimulationConfig,
    rng: rand::rngs::StdRng,
    normal_dist: Normal<f64>,
}

impl VitalsSimulator {
    /// Create new simulator with configuration
    pub fn new(config: SimulationConfig) -> VitalsResult<Self> {
        if config.channels.is_empty() {
            return Err(simulation_error("at least one channel is required".to_string()));
        }
        if let Some(spec) = config
            .channels
            .iter()
            .find(|c| !c.sampling_rate.is_finite() || c.sampling_rate <= 0.0)
        {
            return Err(simulation_error(format!(
                "channel sampling rate {} is not positive",
                spec.sampling_rate
            )));
        }

        let seed = config.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });

        let rng = rand::rngs::StdRng::seed_from_u64(seed);
        let normal_dist = Normal::new(0.0, config.noise.gaussian_std).map_err(|e| {
            simulation_error(format!("Failed to create normal distribution: {}", e))
        })?;

        Ok(VitalsSimulator {
            config,
            rng,
            normal_dist,
        })
    }

    /// Generate `duration_s` seconds of every channel, each at its own rate
    pub fn generate(&mut self, duration_s: f64) -> Vec<ChannelSignal> {
        let specs = self.config.channels.clone();
        specs
            .iter()
            .enumerate()
            .map(|(channel, spec)| {
                let count = (duration_s * spec.sampling_rate).floor().max(0.0) as usize;
                let samples = (0..count)
                    .map(|i| {
                        let time = i as f64 / spec.sampling_rate;
                        spec.offset + spec.pattern.value_at(time) + self.noise_at(time)
                    })
                    .collect();
                ChannelSignal::new(channel, samples, spec.sampling_rate)
            })
            .collect()
    }

    /// Generate the noise-free version of every channel
    pub fn generate_clean(&self, duration_s: f64) -> Vec<ChannelSignal> {
        self.config
            .channels
            .iter()
            .enumerate()
            .map(|(channel, spec)| {
                let count = (duration_s * spec.sampling_rate).floor().max(0.0) as usize;
                let samples = (0..count)
                    .map(|i| spec.offset + spec.pattern.value_at(i as f64 / spec.sampling_rate))
                    .collect();
                ChannelSignal::new(channel, samples, spec.sampling_rate)
            })
            .collect()
    }

    fn noise_at(&mut self, time: f64) -> f64 {
        let noise = &self.config.noise;
        let mut value = noise.baseline_wander * (2.0 * PI * noise.wander_frequency * time).sin();

        if noise.gaussian_std > 0.0 {
            value += self.normal_dist.sample(&mut self.rng);
        }

        if noise.spike_prob > 0.0 && self.rng.gen::<f64>() < noise.spike_prob {
            value += noise.spike_amp * self.rng.gen_range(-1.0..1.0);
        }

        value
    }

    /// Get current configuration
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

fn simulation_error(message: String) -> VitalsError {
    VitalsError::InvalidConfig { message }
}
