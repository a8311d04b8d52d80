//! Pre-defined physiological waveform patterns

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Predefined waveform patterns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SignalPattern {
    /// Constant level
    Flat { level: f64 },
    /// Pure sinusoid
    Sinusoid { frequency: f64, amplitude: f64 },
    /// ECG-like beat train built from P, QRS and T waves
    Ecg { heart_rate_bpm: f64, r_amplitude: f64 },
    /// Slow breathing trace
    Respiration { rate_bpm: f64, amplitude: f64 },
}

/// One wave of a beat: center as a fraction of the beat period, gaussian
/// width in seconds, amplitude relative to the R wave
const ECG_WAVES: [(f64, f64, f64); 5] = [
    (0.20, 0.025, 0.12),  // P
    (0.36, 0.010, -0.15), // Q
    (0.40, 0.012, 1.00),  // R
    (0.44, 0.010, -0.25), // S
    (0.68, 0.040, 0.30),  // T
];

impl SignalPattern {
    /// Waveform value at `time` seconds
    pub fn value_at(&self, time: f64) -> f64 {
        match self {
            SignalPattern::Flat { level } => *level,

            SignalPattern::Sinusoid { frequency, amplitude } => {
                amplitude * (2.0 * PI * frequency * time).sin()
            }

            SignalPattern::Ecg { heart_rate_bpm, r_amplitude } => {
                let period = 60.0 / heart_rate_bpm;
                let phase = time.rem_euclid(period);
                ECG_WAVES
                    .iter()
                    .map(|&(center, width, relative)| {
                        let dt = phase - center * period;
                        relative * (-0.5 * (dt / width).powi(2)).exp()
                    })
                    .sum::<f64>()
                    * r_amplitude
            }

            SignalPattern::Respiration { rate_bpm, amplitude } => {
                let phase = 2.0 * PI * rate_bpm / 60.0 * time;
                // slightly faster inhale than exhale
                amplitude * (phase.sin() + 0.25 * (2.0 * phase).sin())
            }
        }
    }

    /// Get pattern description
    pub fn description(&self) -> &'static str {
        match self {
            SignalPattern::Flat { .. } => "Flat line",
            SignalPattern::Sinusoid { .. } => "Sinusoid",
            SignalPattern::Ecg { .. } => "ECG beat train",
            SignalPattern::Respiration { .. } => "Respiration",
        }
    }

    /// Create common preset patterns
    pub fn presets() -> Vec<(&'static str, SignalPattern)> {
        vec![
            ("Resting ECG", SignalPattern::Ecg { heart_rate_bpm: 60.0, r_amplitude: 400.0 }),
            ("Tachycardia", SignalPattern::Ecg { heart_rate_bpm: 150.0, r_amplitude: 350.0 }),
            ("Calm breathing", SignalPattern::Respiration { rate_bpm: 12.0, amplitude: 200.0 }),
            ("Test tone", SignalPattern::Sinusoid { frequency: 10.0, amplitude: 100.0 }),
            ("Lead off", SignalPattern::Flat { level: 0.0 }),
        ]
    }
}
