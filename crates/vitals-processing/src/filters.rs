//! Median filtering and baseline wander removal

use crate::processor::{
    ensure_processable, ProcessingMetrics, ProcessorType, SignalProcessor,
};
use std::cmp::Ordering;
use tracing::debug;
use vitals_core::{ChannelSignal, VitalsError, VitalsResult};

/// Default cascade of median windows for ECG baseline estimation
pub const DEFAULT_BASELINE_WINDOWS: [usize; 2] = [201, 601];

/// Running median over an odd `window`, padding both ends by replicating the
/// edge samples so the output has the input's length.
pub fn median_filter(signal: &[f64], window: usize) -> VitalsResult<Vec<f64>> {
    validate_window(window)?;
    let (first, last) = match (signal.first(), signal.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Ok(Vec::new()),
    };

    let half = window / 2;
    let padded: Vec<f64> = std::iter::repeat(first)
        .take(half)
        .chain(signal.iter().copied())
        .chain(std::iter::repeat(last).take(half))
        .collect();

    let mut sorted: Vec<f64> = padded[..window].to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut output = Vec::with_capacity(signal.len());
    for i in 0..signal.len() {
        output.push(sorted[half]);
        if i + window < padded.len() {
            let outgoing = padded[i];
            if let Ok(at) = sorted.binary_search_by(|v| v.total_cmp(&outgoing)) {
                sorted.remove(at);
            }
            let incoming = padded[i + window];
            let at = sorted.partition_point(|v| v.total_cmp(&incoming) == Ordering::Less);
            sorted.insert(at, incoming);
        }
    }
    Ok(output)
}

fn validate_window(window: usize) -> VitalsResult<()> {
    if window == 0 || window % 2 == 0 {
        return Err(VitalsError::InvalidConfig {
            message: format!("median window must be odd and non-zero, got {}", window),
        });
    }
    Ok(())
}

/// Baseline remover: cascaded median filters estimate the slow drift, which
/// is then subtracted from the input.
#[derive(Debug, Clone)]
pub struct BaselineRemover {
    name: String,
    windows: Vec<usize>,
}

impl BaselineRemover {
    /// Each window filters the output of the previous one
    pub fn new(windows: &[usize]) -> VitalsResult<Self> {
        if windows.is_empty() {
            return Err(VitalsError::InvalidConfig {
                message: "baseline remover needs at least one median window".to_string(),
            });
        }
        for &window in windows {
            validate_window(window)?;
        }
        Ok(Self {
            name: "Median baseline remover".to_string(),
            windows: windows.to_vec(),
        })
    }

    /// Remover with the 201/601-sample cascade
    pub fn ecg() -> Self {
        Self {
            name: "Median baseline remover".to_string(),
            windows: DEFAULT_BASELINE_WINDOWS.to_vec(),
        }
    }

    pub fn windows(&self) -> &[usize] {
        &self.windows
    }

    /// Baseline estimate of `samples`
    pub fn baseline(&self, samples: &[f64]) -> VitalsResult<Vec<f64>> {
        let mut baseline = samples.to_vec();
        for &window in &self.windows {
            baseline = median_filter(&baseline, window)?;
        }
        Ok(baseline)
    }

    /// `samples` minus their baseline
    pub fn remove(&self, samples: &[f64]) -> VitalsResult<Vec<f64>> {
        let baseline = self.baseline(samples)?;
        Ok(samples.iter().zip(&baseline).map(|(x, b)| x - b).collect())
    }
}

impl SignalProcessor for BaselineRemover {
    fn process(&mut self, input: &ChannelSignal) -> VitalsResult<ChannelSignal> {
        ensure_processable(input)?;
        let timer = ProcessingMetrics::start_timing(&self.name);

        let corrected = self.remove(&input.samples)?;

        let metrics = timer.finish();
        debug!(
            channel = input.channel,
            windows = ?self.windows,
            elapsed_us = metrics.processing_time_us,
            "baseline removed"
        );
        Ok(input.with_samples(corrected))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::BaselineCorrection
    }
}
