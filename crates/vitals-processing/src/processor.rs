//! Core signal processor trait and types

use serde::{Deserialize, Serialize};
use std::time::Instant;
use vitals_core::{ChannelSignal, VitalsError, VitalsResult};

/// Core trait for all per-channel processors
pub trait SignalProcessor: Send + Sync {
    /// Process one channel and return the processed channel
    fn process(&mut self, input: &ChannelSignal) -> VitalsResult<ChannelSignal>;

    /// Get processor name/identifier
    fn name(&self) -> &str;

    /// Reset processor internal state
    fn reset(&mut self) {}

    /// Get processor type for pipeline organization
    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Denoiser
    }
}

/// Types of signal processors for pipeline organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorType {
    /// High-frequency noise suppression
    Denoiser,
    /// Slow drift removal
    BaselineCorrection,
}

/// Performance metrics for processing operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    /// Processor that produced these metrics
    pub processor: String,
    /// Actual processing time in microseconds
    pub processing_time_us: u64,
}

/// Helper for timing processing operations
pub struct ProcessingTimer {
    start_time: Instant,
    metrics: ProcessingMetrics,
}

impl ProcessingMetrics {
    pub fn new(processor: &str) -> Self {
        Self {
            processor: processor.to_string(),
            processing_time_us: 0,
        }
    }

    /// Start timing a processing operation
    pub fn start_timing(processor: &str) -> ProcessingTimer {
        ProcessingTimer {
            start_time: Instant::now(),
            metrics: ProcessingMetrics::new(processor),
        }
    }
}

impl ProcessingTimer {
    /// Finish timing and return metrics
    pub fn finish(mut self) -> ProcessingMetrics {
        self.metrics.processing_time_us = self.start_time.elapsed().as_micros() as u64;
        self.metrics
    }
}

/// Reject channels no denoising stage can work on: empty ones and ones
/// carrying NaN or infinite samples.
pub fn ensure_processable(signal: &ChannelSignal) -> VitalsResult<()> {
    if signal.is_empty() {
        return Err(VitalsError::ChannelDenoiseFailure {
            channel: signal.channel,
            reason: "signal is empty".to_string(),
        });
    }
    if let Some(index) = signal.samples.iter().position(|x| !x.is_finite()) {
        return Err(VitalsError::ChannelDenoiseFailure {
            channel: signal.channel,
            reason: format!("non-finite sample {} at index {}", signal.samples[index], index),
        });
    }
    Ok(())
}
