//! Per-channel processing pipeline for chaining processors

use crate::config::DenoiseConfig;
use crate::filters::BaselineRemover;
use crate::processor::{ProcessingMetrics, SignalProcessor};
use crate::wavelet::WaveletDenoiser;
use std::time::Instant;
use vitals_core::{ChannelSignal, VitalsResult};

/// Processing pipeline that chains processors over one channel
pub struct DenoisePipeline {
    processors: Vec<Box<dyn SignalProcessor>>,
    name: String,
}

/// Pipeline builder for constructing processing chains
pub struct PipelineBuilder {
    processors: Vec<Box<dyn SignalProcessor>>,
    name: String,
}

/// Pipeline execution result with per-processor metrics
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub output_signal: ChannelSignal,
    pub processing_metrics: Vec<ProcessingMetrics>,
    pub total_latency_us: u64,
}

impl DenoisePipeline {
    /// Create new empty pipeline
    pub fn new(name: &str) -> Self {
        DenoisePipeline {
            processors: Vec::new(),
            name: name.to_string(),
        }
    }

    /// Wavelet shrinkage followed by baseline removal, as configured
    pub fn from_config(config: &DenoiseConfig) -> VitalsResult<Self> {
        config.validate()?;

        let mut denoiser = WaveletDenoiser::new(config.wavelet, config.noise_sigma)?;
        if let Some(levels) = config.levels {
            denoiser = denoiser.with_levels(levels);
        }
        let remover = BaselineRemover::new(&config.baseline_windows)?;

        let mut builder = PipelineBuilder::new(&config.name);
        builder.add_processor(Box::new(denoiser));
        builder.add_processor(Box::new(remover));
        Ok(builder.build())
    }

    /// Default ECG chain
    pub fn ecg() -> VitalsResult<Self> {
        Self::from_config(&DenoiseConfig::ecg())
    }

    /// Add processor to pipeline
    pub fn add_processor(&mut self, processor: Box<dyn SignalProcessor>) {
        self.processors.push(processor);
    }

    /// Process one channel through every processor in order; the first
    /// failure aborts the chain
    pub fn process(&mut self, input: &ChannelSignal) -> VitalsResult<PipelineResult> {
        let start_time = Instant::now();
        let mut current_signal = input.clone();
        let mut all_metrics = Vec::with_capacity(self.processors.len());

        for processor in self.processors.iter_mut() {
            let timer = ProcessingMetrics::start_timing(processor.name());
            current_signal = processor.process(&current_signal)?;
            all_metrics.push(timer.finish());
        }

        Ok(PipelineResult {
            output_signal: current_signal,
            processing_metrics: all_metrics,
            total_latency_us: start_time.elapsed().as_micros() as u64,
        })
    }

    /// Reset all processors in pipeline
    pub fn reset(&mut self) {
        for processor in &mut self.processors {
            processor.reset();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Processor names in execution order
    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl PipelineBuilder {
    /// Create new pipeline builder
    pub fn new(name: &str) -> Self {
        Self {
            processors: Vec::new(),
            name: name.to_string(),
        }
    }

    /// Add processor to pipeline
    pub fn add_processor(&mut self, processor: Box<dyn SignalProcessor>) -> &mut Self {
        self.processors.push(processor);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> DenoisePipeline {
        DenoisePipeline {
            processors: self.processors,
            name: self.name,
        }
    }
}
