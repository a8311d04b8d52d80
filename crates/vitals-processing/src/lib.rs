//! Vitals-Processing: channel denoising for decoded recordings
//!
//! Wavelet shrinkage followed by cascaded-median baseline removal, run
//! per channel and in parallel across channels.

pub mod processor;
pub mod wavelet;
pub mod filters;
pub mod pipeline;
pub mod config;
pub mod runner;

pub use processor::{ProcessingMetrics, ProcessorType, SignalProcessor};
pub use wavelet::{Wavelet, WaveletCoefficients, WaveletDenoiser};
pub use filters::{median_filter, BaselineRemover};
pub use pipeline::{DenoisePipeline, PipelineBuilder, PipelineResult};
pub use config::{DenoiseConfig, ErrorHandling};
pub use runner::{
    denoise_channels, ChannelReport, ChannelStatus, DenoiseOutcome, DenoiseRunner, PipelineFactory,
};
