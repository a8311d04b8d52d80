//! Parallel denoising across channels
//!
//! One blocking task per channel on a tokio `JoinSet`, capped by a semaphore
//! at `max_workers`. Every task owns its channel and its own pipeline; results
//! land in a slot indexed by channel, so output order never depends on which
//! task finishes first.
//!
//! The synchronous entry points work both outside and inside a tokio runtime.

use crate::config::{DenoiseConfig, ErrorHandling};
use crate::pipeline::DenoisePipeline;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn};
use vitals_core::{ChannelSignal, VitalsError, VitalsResult};

/// Outcome of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChannelStatus {
    /// Denoised successfully
    Denoised,
    /// Denoising failed; the original samples were kept
    Bypassed { reason: String },
    /// Outside the requested channel count; returned unchanged
    Skipped,
}

/// Per-channel report of a denoise run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelReport {
    pub channel: usize,
    pub status: ChannelStatus,
    pub processing_time_us: u64,
}

/// Channels and reports of a denoise run, both in channel order
#[derive(Debug, Clone)]
pub struct DenoiseOutcome {
    pub channels: Vec<ChannelSignal>,
    pub reports: Vec<ChannelReport>,
}

impl DenoiseOutcome {
    /// Channels that fell back to their original samples
    pub fn bypassed(&self) -> Vec<usize> {
        self.reports
            .iter()
            .filter(|r| matches!(r.status, ChannelStatus::Bypassed { .. }))
            .map(|r| r.channel)
            .collect()
    }
}

/// Builds the pipeline each worker runs over its channel
pub type PipelineFactory =
    Arc<dyn Fn(&DenoiseConfig) -> VitalsResult<DenoisePipeline> + Send + Sync>;

/// Runs the denoise pipeline over many channels concurrently
#[derive(Clone)]
pub struct DenoiseRunner {
    config: Arc<DenoiseConfig>,
    factory: PipelineFactory,
}

type TaskOutput = (usize, VitalsResult<(ChannelSignal, u64)>);

impl DenoiseRunner {
    pub fn new(config: DenoiseConfig) -> VitalsResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            factory: Arc::new(DenoisePipeline::from_config),
        })
    }

    /// Replace the default wavelet + baseline chain
    pub fn with_pipeline_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&DenoiseConfig) -> VitalsResult<DenoisePipeline> + Send + Sync + 'static,
    {
        self.factory = Arc::new(factory);
        self
    }

    pub fn config(&self) -> &DenoiseConfig {
        &self.config
    }

    /// Denoise the first `channel_limit` channels (all when `None`); later
    /// channels are returned unchanged.
    pub async fn run(
        &self,
        channels: Vec<ChannelSignal>,
        channel_limit: Option<usize>,
    ) -> VitalsResult<DenoiseOutcome> {
        let total = channels.len();
        let active = self.active_count(total, channel_limit);
        info!(
            channels = total,
            active,
            workers = self.config.max_workers,
            wavelet = ?self.config.wavelet,
            "denoising channels"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let mut slots: Vec<Option<(ChannelSignal, ChannelReport)>> = vec![None; total];
        let mut originals: Vec<Option<Arc<ChannelSignal>>> = vec![None; total];
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();

        for (index, signal) in channels.into_iter().enumerate() {
            if index >= active {
                slots[index] = Some((
                    signal,
                    ChannelReport {
                        channel: index,
                        status: ChannelStatus::Skipped,
                        processing_time_us: 0,
                    },
                ));
                continue;
            }

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| VitalsError::ChannelDenoiseFailure {
                    channel: index,
                    reason: format!("worker pool closed: {}", e),
                })?;
            let signal = Arc::new(signal);
            originals[index] = Some(Arc::clone(&signal));
            let config = Arc::clone(&self.config);
            let factory = Arc::clone(&self.factory);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let span = info_span!("denoise", channel = index);
                let _enter = span.enter();
                (index, denoise_channel(&config, factory.as_ref(), index, &signal))
            });
        }

        let mut failures: Vec<VitalsError> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = match joined {
                Ok(output) => output,
                Err(e) => {
                    // the channel index is recovered below from its empty slot
                    warn!(error = %e, "denoise worker did not complete");
                    continue;
                }
            };

            match outcome {
                Ok((denoised, elapsed_us)) => {
                    debug!(channel = index, elapsed_us, "channel denoised");
                    slots[index] = Some((
                        denoised,
                        ChannelReport {
                            channel: index,
                            status: ChannelStatus::Denoised,
                            processing_time_us: elapsed_us,
                        },
                    ));
                }
                Err(e) => failures.push(e),
            }
        }

        for (index, slot) in slots.iter().enumerate().take(active) {
            if slot.is_none() && !failures.iter().any(|f| f.channel() == Some(index)) {
                failures.push(VitalsError::ChannelDenoiseFailure {
                    channel: index,
                    reason: "worker did not complete".to_string(),
                });
            }
        }
        failures.sort_by_key(|f| f.channel());

        if self.config.error_handling == ErrorHandling::StrictMode && !failures.is_empty() {
            warn!(failed = failures.len(), "denoising aborted");
            return Err(failures.swap_remove(0));
        }

        for failure in failures {
            let Some(index) = failure.channel() else { continue };
            warn!(channel = index, error = %failure, "keeping original samples");
            let original = originals[index]
                .take()
                .map(|shared| Arc::try_unwrap(shared).unwrap_or_else(|shared| (*shared).clone()))
                .ok_or_else(|| VitalsError::ChannelDenoiseFailure {
                    channel: index,
                    reason: "original samples were never handed to a worker".to_string(),
                })?;
            slots[index] = Some((
                original,
                ChannelReport {
                    channel: index,
                    status: ChannelStatus::Bypassed {
                        reason: failure.to_string(),
                    },
                    processing_time_us: 0,
                },
            ));
        }

        let mut outcome = DenoiseOutcome {
            channels: Vec::with_capacity(total),
            reports: Vec::with_capacity(total),
        };
        for (index, slot) in slots.into_iter().enumerate() {
            let (signal, report) = slot.ok_or_else(|| VitalsError::ChannelDenoiseFailure {
                channel: index,
                reason: "no result for channel".to_string(),
            })?;
            outcome.channels.push(signal);
            outcome.reports.push(report);
        }

        info!(
            denoised = outcome
                .reports
                .iter()
                .filter(|r| r.status == ChannelStatus::Denoised)
                .count(),
            bypassed = outcome.bypassed().len(),
            "denoising finished"
        );
        Ok(outcome)
    }

    /// Synchronous wrapper around [`DenoiseRunner::run`].
    ///
    /// Outside a runtime a private one is built for the call. On a
    /// multi-thread runtime the current worker blocks in place; on a
    /// current-thread runtime the batch runs on a helper thread with its own
    /// runtime.
    pub fn run_blocking(
        &self,
        channels: Vec<ChannelSignal>,
        channel_limit: Option<usize>,
    ) -> VitalsResult<DenoiseOutcome> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.run(channels, channel_limit)))
            }
            Ok(_) => {
                debug!("current-thread runtime detected; denoising on a helper thread");
                std::thread::scope(|scope| {
                    scope
                        .spawn(|| self.run_on_private_runtime(channels, channel_limit))
                        .join()
                        .unwrap_or_else(|payload| {
                            Err(VitalsError::Io(std::io::Error::new(
                                std::io::ErrorKind::Other,
                                panic_message(payload.as_ref()),
                            )))
                        })
                })
            }
            Err(_) => self.run_on_private_runtime(channels, channel_limit),
        }
    }

    fn run_on_private_runtime(
        &self,
        channels: Vec<ChannelSignal>,
        channel_limit: Option<usize>,
    ) -> VitalsResult<DenoiseOutcome> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_workers.min(4))
            .enable_all()
            .build()?;
        runtime.block_on(self.run(channels, channel_limit))
    }

    fn active_count(&self, total: usize, channel_limit: Option<usize>) -> usize {
        match channel_limit {
            Some(limit) if limit > total => {
                warn!(
                    requested = limit,
                    available = total,
                    "channel count override exceeds the recording; clamping"
                );
                total
            }
            Some(limit) => limit,
            None => total,
        }
    }
}

/// Denoise with the default configuration, returning only the channels
pub fn denoise_channels(
    channels: Vec<ChannelSignal>,
    channel_limit: Option<usize>,
) -> VitalsResult<Vec<ChannelSignal>> {
    DenoiseRunner::new(DenoiseConfig::default())?
        .run_blocking(channels, channel_limit)
        .map(|outcome| outcome.channels)
}

impl fmt::Debug for DenoiseRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenoiseRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn denoise_channel(
    config: &DenoiseConfig,
    factory: &(dyn Fn(&DenoiseConfig) -> VitalsResult<DenoisePipeline> + Send + Sync),
    index: usize,
    signal: &ChannelSignal,
) -> VitalsResult<(ChannelSignal, u64)> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut pipeline = factory(config)?;
        pipeline.process(signal)
    }));

    match result {
        Ok(Ok(result)) => Ok((result.output_signal, result.total_latency_us)),
        Ok(Err(VitalsError::ChannelDenoiseFailure { reason, .. })) => {
            Err(VitalsError::ChannelDenoiseFailure { channel: index, reason })
        }
        Ok(Err(e)) => Err(VitalsError::ChannelDenoiseFailure {
            channel: index,
            reason: e.to_string(),
        }),
        Err(payload) => Err(VitalsError::ChannelDenoiseFailure {
            channel: index,
            reason: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", message)
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::SignalProcessor;

    fn channels() -> Vec<ChannelSignal> {
        (0..5)
            .map(|c| {
                let samples = (0..800)
                    .map(|i| 200.0 + (i as f64 * 0.05 * (c + 1) as f64).sin() * 50.0 + i as f64 * 0.1)
                    .collect();
                ChannelSignal::new(c, samples, 250.0)
            })
            .collect()
    }

    fn config(error_handling: ErrorHandling, max_workers: usize) -> DenoiseConfig {
        DenoiseConfig {
            error_handling,
            max_workers,
            ..DenoiseConfig::ecg()
        }
    }

    #[tokio::test]
    async fn test_results_follow_channel_order() {
        let runner = DenoiseRunner::new(config(ErrorHandling::StrictMode, 2)).unwrap();
        let input = channels();
        let outcome = runner.run(input.clone(), None).await.unwrap();

        assert_eq!(outcome.channels.len(), 5);
        for (index, (signal, report)) in outcome.channels.iter().zip(&outcome.reports).enumerate() {
            assert_eq!(signal.channel, index);
            assert_eq!(report.channel, index);
            assert_eq!(report.status, ChannelStatus::Denoised);
            assert_eq!(signal.len(), input[index].len());
        }
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let input = channels();
        let parallel = DenoiseRunner::new(config(ErrorHandling::StrictMode, 8))
            .unwrap()
            .run(input.clone(), None)
            .await
            .unwrap();

        for (signal, denoised) in input.iter().zip(&parallel.channels) {
            let mut pipeline = DenoisePipeline::ecg().unwrap();
            let expected = pipeline.process(signal).unwrap().output_signal;
            assert_eq!(&expected, denoised);
        }
    }

    #[tokio::test]
    async fn test_strict_mode_reports_failing_channel() {
        let mut input = channels();
        input[3].samples[10] = f64::NAN;
        let runner = DenoiseRunner::new(config(ErrorHandling::StrictMode, 3)).unwrap();

        match runner.run(input, None).await {
            Err(VitalsError::ChannelDenoiseFailure { channel, .. }) => assert_eq!(channel, 3),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_strict_mode_reports_lowest_failing_channel() {
        let mut input = channels();
        input[4].samples.clear();
        input[1].samples[0] = f64::INFINITY;
        let runner = DenoiseRunner::new(config(ErrorHandling::StrictMode, 5)).unwrap();
        let err = runner.run(input, None).await.unwrap_err();
        assert_eq!(err.channel(), Some(1));
    }

    #[tokio::test]
    async fn test_bypass_mode_keeps_original() {
        let mut input = channels();
        input[2].samples[5] = f64::NAN;
        let runner = DenoiseRunner::new(config(ErrorHandling::BypassMode, 2)).unwrap();
        let outcome = runner.run(input.clone(), None).await.unwrap();

        assert_eq!(outcome.bypassed(), vec![2]);
        assert_eq!(outcome.channels[2].samples.len(), input[2].samples.len());
        assert!(outcome.channels[2].samples[5].is_nan());
        assert!(matches!(
            outcome.reports[2].status,
            ChannelStatus::Bypassed { .. }
        ));
        assert_eq!(outcome.reports[0].status, ChannelStatus::Denoised);
        assert_ne!(outcome.channels[0], input[0]);
    }

    #[tokio::test]
    async fn test_channel_limit() {
        let input = channels();
        let runner = DenoiseRunner::new(config(ErrorHandling::StrictMode, 2)).unwrap();
        let outcome = runner.run(input.clone(), Some(2)).await.unwrap();

        assert_eq!(outcome.reports[1].status, ChannelStatus::Denoised);
        assert_eq!(outcome.reports[2].status, ChannelStatus::Skipped);
        assert_eq!(outcome.channels[2], input[2]);
        assert_eq!(outcome.channels[4], input[4]);
    }

    #[tokio::test]
    async fn test_channel_limit_is_clamped() {
        let runner = DenoiseRunner::new(config(ErrorHandling::StrictMode, 2)).unwrap();
        let outcome = runner.run(channels(), Some(50)).await.unwrap();
        assert_eq!(outcome.channels.len(), 5);
        assert!(outcome
            .reports
            .iter()
            .all(|r| r.status == ChannelStatus::Denoised));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let runner = DenoiseRunner::new(DenoiseConfig::default()).unwrap();
        let outcome = runner.run(Vec::new(), None).await.unwrap();
        assert!(outcome.channels.is_empty());
    }

    #[test]
    fn test_run_blocking() {
        let runner = DenoiseRunner::new(config(ErrorHandling::StrictMode, 2)).unwrap();
        let outcome = runner.run_blocking(channels(), Some(1)).unwrap();
        assert_eq!(outcome.reports[0].status, ChannelStatus::Denoised);
        assert_eq!(outcome.reports[1].status, ChannelStatus::Skipped);
    }

    #[test]
    fn test_denoise_channels() {
        let zeros = vec![ChannelSignal::new(0, vec![0.0; 1024], 1000.0)];
        let out = denoise_channels(zeros, None).unwrap();
        assert!(out[0].samples.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_denoise_channels_inside_runtime() {
        let zeros = vec![ChannelSignal::new(0, vec![0.0; 1024], 1000.0)];
        let out = denoise_channels(zeros, None).unwrap();
        assert_eq!(out[0].len(), 1024);
        assert!(out[0].samples.iter().all(|&x| x == 0.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_blocking_inside_multi_thread_runtime() {
        let runner = DenoiseRunner::new(config(ErrorHandling::StrictMode, 2)).unwrap();
        let outcome = runner.run_blocking(channels(), None).unwrap();
        assert!(outcome
            .reports
            .iter()
            .all(|r| r.status == ChannelStatus::Denoised));
    }

    /// Stage that panics on one channel and passes the others through
    struct PanicsOnChannel(usize);

    impl SignalProcessor for PanicsOnChannel {
        fn process(&mut self, input: &ChannelSignal) -> VitalsResult<ChannelSignal> {
            if input.channel == self.0 {
                panic!("stage blew up on channel {}", self.0);
            }
            Ok(input.clone())
        }

        fn name(&self) -> &str {
            "panics on channel"
        }
    }

    fn runner_panicking_on(channel: usize, error_handling: ErrorHandling) -> DenoiseRunner {
        DenoiseRunner::new(config(error_handling, 3))
            .unwrap()
            .with_pipeline_factory(move |config| {
                let mut pipeline = DenoisePipeline::from_config(config)?;
                pipeline.add_processor(Box::new(PanicsOnChannel(channel)));
                Ok(pipeline)
            })
    }

    #[tokio::test]
    async fn test_worker_panic_fails_strict_run() {
        let runner = runner_panicking_on(2, ErrorHandling::StrictMode);
        match runner.run(channels(), None).await {
            Err(VitalsError::ChannelDenoiseFailure { channel, reason }) => {
                assert_eq!(channel, 2);
                assert!(reason.contains("panicked"));
                assert!(reason.contains("stage blew up"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_worker_panic_is_bypassed() {
        let input = channels();
        let runner = runner_panicking_on(2, ErrorHandling::BypassMode);
        let outcome = runner.run(input.clone(), None).await.unwrap();

        assert_eq!(outcome.bypassed(), vec![2]);
        assert_eq!(outcome.channels[2], input[2]);
        for index in [0, 1, 3, 4] {
            assert_eq!(outcome.reports[index].status, ChannelStatus::Denoised);
            assert_ne!(outcome.channels[index], input[index]);
        }
    }

    #[test]
    fn test_custom_factory_is_used() {
        let runner = DenoiseRunner::new(config(ErrorHandling::StrictMode, 2))
            .unwrap()
            .with_pipeline_factory(|_| Ok(DenoisePipeline::new("passthrough")));
        let input = channels();
        let outcome = runner.run_blocking(input.clone(), None).unwrap();
        assert_eq!(outcome.channels, input);
        assert!(format!("{:?}", runner).contains("DenoiseRunner"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = DenoiseConfig::ecg();
        config.max_workers = 0;
        assert!(DenoiseRunner::new(config).is_err());
    }
}
