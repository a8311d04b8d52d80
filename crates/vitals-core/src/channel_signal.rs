//! ChannelSignal: decoded samples of one channel at its own rate

use serde::{Deserialize, Serialize};

/// Requested `[start_s, end_s)` window in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_s: f64,
    /// `None` means "to the end of the recording"
    pub end_s: Option<f64>,
}

impl TimeWindow {
    pub fn new(start_s: f64, end_s: f64) -> Self {
        Self {
            start_s,
            end_s: Some(end_s),
        }
    }

    /// Window from `start_s` to the end of the recording
    pub fn starting_at(start_s: f64) -> Self {
        Self {
            start_s,
            end_s: None,
        }
    }

    /// Overlap of two windows
    pub fn intersect(&self, other: &TimeWindow) -> TimeWindow {
        let end_s = match (self.end_s, other.end_s) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        TimeWindow {
            start_s: self.start_s.max(other.start_s),
            end_s,
        }
    }
}

/// Samples of a single channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSignal {
    /// Channel index in the recording
    pub channel: usize,
    /// Sample values
    pub samples: Vec<f64>,
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// Index of `samples[0]` in the full recording
    pub start_index: usize,
}

impl ChannelSignal {
    /// Create a signal that starts at the beginning of the recording
    pub fn new(channel: usize, samples: Vec<f64>, sampling_rate: f64) -> Self {
        Self {
            channel,
            samples,
            sampling_rate,
            start_index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Signal duration in seconds
    pub fn duration_s(&self) -> f64 {
        self.samples.len() as f64 / self.sampling_rate
    }

    /// Recording time of the first sample in seconds
    pub fn start_time_s(&self) -> f64 {
        self.start_index as f64 / self.sampling_rate
    }

    /// Wall-clock time of every sample, for plotting
    pub fn time_axis(&self) -> Vec<f64> {
        let dt = 1.0 / self.sampling_rate;
        (0..self.samples.len())
            .map(|i| (self.start_index + i) as f64 * dt)
            .collect()
    }

    /// Extract `[floor(rate * start_s), floor(rate * end_s))` in recording
    /// sample indices, clamped to the samples held. An inverted or empty
    /// window yields an empty signal.
    pub fn slice(&self, window: &TimeWindow) -> ChannelSignal {
        let first = self.start_index;
        let last = self.start_index + self.samples.len();

        let start = self.index_at(window.start_s).clamp(first, last);
        let end = window
            .end_s
            .map_or(last, |end_s| self.index_at(end_s))
            .clamp(first, last);
        let end = end.max(start);

        ChannelSignal {
            channel: self.channel,
            samples: self.samples[start - first..end - first].to_vec(),
            sampling_rate: self.sampling_rate,
            start_index: start,
        }
    }

    /// Same channel with its samples replaced
    pub fn with_samples(&self, samples: Vec<f64>) -> ChannelSignal {
        ChannelSignal {
            channel: self.channel,
            samples,
            sampling_rate: self.sampling_rate,
            start_index: self.start_index,
        }
    }

    /// Basic statistics of the samples
    pub fn stats(&self) -> ChannelStats {
        ChannelStats::calculate(&self.samples)
    }

    fn index_at(&self, time_s: f64) -> usize {
        let index = (self.sampling_rate * time_s).floor();
        if index.is_nan() || index <= 0.0 {
            0
        } else if index >= usize::MAX as f64 {
            usize::MAX
        } else {
            index as usize
        }
    }
}

/// Basic statistics for a signal channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub rms: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub peak_to_peak: f64,
}

impl ChannelStats {
    pub fn calculate(data: &[f64]) -> Self {
        if data.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
            };
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let rms = (data.iter().map(|x| x * x).sum::<f64>() / n).sqrt();
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        let min = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        Self {
            mean,
            rms,
            std_dev: variance.sqrt(),
            min,
            max,
            peak_to_peak: max - min,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(len: usize, rate: f64) -> ChannelSignal {
        ChannelSignal::new(0, (0..len).map(|i| i as f64).collect(), rate)
    }

    #[test]
    fn test_slice_uses_channel_rate() {
        let fast = ramp(4000, 1000.0);
        let slow = ramp(1000, 250.0);
        let window = TimeWindow::new(1.0, 2.5);

        let fast_slice = fast.slice(&window);
        let slow_slice = slow.slice(&window);

        assert_eq!(fast_slice.len(), 1500);
        assert_eq!(fast_slice.samples[0], 1000.0);
        assert_eq!(slow_slice.len(), 375);
        assert_eq!(slow_slice.samples[0], 250.0);
        assert_relative_eq!(fast_slice.start_time_s(), slow_slice.start_time_s());
    }

    #[test]
    fn test_full_window_is_identity() {
        let signal = ramp(500, 100.0);
        assert_eq!(signal.slice(&TimeWindow::new(0.0, 10.0)), signal);
        assert_eq!(signal.slice(&TimeWindow::starting_at(0.0)), signal);
    }

    #[test]
    fn test_nested_slice_matches_direct_slice() {
        let signal = ramp(2000, 200.0);
        let outer = TimeWindow::new(1.0, 8.0);
        let inner = TimeWindow::new(2.5, 4.0);

        let nested = signal.slice(&outer).slice(&inner);
        let direct = signal.slice(&outer.intersect(&inner));
        assert_eq!(nested, direct);
        assert_eq!(nested.start_index, 500);
        assert_eq!(nested.len(), 300);
    }

    #[test]
    fn test_inverted_window_is_empty() {
        let signal = ramp(100, 10.0);
        assert!(signal.slice(&TimeWindow::new(5.0, 2.0)).is_empty());
        assert!(signal.slice(&TimeWindow::new(20.0, 30.0)).is_empty());
        assert!(signal.slice(&TimeWindow::new(3.0, 3.0)).is_empty());
    }

    #[test]
    fn test_negative_start_clamps_to_zero() {
        let signal = ramp(100, 10.0);
        let sliced = signal.slice(&TimeWindow::new(-4.0, 1.0));
        assert_eq!(sliced.len(), 10);
        assert_eq!(sliced.start_index, 0);
    }

    #[test]
    fn test_time_axis() {
        let signal = ramp(1000, 250.0).slice(&TimeWindow::new(2.0, 3.0));
        let axis = signal.time_axis();
        assert_eq!(axis.len(), 250);
        assert_relative_eq!(axis[0], 2.0);
        assert_relative_eq!(axis[1], 2.004, epsilon = 1e-12);
        assert_relative_eq!(signal.duration_s(), 1.0);
    }

    #[test]
    fn test_channel_stats() {
        let stats = ChannelStats::calculate(&[1.0, -1.0, 1.0, -1.0]);
        assert_relative_eq!(stats.mean, 0.0);
        assert_relative_eq!(stats.rms, 1.0);
        assert_relative_eq!(stats.std_dev, 1.0);
        assert_relative_eq!(stats.peak_to_peak, 2.0);

        let empty = ChannelStats::calculate(&[]);
        assert_eq!(empty.max, 0.0);
    }
}
