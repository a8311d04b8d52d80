//! Discrete wavelet transform and wavelet-shrinkage denoising
//!
//! Multi-level decomposition with symmetric (half-sample) boundary
//! extension. A level of length `n` produces `(n + F - 1) / 2` approximation
//! and detail coefficients for a filter of `F` taps; synthesis truncates each
//! level back to its stored length, so reconstruction is exact for any `n`.

use crate::processor::{
    ensure_processable, ProcessingMetrics, ProcessorType, SignalProcessor,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vitals_core::{ChannelSignal, VitalsError, VitalsResult};

/// Wavelet family selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wavelet {
    /// Haar wavelet (db1), 2 taps
    Haar,
    /// Daubechies with 2 vanishing moments, 4 taps
    Db2,
    /// Daubechies with 4 vanishing moments, 8 taps
    Db4,
    /// Symlet-8, 16 taps; near-symmetric, suits ECG morphology
    Sym8,
}

/// Analysis and synthesis filter bank of an orthogonal wavelet
#[derive(Debug, Clone)]
pub struct WaveletFilters {
    pub dec_lo: Vec<f64>,
    pub dec_hi: Vec<f64>,
    pub rec_lo: Vec<f64>,
    pub rec_hi: Vec<f64>,
}

/// Coefficients of a multi-level decomposition
#[derive(Debug, Clone, PartialEq)]
pub struct WaveletCoefficients {
    /// Coarsest approximation band
    pub approximation: Vec<f64>,
    /// Detail bands, coarsest first
    pub details: Vec<Vec<f64>>,
    /// Input length at each level, finest first
    lengths: Vec<usize>,
}

const DB4_DEC_LO: [f64; 8] = [
    -0.010597401785069032,
    0.03288301166688519,
    0.03084138183556078,
    -0.18703481171909292,
    -0.027983769416859667,
    0.6308807679298589,
    0.7148465705529155,
    0.23037781330889645,
];

const SYM8_DEC_LO: [f64; 16] = [
    -0.0033824159510061256,
    -0.0005421323317911481,
    0.03169508781149298,
    0.007607487324917605,
    -0.1432942383508097,
    -0.061273359067658524,
    0.4813596512583722,
    0.7771857517005235,
    0.3644418948353314,
    -0.05194583810770904,
    -0.027219029917056003,
    0.049137179673607506,
    0.003808752013890615,
    -0.01495225833704823,
    -0.0003029205147213668,
    0.0018899503327594609,
];

impl Wavelet {
    /// Lowpass decomposition filter
    pub fn dec_lo(&self) -> Vec<f64> {
        match self {
            Wavelet::Haar => vec![std::f64::consts::FRAC_1_SQRT_2; 2],
            Wavelet::Db2 => {
                let s3 = 3.0_f64.sqrt();
                let norm = 4.0 * 2.0_f64.sqrt();
                vec![
                    (1.0 + s3) / norm,
                    (3.0 + s3) / norm,
                    (3.0 - s3) / norm,
                    (1.0 - s3) / norm,
                ]
            }
            Wavelet::Db4 => DB4_DEC_LO.to_vec(),
            Wavelet::Sym8 => SYM8_DEC_LO.to_vec(),
        }
    }

    /// Full filter bank.
    ///
    /// `rec_lo` is the time reverse of `dec_lo`, `dec_hi[k] = (-1)^(k+1) rec_lo[k]`
    /// and `rec_hi` is the time reverse of `dec_hi`.
    pub fn filters(&self) -> WaveletFilters {
        let dec_lo = self.dec_lo();
        let rec_lo: Vec<f64> = dec_lo.iter().rev().copied().collect();
        let dec_hi: Vec<f64> = rec_lo
            .iter()
            .enumerate()
            .map(|(k, &h)| if k % 2 == 0 { -h } else { h })
            .collect();
        let rec_hi: Vec<f64> = dec_hi.iter().rev().copied().collect();

        WaveletFilters {
            dec_lo,
            dec_hi,
            rec_lo,
            rec_hi,
        }
    }

    /// Number of filter taps
    pub fn filter_len(&self) -> usize {
        match self {
            Wavelet::Haar => 2,
            Wavelet::Db2 => 4,
            Wavelet::Db4 => 8,
            Wavelet::Sym8 => 16,
        }
    }
}

impl WaveletCoefficients {
    /// Number of decomposition levels
    pub fn levels(&self) -> usize {
        self.details.len()
    }

    /// Length of the decomposed signal
    pub fn original_len(&self) -> usize {
        self.lengths
            .first()
            .copied()
            .unwrap_or(self.approximation.len())
    }

    /// Every band, approximation first
    pub fn bands_mut(&mut self) -> impl Iterator<Item = &mut Vec<f64>> {
        std::iter::once(&mut self.approximation).chain(self.details.iter_mut())
    }

    /// Total number of coefficients across all bands
    pub fn total_coefficients(&self) -> usize {
        self.approximation.len() + self.details.iter().map(Vec::len).sum::<usize>()
    }
}

/// Decomposition depth used when none is configured: `floor(log2(n))`
pub fn max_level(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        n.ilog2() as usize
    }
}

/// Multi-level decomposition
pub fn wavedec(signal: &[f64], wavelet: Wavelet, levels: usize) -> WaveletCoefficients {
    let filters = wavelet.filters();
    let mut approximation = signal.to_vec();
    let mut details = Vec::with_capacity(levels);
    let mut lengths = Vec::with_capacity(levels);

    for _ in 0..levels {
        if approximation.is_empty() {
            break;
        }
        lengths.push(approximation.len());
        let (a, d) = analysis_step(&approximation, &filters);
        approximation = a;
        details.push(d);
    }
    details.reverse();

    WaveletCoefficients {
        approximation,
        details,
        lengths,
    }
}

/// Inverse of [`wavedec`]
pub fn waverec(coefficients: &WaveletCoefficients, wavelet: Wavelet) -> Vec<f64> {
    let filters = wavelet.filters();
    let mut approximation = coefficients.approximation.clone();

    for (detail, &len) in coefficients
        .details
        .iter()
        .zip(coefficients.lengths.iter().rev())
    {
        let mut level = synthesis_step(&approximation, detail, &filters);
        level.truncate(len);
        approximation = level;
    }
    approximation
}

/// `sign(x) * max(|x| - threshold, 0)`
#[inline]
pub fn soft_threshold(x: f64, threshold: f64) -> f64 {
    let magnitude = x.abs() - threshold;
    if magnitude > 0.0 {
        x.signum() * magnitude
    } else {
        0.0
    }
}

/// Universal threshold `sigma * sqrt(2 ln n)`
pub fn universal_threshold(noise_sigma: f64, n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    noise_sigma * (2.0 * (n as f64).ln()).sqrt()
}

fn analysis_step(x: &[f64], filters: &WaveletFilters) -> (Vec<f64>, Vec<f64>) {
    let n = x.len();
    let taps = filters.dec_lo.len();
    let out_len = (n + taps - 1) / 2;

    let mut approximation = Vec::with_capacity(out_len);
    let mut detail = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let mut a = 0.0;
        let mut d = 0.0;
        for j in 0..taps {
            let v = x[symmetric_index(2 * i as isize + 1 - j as isize, n)];
            a += filters.dec_lo[j] * v;
            d += filters.dec_hi[j] * v;
        }
        approximation.push(a);
        detail.push(d);
    }
    (approximation, detail)
}

fn synthesis_step(approximation: &[f64], detail: &[f64], filters: &WaveletFilters) -> Vec<f64> {
    let n = approximation.len().min(detail.len());
    let taps = filters.rec_lo.len();
    let out_len = (2 * n + 2).saturating_sub(taps);

    (0..out_len)
        .map(|m| {
            let p = m + taps - 2;
            // i ranges over coefficients whose filter tap p - 2i lies in 0..taps
            let first = (p + 2).saturating_sub(taps) / 2;
            let last = (p / 2).min(n.saturating_sub(1));
            (first..=last)
                .filter(|&i| p >= 2 * i && p - 2 * i < taps)
                .map(|i| {
                    let k = p - 2 * i;
                    approximation[i] * filters.rec_lo[k] + detail[i] * filters.rec_hi[k]
                })
                .sum()
        })
        .collect()
}

/// Half-sample symmetric extension: `... x1 x0 | x0 x1 ... xn-1 | xn-1 xn-2 ...`
fn symmetric_index(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let r = i.rem_euclid(period) as usize;
    if r < n {
        r
    } else {
        2 * n - 1 - r
    }
}

/// Wavelet-shrinkage denoiser: decompose, soft-threshold every band with the
/// universal threshold, reconstruct.
#[derive(Debug, Clone)]
pub struct WaveletDenoiser {
    name: String,
    wavelet: Wavelet,
    noise_sigma: f64,
    levels: Option<usize>,
}

impl WaveletDenoiser {
    pub fn new(wavelet: Wavelet, noise_sigma: f64) -> VitalsResult<Self> {
        if !noise_sigma.is_finite() || noise_sigma < 0.0 {
            return Err(VitalsError::InvalidConfig {
                message: format!("noise sigma must be finite and non-negative, got {}", noise_sigma),
            });
        }
        Ok(Self {
            name: format!("{:?} wavelet denoiser", wavelet),
            wavelet,
            noise_sigma,
            levels: None,
        })
    }

    /// Cap the decomposition depth; it never exceeds `floor(log2(n))`
    pub fn with_levels(mut self, levels: usize) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn wavelet(&self) -> Wavelet {
        self.wavelet
    }

    pub fn noise_sigma(&self) -> f64 {
        self.noise_sigma
    }

    /// Threshold applied to a signal of `n` samples
    pub fn threshold(&self, n: usize) -> f64 {
        universal_threshold(self.noise_sigma, n)
    }

    /// Denoise raw samples; output has the input's length
    pub fn denoise(&self, samples: &[f64]) -> Vec<f64> {
        let n = samples.len();
        let levels = self.levels.map_or(max_level(n), |l| l.min(max_level(n)));
        let threshold = self.threshold(n);

        let mut coefficients = wavedec(samples, self.wavelet, levels);
        for band in coefficients.bands_mut() {
            for c in band.iter_mut() {
                *c = soft_threshold(*c, threshold);
            }
        }

        let mut output = waverec(&coefficients, self.wavelet);
        output.resize(n, 0.0);
        output
    }
}

impl SignalProcessor for WaveletDenoiser {
    fn process(&mut self, input: &ChannelSignal) -> VitalsResult<ChannelSignal> {
        ensure_processable(input)?;
        let timer = ProcessingMetrics::start_timing(&self.name);

        let output = input.with_samples(self.denoise(&input.samples));

        let metrics = timer.finish();
        debug!(
            channel = input.channel,
            samples = input.len(),
            threshold = self.threshold(input.len()),
            elapsed_us = metrics.processing_time_us,
            "wavelet shrinkage applied"
        );
        Ok(output)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Denoiser
    }
}
