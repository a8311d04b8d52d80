//! Interleave schedule computation
//!
//! One cycle spans `main_rate / min(channel_rate)` main-rate ticks. At every
//! tick, channels are visited in index order and channel `c` contributes a
//! sample when `tick % (main_rate // rate[c]) == 0`. The resulting reading
//! order repeats unchanged for the whole file.

use crate::error::VitalsResult;
use crate::header::RecordingHeader;
use crate::rate_error;
use tracing::{debug, warn};

/// Relative tolerance when checking that a rate divides the main rate
pub const RATE_TOLERANCE: f64 = 1e-6;

/// Upper bound on ticks per cycle
pub const MAX_CYCLE_TICKS: usize = 1 << 20;

/// Repeating channel reading order derived from a header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterleaveSchedule {
    cycle_ticks: usize,
    divisors: Vec<usize>,
    order: Vec<usize>,
    positions: Vec<Vec<usize>>,
}

impl InterleaveSchedule {
    /// Compute the schedule for a multi-rate header
    pub fn from_header(header: &RecordingHeader) -> VitalsResult<Self> {
        let main = header.main_sampling_rate;
        if !main.is_finite() || main <= 0.0 {
            return Err(rate_error!("main sampling rate {} is not a positive number", main));
        }
        if header.channel_sampling_rates.is_empty() {
            return Err(rate_error!("channel count is zero"));
        }

        let divisors = header
            .channel_sampling_rates
            .iter()
            .enumerate()
            .map(|(channel, &rate)| tick_divisor(main, rate, channel))
            .collect::<VitalsResult<Vec<usize>>>()?;

        Self::from_divisors(divisors)
    }

    /// Schedule for a plain round-robin frame: every channel once per cycle
    pub fn round_robin(channel_count: usize) -> VitalsResult<Self> {
        if channel_count == 0 {
            return Err(rate_error!("channel count is zero"));
        }
        Self::from_divisors(vec![1; channel_count])
    }

    fn from_divisors(divisors: Vec<usize>) -> VitalsResult<Self> {
        let cycle_ticks = divisors.iter().copied().max().unwrap_or(1);
        if cycle_ticks > MAX_CYCLE_TICKS {
            return Err(rate_error!(
                "cycle of {} ticks exceeds the supported maximum of {}",
                cycle_ticks,
                MAX_CYCLE_TICKS
            ));
        }

        for (channel, &divisor) in divisors.iter().enumerate() {
            if cycle_ticks % divisor != 0 {
                warn!(
                    channel,
                    divisor,
                    cycle_ticks,
                    "channel divisor does not divide the cycle; samples will not be evenly spaced"
                );
            }
        }

        let mut order = Vec::new();
        let mut positions = vec![Vec::new(); divisors.len()];
        for tick in 0..cycle_ticks {
            for (channel, &divisor) in divisors.iter().enumerate() {
                if tick % divisor == 0 {
                    positions[channel].push(order.len());
                    order.push(channel);
                }
            }
        }

        debug!(cycle_ticks, slots = order.len(), ?order, "interleave schedule computed");

        Ok(Self {
            cycle_ticks,
            divisors,
            order,
            positions,
        })
    }

    /// Main-rate ticks per cycle
    pub fn cycle_ticks(&self) -> usize {
        self.cycle_ticks
    }

    /// Samples stored per cycle (length of the reading order)
    pub fn slots_per_cycle(&self) -> usize {
        self.order.len()
    }

    /// Channel index for every slot of one cycle
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Number of channels covered by the schedule
    pub fn channel_count(&self) -> usize {
        self.divisors.len()
    }

    /// Ticks between consecutive samples of a channel
    pub fn divisor(&self, channel: usize) -> usize {
        self.divisors[channel]
    }

    /// Ascending slot positions of a channel within one cycle
    pub fn positions(&self, channel: usize) -> &[usize] {
        &self.positions[channel]
    }

    /// Samples a channel contributes per cycle
    pub fn occurrences(&self, channel: usize) -> usize {
        self.positions[channel].len()
    }

    /// Samples per cycle for every channel
    pub fn occurrences_per_cycle(&self) -> Vec<usize> {
        self.positions.iter().map(Vec::len).collect()
    }
}

/// Floor division of the main rate by a channel rate, rejecting rates that
/// do not divide it
fn tick_divisor(main: f64, rate: f64, channel: usize) -> VitalsResult<usize> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(rate_error!("channel {} rate {} is not a positive number", channel, rate));
    }

    let ratio = main / rate;
    let nearest = ratio.round();
    if (ratio - nearest).abs() > RATE_TOLERANCE * ratio.max(1.0) {
        return Err(rate_error!(
            "channel {} rate {} Hz does not divide the main rate {} Hz",
            channel,
            rate,
            main
        ));
    }
    if nearest < 1.0 {
        return Err(rate_error!(
            "channel {} rate {} Hz exceeds the main rate {} Hz",
            channel,
            rate,
            main
        ));
    }
    Ok(nearest as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VitalsError;

    fn schedule(main: f64, rates: &[f64]) -> VitalsResult<InterleaveSchedule> {
        InterleaveSchedule::from_header(&RecordingHeader::new(main, rates.to_vec()).unwrap())
    }

    #[test]
    fn test_two_rate_schedule() {
        let s = schedule(1000.0, &[1000.0, 250.0]).unwrap();

        assert_eq!(s.cycle_ticks(), 4);
        assert_eq!(s.order(), &[0, 1, 0, 0, 0]);
        assert_eq!(s.positions(0), &[0, 2, 3, 4]);
        assert_eq!(s.positions(1), &[1]);
        assert_eq!(s.occurrences_per_cycle(), vec![4, 1]);
        assert_eq!(s.slots_per_cycle(), 5);
    }

    #[test]
    fn test_cycle_length_and_occurrence_invariants() {
        let cases: &[(f64, &[f64])] = &[
            (1000.0, &[1000.0, 250.0]),
            (2000.0, &[500.0, 1000.0, 250.0, 2000.0]),
            (4000.0, &[4000.0, 4000.0, 1000.0]),
            (500.0, &[500.0]),
            (1200.0, &[400.0, 300.0, 100.0]),
        ];

        for (main, rates) in cases {
            let s = schedule(*main, rates).unwrap();
            let min_rate = rates.iter().copied().fold(f64::INFINITY, f64::min);
            assert_eq!(s.cycle_ticks(), (main / min_rate) as usize);

            let occurrences = s.occurrences_per_cycle();
            assert_eq!(occurrences.iter().sum::<usize>(), s.slots_per_cycle());
            for (channel, &rate) in rates.iter().enumerate() {
                let divisor = (main / rate) as usize;
                assert_eq!(s.divisor(channel), divisor);
                assert_eq!(occurrences[channel], s.cycle_ticks().div_ceil(divisor));
            }
        }
    }

    #[test]
    fn test_positions_are_ascending_and_cover_order() {
        let s = schedule(2000.0, &[500.0, 1000.0, 250.0, 2000.0]).unwrap();
        let mut seen = vec![false; s.slots_per_cycle()];
        for channel in 0..s.channel_count() {
            let positions = s.positions(channel);
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
            for &p in positions {
                assert_eq!(s.order()[p], channel);
                seen[p] = true;
            }
        }
        assert!(seen.into_iter().all(|v| v));
    }

    #[test]
    fn test_round_robin_schedule() {
        let s = InterleaveSchedule::round_robin(3).unwrap();
        assert_eq!(s.cycle_ticks(), 1);
        assert_eq!(s.order(), &[0, 1, 2]);
        assert!(InterleaveSchedule::round_robin(0).is_err());
    }

    #[test]
    fn test_invalid_rates() {
        for rates in [vec![300.0], vec![2000.0], vec![0.0], vec![-250.0], vec![f64::NAN]] {
            let result = schedule(1000.0, &rates);
            assert!(
                matches!(result, Err(VitalsError::InvalidSamplingRates { .. })),
                "rates {:?} should be rejected",
                rates
            );
        }
        assert!(schedule(0.0, &[250.0]).is_err());
    }

    #[test]
    fn test_near_integral_ratio_is_accepted() {
        let s = schedule(1000.0, &[333.33333333333337]).unwrap();
        assert_eq!(s.divisor(0), 3);
    }

    #[test]
    fn test_oversized_cycle_is_rejected() {
        assert!(schedule(1e9, &[1.0]).is_err());
    }
}
