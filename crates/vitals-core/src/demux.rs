//! Sample stream demultiplexing
//!
//! The stream is a sequence of whole cycles, each `slots_per_cycle` samples
//! long. Channel `c` with slot positions `p_0 < .. < p_{k-1}` owns flat index
//! `cycle * slots_per_cycle + p_j` as its sample `cycle * k + j`.

use crate::config::{SampleEncoding, BYTES_PER_SAMPLE};
use crate::error::{VitalsError, VitalsResult};
use crate::schedule::InterleaveSchedule;
use tracing::debug;

/// Splits an interleaved stream into one sequence per channel
#[derive(Debug, Clone, Copy)]
pub struct Demultiplexer<'a> {
    schedule: &'a InterleaveSchedule,
}

impl<'a> Demultiplexer<'a> {
    pub fn new(schedule: &'a InterleaveSchedule) -> Self {
        Self { schedule }
    }

    /// Bytes occupied by one full cycle
    pub fn cycle_bytes(&self) -> usize {
        self.schedule.slots_per_cycle() * BYTES_PER_SAMPLE
    }

    /// Whole cycles available in `byte_len` bytes; a partial trailing cycle
    /// is not counted
    pub fn cycle_count(&self, byte_len: usize) -> usize {
        byte_len / self.cycle_bytes()
    }

    /// Demultiplex raw little-endian sample bytes
    pub fn demultiplex_bytes(
        &self,
        bytes: &[u8],
        encoding: SampleEncoding,
    ) -> VitalsResult<Vec<Vec<f64>>> {
        let cycles = self.require_cycles(bytes.len())?;
        let cycle_bytes = self.cycle_bytes();

        let channels = self.gather(cycles, |cycle, slot| {
            let at = cycle * cycle_bytes + slot * BYTES_PER_SAMPLE;
            encoding.decode([bytes[at], bytes[at + 1]])
        });

        let dropped = bytes.len() - cycles * cycle_bytes;
        debug!(cycles, dropped_bytes = dropped, "demultiplexed sample stream");
        Ok(channels)
    }

    /// Demultiplex an already decoded flat stream
    pub fn demultiplex(&self, flat: &[f64]) -> VitalsResult<Vec<Vec<f64>>> {
        let cycles = self.require_cycles(flat.len() * BYTES_PER_SAMPLE)?;
        let slots = self.schedule.slots_per_cycle();
        Ok(self.gather(cycles, |cycle, slot| flat[cycle * slots + slot]))
    }

    /// Inverse of [`Demultiplexer::demultiplex`]: lay per-channel sequences
    /// out in reading order. Every channel must hold the same number of
    /// whole cycles.
    pub fn interleave(&self, channels: &[Vec<f64>]) -> VitalsResult<Vec<f64>> {
        if channels.len() != self.schedule.channel_count() {
            return Err(VitalsError::InvalidConfig {
                message: format!(
                    "{} channel sequences for a {}-channel schedule",
                    channels.len(),
                    self.schedule.channel_count()
                ),
            });
        }

        let occurrences = self.schedule.occurrences_per_cycle();
        let cycles = channels[0].len() / occurrences[0];
        for (channel, data) in channels.iter().enumerate() {
            if data.len() != cycles * occurrences[channel] {
                return Err(VitalsError::InvalidConfig {
                    message: format!(
                        "channel {} holds {} samples, expected {} for {} cycles",
                        channel,
                        data.len(),
                        cycles * occurrences[channel],
                        cycles
                    ),
                });
            }
        }

        let mut cursors = vec![0usize; channels.len()];
        let mut flat = Vec::with_capacity(cycles * self.schedule.slots_per_cycle());
        for _ in 0..cycles {
            for &channel in self.schedule.order() {
                flat.push(channels[channel][cursors[channel]]);
                cursors[channel] += 1;
            }
        }
        Ok(flat)
    }

    fn require_cycles(&self, byte_len: usize) -> VitalsResult<usize> {
        match self.cycle_count(byte_len) {
            0 => Err(VitalsError::TruncatedStream {
                available_bytes: byte_len,
                cycle_bytes: self.cycle_bytes(),
            }),
            cycles => Ok(cycles),
        }
    }

    fn gather<F>(&self, cycles: usize, sample_at: F) -> Vec<Vec<f64>>
    where
        F: Fn(usize, usize) -> f64,
    {
        (0..self.schedule.channel_count())
            .map(|channel| {
                let positions = self.schedule.positions(channel);
                let mut data = Vec::with_capacity(cycles * positions.len());
                for cycle in 0..cycles {
                    data.extend(positions.iter().map(|&slot| sample_at(cycle, slot)));
                }
                data
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::RecordingHeader;

    fn two_rate_schedule() -> InterleaveSchedule {
        let header = RecordingHeader::new(1000.0, vec![1000.0, 250.0]).unwrap();
        InterleaveSchedule::from_header(&header).unwrap()
    }

    #[test]
    fn test_ten_cycle_stream() {
        let schedule = two_rate_schedule();
        let demux = Demultiplexer::new(&schedule);
        let flat: Vec<f64> = (0..50).map(|i| i as f64).collect();

        let channels = demux.demultiplex(&flat).unwrap();
        assert_eq!(channels[0].len(), 40);
        assert_eq!(channels[1].len(), 10);
        for j in 0..10 {
            assert_eq!(channels[1][j], flat[5 * j + 1]);
        }
        assert_eq!(&channels[0][..4], &[0.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_samples_follow_file_order() {
        let schedule = two_rate_schedule();
        let demux = Demultiplexer::new(&schedule);
        let flat: Vec<f64> = (0..100).map(|i| i as f64).collect();

        for channel in demux.demultiplex(&flat).unwrap() {
            assert!(channel.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_round_trip_recovers_channels() {
        let header = RecordingHeader::new(2000.0, vec![500.0, 1000.0, 250.0, 2000.0]).unwrap();
        let schedule = InterleaveSchedule::from_header(&header).unwrap();
        let demux = Demultiplexer::new(&schedule);

        let cycles = 7;
        let originals: Vec<Vec<f64>> = schedule
            .occurrences_per_cycle()
            .iter()
            .enumerate()
            .map(|(c, &k)| (0..cycles * k).map(|i| (c * 1000 + i) as f64).collect())
            .collect();

        let flat = demux.interleave(&originals).unwrap();
        assert_eq!(flat.len(), cycles * schedule.slots_per_cycle());
        assert_eq!(demux.demultiplex(&flat).unwrap(), originals);
    }

    #[test]
    fn test_partial_cycle_is_dropped() {
        let schedule = two_rate_schedule();
        let demux = Demultiplexer::new(&schedule);

        // two whole cycles plus three samples and a stray byte
        let mut bytes = Vec::new();
        for v in 0u16..13 {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.push(0xFF);

        let channels = demux.demultiplex_bytes(&bytes, SampleEncoding::Unsigned).unwrap();
        assert_eq!(channels[0], vec![0.0, 2.0, 3.0, 4.0, 5.0, 7.0, 8.0, 9.0]);
        assert_eq!(channels[1], vec![1.0, 6.0]);
    }

    #[test]
    fn test_signed_samples() {
        let schedule = InterleaveSchedule::round_robin(2).unwrap();
        let demux = Demultiplexer::new(&schedule);
        let mut bytes = Vec::new();
        for v in [-1i16, 300, -32768, 7] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let channels = demux.demultiplex_bytes(&bytes, SampleEncoding::Signed).unwrap();
        assert_eq!(channels[0], vec![-1.0, -32768.0]);
        assert_eq!(channels[1], vec![300.0, 7.0]);
    }

    #[test]
    fn test_less_than_one_cycle_is_truncated() {
        let schedule = two_rate_schedule();
        let demux = Demultiplexer::new(&schedule);
        let result = demux.demultiplex_bytes(&[0u8; 9], SampleEncoding::Unsigned);
        assert!(matches!(
            result,
            Err(VitalsError::TruncatedStream {
                available_bytes: 9,
                cycle_bytes: 10
            })
        ));
    }

    #[test]
    fn test_interleave_rejects_ragged_channels() {
        let schedule = two_rate_schedule();
        let demux = Demultiplexer::new(&schedule);
        assert!(demux.interleave(&[vec![0.0; 8], vec![0.0; 1]]).is_err());
        assert!(demux.interleave(&[vec![0.0; 8]]).is_err());
    }
}
