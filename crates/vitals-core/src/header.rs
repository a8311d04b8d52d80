//! Recording header parsing
//!
//! Both formats reduce to a [`RecordingHeader`]: a channel count, the main
//! (tick) sampling rate, and one sampling rate per channel.

use crate::config::{MultiRateLayout, RoundRobinLayout};
use crate::error::{VitalsError, VitalsResult};
use crate::header_error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

/// Largest channel count a round-robin header may declare
pub const MAX_ROUND_ROBIN_CHANNELS: usize = u16::MAX as usize;

/// Parsed recording header, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingHeader {
    /// Number of channels (at least 1)
    pub channel_count: usize,
    /// Main sampling rate in Hz; one tick per main-rate sample
    pub main_sampling_rate: f64,
    /// Sampling rate of every channel in Hz
    pub channel_sampling_rates: Vec<f64>,
}

/// Header of the round-robin format plus its declared data length
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRobinHeader {
    pub header: RecordingHeader,
    /// Declared sample data length in bytes; `None` means "to end of file"
    pub data_length: Option<usize>,
}

impl RecordingHeader {
    /// Build a header directly from rates
    pub fn new(main_sampling_rate: f64, channel_sampling_rates: Vec<f64>) -> VitalsResult<Self> {
        if channel_sampling_rates.is_empty() {
            return Err(header_error!("channel count is zero"));
        }
        Ok(Self {
            channel_count: channel_sampling_rates.len(),
            main_sampling_rate,
            channel_sampling_rates,
        })
    }

    /// Parse the multi-rate header from the start of a stream.
    ///
    /// Consumes exactly `layout.data_offset` bytes so the reader is left at
    /// the first sample, whatever the size of the rate table.
    pub fn read_multi_rate<R: Read + ?Sized>(reader: &mut R, layout: &MultiRateLayout) -> VitalsResult<Self> {
        let region = read_region(reader, layout.data_offset)?;
        Self::parse_multi_rate(&region, layout)
    }

    /// Parse the multi-rate header from the header region bytes
    pub fn parse_multi_rate(region: &[u8], layout: &MultiRateLayout) -> VitalsResult<Self> {
        layout.validate()?;
        if region.len() < layout.data_offset {
            return Err(header_error!(
                "header region is {} bytes, expected {}",
                region.len(),
                layout.data_offset
            ));
        }
        let region = &region[..layout.data_offset];

        let channel_count = *region
            .get(layout.header_padding)
            .ok_or_else(|| header_error!("channel count byte lies past the header region"))?
            as usize;
        if channel_count == 0 {
            return Err(header_error!("channel count is zero"));
        }

        // Bounded scan: the sentinel must sit inside the header region
        let scan_start = layout.header_padding + 1;
        let sentinel_pos = region
            .get(scan_start..)
            .unwrap_or_default()
            .iter()
            .position(|&b| b == layout.sentinel)
            .map(|p| p + scan_start)
            .ok_or_else(|| {
                header_error!(
                    "sentinel byte 0x{:02X} not found within {} header bytes",
                    layout.sentinel,
                    layout.data_offset
                )
            })?;

        let table_start = sentinel_pos + 1;
        let table_len = (channel_count + 1) * layout.rate_field_width;
        if table_start + table_len > region.len() {
            return Err(header_error!(
                "rate table for {} channels ({} bytes at 0x{:X}) overruns the header region",
                channel_count,
                table_len,
                table_start
            ));
        }

        let mut rates = region[table_start..table_start + table_len]
            .chunks_exact(layout.rate_field_width)
            .enumerate()
            .map(|(index, field)| parse_rate_field(&field[..layout.rate_field_significant], index))
            .collect::<VitalsResult<Vec<f64>>>()?;

        let main_sampling_rate = rates.remove(0);
        Ok(Self {
            channel_count,
            main_sampling_rate,
            channel_sampling_rates: rates,
        })
    }

    /// Lowest per-channel rate
    pub fn min_channel_rate(&self) -> f64 {
        self.channel_sampling_rates
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }
}

impl RoundRobinHeader {
    /// Parse the round-robin header from the start of a stream, leaving the
    /// reader at the first sample
    pub fn read<R: Read + ?Sized>(reader: &mut R, layout: &RoundRobinLayout) -> VitalsResult<Self> {
        let region = read_region(reader, layout.data_offset)?;
        Self::parse(&region, layout)
    }

    /// Parse the round-robin header from the header region bytes
    pub fn parse(region: &[u8], layout: &RoundRobinLayout) -> VitalsResult<Self> {
        let channel_count = read_u32_le(region, layout.channel_count_offset, "channel count")? as usize;
        let sampling_rate = read_u32_le(region, layout.sampling_rate_offset, "sampling rate")? as f64;
        let data_length = read_u32_le(region, layout.data_length_offset, "data length")? as usize;

        if channel_count == 0 {
            return Err(header_error!("channel count is zero"));
        }
        if channel_count > MAX_ROUND_ROBIN_CHANNELS {
            return Err(header_error!(
                "channel count {} exceeds the maximum of {}",
                channel_count,
                MAX_ROUND_ROBIN_CHANNELS
            ));
        }

        Ok(Self {
            header: RecordingHeader {
                channel_count,
                main_sampling_rate: sampling_rate,
                channel_sampling_rates: vec![sampling_rate; channel_count],
            },
            data_length: (data_length > 0).then_some(data_length),
        })
    }
}

impl fmt::Display for RecordingHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} channels, main rate {} Hz, channel rates {:?}",
            self.channel_count, self.main_sampling_rate, self.channel_sampling_rates
        )
    }
}

fn read_region<R: Read + ?Sized>(reader: &mut R, len: usize) -> VitalsResult<Vec<u8>> {
    let mut region = vec![0u8; len];
    match reader.read_exact(&mut region) {
        Ok(()) => Ok(region),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(header_error!(
            "stream ended inside the {}-byte header region",
            len
        )),
        Err(e) => Err(VitalsError::Io(e)),
    }
}

fn parse_rate_field(field: &[u8], index: usize) -> VitalsResult<f64> {
    let label = if index == 0 {
        "main rate".to_string()
    } else {
        format!("channel {} rate", index - 1)
    };
    let text = std::str::from_utf8(field)
        .map_err(|_| header_error!("{} field is not ASCII text", label))?;
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    text.parse::<f64>()
        .map_err(|_| header_error!("{} field {:?} is not a number", label, text))
}

fn read_u32_le(region: &[u8], offset: usize, name: &str) -> VitalsResult<u32> {
    region
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| header_error!("{} field at 0x{:X} lies past the header", name, offset))
}
