//! Decoder configuration
//!
//! Byte layouts of the two recording formats. Defaults match the monitor's
//! firmware; overrides are loaded from JSON.

use crate::error::{VitalsError, VitalsResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Width of one stored sample in bytes
pub const BYTES_PER_SAMPLE: usize = 2;

/// How the 16-bit little-endian samples are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleEncoding {
    /// `u16` little endian
    Unsigned,
    /// `i16` little endian
    Signed,
}

impl SampleEncoding {
    /// Decode one sample from two little-endian bytes
    #[inline]
    pub fn decode(self, bytes: [u8; 2]) -> f64 {
        match self {
            SampleEncoding::Unsigned => u16::from_le_bytes(bytes) as f64,
            SampleEncoding::Signed => i16::from_le_bytes(bytes) as f64,
        }
    }
}

/// Layout of the multi-rate interleaved format (`*.raw`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiRateLayout {
    /// Padding bytes before the channel count byte
    pub header_padding: usize,
    /// Byte value marking the start of the rate table
    pub sentinel: u8,
    /// Width of each textual rate field
    pub rate_field_width: usize,
    /// Leading bytes of a rate field that carry the number
    pub rate_field_significant: usize,
    /// Offset of the first sample
    pub data_offset: usize,
    /// Sample interpretation
    pub encoding: SampleEncoding,
}

/// Layout of the round-robin format (`*.bin`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRobinLayout {
    /// Offset of the `u32` channel count
    pub channel_count_offset: usize,
    /// Offset of the `u32` sampling rate (Hz)
    pub sampling_rate_offset: usize,
    /// Offset of the `u32` sample data length in bytes
    pub data_length_offset: usize,
    /// Offset of the first sample
    pub data_offset: usize,
    /// Sample interpretation
    pub encoding: SampleEncoding,
}

/// Full decoder configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub multi_rate: MultiRateLayout,
    pub round_robin: RoundRobinLayout,
}

impl Default for MultiRateLayout {
    fn default() -> Self {
        Self {
            header_padding: 0x24,
            sentinel: 0x0F,
            rate_field_width: 0x10,
            rate_field_significant: 0x0F,
            data_offset: 0x200,
            encoding: SampleEncoding::Unsigned,
        }
    }
}

impl Default for RoundRobinLayout {
    fn default() -> Self {
        Self {
            channel_count_offset: 0xE0,
            sampling_rate_offset: 0xE4,
            data_length_offset: 0xE8,
            data_offset: 0x4B8,
            encoding: SampleEncoding::Signed,
        }
    }
}

impl MultiRateLayout {
    /// Validate layout constants
    pub fn validate(&self) -> VitalsResult<()> {
        if self.rate_field_width == 0 {
            return Err(config_error("rate field width must be greater than 0"));
        }
        if self.rate_field_significant == 0 || self.rate_field_significant > self.rate_field_width {
            return Err(config_error(
                "significant rate bytes must be in 1..=rate_field_width",
            ));
        }
        // channel count byte, sentinel, and at least the main rate field
        let minimum_header = self.header_padding + 2 + self.rate_field_width;
        if self.data_offset < minimum_header {
            return Err(VitalsError::InvalidConfig {
                message: format!(
                    "multi-rate data offset 0x{:X} leaves no room for a header of at least {} bytes",
                    self.data_offset, minimum_header
                ),
            });
        }
        Ok(())
    }
}

impl RoundRobinLayout {
    /// Validate layout constants
    pub fn validate(&self) -> VitalsResult<()> {
        for (name, offset) in [
            ("channel count", self.channel_count_offset),
            ("sampling rate", self.sampling_rate_offset),
            ("data length", self.data_length_offset),
        ] {
            if offset + 4 > self.data_offset {
                return Err(VitalsError::InvalidConfig {
                    message: format!(
                        "round-robin {} field at 0x{:X} overlaps sample data at 0x{:X}",
                        name, offset, self.data_offset
                    ),
                });
            }
        }
        Ok(())
    }
}

impl DecoderConfig {
    /// Validate both layouts
    pub fn validate(&self) -> VitalsResult<()> {
        self.multi_rate.validate()?;
        self.round_robin.validate()
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> VitalsResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| VitalsError::InvalidConfig {
            message: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> VitalsResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| VitalsError::InvalidConfig {
            message: format!("Failed to deserialize configuration: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> VitalsResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

fn config_error(message: &str) -> VitalsError {
    VitalsError::InvalidConfig {
        message: message.to_string(),
    }
}
