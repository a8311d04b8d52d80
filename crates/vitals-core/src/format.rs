//! Recording format selection
//!
//! Two formats share one decoder: the multi-rate interleaved `*.raw` format
//! and the structurally simpler round-robin `*.bin` format. Each has its own
//! [`FormatHandler`] that turns the header region into a [`StreamLayout`].

use crate::config::{DecoderConfig, MultiRateLayout, RoundRobinLayout, SampleEncoding};
use crate::error::{VitalsError, VitalsResult};
use crate::header::{RecordingHeader, RoundRobinHeader};
use crate::schedule::InterleaveSchedule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Recording format kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    /// Heterogeneous channel rates interleaved by tick (`*.raw`)
    MultiRate,
    /// One sample per channel per frame (`*.bin`)
    RoundRobin,
}

/// Everything the demultiplexer needs to read the sample region
#[derive(Debug, Clone)]
pub struct StreamLayout {
    pub header: RecordingHeader,
    pub schedule: InterleaveSchedule,
    pub encoding: SampleEncoding,
    /// Maximum bytes of sample data to read; `None` reads to end of stream
    pub data_limit: Option<usize>,
}

/// Per-format header parser
pub trait FormatHandler {
    /// Format identifier
    fn format_id(&self) -> FileFormat;

    /// Parse the header region, leaving the reader at the first sample
    fn read_layout(&self, reader: &mut dyn Read) -> VitalsResult<StreamLayout>;
}

/// Handler for the multi-rate interleaved format
pub struct MultiRateHandler<'a> {
    layout: &'a MultiRateLayout,
}

/// Handler for the round-robin format
pub struct RoundRobinHandler<'a> {
    layout: &'a RoundRobinLayout,
}

impl FileFormat {
    /// Select a format from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> VitalsResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("raw") => Ok(FileFormat::MultiRate),
            Some("bin") => Ok(FileFormat::RoundRobin),
            _ => Err(VitalsError::UnknownFormat {
                path: path.display().to_string(),
            }),
        }
    }

    /// Header parser for this format
    pub fn handler<'a>(&self, config: &'a DecoderConfig) -> Box<dyn FormatHandler + 'a> {
        match self {
            FileFormat::MultiRate => Box::new(MultiRateHandler::new(&config.multi_rate)),
            FileFormat::RoundRobin => Box::new(RoundRobinHandler::new(&config.round_robin)),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::MultiRate => write!(f, "multi-rate interleaved"),
            FileFormat::RoundRobin => write!(f, "round-robin"),
        }
    }
}

impl<'a> MultiRateHandler<'a> {
    pub fn new(layout: &'a MultiRateLayout) -> Self {
        Self { layout }
    }
}

impl FormatHandler for MultiRateHandler<'_> {
    fn format_id(&self) -> FileFormat {
        FileFormat::MultiRate
    }

    fn read_layout(&self, reader: &mut dyn Read) -> VitalsResult<StreamLayout> {
        let header = RecordingHeader::read_multi_rate(reader, self.layout)?;
        let schedule = InterleaveSchedule::from_header(&header)?;
        Ok(StreamLayout {
            header,
            schedule,
            encoding: self.layout.encoding,
            data_limit: None,
        })
    }
}

impl<'a> RoundRobinHandler<'a> {
    pub fn new(layout: &'a RoundRobinLayout) -> Self {
        Self { layout }
    }
}

impl FormatHandler for RoundRobinHandler<'_> {
    fn format_id(&self) -> FileFormat {
        FileFormat::RoundRobin
    }

    fn read_layout(&self, reader: &mut dyn Read) -> VitalsResult<StreamLayout> {
        let parsed = RoundRobinHeader::read(reader, self.layout)?;
        // validates the shared rate; every channel sits at divisor 1
        InterleaveSchedule::from_header(&parsed.header)?;
        let schedule = InterleaveSchedule::round_robin(parsed.header.channel_count)?;
        Ok(StreamLayout {
            header: parsed.header,
            schedule,
            encoding: self.layout.encoding,
            data_limit: parsed.data_length,
        })
    }
}
