//! Recording decoder
//!
//! Opens a recording, parses its header, derives the interleave schedule,
//! demultiplexes the sample region, and optionally slices every channel to a
//! time window. The file handle lives only for the duration of one call.

use crate::channel_signal::{ChannelSignal, TimeWindow};
use crate::config::{DecoderConfig, BYTES_PER_SAMPLE};
use crate::demux::Demultiplexer;
use crate::error::VitalsResult;
use crate::format::FileFormat;
use crate::header::RecordingHeader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// A decoded recording
#[derive(Debug, Clone)]
pub struct Recording {
    pub format: FileFormat,
    pub header: RecordingHeader,
    /// One signal per channel, in channel index order
    pub channels: Vec<ChannelSignal>,
}

impl Recording {
    /// Sampling rate of every channel, aligned with `channels`
    pub fn sampling_rates(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.sampling_rate).collect()
    }

    /// Longest channel duration in seconds
    pub fn duration_s(&self) -> f64 {
        self.channels
            .iter()
            .map(ChannelSignal::duration_s)
            .fold(0.0, f64::max)
    }

    /// Split into channel signals and their sampling rates
    pub fn into_parts(self) -> (Vec<ChannelSignal>, Vec<f64>) {
        let rates = self.sampling_rates();
        (self.channels, rates)
    }
}

/// Decoder for multi-rate and round-robin recordings
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Create a decoder with validated layouts
    pub fn new(config: DecoderConfig) -> VitalsResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a file, choosing the format from its extension
    pub fn decode_file(
        &self,
        path: impl AsRef<Path>,
        window: Option<&TimeWindow>,
    ) -> VitalsResult<Recording> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        self.decode(path, format, window)
    }

    /// Decode a file in the given format
    pub fn decode(
        &self,
        path: impl AsRef<Path>,
        format: FileFormat,
        window: Option<&TimeWindow>,
    ) -> VitalsResult<Recording> {
        let path = path.as_ref();
        debug!(path = %path.display(), %format, "opening recording");

        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        self.decode_reader(&mut reader, format, window)
    }

    /// Decode from any byte stream positioned at the start of a recording
    pub fn decode_reader<R: Read>(
        &self,
        reader: &mut R,
        format: FileFormat,
        window: Option<&TimeWindow>,
    ) -> VitalsResult<Recording> {
        let layout = format.handler(&self.config).read_layout(reader)?;
        info!(
            format = %format,
            channels = layout.header.channel_count,
            main_rate = layout.header.main_sampling_rate,
            rates = ?layout.header.channel_sampling_rates,
            "recording header parsed"
        );
        debug!(order = ?layout.schedule.order(), "reading order");

        let mut data = Vec::new();
        match layout.data_limit {
            Some(limit) => reader.by_ref().take(limit as u64).read_to_end(&mut data)?,
            None => reader.read_to_end(&mut data)?,
        };

        let demux = Demultiplexer::new(&layout.schedule);
        let sequences = demux.demultiplex_bytes(&data, layout.encoding)?;

        let cycles = demux.cycle_count(data.len());
        info!(
            cycles,
            samples = cycles * layout.schedule.slots_per_cycle(),
            bytes = cycles * demux.cycle_bytes(),
            "sample data decoded"
        );
        debug!(
            trailing_bytes = data.len() - cycles * layout.schedule.slots_per_cycle() * BYTES_PER_SAMPLE,
            "partial trailing cycle ignored"
        );

        let channels = sequences
            .into_iter()
            .zip(&layout.header.channel_sampling_rates)
            .enumerate()
            .map(|(channel, (samples, &rate))| {
                let signal = ChannelSignal::new(channel, samples, rate);
                match window {
                    Some(window) => signal.slice(window),
                    None => signal,
                }
            })
            .collect();

        Ok(Recording {
            format,
            header: layout.header,
            channels,
        })
    }
}

/// Decode a file with the default layouts
pub fn decode_file(
    path: impl AsRef<Path>,
    window: Option<&TimeWindow>,
) -> VitalsResult<(Vec<ChannelSignal>, Vec<f64>)> {
    Decoder::default()
        .decode_file(path, window)
        .map(Recording::into_parts)
}
