//! Byte images of recordings for tests and demos
//!
//! Encodes channel signals into the two on-disk formats so the decoder can be
//! exercised end to end without monitor hardware.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use vitals_core::{
    ChannelSignal, DecoderConfig, Demultiplexer, FileFormat, InterleaveSchedule, MultiRateLayout,
    RecordingHeader, RoundRobinLayout, SampleEncoding, VitalsError, VitalsResult,
};

/// Filler bytes between the channel count and the sentinel
const SENTINEL_GAP: usize = 3;

/// Builder of recording images
#[derive(Debug, Clone, Default)]
pub struct RecordingFixture {
    config: DecoderConfig,
}

impl RecordingFixture {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Header region of a multi-rate recording
    pub fn multi_rate_header(&self, header: &RecordingHeader) -> VitalsResult<Vec<u8>> {
        let layout: &MultiRateLayout = &self.config.multi_rate;
        let count = u8::try_from(header.channel_count)
            .map_err(|_| fixture_error(format!("{} channels do not fit the count byte", header.channel_count)))?;

        let mut region = vec![0u8; layout.data_offset];
        region[layout.header_padding] = count;
        let sentinel_pos = layout.header_padding + 1 + SENTINEL_GAP;
        let mut pos = sentinel_pos + 1;
        if pos + (header.channel_count + 1) * layout.rate_field_width > layout.data_offset {
            return Err(fixture_error(format!(
                "rate table for {} channels does not fit the header",
                header.channel_count
            )));
        }
        region[sentinel_pos] = layout.sentinel;

        for rate in std::iter::once(header.main_sampling_rate).chain(header.channel_sampling_rates.iter().copied()) {
            let text = format!("{:.1}", rate);
            if text.len() > layout.rate_field_significant {
                return Err(fixture_error(format!("rate {} does not fit a rate field", text)));
            }
            let field = &mut region[pos..pos + layout.rate_field_width];
            field.fill(b' ');
            field[..text.len()].copy_from_slice(text.as_bytes());
            pos += layout.rate_field_width;
        }
        Ok(region)
    }

    /// Full multi-rate image. Channels are cut to the largest whole number
    /// of cycles they all cover and quantized to the layout's sample type.
    pub fn multi_rate_image(
        &self,
        main_sampling_rate: f64,
        channels: &[ChannelSignal],
    ) -> VitalsResult<Vec<u8>> {
        let rates: Vec<f64> = channels.iter().map(|c| c.sampling_rate).collect();
        let header = RecordingHeader::new(main_sampling_rate, rates)?;
        let schedule = InterleaveSchedule::from_header(&header)?;

        let mut image = self.multi_rate_header(&header)?;
        let flat = interleave_whole_cycles(&schedule, channels)?;
        image.extend(encode_samples(&flat, self.config.multi_rate.encoding));
        Ok(image)
    }

    /// Full round-robin image; all channels must share one rate. The declared
    /// data length is the byte count of the frames written, or 0 when
    /// `declare_length` is false.
    pub fn round_robin_image(
        &self,
        channels: &[ChannelSignal],
        declare_length: bool,
    ) -> VitalsResult<Vec<u8>> {
        let layout: &RoundRobinLayout = &self.config.round_robin;
        let rate = channels
            .first()
            .map(|c| c.sampling_rate)
            .ok_or_else(|| fixture_error("no channels to encode".to_string()))?;
        if channels.iter().any(|c| c.sampling_rate != rate) {
            return Err(fixture_error("round-robin channels must share one rate".to_string()));
        }

        let schedule = InterleaveSchedule::round_robin(channels.len())?;
        let flat = interleave_whole_cycles(&schedule, channels)?;
        let samples = encode_samples(&flat, layout.encoding);

        let mut image = vec![0u8; layout.data_offset];
        write_u32(&mut image, layout.channel_count_offset, channels.len())?;
        write_u32(&mut image, layout.sampling_rate_offset, rate.round() as usize)?;
        let declared = if declare_length { samples.len() } else { 0 };
        write_u32(&mut image, layout.data_length_offset, declared)?;
        image.extend(samples);
        Ok(image)
    }

    /// Write an image into `dir`, naming it after the format's extension
    pub fn write(&self, dir: &Path, stem: &str, format: FileFormat, image: &[u8]) -> VitalsResult<PathBuf> {
        let extension = match format {
            FileFormat::MultiRate => "raw",
            FileFormat::RoundRobin => "bin",
        };
        let path = dir.join(format!("{}.{}", stem, extension));
        fs::write(&path, image)?;
        debug!(path = %path.display(), bytes = image.len(), "recording fixture written");
        Ok(path)
    }
}

/// Quantize to 16-bit samples, rounding and saturating at the type bounds
pub fn encode_samples(flat: &[f64], encoding: SampleEncoding) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(flat.len() * 2);
    for &value in flat {
        let word = match encoding {
            SampleEncoding::Unsigned => (value.round().clamp(0.0, u16::MAX as f64) as u16).to_le_bytes(),
            SampleEncoding::Signed => {
                (value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16).to_le_bytes()
            }
        };
        bytes.extend_from_slice(&word);
    }
    bytes
}

/// Values a channel takes after a trip through `encode_samples`
pub fn quantize(samples: &[f64], encoding: SampleEncoding) -> Vec<f64> {
    encode_samples(samples, encoding)
        .chunks_exact(2)
        .map(|b| encoding.decode([b[0], b[1]]))
        .collect()
}

fn interleave_whole_cycles(
    schedule: &InterleaveSchedule,
    channels: &[ChannelSignal],
) -> VitalsResult<Vec<f64>> {
    let cycles = channels
        .iter()
        .enumerate()
        .map(|(c, signal)| signal.len() / schedule.occurrences(c))
        .min()
        .unwrap_or(0);
    if cycles == 0 {
        return Err(fixture_error("channels are shorter than one cycle".to_string()));
    }

    let sequences: Vec<Vec<f64>> = channels
        .iter()
        .enumerate()
        .map(|(c, signal)| signal.samples[..cycles * schedule.occurrences(c)].to_vec())
        .collect();
    Demultiplexer::new(schedule).interleave(&sequences)
}

fn write_u32(image: &mut [u8], offset: usize, value: usize) -> VitalsResult<()> {
    let value = u32::try_from(value).map_err(|_| fixture_error(format!("{} overflows a u32 field", value)))?;
    image
        .get_mut(offset..offset + 4)
        .ok_or_else(|| fixture_error(format!("field at 0x{:X} lies past the header", offset)))?
        .copy_from_slice(&value.to_le_bytes());
    Ok(())
}

fn fixture_error(message: String) -> VitalsError {
    VitalsError::InvalidConfig { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitals_core::Decoder;

    fn ramp(channel: usize, len: usize, rate: f64) -> ChannelSignal {
        ChannelSignal::new(channel, (0..len).map(|i| (channel * 1000 + i) as f64).collect(), rate)
    }

    #[test]
    fn test_header_parses_back() {
        let fixture = RecordingFixture::default();
        let header = RecordingHeader::new(1000.0, vec![1000.0, 250.0, 500.0]).unwrap();
        let region = fixture.multi_rate_header(&header).unwrap();

        let parsed = RecordingHeader::parse_multi_rate(&region, &MultiRateLayout::default()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_multi_rate_image_decodes() {
        let fixture = RecordingFixture::default();
        let channels = vec![ramp(0, 41, 1000.0), ramp(1, 12, 250.0)];
        let image = fixture.multi_rate_image(1000.0, &channels).unwrap();

        let recording = Decoder::default()
            .decode_reader(&mut image.as_slice(), FileFormat::MultiRate, None)
            .unwrap();
        // ten whole cycles fit both channels
        assert_eq!(recording.channels[0].samples, channels[0].samples[..40].to_vec());
        assert_eq!(recording.channels[1].samples, channels[1].samples[..10].to_vec());
    }

    #[test]
    fn test_round_robin_image_decodes() {
        let fixture = RecordingFixture::default();
        let channels = vec![ramp(0, 20, 500.0), ramp(1, 20, 500.0)];
        for declare_length in [true, false] {
            let image = fixture.round_robin_image(&channels, declare_length).unwrap();
            let recording = Decoder::default()
                .decode_reader(&mut image.as_slice(), FileFormat::RoundRobin, None)
                .unwrap();
            assert_eq!(recording.channels[1].samples, channels[1].samples);
            assert_eq!(recording.header.main_sampling_rate, 500.0);
        }
    }

    #[test]
    fn test_quantization_saturates() {
        assert_eq!(
            quantize(&[-5.0, 1.4, 1.6, 70000.0], SampleEncoding::Unsigned),
            vec![0.0, 1.0, 2.0, 65535.0]
        );
        assert_eq!(
            quantize(&[-40000.0, -1.5, 40000.0], SampleEncoding::Signed),
            vec![-32768.0, -2.0, 32767.0]
        );
    }

    #[test]
    fn test_rejects_unencodable_input() {
        let fixture = RecordingFixture::default();
        assert!(fixture
            .multi_rate_image(1000.0, &[ramp(0, 8, 1000.0), ramp(1, 0, 250.0)])
            .is_err());
        assert!(fixture
            .round_robin_image(&[ramp(0, 4, 500.0), ramp(1, 4, 250.0)], true)
            .is_err());
        assert!(fixture.round_robin_image(&[], true).is_err());
    }

    #[test]
    fn test_write_uses_format_extension() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = RecordingFixture::default();
        let path = fixture
            .write(dir.path(), "night", FileFormat::RoundRobin, &[1, 2, 3])
            .unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("bin"));
        assert_eq!(fs::read(path).unwrap(), vec![1, 2, 3]);
    }
}
