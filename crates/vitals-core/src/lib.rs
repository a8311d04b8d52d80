//! Vitals-Core: decoding of multi-channel vital-sign recordings
//!
//! Parses the recording header, derives the interleave schedule, and splits
//! the sample stream into one [`ChannelSignal`] per channel at its own rate.

pub mod error;
pub mod config;
pub mod header;
pub mod schedule;
pub mod demux;
pub mod channel_signal;
pub mod format;
pub mod reader;

pub use channel_signal::*;
pub use config::{DecoderConfig, MultiRateLayout, RoundRobinLayout, SampleEncoding};
pub use demux::Demultiplexer;
pub use error::{VitalsError, VitalsResult};
pub use format::{FileFormat, FormatHandler, StreamLayout};
pub use header::{RecordingHeader, RoundRobinHeader};
pub use reader::{decode_file, Decoder, Recording};
pub use schedule::InterleaveSchedule;
