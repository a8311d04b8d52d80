//! Vitals-Simulation: synthetic vital-sign recordings
//!
//! Seeded multi-rate signal generation and on-disk recording images for
//! exercising the decoder and the denoising pipeline.

pub mod signal_patterns;
pub mod ecg_simulator;
pub mod recording_fixture;

pub use ecg_simulator::*;
pub use recording_fixture::*;
pub use signal_patterns::*;
