//! Shared helpers for building test media sources across the black-box
//! integration tests in this directory. Each test file includes this one
//! with `mod support;`.
use std::sync::Arc;

use decoder_api::MediaStream;
use mixer_core::MixerConfig;

pub const SR: u32 = 48_000;

pub fn config() -> MixerConfig {
    MixerConfig { freq: SR, stereo: 2, samples: 256, status: false, equal_mono: false }
}

pub fn sine_stream(freq_hz: u32) -> MediaStream {
    MediaStream::Bytes(Arc::from(freq_hz.to_string().into_bytes().into_boxed_slice()))
}

/// Builds the headered PCM/SFX blob `mixer_decoders::sfx_loader` parses:
/// channel count, a reserved u16, sample rate, then interleaved f32 samples.
pub fn pcm_blob(channels: u16, sample_rate: u32, frames: usize, value: f32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    for _ in 0..frames * channels as usize {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf
}

pub fn pcm_stream(channels: u16, sample_rate: u32, frames: usize, value: f32) -> MediaStream {
    let blob = pcm_blob(channels, sample_rate, frames, value);
    MediaStream::Bytes(Arc::from(blob.into_boxed_slice()))
}
