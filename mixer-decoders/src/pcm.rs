//! Whole-file PCM/SFX decoder. Grounded on `sfx_loader::load_sfx_path_with_target`:
//! parses the same headered `.pcm`/`.sfx` blob format, resamples once up front
//! with `rubato` if the source rate doesn't match the engine's configured
//! rate, and converts to i16 so `read_audio` is a plain memcpy from then on.

use decoder_api::{DecoderError, MediaDecoder, MediaStream, SeekWindow, VideoFrame, VideoMode};

use crate::sfx_loader;

pub struct PcmDecoder {
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
    pos_frames: usize,
    start_frame: usize,
    end_frame: Option<usize>,
}

impl PcmDecoder {
    pub fn open(stream: MediaStream, target_sample_rate: u32) -> Result<Self, DecoderError> {
        let data: Vec<u8> = match stream {
            MediaStream::Path(path) => std::fs::read(&path)?,
            MediaStream::Bytes(bytes) => bytes.to_vec(),
        };

        let (samples_f32, meta) = sfx_loader::parse_pcm_sfx_data(&data)
            .map_err(|e| DecoderError::Codec(format!("{:?}", e)))?;

        let resampled = if meta.sample_rate != target_sample_rate {
            sfx_loader::resample_interleaved(
                &samples_f32,
                meta.sample_rate,
                target_sample_rate,
                meta.channels as usize,
            )
        } else {
            samples_f32
        };

        let stereo = to_stereo_i16(&resampled, meta.channels as usize);

        Ok(Self {
            samples: stereo,
            channels: 2,
            sample_rate: target_sample_rate,
            pos_frames: 0,
            start_frame: 0,
            end_frame: None,
        })
    }

    fn total_frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }
}

/// Converts arbitrary-channel interleaved f32 down/up to interleaved stereo
/// i16 (mono duplicates to both channels; >2 channels keep the first two).
fn to_stereo_i16(samples: &[f32], channels: usize) -> Vec<i16> {
    if channels == 0 {
        return Vec::new();
    }
    let frames = samples.len() / channels;
    let mut out = Vec::with_capacity(frames * 2);
    for f in 0..frames {
        let base = f * channels;
        let l = samples[base];
        let r = if channels > 1 { samples[base + 1] } else { l };
        out.push((l.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
        out.push((r.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
    }
    out
}

impl MediaDecoder for PcmDecoder {
    fn set_range(&mut self, window: SeekWindow) {
        let total = self.total_frames();
        self.start_frame = ((window.start_s * self.sample_rate as f32) as usize).min(total);
        self.end_frame = if window.end_s > 0.0 {
            Some(((window.end_s * self.sample_rate as f32) as usize).min(total))
        } else {
            None
        };
        self.pos_frames = self.start_frame;
    }

    fn want_video(&mut self, _mode: VideoMode) {}

    fn start(&mut self) -> Result<(), DecoderError> {
        Ok(())
    }

    fn pause(&mut self, _flag: bool) {}

    fn wait_ready(&mut self) {}

    fn read_audio(&mut self, dest: &mut [i16]) -> usize {
        let limit = self.end_frame.unwrap_or_else(|| self.total_frames());
        let remaining = limit.saturating_sub(self.pos_frames);
        let frames = (dest.len() / 2).min(remaining);
        let src_start = self.pos_frames * 2;
        dest[..frames * 2].copy_from_slice(&self.samples[src_start..src_start + frames * 2]);
        self.pos_frames += frames;
        frames
    }

    fn duration(&self) -> f32 {
        self.total_frames() as f32 / self.sample_rate as f32
    }

    fn video_ready(&self) -> bool {
        false
    }

    fn read_video(&mut self) -> Option<VideoFrame> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make_blob(channels: u16, sample_rate: u32, samples: &[f32]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&channels.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&sample_rate.to_le_bytes());
        for s in samples {
            buf.extend_from_slice(&s.to_le_bytes());
        }
        buf
    }

    #[test]
    fn reads_stereo_samples_unchanged_rate() {
        let blob = make_blob(2, 48_000, &[0.5, -0.5, 0.25, -0.25]);
        let mut dec = PcmDecoder::open(MediaStream::Bytes(Arc::from(blob.into_boxed_slice())), 48_000).unwrap();
        let mut out = vec![0i16; 4];
        let frames = dec.read_audio(&mut out);
        assert_eq!(frames, 2);
        assert!(out[0] > 0 && out[1] < 0);
    }

    #[test]
    fn reports_eof_after_full_read() {
        let blob = make_blob(2, 48_000, &[0.0, 0.0]);
        let mut dec = PcmDecoder::open(MediaStream::Bytes(Arc::from(blob.into_boxed_slice())), 48_000).unwrap();
        let mut out = vec![0i16; 16];
        assert_eq!(dec.read_audio(&mut out), 1);
        assert_eq!(dec.read_audio(&mut out), 0);
    }
}
