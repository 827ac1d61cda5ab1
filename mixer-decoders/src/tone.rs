//! Sine-wave test decoder: a phase-accumulator render loop with no
//! attack/release ramp of its own, since that's `mixer_core::Envelope`'s job
//! once the tone reaches a channel.

use std::f32::consts::PI;

use decoder_api::{DecoderError, MediaDecoder, SeekWindow, VideoFrame, VideoMode};

pub struct ToneDecoder {
    freq: f32,
    sample_rate: u32,
    phase: f32,
    frames_total: Option<u64>,
    frames_emitted: u64,
}

impl ToneDecoder {
    pub fn new(freq: f32, sample_rate: u32) -> Self {
        Self {
            freq,
            sample_rate,
            phase: 0.0,
            frames_total: None,
            frames_emitted: 0,
        }
    }
}

impl MediaDecoder for ToneDecoder {
    fn set_range(&mut self, window: SeekWindow) {
        if window.end_s > 0.0 {
            self.frames_total = Some((window.end_s * self.sample_rate as f32) as u64);
        }
        self.phase = 2.0 * PI * self.freq * window.start_s;
    }

    fn want_video(&mut self, _mode: VideoMode) {}

    fn start(&mut self) -> Result<(), DecoderError> {
        Ok(())
    }

    fn pause(&mut self, _flag: bool) {}

    fn wait_ready(&mut self) {}

    fn read_audio(&mut self, dest: &mut [i16]) -> usize {
        let frames = dest.len() / 2;
        let step = 2.0 * PI * self.freq / self.sample_rate as f32;
        let mut written = 0usize;
        for i in 0..frames {
            if let Some(total) = self.frames_total {
                if self.frames_emitted >= total {
                    break;
                }
            }
            let sample = (self.phase.sin() * i16::MAX as f32 * 0.5) as i16;
            dest[i * 2] = sample;
            dest[i * 2 + 1] = sample;
            self.phase += step;
            if self.phase > 2.0 * PI {
                self.phase -= 2.0 * PI;
            }
            self.frames_emitted += 1;
            written += 1;
        }
        written
    }

    fn duration(&self) -> f32 {
        match self.frames_total {
            Some(total) => total as f32 / self.sample_rate as f32,
            None => 0.0,
        }
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

    #[test]
    fn emits_nonzero_samples() {
        let mut dec = ToneDecoder::new(440.0, 48_000);
        dec.start().unwrap();
        let mut buf = vec![0i16; 256];
        let frames = dec.read_audio(&mut buf);
        assert_eq!(frames, 128);
        assert!(buf.iter().any(|&s| s != 0));
    }

    #[test]
    fn set_range_bounds_total_frames() {
        let mut dec = ToneDecoder::new(440.0, 1000);
        dec.set_range(SeekWindow { start_s: 0.0, end_s: 0.01 });
        dec.start().unwrap();
        let mut buf = vec![0i16; 2 * 100];
        let frames = dec.read_audio(&mut buf);
        assert_eq!(frames, 10);
        assert_eq!(dec.read_audio(&mut buf), 0);
    }
}
