//! Concrete `decoder_api::MediaDecoder` implementations the mixer can open:
//! a sine-wave generator for tests, a whole-file PCM/SFX reader, and (behind
//! the `streaming` feature) a `symphonia`-backed background decoder.

pub mod pcm;
pub mod sfx_loader;
pub mod tone;
pub mod util;

#[cfg(feature = "streaming")]
pub mod symphonia_decoder;

pub use pcm::PcmDecoder;
pub use tone::ToneDecoder;
pub use util::AssetError;

#[cfg(feature = "streaming")]
pub use symphonia_decoder::SymphoniaDecoder;

use decoder_api::{DecoderError, DecoderFactory, MediaDecoder, MediaStream};

/// Opens `ToneDecoder`/`PcmDecoder`/`SymphoniaDecoder` by extension hint.
/// `ext == "sine"` expects the stream to carry the frequency as ASCII text
/// (`app-cli`'s `sine:<freq>` asset id); `"pcm"`/`"sfx"` dispatch to the
/// whole-file reader; anything else goes to the streaming decoder.
pub struct DefaultDecoderFactory {
    sample_rate: u32,
}

impl DefaultDecoderFactory {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl DecoderFactory for DefaultDecoderFactory {
    fn open(&self, stream: MediaStream, ext: &str) -> Result<Box<dyn MediaDecoder>, DecoderError> {
        match ext {
            "sine" => {
                let bytes = match &stream {
                    MediaStream::Bytes(b) => b.clone(),
                    MediaStream::Path(_) => {
                        return Err(DecoderError::Unsupported(
                            "sine decoder expects MediaStream::Bytes".into(),
                        ))
                    }
                };
                let text = std::str::from_utf8(&bytes)
                    .map_err(|e| DecoderError::Codec(e.to_string()))?;
                let freq: f32 = text
                    .trim()
                    .parse()
                    .map_err(|_| DecoderError::Unsupported(format!("invalid sine frequency: {}", text)))?;
                Ok(Box::new(ToneDecoder::new(freq, self.sample_rate)))
            }
            "pcm" | "sfx" => Ok(Box::new(pcm::PcmDecoder::open(stream, self.sample_rate)?)),
            #[cfg(feature = "streaming")]
            _ => Ok(Box::new(symphonia_decoder::SymphoniaDecoder::open(stream, self.sample_rate)?)),
            #[cfg(not(feature = "streaming"))]
            other => Err(DecoderError::Unsupported(format!(
                "no decoder for extension {:?} (streaming feature disabled)",
                other
            ))),
        }
    }
}
