//! The narrow interface `mixer-core` consumes to pull PCM (and, optionally,
//! video frames) out of a media source. No concrete codec lives here —
//! implementations are provided by the `mixer-decoders` crate or by a host
//! application.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Where the decoder should read its encoded bytes from.
#[derive(Debug, Clone)]
pub enum MediaStream {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// Playback confinement window, in seconds. `end` of `0.0` means "to EOF".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekWindow {
    pub start_s: f32,
    pub end_s: f32,
}

impl SeekWindow {
    pub const FULL: SeekWindow = SeekWindow { start_s: 0.0, end_s: 0.0 };
}

/// Video production mode for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    /// Audio-only; no frames are produced.
    Off,
    /// Video frames are produced; late frames may be dropped to catch up.
    DropLate,
    /// Video frames are produced; none are ever dropped.
    KeepAll,
}

/// A single decoded video frame. Presentation is the host's job; this repo
/// only carries the frame across the decoder boundary.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB24, row-major, no padding.
    pub rgb: Arc<[u8]>,
    pub pts_s: f32,
}

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("source not found")]
    NotFound,
    #[error("unsupported format: {0}")]
    Unsupported(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(String),
}

/// A decoder instance bound to one open media source.
///
/// Ownership is exclusive: a `Box<dyn MediaDecoder>` is held by exactly one
/// channel source slot at a time. Closing happens by dropping the box, which
/// implementations route through whatever background-thread teardown they
/// need — `mixer-core` guarantees the drop never happens on the audio
/// thread (see the dying list in `mixer_core::dying`).
pub trait MediaDecoder: Send {
    /// Confine playback to `window`. Must be called, if at all, before
    /// `start`.
    fn set_range(&mut self, window: SeekWindow);

    /// Enable or disable video frame production.
    fn want_video(&mut self, mode: VideoMode);

    /// Begin background decoding.
    fn start(&mut self) -> Result<(), DecoderError>;

    /// Pause or resume decode-ahead work. Does not affect already-buffered
    /// audio available to `read_audio`.
    fn pause(&mut self, flag: bool);

    /// Block until the first output is available. May be called from a
    /// non-real-time thread only.
    fn wait_ready(&mut self);

    /// Fill as much of `dest` as possible with interleaved stereo i16
    /// frames (`dest.len()` must be even). Returns the number of frames
    /// (not samples) written. Returning 0 signals EOF.
    fn read_audio(&mut self, dest: &mut [i16]) -> usize;

    /// Total duration in seconds, or `0.0` if unknown.
    fn duration(&self) -> f32;

    /// Whether a decoded video frame is currently available.
    fn video_ready(&self) -> bool;

    /// Take the next ready video frame, if any.
    fn read_video(&mut self) -> Option<VideoFrame>;
}

/// Creates `MediaDecoder`s from a stream + extension hint.
pub trait DecoderFactory: Send + Sync {
    fn open(&self, stream: MediaStream, ext: &str) -> Result<Box<dyn MediaDecoder>, DecoderError>;
}
