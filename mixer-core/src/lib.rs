//! The real-time audio mixer engine: an indexed set of logical playback
//! channels, the envelope/dying-list primitives that back them, and the
//! thread-safe control API plus device callback that drive them.
//!
//! Decoders and the audio device itself are supplied by the host through
//! `decoder_api::DecoderFactory` and a render-callback closure respectively
//! (see `audio-backend`); this crate owns none of them.

mod channel;
mod config;
mod dying;
mod envelope;
pub mod error;
mod events;
mod mixer;
mod table;

pub use channel::{Channel, SourceSlot};
pub use config::MixerConfig;
pub use dying::DyingList;
pub use envelope::Envelope;
pub use error::{last_error, ErrorKind, MixerError};
pub use events::{EndEventSink, NullSink};
pub use mixer::{ms_to_samples, samples_to_ms, Mixer};
pub use table::ChannelTable;
