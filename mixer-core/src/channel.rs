use crate::envelope::Envelope;
use decoder_api::{MediaDecoder, VideoMode};
use std::sync::atomic::{AtomicU32, Ordering};

/// One of a channel's two source slots (playing or queued). Appears twice
/// per channel.
pub struct SourceSlot {
    pub decoder: Option<Box<dyn MediaDecoder>>,
    pub name: Option<String>,
    pub fadein_ms: u32,
    pub tight: bool,
    /// Offset into the media where playback began, for absolute position
    /// reporting.
    pub start_ms: i64,
    pub relative_volume: f32,
}

impl SourceSlot {
    pub fn empty() -> Self {
        SourceSlot {
            decoder: None,
            name: None,
            fadein_ms: 0,
            tight: false,
            start_ms: 0,
            relative_volume: 1.0,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.decoder.is_some()
    }

    /// Clears the slot to its default, returning whatever decoder it held
    /// (for the caller to push onto the dying list) and dropping the name
    /// inline (names are not shared with the decoder).
    pub fn take(&mut self) -> Option<Box<dyn MediaDecoder>> {
        self.name = None;
        self.fadein_ms = 0;
        self.tight = false;
        self.start_ms = 0;
        self.relative_volume = 1.0;
        self.decoder.take()
    }
}

impl Default for SourceSlot {
    fn default() -> Self {
        SourceSlot::empty()
    }
}

/// A logical mixer strip: one playing source, one queued source, and the
/// per-channel gain/pan envelopes that apply to whichever is playing.
pub struct Channel {
    pub playing: SourceSlot,
    pub queued: SourceSlot,
    pub paused: bool,
    /// Written by the control thread, read by the mixer without a lock
    /// (single `f32`-as-bits word; relaxed ordering is adequate since a torn
    /// read only ever yields a stale-but-valid gain for one buffer).
    mixer_volume_bits: AtomicU32,
    pub secondary_volume: Envelope,
    pub pan: Envelope,
    pub fade: Envelope,
    /// Samples consumed from the currently-playing source since its start.
    pub pos: u64,
    /// -1 == no hard stop scheduled; >=0 counts down per mixed sample.
    pub stop_samples: i64,
    /// Integer tag posted to the host event queue on playing-source
    /// termination. 0 means "no post". Single-word, lock-free.
    event: AtomicU32,
    pub video: VideoMode,
}

impl Channel {
    /// A freshly grown channel table slot: paused with unity gain and no
    /// source loaded.
    pub fn new_default() -> Self {
        Channel {
            playing: SourceSlot::empty(),
            queued: SourceSlot::empty(),
            paused: true,
            mixer_volume_bits: AtomicU32::new(1.0f32.to_bits()),
            secondary_volume: Envelope::constant(1.0),
            pan: Envelope::constant(0.0),
            fade: Envelope::constant(1.0),
            pos: 0,
            stop_samples: -1,
            event: AtomicU32::new(0),
            video: VideoMode::Off,
        }
    }

    pub fn mixer_volume(&self) -> f32 {
        f32::from_bits(self.mixer_volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_mixer_volume(&self, v: f32) {
        self.mixer_volume_bits.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn event_tag(&self) -> u32 {
        self.event.load(Ordering::Relaxed)
    }

    pub fn set_event_tag(&self, tag: u32) {
        self.event.store(tag, Ordering::Relaxed);
    }

    /// Number of occupied slots: 0, 1, or 2.
    pub fn queue_depth(&self) -> u8 {
        self.playing.is_occupied() as u8 + self.queued.is_occupied() as u8
    }
}
