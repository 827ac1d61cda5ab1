/// The host event queue the mixer posts to on playing-source termination.
/// `mixer-core` stays agnostic to the concrete queue implementation;
/// `mixer-events::EventBusImpl` implements this trait, but a host may wire
/// up anything that can accept a tag off the audio thread without blocking.
pub trait EndEventSink: Send + Sync {
    /// Posts `tag` for `channel`. Must not block; called from the audio
    /// callback.
    fn post(&self, channel: usize, tag: u32);
}

/// A sink that drops every event. Used where no host queue is wired up.
pub struct NullSink;

impl EndEventSink for NullSink {
    fn post(&self, _channel: usize, _tag: u32) {}
}
