use decoder_api::MediaDecoder;

/// Decoder handles retired by the audio callback, awaiting off-thread
/// teardown. The callback only ever pushes (O(1), two pointer stores under
/// the name lock); `Mixer::periodic` detaches the whole list and closes the
/// handles outside any lock. Closure order is LIFO and unobserved by
/// clients.
#[derive(Default)]
pub struct DyingList {
    handles: Vec<Box<dyn MediaDecoder>>,
}

impl DyingList {
    pub fn new() -> Self {
        DyingList { handles: Vec::new() }
    }

    /// Appends a retired handle. Called from the audio callback under the
    /// name lock.
    pub fn push(&mut self, handle: Box<dyn MediaDecoder>) {
        self.handles.push(handle);
    }

    /// Atomically detaches the entire list, returning what was pending.
    /// Called under the name lock by `periodic`; the returned handles are
    /// then dropped (closed) outside the lock.
    pub fn detach(&mut self) -> Vec<Box<dyn MediaDecoder>> {
        std::mem::take(&mut self.handles)
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
