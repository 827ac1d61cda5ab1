/// Configuration supplied to [`crate::Mixer::init`]. `status` and
/// `equal_mono` pass through unchanged to every decoder this mixer opens.
#[derive(Debug, Clone, Copy)]
pub struct MixerConfig {
    pub freq: u32,
    /// Must be 2; kept as a field rather than hardcoded since it is part
    /// of the init contract.
    pub stereo: u8,
    /// Device buffer size in frames.
    pub samples: u32,
    pub status: bool,
    pub equal_mono: bool,
}

impl Default for MixerConfig {
    fn default() -> Self {
        MixerConfig { freq: 48_000, stereo: 2, samples: 1024, status: false, equal_mono: false }
    }
}
