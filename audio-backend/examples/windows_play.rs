use std::sync::Arc;
use std::time::Duration;

use audio_backend::{create_audio_backend, AudioBackend};
use decoder_api::MediaStream;
use mixer_core::{Mixer, MixerConfig};
use mixer_decoders::DefaultDecoderFactory;

fn main() -> Result<(), audio_backend::BackendError> {
    // Parse optional CLI args: <duration_ms> <freq>
    let mut args = std::env::args().skip(1);
    let duration_ms: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(2000);
    let freq: u32 = args.next().and_then(|s| s.parse().ok()).unwrap_or(440);

    let mut backend = create_audio_backend()?;
    let config = MixerConfig {
        freq: backend.sample_rate(),
        stereo: 2,
        samples: backend.buffer_size() as u32,
        status: false,
        equal_mono: false,
    };
    let factory = Arc::new(DefaultDecoderFactory::new(config.freq));
    let mixer = Arc::new(Mixer::init(config, factory));

    // Start the backend with a render function that forwards straight into
    // the mixer callback; same pattern app-cli uses.
    let render_mixer = mixer.clone();
    let render: audio_backend::RenderFn = Arc::new(move |out: &mut [i16]| {
        render_mixer.render_callback(out);
    });
    backend.start(render)?;

    // Start a sine source on channel 0; asset id is "sine:<freq>", same
    // convention app-cli uses for `DefaultDecoderFactory`'s "sine" extension.
    mixer
        .play(
            0,
            MediaStream::Bytes(Arc::from(freq.to_string().into_bytes().into_boxed_slice())),
            "sine",
            format!("sine:{freq}"),
            0,
            false,
            false,
            0.0,
            0.0,
            1.0,
        )
        .map_err(|e| audio_backend::BackendError::Other(e.to_string()))?;

    // Let it run for the requested duration to audibly verify the sine source.
    std::thread::sleep(Duration::from_millis(duration_ms));

    mixer.quit();
    backend.stop()?;
    Ok(())
}
