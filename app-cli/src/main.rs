//! Terminal demo for `mixer-core`: plays a sine tone on channel 0 and lets
//! arrow keys drive volume/pan live while the audio callback runs on a real
//! device.
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::{terminal, ExecutableCommand};
use std::io::{stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use audio_backend::{create_audio_backend_with_options, AudioBackend, BackendOptions};
use decoder_api::MediaStream;
use mixer_core::{Mixer, MixerConfig};
use mixer_decoders::DefaultDecoderFactory;
use mixer_events::EventBusImpl;

const CHANNEL: i64 = 0;

/// Terminal demo for the mixer engine: plays a sine tone on channel 0 and
/// lets arrow keys drive live volume/pan.
#[derive(Parser)]
struct Args {
    /// Preferred output sample rate in Hz; falls back to the device's
    /// default if the device doesn't support it.
    #[arg(long)]
    rate: Option<u32>,
    /// Preferred device callback buffer size in frames.
    #[arg(long)]
    buffer: Option<u32>,
    /// Substring match against output device names; falls back to the
    /// host's default output device if no match is found.
    #[arg(long)]
    device: Option<String>,
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut backend = create_audio_backend_with_options(BackendOptions {
        device_name: args.device,
        sample_rate: args.rate,
        buffer_size: args.buffer,
    })
    .expect("create audio backend");
    let config = MixerConfig {
        freq: backend.sample_rate(),
        stereo: 2,
        samples: backend.buffer_size() as u32,
        status: false,
        equal_mono: false,
    };
    let factory = Arc::new(DefaultDecoderFactory::new(config.freq));
    let events = Arc::new(EventBusImpl::new());
    let mixer = Arc::new(Mixer::with_event_sink(config, factory, events.clone()));

    let render_mixer = mixer.clone();
    backend
        .start(Arc::new(move |out: &mut [i16]| render_mixer.render_callback(out)))
        .expect("start audio backend");

    mixer
        .play(
            CHANNEL,
            MediaStream::Bytes(Arc::from(b"440".to_vec().into_boxed_slice())),
            "sine",
            "sine:440",
            200,
            false,
            false,
            0.0,
            0.0,
            1.0,
        )
        .expect("play sine tone");

    // Background sweep thread: closes decoder handles retired by the audio
    // callback off the real-time thread.
    let stop = Arc::new(AtomicBool::new(false));
    let sweep_mixer = mixer.clone();
    let sweep_stop = stop.clone();
    let sweep_handle = std::thread::spawn(move || {
        while !sweep_stop.load(Ordering::Relaxed) {
            sweep_mixer.periodic();
            std::thread::sleep(Duration::from_millis(50));
        }
    });

    let mut stdout = stdout();
    terminal::enable_raw_mode()?;
    stdout.execute(crossterm::cursor::Hide)?;
    stdout.execute(terminal::EnterAlternateScreen)?;

    let mut volume = 1.0f32;
    let mut pan = 0.0f32;
    let mut paused = false;
    let target_frame = Duration::from_micros(16_667);

    'running: loop {
        let frame_start = Instant::now();
        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
                    || key.code == KeyCode::Esc
                    || key.code == KeyCode::Char('q')
                {
                    break 'running;
                }
                match key.code {
                    KeyCode::Up => volume = (volume + 0.05).min(2.0),
                    KeyCode::Down => volume = (volume - 0.05).max(0.0),
                    KeyCode::Left => pan = (pan - 0.1).max(-1.0),
                    KeyCode::Right => pan = (pan + 0.1).min(1.0),
                    KeyCode::Char('p') => {
                        paused = !paused;
                        mixer.pause(CHANNEL, paused).ok();
                    }
                    KeyCode::Char('f') => {
                        mixer.fadeout(CHANNEL, 500).ok();
                    }
                    _ => {}
                }
                mixer.set_volume(CHANNEL, volume).ok();
                mixer.set_pan(CHANNEL, pan, 0.0).ok();
            }
        }

        events.drain();

        stdout.execute(terminal::Clear(terminal::ClearType::All))?;
        writeln!(stdout, "mixer-core CLI demo")?;
        writeln!(stdout, "Left/Right: pan   Up/Down: volume   p: pause   f: fadeout   q/Esc: quit")?;
        writeln!(stdout, "volume={:.2} pan={:.2} paused={}", volume, pan, paused)?;
        if let Ok(pos_ms) = mixer.get_pos(CHANNEL) {
            writeln!(stdout, "position_ms={} queue_depth={:?}", pos_ms, mixer.queue_depth(CHANNEL))?;
        }
        stdout.flush().ok();

        let elapsed = frame_start.elapsed();
        if elapsed < target_frame {
            std::thread::sleep(target_frame - elapsed);
        }
    }

    stop.store(true, Ordering::Relaxed);
    sweep_handle.join().ok();

    mixer.quit();
    backend.stop().ok();

    stdout.execute(terminal::LeaveAlternateScreen)?;
    stdout.execute(crossterm::cursor::Show)?;
    terminal::disable_raw_mode()?;
    Ok(())
}
