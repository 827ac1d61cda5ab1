//! Background-thread media decoder. Grounded directly on
//! `streaming_loader::StreamingAsset`: a dedicated thread probes the file
//! with `symphonia`, resamples with `rubato` when the source rate doesn't
//! match the engine's configured rate, and pushes converted i16 frames into
//! a `ringbuf` SPSC ring buffer. `read_audio` only ever touches the consumer
//! side, so it's safe to call from the audio thread.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use rubato::{InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction};

use decoder_api::{DecoderError, MediaDecoder, MediaStream, SeekWindow, VideoFrame, VideoMode};

const RING_CAPACITY_FRAMES: usize = 64 * 1024;

struct ReadySignal {
    mutex: Mutex<bool>,
    condvar: Condvar,
}

impl ReadySignal {
    fn new() -> Self {
        Self { mutex: Mutex::new(false), condvar: Condvar::new() }
    }

    fn signal(&self) {
        *self.mutex.lock() = true;
        self.condvar.notify_all();
    }

    fn wait(&self) {
        let mut ready = self.mutex.lock();
        if !*ready {
            self.condvar.wait(&mut ready);
        }
    }
}

pub struct SymphoniaDecoder {
    consumer: HeapCons<i16>,
    ready: Arc<ReadySignal>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    duration_s: f32,
}

impl SymphoniaDecoder {
    pub fn open(stream: MediaStream, target_sample_rate: u32) -> Result<Self, DecoderError> {
        let path = match stream {
            MediaStream::Path(p) => p,
            MediaStream::Bytes(_) => {
                return Err(DecoderError::Unsupported(
                    "SymphoniaDecoder requires a file path".into(),
                ))
            }
        };

        let rb = HeapRb::<i16>::new(RING_CAPACITY_FRAMES * 2);
        let (prod, consumer) = rb.split();

        let ready = Arc::new(ReadySignal::new());
        let stop = Arc::new(AtomicBool::new(false));

        let ready_for_thread = ready.clone();
        let stop_for_thread = stop.clone();
        let handle = thread::spawn(move || {
            decode_thread(path, target_sample_rate, prod, ready_for_thread, stop_for_thread);
        });

        Ok(Self {
            consumer,
            ready,
            stop,
            handle: Some(handle),
            duration_s: 0.0,
        })
    }
}

impl Drop for SymphoniaDecoder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl MediaDecoder for SymphoniaDecoder {
    fn set_range(&mut self, _window: SeekWindow) {
        // Mid-stream seeking isn't implemented; the decode thread always
        // starts from the beginning of the file.
    }

    fn want_video(&mut self, _mode: VideoMode) {}

    fn start(&mut self) -> Result<(), DecoderError> {
        Ok(())
    }

    fn pause(&mut self, _flag: bool) {}

    fn wait_ready(&mut self) {
        self.ready.wait();
    }

    fn read_audio(&mut self, dest: &mut [i16]) -> usize {
        let read = self.consumer.pop_slice(dest);
        read / 2
    }

    fn duration(&self) -> f32 {
        self.duration_s
    }

    fn video_ready(&self) -> bool {
        false
    }

    fn read_video(&mut self) -> Option<VideoFrame> {
        None
    }
}

fn decode_thread(
    path: PathBuf,
    target_sample_rate: u32,
    mut prod: HeapProd<i16>,
    ready: Arc<ReadySignal>,
    stop: Arc<AtomicBool>,
) {
    if let Err(e) = run(&path, target_sample_rate, &mut prod, &ready, &stop) {
        tracing::warn!(path = %path.display(), error = %e, "symphonia decode thread stopped early");
    }
    ready.signal();
}

fn run(
    path: &std::path::Path,
    target_sample_rate: u32,
    prod: &mut HeapProd<i16>,
    ready: &ReadySignal,
    stop: &AtomicBool,
) -> Result<(), String> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::default::{get_codecs, get_probe};

    let file = std::fs::File::open(path).map_err(|e| format!("open: {}", e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = get_probe()
        .format(&Default::default(), mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| format!("probe error: {}", e))?;

    let mut format = probed.format;
    let track = format.default_track().ok_or_else(|| "no default track".to_string())?;
    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| format!("codec make error: {}", e))?;

    let mut resampler: Option<SincFixedIn<f32>> = None;
    let mut resampler_ratio: Option<f64> = None;
    let mut signaled_ready = false;

    while !stop.load(Ordering::Relaxed) {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(_) => break,
        };

        let audio_buf = match decoder.decode(&packet) {
            Ok(buf) => buf,
            Err(_) => break,
        };

        let spec = audio_buf.spec();
        let sr = spec.rate;
        let channels = spec.channels.count().max(1);
        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, *spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        let samples = sample_buf.samples();

        let interleaved: Vec<f32> = if sr == target_sample_rate {
            samples.to_vec()
        } else {
            let ratio = target_sample_rate as f64 / sr as f64;
            let frames = samples.len() / channels;
            let planar = to_planar(samples, channels);
            ensure_resampler(&mut resampler, &mut resampler_ratio, ratio, channels, frames);
            match resampler.as_mut() {
                Some(r) => {
                    let input_refs: Vec<&[f32]> = planar.iter().map(|v| v.as_slice()).collect();
                    match r.process(&input_refs, None) {
                        Ok(outputs) if !outputs.is_empty() => interleave(&outputs, channels),
                        _ => continue,
                    }
                }
                None => continue,
            }
        };

        let stereo = to_stereo_i16(&interleaved, channels);
        push_in_chunks(prod, &stereo);

        if !signaled_ready {
            ready.signal();
            signaled_ready = true;
        }
    }

    Ok(())
}

fn to_planar(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar: Vec<Vec<f32>> = vec![Vec::with_capacity(frames); channels];
    for f in 0..frames {
        for (ch, plane) in planar.iter_mut().enumerate() {
            plane.push(samples[f * channels + ch]);
        }
    }
    planar
}

fn interleave(outputs: &[Vec<f32>], channels: usize) -> Vec<f32> {
    let out_frames = outputs[0].len();
    let mut interleaved = vec![0.0f32; out_frames * channels];
    for f in 0..out_frames {
        for ch in 0..channels {
            interleaved[f * channels + ch] = outputs[ch][f];
        }
    }
    interleaved
}

fn to_stereo_i16(samples: &[f32], channels: usize) -> Vec<i16> {
    let frames = samples.len() / channels;
    let mut out = Vec::with_capacity(frames * 2);
    for f in 0..frames {
        let base = f * channels;
        let l = samples[base];
        let r = if channels > 1 { samples[base + 1] } else { l };
        out.push((l.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
        out.push((r.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
    }
    out
}

fn push_in_chunks(prod: &mut HeapProd<i16>, data: &[i16]) {
    let mut off = 0usize;
    while off < data.len() {
        let end = (off + 2048).min(data.len());
        let _ = prod.push_slice(&data[off..end]);
        off = end;
    }
}

fn ensure_resampler(
    resampler: &mut Option<SincFixedIn<f32>>,
    resampler_ratio: &mut Option<f64>,
    ratio: f64,
    channels: usize,
    frames: usize,
) {
    let recreate = match resampler_ratio {
        Some(r) => (*r - ratio).abs() > 1e-8,
        None => true,
    };

    if recreate {
        let params = InterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: InterpolationType::Cubic,
            oversampling_factor: 32,
            window: WindowFunction::BlackmanHarris2,
        };
        let chunk_size = frames.max(1024);
        let max_relative_ratio: f64 = 1.1;
        *resampler = Some(
            SincFixedIn::<f32>::new(ratio, max_relative_ratio, params, chunk_size, channels)
                .expect("failed to create rubato resampler"),
        );
        *resampler_ratio = Some(ratio);
    }
}
