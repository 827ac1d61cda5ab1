use crate::channel::{Channel, SourceSlot};
use crate::config::MixerConfig;
use crate::dying::DyingList;
use crate::envelope::Envelope;
use crate::error::{self, MixerError};
use crate::events::{EndEventSink, NullSink};
use crate::table::ChannelTable;
use decoder_api::{DecoderFactory, MediaStream, SeekWindow, VideoFrame, VideoMode};
use parking_lot::Mutex;
use std::sync::Arc;

pub fn ms_to_samples(ms: u32, freq: u32) -> u64 {
    (ms as u64 * freq as u64) / 1000
}

pub fn samples_to_ms(samples: u64, freq: u32) -> i64 {
    ((samples as u128 * 1000) / freq.max(1) as u128) as i64
}

/// The identity-facing fields mirrored under the name lock so read-only
/// control operations (queue depth, name, position, duration) never have to
/// contend with the audio lock the mixer callback holds for its whole
/// invocation. Kept in sync by whichever audio-lock-holding code last
/// changed the authoritative `Channel` state.
#[derive(Default, Clone)]
struct ChannelIdentity {
    playing_name: Option<String>,
    queued_name: Option<String>,
    playing_duration_s: f32,
    playing_start_ms: i64,
    pos_ms: i64,
    queue_depth: u8,
    is_playing: bool,
}

#[derive(Default)]
struct NameLockState {
    identity: Vec<ChannelIdentity>,
    dying: DyingList,
}

impl NameLockState {
    fn ensure(&mut self, index: usize) {
        if index >= self.identity.len() {
            self.identity.resize_with(index + 1, ChannelIdentity::default);
        }
    }
}

struct AudioState {
    table: ChannelTable,
    /// Reused across callbacks so the real-time path doesn't allocate.
    scratch: Vec<i16>,
    accum: Vec<f32>,
}

/// The engine: an indexed set of channels, the mixer callback, and the
/// thread-safe control API that drives them.
pub struct Mixer {
    audio: Mutex<AudioState>,
    names: Mutex<NameLockState>,
    config: MixerConfig,
    factory: Arc<dyn DecoderFactory>,
    events: Arc<dyn EndEventSink>,
}

impl Mixer {
    /// Constructs the engine. Device open/close is the caller's
    /// responsibility (see `audio-backend`); this only records the
    /// configuration the callback and decoders will use.
    pub fn init(config: MixerConfig, factory: Arc<dyn DecoderFactory>) -> Self {
        Mixer::with_event_sink(config, factory, Arc::new(NullSink))
    }

    pub fn with_event_sink(
        config: MixerConfig,
        factory: Arc<dyn DecoderFactory>,
        events: Arc<dyn EndEventSink>,
    ) -> Self {
        Mixer {
            audio: Mutex::new(AudioState {
                table: ChannelTable::new(),
                scratch: vec![0i16; config.samples as usize * 2],
                accum: vec![0f32; config.samples as usize * 2],
            }),
            names: Mutex::new(NameLockState::default()),
            config,
            factory,
            events,
        }
    }

    pub fn config(&self) -> MixerConfig {
        self.config
    }

    /// Stops all channels and resets the channel count. No channel survives
    /// `quit`. Device pause/close is the caller's job.
    pub fn quit(&self) {
        let retired = {
            let mut audio = self.audio.lock();
            let mut names = self.names.lock();
            let channel_count = audio.table.len();
            for ch in audio.table.iter_mut() {
                if let Some(d) = ch.playing.take() {
                    names.dying.push(d);
                }
                if let Some(d) = ch.queued.take() {
                    names.dying.push(d);
                }
            }
            audio.table.clear();
            names.identity.clear();
            tracing::info!(channel_count, "quit: all channels stopped");
            names.dying.detach()
        };
        drop(retired);
    }

    fn fail<T>(&self, err: MixerError) -> Result<T, MixerError> {
        tracing::warn!(kind = ?err.kind, message = %err.message, "control operation failed");
        error::set_error(&err);
        Err(err)
    }

    fn ok<T>(&self, v: T) -> Result<T, MixerError> {
        error::clear_error();
        Ok(v)
    }

    fn ensure_index(&self, channel: i64) -> Result<usize, MixerError> {
        let mut audio = self.audio.lock();
        audio.table.ensure(channel)
    }

    // ---- Control API -----------------------------------------------------

    /// `play(ch, src, ext, name, fadein, tight, paused, start_s, end_s, rel_vol)`
    #[allow(clippy::too_many_arguments)]
    pub fn play(
        &self,
        channel: i64,
        stream: MediaStream,
        ext: &str,
        name: impl Into<String>,
        fadein_ms: u32,
        tight: bool,
        paused: bool,
        start_s: f32,
        end_s: f32,
        relative_volume: f32,
    ) -> Result<(), MixerError> {
        let index = match self.audio.lock().table.ensure(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };

        // Free the existing playing/queued slots before opening the new
        // source, so a failed open leaves the channel silent (playing
        // absent) instead of leaving the old source running underneath a
        // reported SOUND_ERROR.
        let (old_playing, old_queued) = {
            let mut audio = self.audio.lock();
            let ch = audio.table.get_mut(index).expect("index ensured above");
            (ch.playing.take(), ch.queued.take())
        };
        {
            let mut names = self.names.lock();
            names.ensure(index);
            if let Some(d) = old_playing {
                names.dying.push(d);
            }
            if let Some(d) = old_queued {
                names.dying.push(d);
            }
        }

        let mut decoder = match self.factory.open(stream, ext) {
            Ok(d) => d,
            Err(e) => return self.fail(MixerError::sound(e.to_string())),
        };
        decoder.set_range(SeekWindow { start_s, end_s });
        if let Err(e) = decoder.start() {
            return self.fail(MixerError::sound(e.to_string()));
        }

        let name = name.into();
        let mut audio = self.audio.lock();
        let ch = audio.table.get_mut(index).expect("index ensured above");

        ch.playing.decoder = Some(decoder);
        ch.playing.name = Some(name);
        ch.playing.fadein_ms = fadein_ms;
        ch.playing.tight = tight;
        ch.playing.start_ms = (start_s * 1000.0) as i64;
        ch.playing.relative_volume = relative_volume;
        ch.paused = paused;
        start_stream(ch, self.config.freq, true);

        drop(audio);
        self.refresh_identity(index);
        tracing::info!(channel, index, "play: source started");
        self.ok(())
    }

    /// `queue(ch, src, ext, name, fadein, tight, start_s, end_s, rel_vol)`
    #[allow(clippy::too_many_arguments)]
    pub fn queue(
        &self,
        channel: i64,
        stream: MediaStream,
        ext: &str,
        name: impl Into<String>,
        fadein_ms: u32,
        tight: bool,
        start_s: f32,
        end_s: f32,
        relative_volume: f32,
    ) -> Result<(), MixerError> {
        let index = match self.audio.lock().table.ensure(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };

        let already_playing = self.audio.lock().table.get(index).unwrap().playing.is_occupied();
        if !already_playing {
            return self.play(
                channel,
                stream,
                ext,
                name,
                fadein_ms,
                tight,
                false,
                start_s,
                end_s,
                relative_volume,
            );
        }

        // Free the existing queued slot before opening the new source, so
        // a failed open leaves the queue slot absent rather than holding
        // the stale queued source underneath a reported SOUND_ERROR.
        let old_queued = {
            let mut audio = self.audio.lock();
            let ch = audio.table.get_mut(index).expect("index ensured above");
            ch.queued.take()
        };
        if let Some(d) = old_queued {
            let mut names = self.names.lock();
            names.ensure(index);
            names.dying.push(d);
        }

        let mut decoder = match self.factory.open(stream, ext) {
            Ok(d) => d,
            Err(e) => return self.fail(MixerError::sound(e.to_string())),
        };
        decoder.set_range(SeekWindow { start_s, end_s });
        if let Err(e) = decoder.start() {
            return self.fail(MixerError::sound(e.to_string()));
        }

        let name = name.into();
        let mut audio = self.audio.lock();
        let ch = audio.table.get_mut(index).expect("index ensured above");
        ch.queued.decoder = Some(decoder);
        ch.queued.name = Some(name);
        ch.queued.fadein_ms = fadein_ms;
        ch.queued.tight = tight;
        ch.queued.start_ms = (start_s * 1000.0) as i64;
        ch.queued.relative_volume = relative_volume;
        drop(audio);

        self.refresh_identity(index);
        self.ok(())
    }

    pub fn stop(&self, channel: i64) -> Result<(), MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut audio = self.audio.lock();
        let ch = audio.table.get_mut(index).unwrap();
        let tag = ch.event_tag();
        let was_playing = ch.playing.is_occupied();
        let old_playing = ch.playing.take();
        let old_queued = ch.queued.take();
        drop(audio);

        if was_playing && tag != 0 {
            self.events.post(index, tag);
        }
        {
            let mut names = self.names.lock();
            if let Some(d) = old_playing {
                names.dying.push(d);
            }
            if let Some(d) = old_queued {
                names.dying.push(d);
            }
        }
        self.refresh_identity(index);
        tracing::debug!(channel, index, "stop: slots freed");
        self.ok(())
    }

    pub fn dequeue(&self, channel: i64, even_tight: bool) -> Result<(), MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut audio = self.audio.lock();
        let ch = audio.table.get_mut(index).unwrap();
        let drop_it = ch.queued.is_occupied() && (!ch.playing.tight || even_tight);
        let dropped = if drop_it { ch.queued.take() } else { None };
        if !drop_it {
            ch.queued.tight = false;
        }
        drop(audio);

        if let Some(d) = dropped {
            let mut names = self.names.lock();
            names.dying.push(d);
        }
        self.refresh_identity(index);
        self.ok(())
    }

    pub fn fadeout(&self, channel: i64, ms: u32) -> Result<(), MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut audio = self.audio.lock();
        let ch = audio.table.get_mut(index).unwrap();
        if ms == 0 {
            ch.stop_samples = 0;
        } else {
            let samples = ms_to_samples(ms, self.config.freq);
            ch.fade.retarget(0.0, samples);
            ch.stop_samples = samples as i64;
            ch.queued.tight = false;
            if !ch.queued.is_occupied() {
                ch.playing.tight = false;
            }
        }
        self.ok(())
    }

    pub fn pause(&self, channel: i64, flag: bool) -> Result<(), MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut audio = self.audio.lock();
        let ch = audio.table.get_mut(index).unwrap();
        ch.paused = flag;
        if let Some(d) = ch.playing.decoder.as_mut() {
            d.pause(flag);
        }
        self.ok(())
    }

    /// For every channel where a source is playing, paused, and at its very
    /// start: blocks until the decoder reports ready, then clears `paused`.
    /// Must be called from a non-real-time thread; may block.
    pub fn unpause_all_at_start(&self) -> Result<(), MixerError> {
        let len = self.audio.lock().table.len();
        for index in 0..len {
            let should_wait = {
                let mut audio = self.audio.lock();
                let ch = audio.table.get_mut(index).unwrap();
                ch.playing.is_occupied() && ch.paused && ch.pos == 0
            };
            if !should_wait {
                continue;
            }
            // Take the decoder out of the slot so `wait_ready` can block
            // without holding either lock; the audio thread renders silence
            // for this channel for the duration (mix_channel skips slots
            // that aren't occupied).
            let mut decoder = {
                let mut audio = self.audio.lock();
                audio.table.get_mut(index).and_then(|ch| ch.playing.decoder.take())
            };
            if let Some(d) = decoder.as_mut() {
                d.wait_ready();
            }
            let mut audio = self.audio.lock();
            if let Some(ch) = audio.table.get_mut(index) {
                ch.playing.decoder = decoder;
                if ch.playing.is_occupied() && ch.pos == 0 {
                    ch.paused = false;
                    if let Some(d) = ch.playing.decoder.as_mut() {
                        d.pause(false);
                    }
                }
            }
        }
        self.ok(())
    }

    pub fn queue_depth(&self, channel: i64) -> Result<u8, MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut names = self.names.lock();
        names.ensure(index);
        self.ok(names.identity[index].queue_depth)
    }

    pub fn playing_name(&self, channel: i64) -> Result<Option<String>, MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut names = self.names.lock();
        names.ensure(index);
        self.ok(names.identity[index].playing_name.clone())
    }

    pub fn queued_name(&self, channel: i64) -> Result<Option<String>, MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut names = self.names.lock();
        names.ensure(index);
        self.ok(names.identity[index].queued_name.clone())
    }

    pub fn get_pos(&self, channel: i64) -> Result<i64, MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut names = self.names.lock();
        names.ensure(index);
        let id = &names.identity[index];
        self.ok(if id.is_playing { id.pos_ms + id.playing_start_ms } else { -1 })
    }

    pub fn get_duration(&self, channel: i64) -> Result<f32, MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut names = self.names.lock();
        names.ensure(index);
        self.ok(if names.identity[index].is_playing {
            names.identity[index].playing_duration_s
        } else {
            0.0
        })
    }

    pub fn set_endevent(&self, channel: i64, tag: u32) -> Result<(), MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let audio = self.audio.lock();
        audio.table.get(index).unwrap().set_event_tag(tag);
        self.ok(())
    }

    pub fn set_volume(&self, channel: i64, volume: f32) -> Result<(), MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let audio = self.audio.lock();
        audio.table.get(index).unwrap().set_mixer_volume(volume);
        self.ok(())
    }

    pub fn get_volume(&self, channel: i64) -> Result<f32, MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let audio = self.audio.lock();
        self.ok(audio.table.get(index).unwrap().mixer_volume())
    }

    pub fn set_pan(&self, channel: i64, pan: f32, delay_s: f32) -> Result<(), MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut audio = self.audio.lock();
        let ch = audio.table.get_mut(index).unwrap();
        let samples = (delay_s.max(0.0) as f64 * self.config.freq as f64) as u64;
        ch.pan.retarget(pan, samples);
        self.ok(())
    }

    pub fn set_secondary_volume(
        &self,
        channel: i64,
        volume: f32,
        delay_s: f32,
    ) -> Result<(), MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut audio = self.audio.lock();
        let ch = audio.table.get_mut(index).unwrap();
        let samples = (delay_s.max(0.0) as f64 * self.config.freq as f64) as u64;
        ch.secondary_volume.retarget(volume, samples);
        self.ok(())
    }

    pub fn set_video(&self, channel: i64, mode: VideoMode) -> Result<(), MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut audio = self.audio.lock();
        audio.table.get_mut(index).unwrap().video = mode;
        self.ok(())
    }

    pub fn read_video(&self, channel: i64) -> Result<Option<VideoFrame>, MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let mut audio = self.audio.lock();
        let ch = audio.table.get_mut(index).unwrap();
        self.ok(ch.playing.decoder.as_mut().and_then(|d| d.read_video()))
    }

    pub fn video_ready(&self, channel: i64) -> Result<bool, MixerError> {
        let index = match self.ensure_index(channel) {
            Ok(i) => i,
            Err(e) => return self.fail(e),
        };
        let audio = self.audio.lock();
        let ch = audio.table.get(index).unwrap();
        self.ok(ch.playing.decoder.as_ref().map(|d| d.video_ready()).unwrap_or(true))
    }

    /// Detaches the dying list and closes every handle outside the name
    /// lock. Call on a regular cadence from a non-real-time thread.
    pub fn periodic(&self) {
        let retired = {
            let mut names = self.names.lock();
            names.dying.detach()
        };
        drop(retired); // closes each decoder handle (Drop) off the audio thread
    }

    /// Refreshes the name-lock-guarded identity snapshot for `index` from
    /// the authoritative (audio-lock-guarded) channel state. Called after
    /// any control-thread mutation; the callback refreshes it itself after
    /// an EOF transition and once per buffer for position tracking.
    fn refresh_identity(&self, index: usize) {
        let snapshot = {
            let audio = self.audio.lock();
            let ch = match audio.table.get(index) {
                Some(c) => c,
                None => return,
            };
            ChannelIdentity {
                playing_name: ch.playing.name.clone(),
                queued_name: ch.queued.name.clone(),
                playing_duration_s: ch.playing.decoder.as_ref().map(|d| d.duration()).unwrap_or(0.0),
                playing_start_ms: ch.playing.start_ms,
                pos_ms: samples_to_ms(ch.pos, self.config.freq),
                queue_depth: ch.queue_depth(),
                is_playing: ch.playing.is_occupied(),
            }
        };
        let mut names = self.names.lock();
        names.ensure(index);
        names.identity[index] = snapshot;
    }

    /// The real-time mixer callback. `out` is the device's interleaved
    /// stereo i16 buffer; its length must be even.
    pub fn render_callback(&self, out: &mut [i16]) {
        debug_assert_eq!(out.len() % 2, 0);
        let frames = out.len() / 2;
        let mut audio = self.audio.lock();

        if audio.accum.len() < frames * 2 {
            audio.accum.resize(frames * 2, 0.0);
        }
        if audio.scratch.len() < frames * 2 {
            audio.scratch.resize(frames * 2, 0);
        }
        for v in audio.accum[..frames * 2].iter_mut() {
            *v = 0.0;
        }

        let freq = self.config.freq;
        let num_channels = audio.table.len();

        for index in 0..num_channels {
            self.mix_channel(&mut audio, index, frames, freq);
        }

        for (i, sample) in out.iter_mut().enumerate() {
            let x = audio.accum[i] * 32767.0;
            *sample = x.clamp(-32768.0, 32767.0) as i16;
        }

        drop(audio);
        for index in 0..num_channels {
            self.sync_position(index);
        }
    }

    fn mix_channel(&self, audio: &mut AudioState, index: usize, frames: usize, freq: u32) {
        let AudioState { table, scratch, accum } = audio;
        let ch = table.get_mut(index).unwrap();
        if !ch.playing.is_occupied() || ch.paused {
            return;
        }

        let mut mixed = 0usize;
        while mixed < frames && ch.playing.is_occupied() {
            let want = frames - mixed;
            let read_frames = ch
                .playing
                .decoder
                .as_mut()
                .unwrap()
                .read_audio(&mut scratch[..want * 2]);

            if ch.stop_samples == 0 || read_frames == 0 {
                self.handle_end_of_source(ch, index, freq);
                continue;
            }

            let mut i = 0usize;
            while ch.stop_samples != 0 && i < read_frames {
                let l = scratch[i * 2] as f32 / 32768.0;
                let r = scratch[i * 2 + 1] as f32 / 32768.0;

                let gain = ch.mixer_volume()
                    * ch.playing.relative_volume
                    * ch.fade.read()
                    * ch.secondary_volume.read();
                let pan = ch.pan.read();
                let left_gain = gain * (1.0 - pan).min(1.0);
                let right_gain = gain * (1.0 + pan).min(1.0);

                accum[(mixed + i) * 2] += l * left_gain;
                accum[(mixed + i) * 2 + 1] += r * right_gain;

                ch.fade.advance();
                ch.secondary_volume.advance();
                ch.pan.advance();
                if ch.stop_samples > 0 {
                    ch.stop_samples -= 1;
                }
                ch.pos += 1;
                i += 1;
            }
            mixed += i;
        }
    }

    fn handle_end_of_source(&self, ch: &mut Channel, index: usize, freq: u32) {
        let tag = ch.event_tag();

        let mut old_tight = ch.playing.tight;
        let old_decoder = ch.playing.take();

        let moved_fadein = ch.queued.fadein_ms;
        ch.playing = std::mem::replace(&mut ch.queued, SourceSlot::empty());
        if moved_fadein != 0 {
            old_tight = false;
        }
        let reset_fade = !old_tight;
        start_stream(ch, freq, reset_fade);

        {
            let mut names = self.names.lock();
            if let Some(d) = old_decoder {
                names.dying.push(d);
            }
            names.ensure(index);
            names.identity[index] = ChannelIdentity {
                playing_name: ch.playing.name.clone(),
                queued_name: ch.queued.name.clone(),
                playing_duration_s: ch.playing.decoder.as_ref().map(|d| d.duration()).unwrap_or(0.0),
                playing_start_ms: ch.playing.start_ms,
                pos_ms: samples_to_ms(ch.pos, freq),
                queue_depth: ch.queue_depth(),
                is_playing: ch.playing.is_occupied(),
            };
        }

        if tag != 0 {
            self.events.post(index, tag);
        }
    }

    /// Mirrors `pos`/queue-depth into the name-lock identity snapshot once
    /// per buffer, after the audio lock is released.
    fn sync_position(&self, index: usize) {
        let snapshot = {
            let audio = self.audio.lock();
            let ch = match audio.table.get(index) {
                Some(c) => c,
                None => return,
            };
            (ch.pos, ch.queue_depth(), ch.playing.is_occupied())
        };
        let mut names = self.names.lock();
        names.ensure(index);
        let id = &mut names.identity[index];
        id.pos_ms = samples_to_ms(snapshot.0, self.config.freq);
        id.queue_depth = snapshot.1;
        id.is_playing = snapshot.2;
    }
}

fn start_stream(ch: &mut Channel, freq: u32, reset_fade: bool) {
    ch.pos = 0;
    ch.stop_samples = -1;
    if reset_fade {
        let fadein_samples = ms_to_samples(ch.playing.fadein_ms, freq);
        ch.fade = Envelope::constant(0.0);
        ch.fade.retarget(1.0, fadein_samples);
    }
    if let Some(d) = ch.playing.decoder.as_mut() {
        d.pause(ch.paused);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decoder_api::{DecoderError, MediaDecoder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Emits a constant full-scale stereo sample forever, or until a
    /// `set_range`-bounded frame count, then EOF. Lets these tests observe
    /// the mixer's applied gain (`mixer_volume * relative_volume *
    /// fade.read() * secondary_volume.read()`) directly off the output
    /// amplitude rather than reaching into private `Envelope` state.
    struct ConstDecoder {
        value: i16,
        limit: Option<u64>,
        emitted: u64,
        closed: Option<Arc<AtomicUsize>>,
    }

    impl ConstDecoder {
        fn new(value: i16) -> Self {
            ConstDecoder { value, limit: None, emitted: 0, closed: None }
        }

        fn with_close_counter(value: i16, closed: Arc<AtomicUsize>) -> Self {
            ConstDecoder { value, limit: None, emitted: 0, closed: Some(closed) }
        }
    }

    impl Drop for ConstDecoder {
        fn drop(&mut self) {
            if let Some(c) = &self.closed {
                c.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl MediaDecoder for ConstDecoder {
        fn set_range(&mut self, window: SeekWindow) {
            if window.end_s > 0.0 {
                self.limit = Some((window.end_s * 48_000.0) as u64);
            }
        }
        fn want_video(&mut self, _mode: VideoMode) {}
        fn start(&mut self) -> Result<(), DecoderError> {
            Ok(())
        }
        fn pause(&mut self, _flag: bool) {}
        fn wait_ready(&mut self) {}
        fn read_audio(&mut self, dest: &mut [i16]) -> usize {
            let frames = dest.len() / 2;
            let mut n = 0;
            for i in 0..frames {
                if let Some(limit) = self.limit {
                    if self.emitted >= limit {
                        break;
                    }
                }
                dest[i * 2] = self.value;
                dest[i * 2 + 1] = self.value;
                self.emitted += 1;
                n += 1;
            }
            n
        }
        fn duration(&self) -> f32 {
            0.0
        }
        fn video_ready(&self) -> bool {
            false
        }
        fn read_video(&mut self) -> Option<VideoFrame> {
            None
        }
    }

    struct ConstFactory {
        value: i16,
        closed: Option<Arc<AtomicUsize>>,
    }

    impl DecoderFactory for ConstFactory {
        fn open(&self, _stream: MediaStream, _ext: &str) -> Result<Box<dyn MediaDecoder>, DecoderError> {
            let dec = match &self.closed {
                Some(c) => ConstDecoder::with_close_counter(self.value, c.clone()),
                None => ConstDecoder::new(self.value),
            };
            Ok(Box::new(dec))
        }
    }

    #[derive(Default)]
    struct SpyEvents {
        posted: Mutex<Vec<(usize, u32)>>,
    }

    impl EndEventSink for SpyEvents {
        fn post(&self, channel: usize, tag: u32) {
            self.posted.lock().push((channel, tag));
        }
    }

    fn test_mixer(value: i16) -> (Mixer, Arc<SpyEvents>) {
        let config = MixerConfig { freq: 48_000, stereo: 2, samples: 256, status: false, equal_mono: false };
        let events = Arc::new(SpyEvents::default());
        let factory = Arc::new(ConstFactory { value, closed: None });
        (Mixer::with_event_sink(config, factory, events.clone()), events)
    }

    fn dummy_stream() -> MediaStream {
        MediaStream::Bytes(Arc::from(Vec::<u8>::new().into_boxed_slice()))
    }

    #[allow(clippy::too_many_arguments)]
    fn play_defaults(mixer: &Mixer, ch: i64, fadein_ms: u32, tight: bool) {
        mixer
            .play(ch, dummy_stream(), "const", "t", fadein_ms, tight, false, 0.0, 0.0, 1.0)
            .unwrap();
    }

    #[test]
    fn negative_channel_index_fails_with_range() {
        let (mixer, _events) = test_mixer(1000);
        let err = mixer.play(-1, dummy_stream(), "const", "t", 0, false, false, 0.0, 0.0, 1.0).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Range);
    }

    #[test]
    fn eof_drains_queue_and_emits_silence() {
        let (mixer, events) = test_mixer(20_000);
        mixer
            .play(0, dummy_stream(), "const", "t", 0, false, false, 0.0, 100.0 / 48_000.0, 1.0)
            .unwrap();
        mixer.set_endevent(0, 7).unwrap();
        assert_eq!(mixer.queue_depth(0).unwrap(), 1);

        let mut out = vec![0i16; 256 * 2];
        mixer.render_callback(&mut out);
        assert!(out.iter().any(|&s| s != 0), "first 100 frames should be audible");

        // Second callback: the 100-frame source has already EOF'd mid-first-buffer.
        mixer.render_callback(&mut out);
        assert!(out.iter().all(|&s| s == 0), "channel should be silent after EOF");
        assert_eq!(mixer.queue_depth(0).unwrap(), 0);
        assert_eq!(events.posted.lock().as_slice(), &[(0, 7)]);
    }

    #[test]
    fn fadeout_zero_ms_is_immediate_silence_with_single_event() {
        let (mixer, events) = test_mixer(20_000);
        play_defaults(&mixer, 0, 0, false);
        mixer.set_endevent(0, 3).unwrap();

        mixer.fadeout(0, 0).unwrap();
        let mut out = vec![0i16; 256 * 2];
        mixer.render_callback(&mut out);
        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(mixer.queue_depth(0).unwrap(), 0);
        assert_eq!(events.posted.lock().as_slice(), &[(0, 3)]);

        // A further callback must not re-post the event.
        mixer.render_callback(&mut out);
        assert_eq!(events.posted.lock().len(), 1);
    }

    #[test]
    fn fadeout_ramps_gain_to_zero_over_requested_duration() {
        let (mixer, _events) = test_mixer(20_000);
        play_defaults(&mixer, 0, 0, false);

        // One buffer of full-scale output to confirm the starting level.
        let mut out = vec![0i16; 256 * 2];
        mixer.render_callback(&mut out);
        let full_scale = out[0] as i32;
        assert!(full_scale > 15_000);

        // fade to 0 over 5ms (240 samples at 48kHz), comfortably inside one
        // more 256-frame buffer.
        let fade_ms = 5;
        mixer.fadeout(0, fade_ms).unwrap();
        let samples = ms_to_samples(fade_ms, 48_000);
        assert!(samples <= 256, "test assumes the fade completes within one buffer");

        mixer.render_callback(&mut out);
        // last sample of the fade buffer should be much quieter than full scale.
        let last = out[out.len() - 2] as i32;
        assert!(last.abs() < full_scale / 4, "expected gain to have decayed: {last} vs {full_scale}");
    }

    #[test]
    fn tight_transition_with_zero_fadein_has_no_ramp() {
        let (mixer, _events) = test_mixer(20_000);
        // playing source EOFs after exactly one buffer (256 frames), tight.
        mixer
            .play(0, dummy_stream(), "const", "A", 0, true, false, 0.0, 256.0 / 48_000.0, 1.0)
            .unwrap();
        mixer
            .queue(0, dummy_stream(), "const", "B", 0, false, 0.0, 0.0, 1.0)
            .unwrap();

        let mut out = vec![0i16; 256 * 2];
        mixer.render_callback(&mut out); // A plays out fully, B takes over mid/at end
        mixer.render_callback(&mut out); // B's steady state, no fade-in ramp
        assert!(out.iter().all(|&s| (s as i32).abs() > 15_000), "tight transition should not fade in");
    }

    #[test]
    fn non_tight_transition_fades_in() {
        let (mixer, _events) = test_mixer(20_000);
        mixer
            .play(0, dummy_stream(), "const", "A", 0, false, false, 0.0, 256.0 / 48_000.0, 1.0)
            .unwrap();
        mixer
            .queue(0, dummy_stream(), "const", "B", 500, false, 0.0, 0.0, 1.0)
            .unwrap();

        let mut out = vec![0i16; 256 * 2];
        mixer.render_callback(&mut out); // A plays out, B takes over with fade-in started
        mixer.render_callback(&mut out); // still early in a 500ms (24000-sample) ramp
        assert!((out[0] as i32).abs() < 5_000, "expected B to still be fading in: {}", out[0]);
    }

    #[test]
    fn pan_hard_left_silences_right_channel() {
        let (mixer, _events) = test_mixer(20_000);
        play_defaults(&mixer, 0, 0, false);
        mixer.set_pan(0, -1.0, 0.0).unwrap();

        let mut out = vec![0i16; 256 * 2];
        mixer.render_callback(&mut out);
        assert!(out.iter().step_by(2).any(|&l| l != 0), "left channel should be audible");
        assert!(out.iter().skip(1).step_by(2).all(|&r| r == 0), "right channel should be silent");
    }

    #[test]
    fn queue_depth_tracks_slot_occupancy() {
        let (mixer, _events) = test_mixer(1000);
        assert_eq!(mixer.queue_depth(0).unwrap(), 0);
        play_defaults(&mixer, 0, 0, false);
        assert_eq!(mixer.queue_depth(0).unwrap(), 1);
        mixer.queue(0, dummy_stream(), "const", "q", 0, false, 0.0, 0.0, 1.0).unwrap();
        assert_eq!(mixer.queue_depth(0).unwrap(), 2);
        mixer.stop(0).unwrap();
        assert_eq!(mixer.queue_depth(0).unwrap(), 0);
    }

    #[test]
    fn dequeue_is_noop_on_tight_playing_unless_even_tight() {
        let (mixer, _events) = test_mixer(1000);
        play_defaults(&mixer, 0, 0, true);
        mixer.queue(0, dummy_stream(), "const", "q", 0, false, 0.0, 0.0, 1.0).unwrap();
        assert_eq!(mixer.queue_depth(0).unwrap(), 2);

        mixer.dequeue(0, false).unwrap();
        assert_eq!(mixer.queue_depth(0).unwrap(), 2, "tight playing source should keep its queued slot");

        mixer.dequeue(0, true).unwrap();
        assert_eq!(mixer.queue_depth(0).unwrap(), 1);
    }

    #[test]
    fn get_pos_reports_start_offset_and_is_monotonic() {
        let (mixer, _events) = test_mixer(1000);
        mixer
            .play(0, dummy_stream(), "const", "t", 0, false, false, 10.0, 0.0, 1.0)
            .unwrap();

        let mut out = vec![0i16; 256 * 2];
        let mut last_pos = mixer.get_pos(0).unwrap();
        assert!(last_pos >= 10_000, "position should include the 10s start offset");
        for _ in 0..4 {
            mixer.render_callback(&mut out);
            let pos = mixer.get_pos(0).unwrap();
            assert!(pos >= last_pos, "position must be monotone nondecreasing");
            last_pos = pos;
        }
    }

    #[test]
    fn pause_skips_mixing_until_unpause_all_at_start() {
        let (mixer, _events) = test_mixer(20_000);
        mixer
            .play(0, dummy_stream(), "const", "t", 0, false, true, 0.0, 0.0, 1.0)
            .unwrap();

        let mut out = vec![0i16; 256 * 2];
        mixer.render_callback(&mut out);
        assert!(out.iter().all(|&s| s == 0), "paused channel must not mix");

        mixer.unpause_all_at_start().unwrap();
        mixer.render_callback(&mut out);
        assert!(out.iter().any(|&s| s != 0), "unpause_all_at_start should have cleared paused");
    }

    #[test]
    fn periodic_closes_retired_decoders_off_thread() {
        let closed = Arc::new(AtomicUsize::new(0));
        let config = MixerConfig { freq: 48_000, stereo: 2, samples: 256, status: false, equal_mono: false };
        let factory = Arc::new(ConstFactory { value: 1000, closed: Some(closed.clone()) });
        let mixer = Mixer::init(config, factory);

        mixer.play(0, dummy_stream(), "const", "t", 0, false, false, 0.0, 0.0, 1.0).unwrap();
        mixer.stop(0).unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 0, "decoder must not close until periodic() sweeps it");

        mixer.periodic();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn quit_stops_all_channels_and_leaks_nothing() {
        let closed = Arc::new(AtomicUsize::new(0));
        let config = MixerConfig { freq: 48_000, stereo: 2, samples: 256, status: false, equal_mono: false };
        let factory = Arc::new(ConstFactory { value: 1000, closed: Some(closed.clone()) });
        let mixer = Mixer::init(config, factory);

        mixer.play(0, dummy_stream(), "const", "t", 0, false, false, 0.0, 0.0, 1.0).unwrap();
        mixer.play(1, dummy_stream(), "const", "t", 0, false, false, 0.0, 0.0, 1.0).unwrap();
        mixer.quit();
        assert_eq!(closed.load(Ordering::SeqCst), 2);
    }
}
