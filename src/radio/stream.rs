//! [`StreamRadio`]: an HTTP audio stream decoded into the music lane.
//!
//! ```text
//! reqwest body ──chunks──▶ mpsc ──▶ ChannelReader ──▶ PacketDecoder (decode thread)
//!                                                        │ remix, StreamResampler
//!                                                        ▼
//!                                               MusicInput::push(feed)
//! ```
//!
//! Every `play()` opens a fresh connection, a fresh feed and a fresh
//! resampler.  `pause()` cancels all three; samples the decode thread still
//! produces for the old feed are rejected by the graph.
//!
//! While the session runs, [`StallWatch`] reports `Buffering` whenever the
//! decoder is starved and the music lane has played out, and `Playing` once
//! audio reaches the lane again.

use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use symphonia::core::io::ReadOnlySource;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

use crate::audio::{
    extension_for_mime, remix_channels, FeedId, MusicInput, OutputFormat, PacketDecoder,
    ResampleError, StreamResampler,
};
use crate::config::RadioConfig;
use crate::radio::source::{RadioError, RadioEvent, RadioSource};

/// Body chunks buffered between the fetch task and the decoder.
const CHUNK_QUEUE: usize = 32;
/// Poll interval while the music lane holds more than `buffer_secs`, and
/// while the decoder waits for the network.
const BACKLOG_POLL: Duration = Duration::from_millis(20);

// ---------------------------------------------------------------------------
// StreamRadio
// ---------------------------------------------------------------------------

struct Session {
    feed: FeedId,
    cancel: Arc<AtomicBool>,
    /// Cleared by the decode thread when it exits.
    alive: Arc<AtomicBool>,
    fetch: JoinHandle<()>,
}

pub struct StreamRadio {
    client: reqwest::Client,
    config: RadioConfig,
    music: MusicInput,
    events: mpsc::UnboundedSender<RadioEvent>,
    /// `f32` playback rate stored as bits.
    rate: Arc<AtomicU32>,
    session: Mutex<Option<Session>>,
}

impl StreamRadio {
    /// Build a radio writing into `music`.  Events arrive on the returned
    /// receiver.
    pub fn new(config: &RadioConfig, music: MusicInput) -> (Self, mpsc::UnboundedReceiver<RadioEvent>) {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let (events, rx) = mpsc::unbounded_channel();

        let radio = Self {
            client,
            config: config.clone(),
            music,
            events,
            rate: Arc::new(AtomicU32::new(1.0_f32.to_bits())),
            session: Mutex::new(None),
        };
        (radio, rx)
    }

    fn emit(&self, event: RadioEvent) {
        let _ = self.events.send(event);
    }

    /// Tear down the current session.  Returns `true` if one was active.
    fn end_session(&self) -> bool {
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match session {
            Some(s) => {
                s.cancel.store(true, Ordering::SeqCst);
                s.fetch.abort();
                self.music.close_feed(s.feed);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl RadioSource for StreamRadio {
    async fn play(&self) -> Result<(), RadioError> {
        // Always reconnect: a live stream resumed from a buffer is stale.
        self.end_session();
        self.emit(RadioEvent::Buffering);

        let response = self.client.get(&self.config.stream_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RadioError::Status(status.as_u16()));
        }

        let extension = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(extension_for_mime);
        log::info!(
            "radio connected: {} ({})",
            self.config.stream_url,
            extension.unwrap_or("unknown format")
        );

        let feed = self.music.open_feed();
        let cancel = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));
        let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<u8>>(CHUNK_QUEUE);

        let watch = Arc::new(StallWatch::new(
            self.music.clone(),
            self.events.clone(),
            Arc::clone(&cancel),
        ));
        let job = DecodeJob {
            extension,
            music: self.music.clone(),
            feed,
            cancel: Arc::clone(&cancel),
            alive: Arc::clone(&alive),
            rate: Arc::clone(&self.rate),
            buffer_secs: self.config.buffer_secs,
            events: self.events.clone(),
            watch,
        };
        std::thread::Builder::new()
            .name("radio-decode".into())
            .spawn(move || job.run(chunk_rx))
            .map_err(|e| RadioError::Decode(e.to_string()))?;

        let fetch = tokio::spawn(pump_body(response, chunk_tx));

        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(Session {
            feed,
            cancel,
            alive,
            fetch,
        });
        Ok(())
    }

    fn pause(&self) {
        if self.end_session() {
            log::info!("radio paused");
        }
        self.emit(RadioEvent::Paused);
    }

    fn is_paused(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, |s| !s.alive.load(Ordering::SeqCst))
    }

    fn set_playback_rate(&self, rate: f32) {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        self.rate.store(rate.to_bits(), Ordering::SeqCst);
    }

    fn playback_rate(&self) -> f32 {
        f32::from_bits(self.rate.load(Ordering::SeqCst))
    }
}

impl Drop for StreamRadio {
    fn drop(&mut self) {
        self.end_session();
    }
}

/// Forward the response body to the decoder until either side goes away.
async fn pump_body(mut response: reqwest::Response, tx: mpsc::Sender<Vec<u8>>) {
    loop {
        match response.chunk().await {
            Ok(Some(bytes)) => {
                if tx.send(bytes.to_vec()).await.is_err() {
                    return;
                }
            }
            Ok(None) => {
                log::info!("radio stream ended");
                return;
            }
            Err(e) => {
                log::warn!("radio stream read failed: {e}");
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// StallWatch
// ---------------------------------------------------------------------------

/// Tracks whether the listener is hearing the stream.
struct StallWatch {
    music: MusicInput,
    events: mpsc::UnboundedSender<RadioEvent>,
    cancel: Arc<AtomicBool>,
    playing: AtomicBool,
}

impl StallWatch {
    fn new(
        music: MusicInput,
        events: mpsc::UnboundedSender<RadioEvent>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            music,
            events,
            cancel,
            playing: AtomicBool::new(false),
        }
    }

    fn send(&self, event: RadioEvent) {
        if !self.cancel.load(Ordering::SeqCst) {
            let _ = self.events.send(event);
        }
    }

    /// Audio reached the music lane.
    fn audio_arrived(&self) {
        if !self.playing.swap(true, Ordering::SeqCst) {
            self.send(RadioEvent::Playing);
        }
    }

    /// The decoder is waiting for bytes.  Reports `Buffering` once the lane
    /// has nothing left to play.
    fn input_stalled(&self) {
        if self.music.backlog_secs() > 0.0 {
            return;
        }
        if self.playing.swap(false, Ordering::SeqCst) {
            log::info!("radio buffering");
            self.send(RadioEvent::Buffering);
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelReader
// ---------------------------------------------------------------------------

/// Blocking `Read` over the chunk channel.  End of stream once the sender
/// is dropped.  Waiting for the next chunk is reported to the [`StallWatch`].
struct ChannelReader {
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    watch: Arc<StallWatch>,
    pending: Vec<u8>,
    pos: usize,
}

impl ChannelReader {
    fn new(rx: mpsc::Receiver<Vec<u8>>, watch: Arc<StallWatch>) -> Self {
        Self {
            rx: Mutex::new(rx),
            watch,
            pending: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.pending.len() {
            let next = self
                .rx
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .try_recv();
            match next {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                Err(TryRecvError::Empty) => {
                    self.watch.input_stalled();
                    std::thread::sleep(BACKLOG_POLL);
                }
                Err(TryRecvError::Disconnected) => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// DecodeJob
// ---------------------------------------------------------------------------

struct DecodeJob {
    extension: Option<&'static str>,
    music: MusicInput,
    feed: FeedId,
    cancel: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    rate: Arc<AtomicU32>,
    buffer_secs: f32,
    events: mpsc::UnboundedSender<RadioEvent>,
    watch: Arc<StallWatch>,
}

impl DecodeJob {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Report a failure unless the session was cancelled on purpose.
    fn fail(&self, reason: String) {
        if !self.cancelled() {
            log::warn!("radio: {reason}");
            let _ = self.events.send(RadioEvent::Error(reason));
        }
    }

    fn run(self, chunks: mpsc::Receiver<Vec<u8>>) {
        self.decode(ChannelReader::new(chunks, Arc::clone(&self.watch)));
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Push converted PCM into the feed.  `false` once the feed has been
    /// superseded.
    fn deliver(&self, pcm: &[f32]) -> bool {
        if pcm.is_empty() {
            return true;
        }
        if !self.music.push(self.feed, pcm) {
            return false;
        }
        self.watch.audio_arrived();
        true
    }

    /// Remix and resample one decoded packet.  The resampler is rebuilt
    /// (after draining the old one) if the stream changes rate.
    fn convert(
        &self,
        resampler: &mut Option<StreamResampler>,
        samples: &[f32],
        channels: u16,
        sample_rate: u32,
        target: OutputFormat,
    ) -> Result<Vec<f32>, ResampleError> {
        let mut out = Vec::new();
        let rs = match resampler.take() {
            Some(rs) if rs.source_rate() == sample_rate => rs,
            previous => {
                if let Some(mut old) = previous {
                    log::info!("radio sample rate changed to {sample_rate} Hz");
                    out = old.flush()?;
                }
                StreamResampler::new(sample_rate, target.sample_rate, target.channels)?
            }
        };
        let rs = resampler.insert(rs);

        rs.set_speed(f32::from_bits(self.rate.load(Ordering::SeqCst)))?;
        let remixed = remix_channels(samples, channels, target.channels);
        out.extend(rs.process(&remixed)?);
        Ok(out)
    }

    fn decode(&self, reader: ChannelReader) {
        let source = Box::new(ReadOnlySource::new(reader));
        let mut decoder = match PacketDecoder::open(source, self.extension) {
            Ok(d) => d,
            Err(e) => return self.fail(format!("unsupported stream: {e}")),
        };

        let target = self.music.format();
        let mut resampler: Option<StreamResampler> = None;

        while !self.cancelled() {
            let chunk = match decoder.next_chunk() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    if let Some(rs) = resampler.as_mut() {
                        match rs.flush() {
                            Ok(tail) => {
                                self.deliver(&tail);
                            }
                            Err(e) => log::warn!("radio: resampler flush failed: {e}"),
                        }
                    }
                    return self.fail("stream ended".into());
                }
                Err(e) => return self.fail(format!("stream decode failed: {e}")),
            };

            let pcm = match self.convert(
                &mut resampler,
                &chunk.samples,
                chunk.channels,
                chunk.sample_rate,
                target,
            ) {
                Ok(pcm) => pcm,
                Err(e) => return self.fail(format!("stream resample failed: {e}")),
            };
            if !self.deliver(&pcm) {
                // Superseded by a newer feed.
                return;
            }

            while self.music.backlog_secs() > self.buffer_secs {
                if self.cancelled() {
                    return;
                }
                std::thread::sleep(BACKLOG_POLL);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::audio::decode::tests::wav_bytes;
    use crate::audio::{AudioEngine, NullOutput, OutputFormat};
    use crate::config::AudioConfig;

    fn music() -> (Arc<AudioEngine>, MusicInput) {
        let format = OutputFormat {
            sample_rate: 8_000,
            channels: 1,
        };
        let engine = Arc::new(AudioEngine::new(
            AudioConfig::default(),
            Box::new(NullOutput::new(format)),
        ));
        let input = engine.music_input();
        (engine, input)
    }

    /// Serve `body` once over plain HTTP/1.1 and return the URL.
    async fn serve_once(content_type: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0_u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/stream")
    }

    fn config(url: String) -> RadioConfig {
        RadioConfig {
            stream_url: url,
            connect_timeout_secs: 2,
            ..RadioConfig::default()
        }
    }

    fn stall_watch(music: &MusicInput) -> (Arc<StallWatch>, mpsc::UnboundedReceiver<RadioEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let watch = StallWatch::new(music.clone(), tx, Arc::new(AtomicBool::new(false)));
        (Arc::new(watch), rx)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<RadioEvent>) -> RadioEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("radio event")
            .expect("event channel open")
    }

    // ---- ChannelReader ---------------------------------------------------------

    #[test]
    fn channel_reader_spans_chunks_and_ends() {
        let (tx, rx) = mpsc::channel(4);
        tx.try_send(vec![1, 2, 3]).unwrap();
        tx.try_send(vec![4]).unwrap();
        drop(tx);

        let (_engine, input) = music();
        let (watch, _events) = stall_watch(&input);
        let mut reader = ChannelReader::new(rx, watch);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    // ---- Rate ------------------------------------------------------------------

    #[test]
    fn playback_rate_round_trips_and_rejects_nonsense() {
        let (_engine, input) = music();
        let (radio, _rx) = StreamRadio::new(&RadioConfig::default(), input);

        assert_eq!(radio.playback_rate(), 1.0);
        radio.set_playback_rate(1.15);
        assert!((radio.playback_rate() - 1.15).abs() < 1e-6);
        radio.set_playback_rate(f32::NAN);
        assert_eq!(radio.playback_rate(), 1.0);
    }

    #[test]
    fn new_radio_is_paused() {
        let (_engine, input) = music();
        let (radio, _rx) = StreamRadio::new(&RadioConfig::default(), input);
        assert!(radio.is_paused());
    }

    // ---- Decode job --------------------------------------------------------------

    fn decode_job(input: &MusicInput, rate: f32) -> (DecodeJob, mpsc::UnboundedReceiver<RadioEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let watch = StallWatch::new(input.clone(), events_tx.clone(), Arc::clone(&cancel));
        let job = DecodeJob {
            extension: Some("wav"),
            music: input.clone(),
            feed: input.open_feed(),
            cancel,
            alive: Arc::new(AtomicBool::new(true)),
            rate: Arc::new(AtomicU32::new(rate.to_bits())),
            buffer_secs: 5.0,
            events: events_tx,
            watch: Arc::new(watch),
        };
        (job, events_rx)
    }

    fn run_job(wav: Vec<u8>, rate: f32) -> (MusicInput, Vec<RadioEvent>) {
        let (_engine, input) = music();
        let (tx, rx) = mpsc::channel(4);
        tx.try_send(wav).unwrap();
        drop(tx);

        let (job, mut events_rx) = decode_job(&input, rate);
        job.run(rx);

        let mut events = Vec::new();
        while let Ok(e) = events_rx.try_recv() {
            events.push(e);
        }
        (input, events)
    }

    #[test]
    fn decode_job_fills_the_music_lane() {
        let (input, events) = run_job(wav_bytes(&[8_192; 800], 8_000, 1), 1.0);

        // 0.1 s of audio plus the resampler's delay and look-ahead.
        let backlog = input.backlog_secs();
        assert!((0.1..0.125).contains(&backlog), "{backlog}");
        assert_eq!(events.first(), Some(&RadioEvent::Playing));
        assert_eq!(events.last(), Some(&RadioEvent::Error("stream ended".into())));
    }

    #[test]
    fn faster_rate_yields_fewer_frames() {
        let (input, _) = run_job(wav_bytes(&[8_192; 800], 8_000, 1), 2.0);
        let backlog = input.backlog_secs();
        assert!((0.05..0.0625).contains(&backlog), "{backlog}");
    }

    /// Next event within five seconds, without an async runtime.
    fn wait_event(rx: &mut mpsc::UnboundedReceiver<RadioEvent>) -> RadioEvent {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Ok(event) = rx.try_recv() {
                return event;
            }
            assert!(std::time::Instant::now() < deadline, "no radio event");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn starved_stream_reports_buffering_then_playing() {
        let (engine, input) = music();
        engine.resume().unwrap();
        let graph = engine.ensure_initialized();

        // 2 s of audio now, 1 s once the listener has played everything.
        let wav = wav_bytes(&[8_192; 24_000], 8_000, 1);
        let split = 44 + 16_000 * 2;
        let (tx, rx) = mpsc::channel(4);
        tx.try_send(wav[..split].to_vec()).unwrap();

        let (job, mut events) = decode_job(&input, 1.0);
        let decode = std::thread::spawn(move || job.run(rx));

        assert_eq!(wait_event(&mut events), RadioEvent::Playing);

        // Play out the backlog while the network is silent.
        let mut out = vec![0.0; 8_000];
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            graph.lock().unwrap().render(&mut out, 1);
            if let Ok(event) = events.try_recv() {
                assert_eq!(event, RadioEvent::Buffering);
                break;
            }
            assert!(std::time::Instant::now() < deadline, "no buffering event");
            std::thread::sleep(Duration::from_millis(10));
        }

        tx.try_send(wav[split..].to_vec()).unwrap();
        assert_eq!(wait_event(&mut events), RadioEvent::Playing);

        drop(tx);
        decode.join().unwrap();
        assert_eq!(wait_event(&mut events), RadioEvent::Error("stream ended".into()));
        assert!(input.backlog_secs() > 0.9);
    }

    #[test]
    fn undecodable_stream_reports_error() {
        let (input, events) = run_job(b"this is no audio".to_vec(), 1.0);
        assert_eq!(input.backlog_secs(), 0.0);
        assert!(matches!(events.as_slice(), [RadioEvent::Error(_)]));
    }

    // ---- End to end --------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn play_streams_from_http_then_pause_discards() {
        let url = serve_once("audio/wav", wav_bytes(&[8_192; 800], 8_000, 1)).await;
        let (_engine, input) = music();
        let (radio, mut rx) = StreamRadio::new(&config(url), input.clone());

        radio.play().await.unwrap();
        assert_eq!(next_event(&mut rx).await, RadioEvent::Buffering);
        assert_eq!(next_event(&mut rx).await, RadioEvent::Playing);
        assert!(input.backlog_secs() > 0.0);

        radio.pause();
        assert!(radio.is_paused());
        assert_eq!(input.backlog_secs(), 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn play_against_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (_engine, input) = music();
        let (radio, mut rx) = StreamRadio::new(&config(format!("http://{addr}/")), input);

        assert!(radio.play().await.is_err());
        assert_eq!(next_event(&mut rx).await, RadioEvent::Buffering);
        assert!(radio.is_paused());
    }
}
