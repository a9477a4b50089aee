//! Capture orchestration: acquires devices, wires the mixing graph, builds
//! the final recordable stream, and owns teardown.
//!
//! Start sequence, in order: open the meeting URL in an external viewer
//! (best-effort), acquire display, acquire microphone, build the mixer from
//! the granted audio tracks, compose the final encoded stream, register the
//! revocation listener, start the sink, start the transcription feed, start
//! the clock. Display permission denial is terminal; a denied microphone is
//! absorbed and the session records display audio only. Every failure path
//! rolls back whatever was already acquired.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::{AudioFrame, MixerGraph};
use crate::clock::{ClockHandle, SessionClock};
use crate::config::CaptureConfig;
use crate::recording::{EncodedChunk, RecordingSink};
use crate::transcript::{SpeechRecognizer, TranscriptStore, TranscriptionFeed};

use super::device::{AcquireError, CaptureError, DeviceBroker, MediaSourceHandle};

/// Out-of-band events surfaced to the session machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The OS or operator revoked the display stream outside the app.
    /// Drives the same stop path as an explicit operator stop.
    DeviceRevoked,
}

pub struct CaptureOrchestrator {
    devices: Arc<dyn DeviceBroker>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    transcript: TranscriptStore,
    config: CaptureConfig,
}

impl CaptureOrchestrator {
    pub fn new(
        devices: Arc<dyn DeviceBroker>,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        transcript: TranscriptStore,
        config: CaptureConfig,
    ) -> Self {
        Self {
            devices,
            recognizer,
            transcript,
            config,
        }
    }

    /// Run the full start sequence for a meeting URL. On success the
    /// returned capture is live: sink, feed, and clock are all running.
    pub async fn start(
        &self,
        meeting_url: &str,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<RunningCapture, CaptureError> {
        // Let the operator see the meeting while granting permissions.
        open_viewer(&self.config.viewer_command, meeting_url);

        let mut display = match self.devices.acquire_display().await {
            Ok(handle) => handle,
            Err(AcquireError::Denied) => {
                return Err(CaptureError::AcquisitionDenied(
                    "display capture refused".to_string(),
                ));
            }
            Err(AcquireError::Failed(e)) => {
                return Err(CaptureError::AcquisitionFailed(e));
            }
        };

        let mut microphone = match self.devices.acquire_microphone().await {
            Ok(handle) => Some(handle),
            Err(AcquireError::Denied) => {
                warn!("Microphone refused; recording with display audio only");
                None
            }
            Err(AcquireError::Failed(e)) => {
                display.release();
                return Err(CaptureError::AcquisitionFailed(e));
            }
        };

        // Mixing graph from whichever audio tracks were actually granted.
        let mut audio_sources = Vec::new();
        match display.take_audio() {
            Some(frames) => audio_sources.push(frames),
            None => warn!("Display stream granted no audio track"),
        }
        if let Some(mic) = microphone.as_mut() {
            match mic.take_audio() {
                Some(frames) => audio_sources.push(frames),
                None => warn!("Microphone stream granted no audio track"),
            }
        }

        let flush = Duration::from_millis(self.config.flush_interval_ms);
        let mut mixer = MixerGraph::new(audio_sources, self.config.sample_rate, flush);

        // Final stream: display video chunks plus the mixed audio, encoded.
        let video = match display.take_video() {
            Some(video) => video,
            None => {
                display.release();
                if let Some(mut mic) = microphone {
                    mic.release();
                }
                mixer.close();
                return Err(CaptureError::AcquisitionFailed(
                    "display stream granted no video track".to_string(),
                ));
            }
        };

        let mixed = match mixer.take_mixed_output() {
            Some(mixed) => mixed,
            None => {
                display.release();
                if let Some(mut mic) = microphone {
                    mic.release();
                }
                mixer.close();
                return Err(CaptureError::AcquisitionFailed(
                    "mixer output unavailable".to_string(),
                ));
            }
        };
        let visualizer_tap = mixer.take_visualizer_tap();
        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let compose_task = tokio::spawn(compose_stream(
            mixed,
            video.chunks,
            chunk_tx,
            self.config.sample_rate,
            flush,
        ));

        // Revocation listener on the display video track.
        let mut ended = video.ended;
        let revocation_task = tokio::spawn(async move {
            loop {
                if *ended.borrow() {
                    warn!("Display stream ended out-of-band");
                    let _ = events.send(CaptureEvent::DeviceRevoked).await;
                    return;
                }
                if ended.changed().await.is_err() {
                    return;
                }
            }
        });

        let mut sink = RecordingSink::new(flush);
        sink.start(chunk_rx);

        // The feed stamps from the session clock; build the clock first so
        // both share one counter.
        let mut clock = SessionClock::new();
        let feed = TranscriptionFeed::new(
            self.recognizer.clone(),
            self.transcript.clone(),
            clock.handle(),
        );
        feed.start().await;

        clock.start();

        info!("Capture session started");

        let mut handles = vec![display];
        if let Some(mic) = microphone {
            handles.push(mic);
        }

        Ok(RunningCapture {
            clock,
            feed,
            mixer,
            handles,
            sink,
            visualizer_tap,
            compose_task,
            revocation_task,
            stopped: AtomicBool::new(false),
        })
    }
}

/// One live capture session. Owns every media handle and subsystem until
/// teardown.
pub struct RunningCapture {
    clock: SessionClock,
    feed: TranscriptionFeed,
    mixer: MixerGraph,
    handles: Vec<MediaSourceHandle>,
    sink: RecordingSink,
    visualizer_tap: Option<mpsc::Receiver<AudioFrame>>,
    compose_task: JoinHandle<()>,
    revocation_task: JoinHandle<()>,
    stopped: AtomicBool,
}

impl RunningCapture {
    pub fn clock_handle(&self) -> ClockHandle {
        self.clock.handle()
    }

    /// The mixed-audio tap for the external waveform renderer.
    pub fn take_visualizer_tap(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.visualizer_tap.take()
    }

    pub async fn chunk_count(&self) -> usize {
        self.sink.chunk_count().await
    }

    /// Teardown, exactly once per session, in fixed order: clock, feed,
    /// device handles, mixer. Never propagates a failure — each release is
    /// independent so sibling resources always get released. Safe to call
    /// concurrently from the operator stop and the revocation listener.
    pub async fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Capture teardown already ran");
            return;
        }
        info!("Tearing down capture session");

        self.clock.stop();
        self.feed.stop().await;
        for handle in &mut self.handles {
            handle.release();
        }
        self.mixer.close();
        self.revocation_task.abort();
    }

    /// Finalize the recording after teardown. Idempotent through the sink.
    pub async fn finalize(&mut self) -> Option<crate::recording::RecordedArtifact> {
        // Let the compose task flush what the encoder already produced.
        let _ = tokio::time::timeout(Duration::from_millis(200), &mut self.compose_task).await;
        self.sink.stop().await
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Best-effort: open the meeting URL so the operator sees the call while
/// granting permissions. Never a precondition of capture start.
fn open_viewer(command: &str, url: &str) {
    match std::process::Command::new(command)
        .arg(url)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
    {
        Ok(_) => debug!("Opened meeting URL via {}", command),
        Err(e) => warn!("Could not open meeting URL with {}: {}", command, e),
    }
}

/// Compose the final recordable stream: video chunks pass through opaque,
/// accumulated mixed audio is WAV-encoded once per flush interval.
async fn compose_stream(
    mut mixed: mpsc::Receiver<AudioFrame>,
    mut video: mpsc::Receiver<Vec<u8>>,
    tx: mpsc::Sender<EncodedChunk>,
    sample_rate: u32,
    flush: Duration,
) {
    let mut pending: Vec<f32> = Vec::new();
    let mut video_open = true;
    let mut interval = tokio::time::interval(flush);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            frame = mixed.recv() => match frame {
                Some(frame) => pending.extend(frame.samples),
                None => break,
            },
            chunk = video.recv(), if video_open => match chunk {
                Some(bytes) => {
                    if tx.send(EncodedChunk { bytes }).await.is_err() {
                        return;
                    }
                }
                None => video_open = false,
            },
            _ = interval.tick() => {
                if let Some(chunk) = flush_audio(&mut pending, sample_rate) {
                    if tx.send(chunk).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    if let Some(chunk) = flush_audio(&mut pending, sample_rate) {
        let _ = tx.send(chunk).await;
    }
    debug!("Final stream composition ended");
}

fn flush_audio(pending: &mut Vec<f32>, sample_rate: u32) -> Option<EncodedChunk> {
    if pending.is_empty() {
        return None;
    }
    match encode_wav_chunk(pending, sample_rate) {
        Ok(bytes) => {
            pending.clear();
            Some(EncodedChunk { bytes })
        }
        Err(e) => {
            warn!("Failed to encode audio chunk: {}", e);
            pending.clear();
            None
        }
    }
}

fn encode_wav_chunk(samples: &[f32], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}
