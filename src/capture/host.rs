//! Host device broker: real capture via cpal and an external screen
//! recorder.
//!
//! Microphone capture uses the default cpal input device. Display capture
//! spawns the configured screen recorder writing encoded video to stdout,
//! paired with the PipeWire/PulseAudio monitor source for system audio when
//! one exists. A missing monitor source degrades to a display stream
//! without audio — a warning, not a failure.
//!
//! cpal streams are not `Send`, so each one lives on a dedicated thread
//! that blocks until the handle is released.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::audio::AudioFrame;
use crate::config::CaptureConfig;

use super::device::{AcquireError, DeviceBroker, MediaSourceHandle, VideoTrack};

const VIDEO_READ_BUF: usize = 64 * 1024;

pub struct HostDevices {
    config: CaptureConfig,
}

impl HostDevices {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Find a PipeWire/PulseAudio monitor source, which exposes the system
    /// output (what others say on the call) as an input device.
    fn find_monitor_device() -> Option<(cpal::Device, u32)> {
        let host = cpal::default_host();

        for device in host.input_devices().ok()? {
            if let Ok(name) = device.name() {
                if name.to_lowercase().contains("monitor") {
                    if let Ok(default_config) = device.default_input_config() {
                        let sample_rate = default_config.sample_rate().0;
                        info!("Found system audio monitor: {} ({}Hz)", name, sample_rate);
                        return Some((device, sample_rate));
                    }
                }
            }
        }

        None
    }
}

#[async_trait]
impl DeviceBroker for HostDevices {
    async fn acquire_display(&self) -> Result<MediaSourceHandle, AcquireError> {
        let recorder = which::which(&self.config.screen_recorder).map_err(|e| {
            AcquireError::Failed(format!(
                "screen recorder '{}' not found: {}",
                self.config.screen_recorder, e
            ))
        })?;

        let mut child = Command::new(&recorder)
            .args(&self.config.screen_recorder_args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AcquireError::Failed(format!("failed to spawn screen recorder: {}", e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| AcquireError::Failed("screen recorder has no stdout".to_string()))?;

        let (chunk_tx, chunk_rx) = mpsc::channel(32);
        let (ended_tx, ended_rx) = watch::channel(false);
        let (video_stop_tx, mut video_stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut buf = vec![0u8; VIDEO_READ_BUF];
            loop {
                tokio::select! {
                    _ = &mut video_stop_rx => {
                        debug!("Display capture released, killing screen recorder");
                        let _ = child.kill().await;
                        return;
                    }
                    read = stdout.read(&mut buf) => match read {
                        Ok(0) | Err(_) => {
                            // Recorder exited on its own: the platform or
                            // the operator revoked screen sharing.
                            let _ = ended_tx.send(true);
                            let _ = child.wait().await;
                            return;
                        }
                        Ok(n) => {
                            if chunk_tx.send(buf[..n].to_vec()).await.is_err() {
                                let _ = child.kill().await;
                                return;
                            }
                        }
                    }
                }
            }
        });

        info!("Display capture started via {:?}", recorder);

        let mut handle = MediaSourceHandle::new("display").with_video(VideoTrack {
            chunks: chunk_rx,
            ended: ended_rx,
        });

        // System audio rides along when a monitor source exists.
        match Self::find_monitor_device() {
            Some((device, sample_rate)) => {
                match spawn_capture_thread(device, sample_rate) {
                    Ok((frames_rx, audio_stop_tx)) => {
                        handle = handle.with_audio(frames_rx).with_releaser(move || {
                            let _ = video_stop_tx.send(());
                            let _ = audio_stop_tx.send(());
                        });
                    }
                    Err(e) => {
                        warn!("System audio capture failed: {}; recording without it", e);
                        handle = handle.with_releaser(move || {
                            let _ = video_stop_tx.send(());
                        });
                    }
                }
            }
            None => {
                warn!("No system audio monitor source; display stream has no audio track");
                handle = handle.with_releaser(move || {
                    let _ = video_stop_tx.send(());
                });
            }
        }

        Ok(handle)
    }

    async fn acquire_microphone(&self) -> Result<MediaSourceHandle, AcquireError> {
        let host = cpal::default_host();
        // A withheld default input device is how a refused permission
        // prompt presents here.
        let device = host.default_input_device().ok_or(AcquireError::Denied)?;

        info!(
            "Microphone capture using device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let (frames_rx, stop_tx) = spawn_capture_thread(device, self.config.sample_rate)
            .map_err(AcquireError::Failed)?;

        Ok(MediaSourceHandle::new("microphone")
            .with_audio(frames_rx)
            .with_releaser(move || {
                let _ = stop_tx.send(());
            }))
    }
}

/// Run a cpal input stream on its own thread, pushing frames into a channel
/// until the stop sender fires. Returns once the stream is playing.
fn spawn_capture_thread(
    device: cpal::Device,
    sample_rate: u32,
) -> Result<(mpsc::Receiver<AudioFrame>, std::sync::mpsc::Sender<()>), String> {
    let (frames_tx, frames_rx) = mpsc::channel::<AudioFrame>(64);
    let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

    std::thread::spawn(move || {
        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err| error!("Audio capture stream error: {}", err);
        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // try_send from the realtime callback; a full channel drops
                // the frame rather than blocking the audio thread.
                let _ = frames_tx.try_send(AudioFrame {
                    samples: data.to_vec(),
                    sample_rate,
                });
            },
            err_fn,
            None,
        );

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready_tx.send(Err(format!("failed to build input stream: {}", e)));
                return;
            }
        };

        if let Err(e) = stream.play() {
            let _ = ready_tx.send(Err(format!("failed to start input stream: {}", e)));
            return;
        }

        let _ = ready_tx.send(Ok(()));

        // Park until release; dropping the stream stops capture.
        let _ = stop_rx.recv();
        drop(stream);
        debug!("Audio capture thread exited");
    });

    match ready_rx.recv() {
        Ok(Ok(())) => Ok((frames_rx, stop_tx)),
        Ok(Err(e)) => Err(e),
        Err(_) => Err("audio capture thread died before reporting ready".to_string()),
    }
}
