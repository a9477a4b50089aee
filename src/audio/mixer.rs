//! Audio mixing graph: N capture sources in, one mixed stream out, plus a
//! tap for the waveform visualizer.
//!
//! Mixing is plain per-sample summation clamped at ±1.0. There is no gain
//! normalization: two loud sources clip. Known limitation.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::AudioFrame;

/// Sum sample slices into one buffer, zero-padding shorter inputs.
/// No normalization; samples clamp at [-1.0, 1.0].
pub fn mix_frames(sources: &[&[f32]]) -> Vec<f32> {
    let max_len = sources.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut mixed = vec![0.0f32; max_len];

    for source in sources {
        for (i, &sample) in source.iter().enumerate() {
            mixed[i] += sample;
        }
    }

    for sample in &mut mixed {
        *sample = sample.clamp(-1.0, 1.0);
    }

    mixed
}

/// Combines zero or more audio source streams into a single mixed output.
///
/// A pump task wakes on a fixed period, drains whatever each source has
/// produced, sums the buffers, and pushes one mixed frame to the output and
/// the visualizer tap. With no sources the output is a silent frame per
/// period, not an error.
pub struct MixerGraph {
    mixed_rx: Option<mpsc::Receiver<AudioFrame>>,
    tap_rx: Option<mpsc::Receiver<AudioFrame>>,
    pump: Option<JoinHandle<()>>,
}

impl MixerGraph {
    pub fn new(sources: Vec<mpsc::Receiver<AudioFrame>>, sample_rate: u32, period: Duration) -> Self {
        let (mixed_tx, mixed_rx) = mpsc::channel(16);
        let (tap_tx, tap_rx) = mpsc::channel(16);

        debug!("Mixer graph built with {} audio source(s)", sources.len());

        let pump = tokio::spawn(pump_task(sources, mixed_tx, tap_tx, sample_rate, period));

        Self {
            mixed_rx: Some(mixed_rx),
            tap_rx: Some(tap_rx),
            pump: Some(pump),
        }
    }

    /// The mixed audio stream consumed by the recording path. Yields `None`
    /// after the first call.
    pub fn take_mixed_output(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.mixed_rx.take()
    }

    /// Second copy of the mixed stream, for the external waveform renderer.
    pub fn take_visualizer_tap(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.tap_rx.take()
    }

    /// Stop the pump. Idempotent.
    pub fn close(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            debug!("Mixer graph closed");
        }
    }
}

impl Drop for MixerGraph {
    fn drop(&mut self) {
        self.close();
    }
}

async fn pump_task(
    mut sources: Vec<mpsc::Receiver<AudioFrame>>,
    mixed_tx: mpsc::Sender<AudioFrame>,
    tap_tx: mpsc::Sender<AudioFrame>,
    sample_rate: u32,
    period: Duration,
) {
    let silence_len = (sample_rate as u64 * period.as_millis() as u64 / 1000) as usize;
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let mut buffers: Vec<Vec<f32>> = Vec::with_capacity(sources.len());
        for source in &mut sources {
            let mut buffer = Vec::new();
            while let Ok(frame) = source.try_recv() {
                buffer.extend(frame.samples);
            }
            buffers.push(buffer);
        }

        let slices: Vec<&[f32]> = buffers.iter().map(|b| b.as_slice()).collect();
        let mut samples = mix_frames(&slices);
        if samples.is_empty() {
            samples = vec![0.0; silence_len];
        }

        let frame = AudioFrame {
            samples,
            sample_rate,
        };

        // The tap is best-effort: a slow visualizer never stalls recording.
        let _ = tap_tx.try_send(frame.clone());

        if mixed_tx.send(frame).await.is_err() {
            warn!("Mixed output receiver dropped, stopping mixer pump");
            break;
        }
    }
}
