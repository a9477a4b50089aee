pub mod mixer;

pub use mixer::{mix_frames, MixerGraph};

/// One buffer of mono f32 samples from a capture source or the mixer.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}
