pub mod sink;

pub use sink::{EncodedChunk, RecordedArtifact, RecordingSink};
