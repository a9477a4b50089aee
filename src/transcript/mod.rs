pub mod feed;
pub mod recognizer;
pub mod store;

pub use feed::TranscriptionFeed;
pub use recognizer::{
    RecognitionError, RecognitionEvent, RecognitionStream, SpeechRecognizer,
    WhisperStreamRecognizer,
};
pub use store::{TranscriptSegment, TranscriptStore};
