mod backend;
mod stub;

pub use backend::{
    FaceMatch, RecognizerBackend, Region, DEFAULT_CONFIDENCE_CEILING, UNKNOWN_LABEL,
};
pub use stub::StubRecognizer;
