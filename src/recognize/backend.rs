use anyhow::Result;

use crate::frame::CameraFrame;

/// Label reported when no enrolled identity matches a face.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Distance score above which a match is not trusted; backends report the
/// fallback label instead of the nearest enrolled identity.
pub const DEFAULT_CONFIDENCE_CEILING: f32 = 40.0;

/// Pixel-space region of a matched face within its frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One classified face.
///
/// `confidence` is a distance score: lower means a closer match to the
/// enrolled identity. A backend that cannot get under its ceiling labels the
/// face [`UNKNOWN_LABEL`].
#[derive(Clone, Debug)]
pub struct FaceMatch {
    pub label: String,
    pub confidence: f32,
    pub region: Region,
}

impl FaceMatch {
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Classifier seam.
///
/// Implementations take `&mut self` so they can keep per-stream state
/// (running averages, model caches) without interior locking.
pub trait RecognizerBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Classify every face visible in the frame. An empty result means no
    /// faces, not an error.
    fn recognize(&mut self, frame: &CameraFrame) -> Result<Vec<FaceMatch>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
