use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::frame::CameraFrame;
use crate::recognize::backend::{
    FaceMatch, RecognizerBackend, Region, DEFAULT_CONFIDENCE_CEILING, UNKNOWN_LABEL,
};

/// Mean pixel value below which a frame counts as an empty scene.
const DEFAULT_PRESENCE_FLOOR: u8 = 60;

/// Deterministic recognizer for tests, demos, and `stub://` cameras.
///
/// Two modes:
/// - content mode (default): dark frames are an empty scene; brighter frames
///   yield one face whose distance score and roster pick are stable
///   functions of the pixel hash, so identical frames always classify
///   identically;
/// - pattern mode: a caller-supplied closure maps the call counter to
///   matches, for scripting exact appear/disappear sequences.
pub struct StubRecognizer {
    ceiling: f32,
    presence_floor: u8,
    roster: Vec<String>,
    calls: u64,
    pattern: Option<Box<dyn FnMut(u64) -> Vec<FaceMatch> + Send>>,
}

impl StubRecognizer {
    pub fn new() -> Self {
        Self {
            ceiling: DEFAULT_CONFIDENCE_CEILING,
            presence_floor: DEFAULT_PRESENCE_FLOOR,
            roster: vec!["resident".to_string()],
            calls: 0,
            pattern: None,
        }
    }

    /// Script the backend: `pattern` receives the zero-based call index.
    pub fn with_pattern(pattern: impl FnMut(u64) -> Vec<FaceMatch> + Send + 'static) -> Self {
        let mut stub = Self::new();
        stub.pattern = Some(Box::new(pattern));
        stub
    }

    /// Replace the enrolled-identity roster used in content mode.
    pub fn with_roster(mut self, roster: Vec<String>) -> Self {
        if !roster.is_empty() {
            self.roster = roster;
        }
        self
    }

    /// Override the distance ceiling used in content mode.
    pub fn with_ceiling(mut self, ceiling: f32) -> Self {
        self.ceiling = ceiling;
        self
    }
}

impl Default for StubRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecognizerBackend for StubRecognizer {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn recognize(&mut self, frame: &CameraFrame) -> Result<Vec<FaceMatch>> {
        let call = self.calls;
        self.calls += 1;

        if let Some(pattern) = &mut self.pattern {
            return Ok(pattern(call));
        }

        if mean_level(frame) < self.presence_floor {
            return Ok(Vec::new());
        }

        let digest: [u8; 32] = Sha256::digest(frame.image().as_raw()).into();
        let distance = (digest[0] % 64) as f32;
        let label = if distance > self.ceiling {
            UNKNOWN_LABEL.to_string()
        } else {
            self.roster[digest[1] as usize % self.roster.len()].clone()
        };

        let region = Region {
            x: frame.width() / 4,
            y: frame.height() / 4,
            width: (frame.width() / 2).max(1),
            height: (frame.height() / 2).max(1),
        };

        Ok(vec![FaceMatch {
            label,
            confidence: distance,
            region,
        }])
    }
}

fn mean_level(frame: &CameraFrame) -> u8 {
    let raw = frame.image().as_raw();
    if raw.is_empty() {
        return 0;
    }
    let sum: u64 = raw.iter().map(|&b| b as u64).sum();
    (sum / raw.len() as u64) as u8
}
