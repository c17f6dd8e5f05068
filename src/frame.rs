//! Frame ownership layer.
//!
//! - `CameraFrame`: an owned RGB raster plus its capture instant. A frame has
//!   exactly one owner at a time: the camera source hands it to the ring
//!   buffer, the buffer hands it to the assembler on drain (or drops it on
//!   eviction), and dropping it releases the pixels.
//! - `ReleaseProbe`: shared drop counter that tests attach to assert a frame
//!   is released exactly once on every exit path.
//!
//! `CameraFrame` is deliberately not `Clone`. Duplicating a frame would break
//! the exactly-once release accounting the clip pipeline is built around.

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

// ----------------------------------------------------------------------------
// ReleaseProbe: observable release accounting
// ----------------------------------------------------------------------------

/// Shared counter incremented each time an attached frame is dropped.
///
/// Cloning the probe clones the handle, not the count. Attach one probe to
/// many frames to count releases across a whole buffer cycle.
#[derive(Clone, Debug, Default)]
pub struct ReleaseProbe {
    releases: Arc<AtomicU64>,
}

impl ReleaseProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attached frames released so far.
    pub fn released(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------------
// CameraFrame: owned raster with capture time
// ----------------------------------------------------------------------------

/// One captured video frame. Pixels are owned; dropping the frame is the one
/// and only release path.
pub struct CameraFrame {
    image: RgbImage,
    captured_at: Instant,
    probe: Option<ReleaseProbe>,
}

impl CameraFrame {
    /// Wrap an already-decoded raster, stamping it with the current instant.
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
            probe: None,
        }
    }

    /// Build a frame from a packed RGB buffer as produced by the ingest
    /// backends. Fails if the buffer length does not match the dimensions.
    pub fn from_raw(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self> {
        let len = rgb.len();
        let image = RgbImage::from_raw(width, height, rgb).ok_or_else(|| {
            anyhow!(
                "pixel buffer of {} bytes does not hold a {}x{} rgb frame",
                len,
                width,
                height
            )
        })?;
        Ok(Self::new(image))
    }

    /// Attach a release probe. Used by tests asserting release discipline.
    pub fn with_probe(mut self, probe: &ReleaseProbe) -> Self {
        self.probe = Some(probe.clone());
        self
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Monotonic capture instant stamped when the frame was created.
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

impl Drop for CameraFrame {
    fn drop(&mut self) {
        if let Some(probe) = &self.probe {
            probe.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for CameraFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraFrame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("probed", &self.probe.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn make_test_frame(width: u32, height: u32, fill: u8) -> CameraFrame {
        let pixels = vec![fill; (width * height * 3) as usize];
        CameraFrame::from_raw(width, height, pixels).unwrap()
    }

    #[test]
    fn from_raw_rejects_mismatched_buffer() {
        let err = CameraFrame::from_raw(640, 480, vec![0u8; 16]).unwrap_err();
        assert!(err.to_string().contains("640x480"));
    }

    #[test]
    fn accessors_report_dimensions() {
        let frame = make_test_frame(32, 24, 0x7f);
        assert_eq!(frame.width(), 32);
        assert_eq!(frame.height(), 24);
        assert_eq!(frame.image().dimensions(), (32, 24));
    }

    #[test]
    fn probe_counts_release_exactly_once() {
        let probe = ReleaseProbe::new();
        let frame = make_test_frame(8, 8, 1).with_probe(&probe);
        assert_eq!(probe.released(), 0);

        // Moving the frame must not count as a release.
        let moved = frame;
        assert_eq!(probe.released(), 0);

        drop(moved);
        assert_eq!(probe.released(), 1);
    }

    #[test]
    fn one_probe_counts_many_frames() {
        let probe = ReleaseProbe::new();
        let frames: Vec<CameraFrame> = (0..5)
            .map(|i| make_test_frame(4, 4, i as u8).with_probe(&probe))
            .collect();
        drop(frames);
        assert_eq!(probe.released(), 5);
    }
}
