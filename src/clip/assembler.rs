//! Clip normalization and animated GIF encoding.
//!
//! A drained snapshot is turned into one artifact in two stages:
//!
//! 1. every frame is resampled to fit the configured bounding box and
//!    round-tripped through JPEG at the configured quality (the size bound
//!    for the final artifact, separate from the GIF's own palette
//!    compression);
//! 2. the normalized rasters are appended to a single animated GIF with the
//!    configured per-frame delay, a keep-previous-frame disposal policy, and
//!    the loop flag written once for the whole sequence.
//!
//! Output names come from a monotonic counter, so consecutive export cycles
//! never collide. The assembler never touches the ring buffer's locks; it
//! owns the snapshot outright and every frame in it is released here,
//! whether the encode succeeds or fails.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::frame::CameraFrame;

pub const DEFAULT_MAX_WIDTH: u32 = 640;
pub const DEFAULT_MAX_HEIGHT: u32 = 480;
pub const DEFAULT_JPEG_QUALITY: u8 = 50;
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// NeuQuant speed for the palette pass, 1 (best) to 30 (fastest).
const QUANTIZER_SPEED: i32 = 10;

// ----------------------------------------------------------------------------
// Parameters and output
// ----------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct ClipParams {
    /// Bounding box the normalized frames must fit in.
    pub max_width: u32,
    pub max_height: u32,
    /// Quality for the intermediate JPEG pass, 1..=100.
    pub jpeg_quality: u8,
    /// Display time per frame; encoded in hundredths of a second.
    pub frame_delay: Duration,
    /// Loop the animation forever, or play it once.
    pub loop_forever: bool,
}

impl Default for ClipParams {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            frame_delay: DEFAULT_FRAME_DELAY,
            loop_forever: true,
        }
    }
}

/// Finished artifact, ready for a clip store.
#[derive(Clone, Debug)]
pub struct EncodedClip {
    pub name: String,
    pub bytes: Vec<u8>,
    pub frame_count: usize,
}

// ----------------------------------------------------------------------------
// ClipAssembler
// ----------------------------------------------------------------------------

pub struct ClipAssembler {
    params: ClipParams,
    cycle: AtomicU64,
}

impl ClipAssembler {
    pub fn new(params: ClipParams) -> Self {
        Self {
            params,
            cycle: AtomicU64::new(0),
        }
    }

    pub fn params(&self) -> &ClipParams {
        &self.params
    }

    /// Encode one snapshot into an animated GIF.
    ///
    /// Consumes the snapshot: every frame is released by the time this
    /// returns, on the success path and on every error path alike.
    pub fn assemble(&self, frames: Vec<CameraFrame>) -> Result<EncodedClip> {
        if frames.is_empty() {
            return Err(anyhow!("refusing to encode an empty snapshot"));
        }
        let delay_cs = delay_centis(self.params.frame_delay)?;

        // Normalize first, dropping each raw frame as soon as its raster
        // exists. An error mid-pass drops the remainder of the snapshot,
        // which releases every frame exactly once.
        let mut rasters = Vec::with_capacity(frames.len());
        for frame in frames {
            let raster = self.normalize_frame(&frame)?;
            rasters.push(raster);
        }

        let (first_w, first_h) = rasters[0].dimensions();
        let screen_w = u16::try_from(first_w).context("clip width exceeds the gif limit")?;
        let screen_h = u16::try_from(first_h).context("clip height exceeds the gif limit")?;

        let mut bytes = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut bytes, screen_w, screen_h, &[])
                .context("open gif encoder")?;
            let repeat = if self.params.loop_forever {
                gif::Repeat::Infinite
            } else {
                gif::Repeat::Finite(1)
            };
            encoder.set_repeat(repeat).context("write gif loop block")?;

            for raster in &rasters {
                let (w, h) = raster.dimensions();
                let w = u16::try_from(w).context("frame width exceeds the gif limit")?;
                let h = u16::try_from(h).context("frame height exceeds the gif limit")?;
                let mut gif_frame =
                    gif::Frame::from_rgb_speed(w, h, raster.as_raw(), QUANTIZER_SPEED);
                gif_frame.delay = delay_cs;
                gif_frame.dispose = gif::DisposalMethod::Keep;
                encoder.write_frame(&gif_frame).context("append gif frame")?;
            }
        }

        let name = format!(
            "clip_{:06}.gif",
            self.cycle.fetch_add(1, Ordering::SeqCst)
        );
        Ok(EncodedClip {
            name,
            frame_count: rasters.len(),
            bytes,
        })
    }

    /// Resample a frame into the bounding box and round-trip it through
    /// JPEG at the configured quality.
    fn normalize_frame(&self, frame: &CameraFrame) -> Result<RgbImage> {
        let (width, height) = frame.image().dimensions();
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot normalize an empty {}x{} frame", width, height));
        }

        let (target_w, target_h) =
            fit_within(width, height, self.params.max_width, self.params.max_height);
        let resized = imageops::resize(frame.image(), target_w, target_h, FilterType::Triangle);

        let mut jpeg = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut jpeg, self.params.jpeg_quality);
        resized
            .write_with_encoder(encoder)
            .context("recompress frame as jpeg")?;

        let normalized = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
            .context("decode recompressed frame")?
            .to_rgb8();
        Ok(normalized)
    }
}

/// Aspect-preserving fit: scale to the box height first (up or down), then
/// cap the width at the box, recomputing the height from the capped width.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let aspect = width as f64 / height as f64;
    let mut target_w = (max_height as f64 * aspect) as u32;
    let mut target_h = max_height;
    if target_w > max_width {
        target_w = max_width;
        target_h = (max_width as f64 / aspect) as u32;
    }
    (target_w.max(1), target_h.max(1))
}

/// GIF delays tick in hundredths of a second; sub-tick precision truncates.
fn delay_centis(delay: Duration) -> Result<u16> {
    u16::try_from(delay.as_millis() / 10)
        .map_err(|_| anyhow!("frame delay {:?} exceeds the gif delay range", delay))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
