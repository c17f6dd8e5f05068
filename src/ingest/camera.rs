//! Camera frame source.
//!
//! `CameraSource` ingests frames for the watch pipeline:
//! - `stub://` URLs select a synthetic scene generator (always compiled),
//!   used by tests, the demo, and dry runs on machines without a camera;
//! - anything else is treated as an RTSP URL and decoded through a
//!   GStreamer pipeline behind the `rtsp-gstreamer` feature.
//!
//! Sources produce owned [`CameraFrame`]s stamped at capture time and hand
//! them off immediately; they never retain frames past `next_frame`.

#[cfg(feature = "rtsp-gstreamer")]
use anyhow::Context;
use anyhow::Result;
#[cfg(feature = "rtsp-gstreamer")]
use std::time::{Duration, Instant};

use crate::frame::CameraFrame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Stream URL, e.g. "rtsp://192.168.1.100:554/stream" or "stub://door".
    pub url: String,
    /// Target capture rate; the daemon paces its pull loop to this.
    pub target_fps: u32,
    /// Frame width (synthetic frames; RTSP reports its own).
    pub width: u32,
    /// Frame height (synthetic frames; RTSP reports its own).
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://front-door".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Frame source with a synthetic fallback for `stub://` URLs.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "rtsp-gstreamer")]
    Gstreamer(GstreamerCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            })
        } else {
            #[cfg(feature = "rtsp-gstreamer")]
            {
                Ok(Self {
                    backend: CameraBackend::Gstreamer(GstreamerCamera::new(config)?),
                })
            }
            #[cfg(not(feature = "rtsp-gstreamer"))]
            {
                anyhow::bail!("RTSP ingestion requires the rtsp-gstreamer feature")
            }
        }
    }

    /// Connect to the stream. Synthetic sources are always "connected".
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "rtsp-gstreamer")]
            CameraBackend::Gstreamer(source) => source.connect(),
        }
    }

    /// Capture the next frame, stamped with its capture instant.
    pub fn next_frame(&mut self) -> Result<CameraFrame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "rtsp-gstreamer")]
            CameraBackend::Gstreamer(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "rtsp-gstreamer")]
            CameraBackend::Gstreamer(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "rtsp-gstreamer")]
            CameraBackend::Gstreamer(source) => source.stats(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub url: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

/// Frames per visit cycle in the synthetic scene.
const VISIT_CYCLE: u64 = 100;
/// Leading frames of each cycle during which the visitor is in view.
const VISIT_LENGTH: u64 = 30;

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("CameraSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<CameraFrame> {
        let pixels = self.generate_pixels();
        let frame = CameraFrame::from_raw(self.config.width, self.config.height, pixels)?;
        self.frame_count += 1;
        Ok(frame)
    }

    /// Render the synthetic scene: a dim background gradient, with a bright
    /// "visitor" blob in view for the first [`VISIT_LENGTH`] frames of every
    /// [`VISIT_CYCLE`]-frame cycle. A per-frame jitter keeps consecutive
    /// frames from being byte-identical.
    fn generate_pixels(&mut self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let jitter = rand::random::<u8>() & 0x07;
        let visitor = self.frame_count % VISIT_CYCLE < VISIT_LENGTH;

        // Visitor blob: the centered quarter of the scene.
        let bx0 = width / 4;
        let bx1 = bx0 + width / 2;
        let by0 = height / 4;
        let by1 = by0 + height / 2;

        let mut pixels = vec![0u8; width * height * 3];
        for y in 0..height {
            for x in 0..width {
                let base = if visitor && x >= bx0 && x < bx1 && y >= by0 && y < by1 {
                    200
                } else {
                    ((x + y + self.frame_count as usize) % 48) as u8
                };
                let value = base.wrapping_add(jitter);
                let at = (y * width + x) * 3;
                pixels[at] = value;
                pixels[at + 1] = value;
                pixels[at + 2] = value;
            }
        }
        pixels
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// RTSP source using GStreamer
// ----------------------------------------------------------------------------

#[cfg(feature = "rtsp-gstreamer")]
struct GstreamerCamera {
    config: CameraConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    last_error: Option<String>,
}

#[cfg(feature = "rtsp-gstreamer")]
impl GstreamerCamera {
    /// Pipeline: rtspsrc ! decodebin ! videoconvert ! RGB appsink, with the
    /// sink dropping all but the newest buffer so a slow consumer sees
    /// fresh frames rather than a growing backlog.
    fn new(config: CameraConfig) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let pipeline_description = format!(
            "rtspsrc location={} latency=0 ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            config.url
        );
        let pipeline = gstreamer::parse_launch(&pipeline_description)
            .context("build camera pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow::anyhow!("camera pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow::anyhow!("appsink element has unexpected type"))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));
        appsink.set_max_buffers(1);
        appsink.set_drop(true);
        appsink.set_sync(false);

        Ok(Self {
            config,
            pipeline,
            appsink,
            frame_count: 0,
            last_frame_at: None,
            connected_at: None,
            last_error: None,
        })
    }

    fn connect(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("set camera pipeline to Playing")?;
        self.connected_at = Some(Instant::now());
        log::info!("CameraSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<CameraFrame> {
        self.poll_bus();

        let timeout = self.frame_timeout();
        let sample = self
            .appsink
            .try_pull_sample(timeout)
            .context("pull camera sample")?
            .ok_or_else(|| anyhow::anyhow!("camera stream stalled"))?;

        let (pixels, width, height) = sample_to_pixels(&sample)?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        CameraFrame::from_raw(width, height, pixels)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }

    fn frame_timeout(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            500
        } else {
            (1000 / self.config.target_fps).saturating_mul(4)
        };
        Duration::from_millis(base_ms.max(500) as u64)
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.timed_pop(Duration::from_millis(0)) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.last_error = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.last_error = Some("gstreamer reached EOS".to_string());
                }
                _ => {}
            }
        }
    }
}

#[cfg(feature = "rtsp-gstreamer")]
fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
    let buffer = sample.buffer().context("camera sample missing buffer")?;
    let caps = sample.caps().context("camera sample missing caps")?;
    let info =
        gstreamer_video::VideoInfo::from_caps(caps).context("parse camera caps as video info")?;

    let width = info.width() as u32;
    let height = info.height() as u32;
    let row_bytes = (width as usize) * 3;
    let stride = info.stride(0) as usize;

    let map = buffer.map_readable().context("map camera buffer")?;
    let data = map.as_slice();

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("camera buffer row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            url: "stub://test".to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
        }
    }

    fn mean_level(frame: &CameraFrame) -> u32 {
        let raw = frame.image().as_raw();
        (raw.iter().map(|&b| b as u64).sum::<u64>() / raw.len() as u64) as u32
    }

    #[test]
    fn synthetic_source_produces_configured_dimensions() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert!(source.is_healthy());
        Ok(())
    }

    #[test]
    fn synthetic_scene_cycles_between_visitor_and_empty() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        // Visitor frames carry the bright blob; once it leaves, the mean
        // level falls back to the dim background.
        let with_visitor = source.next_frame()?;
        let mut last = None;
        for _ in 1..VISIT_CYCLE {
            last = Some(source.next_frame()?);
        }
        let empty_scene = last.unwrap();

        assert!(mean_level(&with_visitor) > 60);
        assert!(mean_level(&empty_scene) < 60);
        Ok(())
    }

    #[test]
    fn consecutive_frames_are_not_byte_identical() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        let first = source.next_frame()?;
        let second = source.next_frame()?;
        assert_ne!(first.image().as_raw(), second.image().as_raw());
        Ok(())
    }

    #[test]
    fn stats_count_captured_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;
        for _ in 0..3 {
            source.next_frame()?;
        }
        let stats = source.stats();
        assert_eq!(stats.frames_captured, 3);
        assert_eq!(stats.url, "stub://test");
        Ok(())
    }

    #[cfg(not(feature = "rtsp-gstreamer"))]
    #[test]
    fn rtsp_urls_require_the_gstreamer_feature() {
        let config = CameraConfig {
            url: "rtsp://127.0.0.1:554/stream".to_string(),
            ..stub_config()
        };
        assert!(CameraSource::new(config).is_err());
    }
}
