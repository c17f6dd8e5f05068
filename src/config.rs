use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::announce::{GateConfig, DEFAULT_SWEEP_PERIOD};
use crate::announce::gate::{DEFAULT_THRESHOLD, DEFAULT_WINDOW};
use crate::clip::assembler::{
    DEFAULT_FRAME_DELAY, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH,
};
use crate::clip::{ClipParams, DEFAULT_CLIP_CAPACITY, DEFAULT_CLIP_DIR};
use crate::ingest::CameraConfig;
use crate::recognize::UNKNOWN_LABEL;

const DEFAULT_CAMERA_URL: &str = "stub://front-door";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;

/// Longest frame delay expressible in the GIF header (u16 centiseconds).
const MAX_FRAME_DELAY_MS: u64 = u16::MAX as u64 * 10;

#[derive(Debug, Deserialize, Default)]
struct FacewatchdConfigFile {
    camera: Option<CameraConfigFile>,
    announce: Option<AnnounceConfigFile>,
    clip: Option<ClipConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnounceConfigFile {
    window_secs: Option<u64>,
    detection_threshold: Option<usize>,
    sweep_period_ms: Option<u64>,
    fallback_label: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ClipConfigFile {
    dir: Option<String>,
    capacity: Option<usize>,
    max_width: Option<u32>,
    max_height: Option<u32>,
    jpeg_quality: Option<u8>,
    frame_delay_ms: Option<u64>,
    loop_forever: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct FacewatchdConfig {
    pub camera: CameraSettings,
    pub announce: AnnounceSettings,
    pub clip: ClipSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct AnnounceSettings {
    pub window: Duration,
    pub threshold: usize,
    pub sweep_period: Duration,
    pub fallback_label: String,
}

#[derive(Debug, Clone)]
pub struct ClipSettings {
    pub dir: PathBuf,
    pub capacity: usize,
    pub max_width: u32,
    pub max_height: u32,
    pub jpeg_quality: u8,
    pub frame_delay: Duration,
    pub loop_forever: bool,
}

impl FacewatchdConfig {
    /// Resolve the daemon configuration: optional JSON file named by
    /// `FACEWATCH_CONFIG`, then environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FACEWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FacewatchdConfigFile) -> Self {
        let camera = CameraSettings {
            url: file
                .camera
                .as_ref()
                .and_then(|camera| camera.url.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };
        let announce = AnnounceSettings {
            window: file
                .announce
                .as_ref()
                .and_then(|announce| announce.window_secs)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_WINDOW),
            threshold: file
                .announce
                .as_ref()
                .and_then(|announce| announce.detection_threshold)
                .unwrap_or(DEFAULT_THRESHOLD),
            sweep_period: file
                .announce
                .as_ref()
                .and_then(|announce| announce.sweep_period_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SWEEP_PERIOD),
            fallback_label: file
                .announce
                .and_then(|announce| announce.fallback_label)
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        };
        let clip = ClipSettings {
            dir: file
                .clip
                .as_ref()
                .and_then(|clip| clip.dir.clone())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIP_DIR)),
            capacity: file
                .clip
                .as_ref()
                .and_then(|clip| clip.capacity)
                .unwrap_or(DEFAULT_CLIP_CAPACITY),
            max_width: file
                .clip
                .as_ref()
                .and_then(|clip| clip.max_width)
                .unwrap_or(DEFAULT_MAX_WIDTH),
            max_height: file
                .clip
                .as_ref()
                .and_then(|clip| clip.max_height)
                .unwrap_or(DEFAULT_MAX_HEIGHT),
            jpeg_quality: file
                .clip
                .as_ref()
                .and_then(|clip| clip.jpeg_quality)
                .unwrap_or(DEFAULT_JPEG_QUALITY),
            frame_delay: file
                .clip
                .as_ref()
                .and_then(|clip| clip.frame_delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_FRAME_DELAY),
            loop_forever: file.clip.and_then(|clip| clip.loop_forever).unwrap_or(true),
        };
        Self {
            camera,
            announce,
            clip,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("FACEWATCH_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(dir) = std::env::var("FACEWATCH_CLIP_DIR") {
            if !dir.trim().is_empty() {
                self.clip.dir = PathBuf::from(dir);
            }
        }
        if let Ok(window) = std::env::var("FACEWATCH_WINDOW_SECS") {
            let seconds: u64 = window.parse().map_err(|_| {
                anyhow!("FACEWATCH_WINDOW_SECS must be an integer number of seconds")
            })?;
            self.announce.window = Duration::from_secs(seconds);
        }
        if let Ok(threshold) = std::env::var("FACEWATCH_DETECTION_THRESHOLD") {
            let threshold: usize = threshold
                .parse()
                .map_err(|_| anyhow!("FACEWATCH_DETECTION_THRESHOLD must be an integer"))?;
            self.announce.threshold = threshold;
        }
        if let Ok(capacity) = std::env::var("FACEWATCH_CLIP_CAPACITY") {
            let capacity: usize = capacity
                .parse()
                .map_err(|_| anyhow!("FACEWATCH_CLIP_CAPACITY must be an integer"))?;
            self.clip.capacity = capacity;
        }
        if let Ok(period) = std::env::var("FACEWATCH_SWEEP_PERIOD_MS") {
            let millis: u64 = period.parse().map_err(|_| {
                anyhow!("FACEWATCH_SWEEP_PERIOD_MS must be an integer number of milliseconds")
            })?;
            self.announce.sweep_period = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be at least 1"));
        }
        if self.announce.window.is_zero() {
            return Err(anyhow!("announce window must be greater than zero"));
        }
        if self.announce.threshold == 0 {
            return Err(anyhow!("detection threshold must be at least 1"));
        }
        if self.announce.sweep_period.is_zero() {
            return Err(anyhow!("sweep period must be greater than zero"));
        }
        if self.announce.fallback_label.trim().is_empty() {
            return Err(anyhow!("fallback label must not be empty"));
        }
        if self.clip.capacity == 0 {
            return Err(anyhow!("clip capacity must be at least 1"));
        }
        if self.clip.jpeg_quality == 0 || self.clip.jpeg_quality > 100 {
            return Err(anyhow!("jpeg quality must be between 1 and 100"));
        }
        let delay_ms = self.clip.frame_delay.as_millis() as u64;
        if delay_ms < 10 {
            return Err(anyhow!("frame delay must be at least 10ms (one GIF tick)"));
        }
        if delay_ms > MAX_FRAME_DELAY_MS {
            return Err(anyhow!("frame delay must not exceed {MAX_FRAME_DELAY_MS}ms"));
        }
        Ok(())
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            url: self.camera.url.clone(),
            target_fps: self.camera.target_fps,
            width: self.camera.width,
            height: self.camera.height,
        }
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            window: self.announce.window,
            threshold: self.announce.threshold,
            fallback_label: self.announce.fallback_label.clone(),
        }
    }

    pub fn clip_params(&self) -> ClipParams {
        ClipParams {
            max_width: self.clip.max_width,
            max_height: self.clip.max_height,
            jpeg_quality: self.clip.jpeg_quality,
            frame_delay: self.clip.frame_delay,
            loop_forever: self.clip.loop_forever,
        }
    }
}

fn read_config_file(path: &Path) -> Result<FacewatchdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
