//! Frame ingestion.
//!
//! One source type, two backends:
//! - `stub://` URLs render a synthetic scene (always available),
//! - RTSP URLs decode through GStreamer when the `rtsp-gstreamer`
//!   feature is enabled.
//!
//! Sources hand each captured frame to the caller and keep nothing back;
//! buffering and retention policy live in [`crate::clip`].

pub mod camera;

pub use camera::{CameraConfig, CameraSource, CameraStats};
