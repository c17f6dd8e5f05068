//! Face watch pipeline
//!
//! This crate implements the frame-to-announcement pipeline for a
//! single-camera face watcher.
//!
//! # Architecture
//!
//! Frames flow ingest -> recognize -> announce, with a clip branch that
//! turns buffered footage into shareable animations. Four properties hold
//! by construction:
//!
//! 1. **Debounced announcements**: an identity seen continuously is announced
//!    once, not once per frame; re-announcement requires a quiet window.
//! 2. **Suppressed fallback**: the fallback label stays silent while any
//!    named identity is being tracked.
//! 3. **Bounded footage**: the clip buffer holds a fixed number of frames;
//!    overflow evicts oldest-first and a triggered export latches until a
//!    full buffer is drained.
//! 4. **Exactly-once release**: every captured frame is released on exactly
//!    one path (eviction, failed normalization, or encoded into a clip).
//!
//! # Module Structure
//!
//! - `frame`: owned camera frames and release accounting
//! - `ingest`: camera sources (synthetic stub, RTSP via GStreamer)
//! - `recognize`: recognizer seam plus a deterministic stub backend
//! - `announce`: per-identity debounce gate and its background sweeper
//! - `clip`: frame buffer, GIF assembly, clip stores, export worker
//! - `config`: facewatchd configuration

pub mod announce;
pub mod clip;
pub mod config;
pub mod frame;
pub mod ingest;
pub mod recognize;

pub use announce::{AnnouncementGate, AnnouncementSweeper, GateConfig, SweepStats, SweeperHandle};
pub use clip::{
    ClipAssembler, ClipBuffer, ClipExporter, ClipParams, ClipStore, EncodedClip, ExporterHandle,
    FilesystemClipStore, InMemoryClipStore,
};
pub use config::FacewatchdConfig;
pub use frame::{CameraFrame, ReleaseProbe};
pub use ingest::{CameraConfig, CameraSource, CameraStats};
pub use recognize::{FaceMatch, RecognizerBackend, StubRecognizer, UNKNOWN_LABEL};
