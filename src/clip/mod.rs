//! Clip export pipeline.
//!
//! Frames flow through four pieces:
//! - [`buffer::ClipBuffer`] retains the newest frames and owns the
//!   trigger/drain protocol;
//! - [`assembler::ClipAssembler`] normalizes a drained snapshot and encodes
//!   the animated GIF;
//! - [`store::ClipStore`] persists the artifact;
//! - [`exporter::ClipExporter`] is the supervised worker stitching the three
//!   together off the capture path.

pub mod assembler;
pub mod buffer;
pub mod exporter;
pub mod store;

pub use assembler::{ClipAssembler, ClipParams, EncodedClip};
pub use buffer::{ClipBuffer, DEFAULT_CLIP_CAPACITY};
pub use exporter::{ClipExporter, ExporterHandle};
pub use store::{ClipStore, FilesystemClipStore, InMemoryClipStore, DEFAULT_CLIP_DIR};
