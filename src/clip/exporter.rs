//! Supervised clip export worker.
//!
//! One background thread blocks on the ring buffer, and for every full
//! snapshot runs the assembler and hands the artifact to the clip store. A
//! failed cycle is logged and dropped; the worker itself keeps waiting for
//! the next trigger. `stop()` shuts the buffer down and joins the thread.

use anyhow::{anyhow, Result};
use log::{error, info};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::assembler::ClipAssembler;
use super::buffer::ClipBuffer;
use super::store::ClipStore;

pub struct ClipExporter;

/// Handle to a running export worker.
pub struct ExporterHandle {
    buffer: Arc<ClipBuffer>,
    join: Option<JoinHandle<()>>,
}

impl ClipExporter {
    pub fn spawn(
        buffer: Arc<ClipBuffer>,
        assembler: ClipAssembler,
        mut store: Box<dyn ClipStore>,
    ) -> ExporterHandle {
        let worker_buffer = Arc::clone(&buffer);
        let join = thread::spawn(move || {
            info!(
                "clip exporter running (snapshot size {})",
                worker_buffer.capacity()
            );
            while let Some(snapshot) = worker_buffer.wait_for_snapshot() {
                let drained = snapshot.len();
                let result = assembler
                    .assemble(snapshot)
                    .and_then(|clip| store.put(&clip).map(|_| clip));
                match result {
                    Ok(clip) => info!(
                        "exported {} ({} frames, {} bytes)",
                        clip.name,
                        clip.frame_count,
                        clip.bytes.len()
                    ),
                    // Frames from this cycle are already released; the
                    // worker lives on to serve the next trigger.
                    Err(err) => error!(
                        "export cycle failed after draining {} frames: {:#}",
                        drained, err
                    ),
                }
            }
            info!("clip exporter stopped");
        });

        ExporterHandle {
            buffer,
            join: Some(join),
        }
    }
}

impl ExporterHandle {
    /// Shut the buffer down, wake the worker out of its wait, and join it.
    pub fn stop(mut self) -> Result<()> {
        self.buffer.shutdown();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("clip exporter thread panicked"))?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
