//! Clip persistence.
//!
//! The export worker hands finished artifacts to a [`ClipStore`]. The
//! filesystem store is what deployments use; the in-memory store backs tests
//! that need to see what a worker thread stored.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::assembler::EncodedClip;

/// Default output directory for assembled clips.
pub const DEFAULT_CLIP_DIR: &str = "clips";

pub trait ClipStore: Send {
    fn put(&mut self, clip: &EncodedClip) -> Result<()>;
}

// ----------------------------------------------------------------------------
// Filesystem store
// ----------------------------------------------------------------------------

pub struct FilesystemClipStore {
    root: PathBuf,
}

impl FilesystemClipStore {
    /// Creates the output directory eagerly so a misconfigured path fails at
    /// startup rather than on the first export.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("create clip directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ClipStore for FilesystemClipStore {
    fn put(&mut self, clip: &EncodedClip) -> Result<()> {
        let path = self.root.join(&clip.name);
        write_atomic(&path, &clip.bytes)
            .with_context(|| format!("write clip {}", path.display()))
    }
}

/// Write to a temp file and rename into place, so an interrupted write never
/// leaves a partial artifact under the final name.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

// ----------------------------------------------------------------------------
// In-memory store
// ----------------------------------------------------------------------------

/// Keeps clips behind a shared handle; clones observe the same storage, so a
/// test can hand one clone to the export worker and read through another.
#[derive(Clone, Default)]
pub struct InMemoryClipStore {
    clips: Arc<Mutex<Vec<EncodedClip>>>,
}

impl InMemoryClipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clips.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        self.clips
            .lock()
            .unwrap()
            .iter()
            .map(|clip| clip.name.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<EncodedClip> {
        self.clips
            .lock()
            .unwrap()
            .iter()
            .find(|clip| clip.name == name)
            .cloned()
    }
}

impl ClipStore for InMemoryClipStore {
    fn put(&mut self, clip: &EncodedClip) -> Result<()> {
        self.clips.lock().unwrap().push(clip.clone());
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
