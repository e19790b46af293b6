//! Per-run temporary directory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::FetchResult;

const MEDIA_FILE: &str = "fetched.m4b";
const COVER_FILE: &str = "cover.png";
const COVER_DOWNLOAD_FILE: &str = "cover.download";
const METADATA_FILE: &str = "metadata.txt";

/// A uniquely named directory owned by one pipeline run.
///
/// The directory is removed by [`Workspace::remove`] or, failing that, when
/// the value is dropped.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Create a fresh `abookfetcher-<uuid>` directory under `temp_root`.
    pub fn create(temp_root: &Path) -> FetchResult<Self> {
        std::fs::create_dir_all(temp_root)?;
        let root = temp_root.join(format!("abookfetcher-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir(&root)?;
        debug!("created workspace {}", root.display());
        Ok(Self {
            root,
            removed: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remuxed stream before tagging.
    pub fn media_path(&self) -> PathBuf {
        self.root.join(MEDIA_FILE)
    }

    /// Transcoded cover image.
    pub fn cover_path(&self) -> PathBuf {
        self.root.join(COVER_FILE)
    }

    /// Cover image as downloaded.
    pub fn cover_download_path(&self) -> PathBuf {
        self.root.join(COVER_DOWNLOAD_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// Delete the directory and everything in it.
    pub fn remove(mut self) -> std::io::Result<()> {
        self.removed = true;
        debug!("removing {}", self.root.display());
        remove_tree(&self.root)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = remove_tree(&self.root) {
            warn!("failed to remove workspace {}: {e}", self.root.display());
        }
    }
}

fn remove_tree(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
