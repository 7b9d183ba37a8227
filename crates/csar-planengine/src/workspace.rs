//! Scoped on-disk workspace for one pipeline run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::archive::ArchiveEntry;
use crate::error::PlanEngineResult;

/// Temporary directory holding an unpacked plan; removed on drop.
#[derive(Debug)]
pub struct PlanWorkspace {
    dir: TempDir,
}

impl PlanWorkspace {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("csar-plan-").tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `entries` below the workspace root and return their paths.
    pub fn unpack(&self, entries: &[ArchiveEntry]) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let target = self.path().join(&entry.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &entry.bytes)?;
            files.push(target);
        }
        Ok(files)
    }

    /// Read back every file of the workspace, sorted by path.
    pub fn collect(&self) -> PlanEngineResult<Vec<ArchiveEntry>> {
        let root = self.path();
        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let path = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(ArchiveEntry::new(path, fs::read(entry.path())?));
        }
        Ok(entries)
    }
}
