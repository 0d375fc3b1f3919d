//! On-disk project layout.
//!
//! Every entity that owns files gets its own directory tree under a single
//! configured data root:
//!
//! ```text
//! <data_root>/projects/{project_id}/
//!     refs/{ref_id}/source/            + meta.json
//!     motions/{motion_id}/source/      + meta.json
//!     experiments/{experiment_id}/input/   + config.json
//!     jobs/{job_id}/{input,output,tmp,logs}/
//! ```
//!
//! The `ensure_*` operations are idempotent: they create missing
//! directories and never touch existing content, so retried requests are
//! safe. Jobs never share directories; a job's `input/` and `output/`
//! belong to that job alone.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::types::EntityId;

/// Resolved filesystem paths for a single job.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub job_root: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub logs_dir: PathBuf,
}

/// Resolved filesystem paths for a single reference or motion asset.
#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub asset_root: PathBuf,
    pub source_dir: PathBuf,
    pub meta_path: PathBuf,
}

/// Resolved filesystem paths for a single experiment.
#[derive(Debug, Clone)]
pub struct ExperimentPaths {
    pub experiment_root: PathBuf,
    pub input_dir: PathBuf,
    pub config_path: PathBuf,
}

/// Creates and enforces the per-entity directory layout under a data root.
#[derive(Debug, Clone)]
pub struct DataLayout {
    data_root: PathBuf,
}

impl DataLayout {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn project_root(&self, project_id: EntityId) -> PathBuf {
        self.data_root.join("projects").join(project_id.to_string())
    }

    pub fn job_root(&self, project_id: EntityId, job_id: EntityId) -> PathBuf {
        self.project_root(project_id)
            .join("jobs")
            .join(job_id.to_string())
    }

    /// Ensure the directory tree for a job exists and return its paths.
    pub fn ensure_job_dirs(
        &self,
        project_id: EntityId,
        job_id: EntityId,
    ) -> Result<JobPaths, CoreError> {
        let job_root = self.job_root(project_id, job_id);
        let paths = JobPaths {
            input_dir: job_root.join("input"),
            output_dir: job_root.join("output"),
            tmp_dir: job_root.join("tmp"),
            logs_dir: job_root.join("logs"),
            job_root,
        };
        for dir in [
            &paths.input_dir,
            &paths.output_dir,
            &paths.tmp_dir,
            &paths.logs_dir,
        ] {
            create_dir_all(dir)?;
        }
        Ok(paths)
    }

    /// Ensure the directory tree for a reference asset exists.
    pub fn ensure_reference_dirs(
        &self,
        project_id: EntityId,
        ref_id: EntityId,
    ) -> Result<AssetPaths, CoreError> {
        self.ensure_asset_dirs(project_id, "refs", ref_id)
    }

    /// Ensure the directory tree for a motion asset exists.
    pub fn ensure_motion_dirs(
        &self,
        project_id: EntityId,
        motion_id: EntityId,
    ) -> Result<AssetPaths, CoreError> {
        self.ensure_asset_dirs(project_id, "motions", motion_id)
    }

    fn ensure_asset_dirs(
        &self,
        project_id: EntityId,
        kind: &str,
        asset_id: EntityId,
    ) -> Result<AssetPaths, CoreError> {
        let asset_root = self
            .project_root(project_id)
            .join(kind)
            .join(asset_id.to_string());
        let paths = AssetPaths {
            source_dir: asset_root.join("source"),
            meta_path: asset_root.join("meta.json"),
            asset_root,
        };
        create_dir_all(&paths.source_dir)?;
        Ok(paths)
    }

    /// Ensure the directory tree for an experiment exists.
    pub fn ensure_experiment_dirs(
        &self,
        project_id: EntityId,
        experiment_id: EntityId,
    ) -> Result<ExperimentPaths, CoreError> {
        let experiment_root = self
            .project_root(project_id)
            .join("experiments")
            .join(experiment_id.to_string());
        let paths = ExperimentPaths {
            input_dir: experiment_root.join("input"),
            config_path: experiment_root.join("config.json"),
            experiment_root,
        };
        create_dir_all(&paths.input_dir)?;
        Ok(paths)
    }

    /// Remove a project's entire directory tree. Used by the project
    /// deletion cascade; missing trees are not an error.
    pub fn remove_project_root(&self, project_id: EntityId) -> Result<(), CoreError> {
        let root = self.project_root(project_id);
        if root.exists() {
            fs::remove_dir_all(&root)
                .map_err(|e| CoreError::io(format!("removing {}", root.display()), e))?;
        }
        Ok(())
    }
}

fn create_dir_all(dir: &Path) -> Result<(), CoreError> {
    fs::create_dir_all(dir).map_err(|e| CoreError::io(format!("creating {}", dir.display()), e))
}

/// Copy a single file into `dest_dir`, keeping its file name.
/// Returns the destination path.
pub fn copy_file_into(src: &Path, dest_dir: &Path) -> Result<PathBuf, CoreError> {
    let name = src
        .file_name()
        .ok_or_else(|| CoreError::InvalidInput(format!("{} has no file name", src.display())))?;
    let dest = dest_dir.join(name);
    fs::copy(src, &dest).map_err(|e| {
        CoreError::io(
            format!("copying {} to {}", src.display(), dest.display()),
            e,
        )
    })?;
    Ok(dest)
}

/// Recursively copy the contents of `src` into `dest`, merging with
/// whatever is already there. Existing files with the same name are
/// overwritten; nothing else is removed.
pub fn copy_dir_contents(src: &Path, dest: &Path) -> Result<(), CoreError> {
    create_dir_all(dest)?;
    let entries =
        fs::read_dir(src).map_err(|e| CoreError::io(format!("reading {}", src.display()), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::io(format!("reading {}", src.display()), e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_dir_contents(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| {
                CoreError::io(format!("copying {} to {}", from.display(), to.display()), e)
            })?;
        }
    }
    Ok(())
}

/// Move a file into `dest_dir`, keeping its file name.
///
/// Tries `rename` first; if the source and destination live on different
/// filesystems (the worker's scratch space often does), falls back to
/// copy + remove. Returns the destination path.
pub fn move_file_into(src: &Path, dest_dir: &Path) -> Result<PathBuf, CoreError> {
    let name = src
        .file_name()
        .ok_or_else(|| CoreError::InvalidInput(format!("{} has no file name", src.display())))?;
    let dest = dest_dir.join(name);
    if src == dest {
        return Ok(dest);
    }
    match fs::rename(src, &dest) {
        Ok(()) => Ok(dest),
        Err(_) => {
            fs::copy(src, &dest).map_err(|e| {
                CoreError::io(
                    format!("copying {} to {}", src.display(), dest.display()),
                    e,
                )
            })?;
            fs::remove_file(src)
                .map_err(|e| CoreError::io(format!("removing {}", src.display()), e))?;
            Ok(dest)
        }
    }
}
