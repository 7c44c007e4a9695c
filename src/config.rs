//! Batch run configuration.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::scoring::{Algorithm, EngineConfig, DEFAULT_R1_SENTINEL};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReweightConfig {
    /// First depth of the sweep (inclusive). Signed so a negative value is reported by
    /// `validate` rather than by whatever parsed it.
    pub depth_from: i64,
    /// Last depth of the sweep (inclusive).
    pub depth_to: i64,
    pub algorithm: Algorithm,
    /// Append each computed edge to `<output>.cache`.
    pub cache: bool,
    /// Skip the edges already present in `<output>.cache`.
    pub resume: bool,
    /// LRU bound for memo tables; `None` = unbounded.
    pub memo_capacity: Option<usize>,
    pub r1_sentinel: f64,
}

impl Default for ReweightConfig {
    fn default() -> Self {
        Self {
            depth_from: 0,
            depth_to: 0,
            algorithm: Algorithm::Chua,
            cache: false,
            resume: false,
            memo_capacity: None,
            r1_sentinel: DEFAULT_R1_SENTINEL,
        }
    }
}

impl ReweightConfig {
    pub fn validate(&self) -> Result<()> {
        if self.depth_from < 0 || self.depth_to < 0 {
            return Err(Error::InvalidParameter(format!(
                "depths must be >= 0 (got {}..={})",
                self.depth_from, self.depth_to
            )));
        }
        if self.depth_from > self.depth_to {
            return Err(Error::InvalidParameter(format!(
                "depth_from must be <= depth_to (got {}..={})",
                self.depth_from, self.depth_to
            )));
        }
        self.engine_config().validate()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            memo_capacity: self.memo_capacity,
            r1_sentinel: self.r1_sentinel,
        }
    }

    /// Depth sweep; call after `validate`.
    pub fn depths(&self) -> RangeInclusive<i64> {
        self.depth_from..=self.depth_to
    }
}

/// Output path for one depth pass.
///
/// If `template` is an existing directory the file is `<template>/<input stem>v<depth>.<input
/// ext>`; otherwise `v<depth>` is inserted before `template`'s own extension.
pub fn output_path_for_depth(template: &Path, input: &Path, depth: usize) -> PathBuf {
    let (dir, named) = if template.is_dir() {
        (template.to_path_buf(), input)
    } else {
        (
            template.parent().map(Path::to_path_buf).unwrap_or_default(),
            template,
        )
    };
    let stem = named.file_stem().unwrap_or_default().to_string_lossy();
    let file = match named.extension() {
        Some(ext) => format!("{stem}v{depth}.{}", ext.to_string_lossy()),
        None => format!("{stem}v{depth}"),
    };
    dir.join(file)
}
