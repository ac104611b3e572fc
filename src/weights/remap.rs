use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use log::debug;

use super::{
    model::{PointMap, WeightBlock, WeightFile},
    xml::{read_weight_file, write_weight_file},
};
use crate::error::{Result, WeightError};

/// Upper bound applied when two weights are summed onto the same vertex.
pub const MAX_WEIGHT: f64 = 1.0;

/// Ordered (source, target) joint pairs.
///
/// A pair whose source equals its target zeroes that joint out instead of
/// merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapRequest {
    pairs: Vec<(String, String)>,
}

impl RemapRequest {
    pub fn new(sources: Vec<String>, targets: Vec<String>) -> Result<Self> {
        if sources.len() != targets.len() {
            return Err(WeightError::Precondition(format!(
                "{} source joints paired with {} target joints",
                sources.len(),
                targets.len()
            )));
        }
        let pairs: Vec<(String, String)> = sources.into_iter().zip(targets).collect();
        if let Some(position) = pairs
            .iter()
            .position(|(source, target)| source.trim().is_empty() || target.trim().is_empty())
        {
            return Err(WeightError::Precondition(format!(
                "joint pair #{position} has a blank name"
            )));
        }
        Ok(Self { pairs })
    }

    /// Append a pair, rejecting blank names.
    pub fn push(&mut self, source: impl Into<String>, target: impl Into<String>) -> Result<()> {
        let (source, target) = (source.into(), target.into());
        if source.trim().is_empty() || target.trim().is_empty() {
            return Err(WeightError::Precondition(format!(
                "blank joint name in pair '{source}' -> '{target}'"
            )));
        }
        self.pairs.push((source, target));
        Ok(())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// Rewrite `file` so each pair's target joint absorbs the weights of its
/// source joint. A joint split over several blocks contributes all of them and
/// ends up in its first block.
///
/// Shared indices are summed and clamped to [`MAX_WEIGHT`]. Blocks whose joint
/// appears only as a source are dropped once every pair has been merged, and
/// layers are renumbered in block order.
pub fn remap(mut file: WeightFile, request: &RemapRequest) -> WeightFile {
    let sources: HashSet<&str> = request.pairs.iter().map(|(s, _)| s.as_str()).collect();
    let targets: HashSet<&str> = request.pairs.iter().map(|(_, t)| t.as_str()).collect();
    let mut highest_index = 0u32;

    for (source, target) in &request.pairs {
        if source == target {
            debug!("Zeroing weights of {target}");
            write_block(&mut file, target, PointMap::new(), 0);
            continue;
        }

        let mut merged = PointMap::new();
        for block in file.blocks.iter().filter(|block| block.source_joint == *source) {
            merge_points(&mut merged, &block.points);
        }
        let target_blocks = file
            .blocks
            .iter()
            .filter(|block| block.source_joint == *target && block.size != 0);
        for block in target_blocks {
            merge_points(&mut merged, &block.points);
        }
        if let Some(&index) = merged.keys().next_back() {
            highest_index = highest_index.max(index);
        }

        debug!(
            "Merged {source} into {target}: {} points",
            merged.len()
        );
        write_block(&mut file, target, merged, highest_index);
    }

    file.blocks.retain(|block| {
        let joint = block.source_joint.as_str();
        !(sources.contains(joint) && !targets.contains(joint))
    });
    file.renumber_layers();
    file
}

/// Parse `path`, remap it and write the result.
///
/// Without a `write_path` the output goes to the system temp directory under
/// the input's file name. Returns the path written.
pub fn remap_weights(path: &Path, request: &RemapRequest, write_path: Option<&Path>) -> Result<PathBuf> {
    let write_path = match write_path {
        Some(write_path) => write_path.to_path_buf(),
        None => default_remap_path(path)?,
    };
    let file = read_weight_file(path)?;
    let remapped = remap(file, request);
    write_weight_file(&remapped, &write_path)
}

fn default_remap_path(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        WeightError::Precondition(format!("{} does not name a file", path.display()))
    })?;
    Ok(std::env::temp_dir().join(file_name))
}

/// Add `incoming` into `merged`, summing shared indices.
fn merge_points(merged: &mut PointMap, incoming: &PointMap) {
    for (&index, &value) in incoming {
        merged
            .entry(index)
            .and_modify(|existing| *existing = (*existing + value).min(MAX_WEIGHT))
            .or_insert(value);
    }
}

/// Store `points` in the first block of `joint`, dropping any later blocks of
/// the same joint, or append a block if none exists.
fn write_block(file: &mut WeightFile, joint: &str, points: PointMap, max_index: u32) {
    match file.blocks.iter().position(|block| block.source_joint == joint) {
        Some(first) => {
            file.blocks[first].set_points(points, max_index);
            let mut position = 0;
            file.blocks.retain(|block| {
                let keep = position <= first || block.source_joint != joint;
                position += 1;
                keep
            });
        }
        None => {
            let mut block = WeightBlock::empty(joint, &file.deformer_name, &file.shape_name);
            block.set_points(points, max_index);
            file.blocks.push(block);
        }
    }
}
