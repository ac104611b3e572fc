use std::collections::{BTreeMap, HashSet};

use xmltree::Element;

/// Sparse per-vertex weights keyed by vertex index.
///
/// A `BTreeMap` keeps iteration in ascending numeric index order, which is the
/// order points must be written in.
pub type PointMap = BTreeMap<u32, f64>;

/// Weights one joint contributes to a deformer/shape pair.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightBlock {
    pub source_joint: String,
    pub deformer_name: String,
    pub shape_name: String,
    /// Position of the block in the file, renumbered on every write.
    pub layer: usize,
    /// Highest vertex index across the whole file, not just this block.
    pub max_index: u32,
    /// Point count. Only trusted while reading; recomputed on write.
    pub size: usize,
    pub default_value: f64,
    pub points: PointMap,
}

impl WeightBlock {
    /// An explicitly empty block, the result of zeroing out a joint.
    pub fn empty(
        source_joint: impl Into<String>,
        deformer_name: impl Into<String>,
        shape_name: impl Into<String>,
    ) -> Self {
        Self {
            source_joint: source_joint.into(),
            deformer_name: deformer_name.into(),
            shape_name: shape_name.into(),
            layer: 0,
            max_index: 0,
            size: 0,
            default_value: 0.0,
            points: PointMap::new(),
        }
    }

    pub fn highest_index(&self) -> Option<u32> {
        self.points.keys().next_back().copied()
    }

    /// Replace the points, keeping `size` in step.
    pub fn set_points(&mut self, points: PointMap, max_index: u32) {
        self.size = points.len();
        self.points = points;
        self.max_index = max_index;
    }
}

/// All weight blocks of one deformer/shape binding, in file order.
#[derive(Debug, Clone)]
pub struct WeightFile {
    pub deformer_name: String,
    pub shape_name: String,
    pub blocks: Vec<WeightBlock>,
    /// Root element without its `weights` children. Header and shape
    /// description elements ride along untouched.
    pub(crate) envelope: Element,
}

impl WeightFile {
    pub fn new(deformer_name: impl Into<String>, shape_name: impl Into<String>) -> Self {
        Self {
            deformer_name: deformer_name.into(),
            shape_name: shape_name.into(),
            blocks: Vec::new(),
            envelope: Element::new("deformerWeight"),
        }
    }

    /// Append a block carrying this file's deformer and shape names.
    pub fn push_block(&mut self, joint: impl Into<String>, points: PointMap) -> &mut WeightBlock {
        let mut block = WeightBlock::empty(joint, &self.deformer_name, &self.shape_name);
        block.layer = self.blocks.len();
        let max_index = points.keys().next_back().copied().unwrap_or(0);
        block.set_points(points, max_index);
        self.blocks.push(block);
        let last = self.blocks.len() - 1;
        &mut self.blocks[last]
    }

    pub fn block(&self, joint: &str) -> Option<&WeightBlock> {
        self.blocks.iter().find(|block| block.source_joint == joint)
    }

    /// Joint names in file order, each listed once.
    pub fn joints(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.blocks
            .iter()
            .filter(|block| seen.insert(block.source_joint.as_str()))
            .map(|block| block.source_joint.clone())
            .collect()
    }

    /// True highest vertex index referenced anywhere in the file.
    pub fn max_index(&self) -> u32 {
        self.blocks
            .iter()
            .filter_map(WeightBlock::highest_index)
            .max()
            .unwrap_or(0)
    }

    pub fn renumber_layers(&mut self) {
        for (layer, block) in self.blocks.iter_mut().enumerate() {
            block.layer = layer;
        }
    }

    /// Bring every derived field in line with the points: blocks are ordered
    /// by their declared layer, layers are made contiguous, and `size` and the
    /// file-global `max_index` are recomputed.
    pub fn refresh_derived(&mut self) {
        self.blocks.sort_by_key(|block| block.layer);
        self.renumber_layers();
        let max_index = self.max_index();
        for block in &mut self.blocks {
            block.size = block.points.len();
            block.max_index = max_index;
        }
    }
}
