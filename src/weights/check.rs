use std::{collections::BTreeSet, path::Path};

use serde::Serialize;

use super::{model::WeightFile, xml::read_weight_file};
use crate::error::Result;

/// Joints that disagree between a weight file and a live binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JointMismatch {
    /// Named by the file but not driving the binding.
    pub missing_from_live: Vec<String>,
    /// Driving the binding but not named by the file.
    pub missing_from_file: Vec<String>,
}

impl JointMismatch {
    pub fn is_consistent(&self) -> bool {
        self.missing_from_live.is_empty() && self.missing_from_file.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightCheck {
    /// No live joints were supplied; the joints the file references.
    Referenced(Vec<String>),
    Compared(JointMismatch),
}

/// Compare the joints of `file` against `live`, or list the file's joints
/// when `live` is `None`.
pub fn check_weights(file: &WeightFile, live: Option<&[String]>) -> WeightCheck {
    match live {
        None => WeightCheck::Referenced(file.joints()),
        Some(live) => WeightCheck::Compared(compare_joints(file, live)),
    }
}

pub fn check_weights_file(path: &Path, live: Option<&[String]>) -> Result<WeightCheck> {
    let file = read_weight_file(path)?;
    Ok(check_weights(&file, live))
}

/// Both sides come back de-duplicated and sorted.
pub fn compare_joints(file: &WeightFile, live: &[String]) -> JointMismatch {
    let in_file: BTreeSet<&str> = file
        .blocks
        .iter()
        .map(|block| block.source_joint.as_str())
        .collect();
    let in_live: BTreeSet<&str> = live.iter().map(String::as_str).collect();

    JointMismatch {
        missing_from_live: in_file
            .difference(&in_live)
            .map(|joint| joint.to_string())
            .collect(),
        missing_from_file: in_live
            .difference(&in_file)
            .map(|joint| joint.to_string())
            .collect(),
    }
}
