//! Skin weight files: the in-memory model, its XML form, joint remapping and
//! consistency checks against a live binding.

mod check;
mod model;
mod remap;
mod xml;

pub use check::{JointMismatch, WeightCheck, check_weights, check_weights_file, compare_joints};
pub use model::{PointMap, WeightBlock, WeightFile};
pub use remap::{MAX_WEIGHT, RemapRequest, remap, remap_weights};
pub use xml::{parse_weight_str, read_weight_file, to_xml_string, write_weight_file};
