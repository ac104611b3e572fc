//! Seams to the application that owns the scene.
//!
//! The weight tools never talk to a scene graph directly. Selection, skin
//! binding, the host's native weight reader/writer and any user dialogs sit
//! behind [`SkinHost`] and [`Prompter`].

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{error::HostError, settings::ImportMethod};

/// Scene and skin-binding queries plus the host's effectful primitives.
///
/// Meshes are addressed by their long names (`|group|sub|mesh`), bindings by
/// the deformer name the host reports.
pub trait SkinHost {
    /// Skin deformer attached to `mesh`, if any.
    fn find_binding(&self, mesh: &str) -> Option<String>;

    /// Joints currently driving `binding`.
    fn binding_joints(&self, binding: &str) -> Result<Vec<String>, HostError>;

    fn joint_exists(&self, joint: &str) -> bool;

    /// Write the weights of `binding` to `path` in the weight file format.
    fn export_weights(&mut self, path: &Path, binding: &str) -> Result<(), HostError>;

    /// Apply the weight file at `path` to `binding`.
    fn import_weights(
        &mut self,
        path: &Path,
        binding: &str,
        method: ImportMethod,
    ) -> Result<(), HostError>;

    fn normalize_weights(&mut self, binding: &str, mesh: &str) -> Result<(), HostError>;

    /// Bind `mesh` to `joints`, returning the new binding's name.
    fn bind(&mut self, joints: &[String], mesh: &str) -> Result<String, HostError>;

    /// Vertex count, or `None` when `mesh` is not a polygon mesh.
    fn vertex_count(&self, mesh: &str) -> Option<usize>;

    /// (joint, weight) pairs for one vertex, zero weights included.
    fn vertex_influences(
        &self,
        binding: &str,
        mesh: &str,
        vertex: usize,
    ) -> Result<Vec<(String, f64)>, HostError>;

    fn set_vertex_weight(
        &mut self,
        binding: &str,
        mesh: &str,
        vertex: usize,
        joint: &str,
        value: f64,
    ) -> Result<(), HostError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JointResolution {
    /// Give the missing joint's weights to this joint.
    Substitute(String),
    SkipFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteDecision {
    Yes,
    YesToAll,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackDecision {
    Yes,
    YesToAll,
    No,
    NoToAll,
}

/// Interactive decisions the batch operations defer to the caller.
pub trait Prompter {
    /// `missing` is referenced by `file` but absent from the live binding.
    fn resolve_joint(&mut self, missing: &str, file: &Path) -> JointResolution;

    fn confirm_overwrite(&mut self, path: &Path) -> OverwriteDecision;

    /// No file matched `mesh` exactly; offer `candidate` instead.
    fn confirm_fallback(&mut self, mesh: &str, candidate: &str) -> FallbackDecision;
}

/// Cooperative cancellation shared between a batch and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        collections::{BTreeMap, HashMap, VecDeque},
        path::PathBuf,
    };

    use super::*;

    #[derive(Debug, Clone, Default)]
    pub struct MockMesh {
        pub binding: Option<String>,
        /// Per vertex: joint -> weight.
        pub vertices: Option<Vec<BTreeMap<String, f64>>>,
    }

    /// In-memory host recording every effectful call.
    #[derive(Debug, Default)]
    pub struct MemoryHost {
        pub meshes: HashMap<String, MockMesh>,
        pub bindings: HashMap<String, Vec<String>>,
        pub scene_joints: Vec<String>,
        /// Body written by `export_weights`.
        pub export_body: String,
        pub failing_bindings: Vec<String>,
        pub exported: Vec<(PathBuf, String)>,
        /// (path, binding, method, file contents at import time)
        pub imported: Vec<(PathBuf, String, ImportMethod, String)>,
        pub normalized: Vec<(String, String)>,
        pub bound: Vec<(Vec<String>, String)>,
    }

    impl MemoryHost {
        pub fn with_mesh(mut self, mesh: &str, binding: &str, joints: &[&str]) -> Self {
            self.meshes.insert(
                mesh.to_string(),
                MockMesh {
                    binding: Some(binding.to_string()),
                    vertices: None,
                },
            );
            self.bindings.insert(
                binding.to_string(),
                joints.iter().map(|joint| joint.to_string()).collect(),
            );
            self
        }

        fn check(&self, binding: &str) -> Result<(), HostError> {
            if self.failing_bindings.iter().any(|failing| failing == binding) {
                return Err(HostError::new(format!("{binding} rejected the operation")));
            }
            Ok(())
        }
    }

    impl SkinHost for MemoryHost {
        fn find_binding(&self, mesh: &str) -> Option<String> {
            self.meshes.get(mesh).and_then(|mesh| mesh.binding.clone())
        }

        fn binding_joints(&self, binding: &str) -> Result<Vec<String>, HostError> {
            self.bindings
                .get(binding)
                .cloned()
                .ok_or_else(|| HostError::new(format!("unknown binding {binding}")))
        }

        fn joint_exists(&self, joint: &str) -> bool {
            self.scene_joints.iter().any(|known| known == joint)
        }

        fn export_weights(&mut self, path: &Path, binding: &str) -> Result<(), HostError> {
            self.check(binding)?;
            std::fs::write(path, &self.export_body).map_err(|err| HostError::new(err.to_string()))?;
            self.exported.push((path.to_path_buf(), binding.to_string()));
            Ok(())
        }

        fn import_weights(
            &mut self,
            path: &Path,
            binding: &str,
            method: ImportMethod,
        ) -> Result<(), HostError> {
            self.check(binding)?;
            let body =
                std::fs::read_to_string(path).map_err(|err| HostError::new(err.to_string()))?;
            self.imported
                .push((path.to_path_buf(), binding.to_string(), method, body));
            Ok(())
        }

        fn normalize_weights(&mut self, binding: &str, mesh: &str) -> Result<(), HostError> {
            self.normalized.push((binding.to_string(), mesh.to_string()));
            Ok(())
        }

        fn bind(&mut self, joints: &[String], mesh: &str) -> Result<String, HostError> {
            if !self.meshes.contains_key(mesh) {
                return Err(HostError::new(format!("no mesh named {mesh}")));
            }
            self.bound.push((joints.to_vec(), mesh.to_string()));
            Ok(format!("skin_{}", self.bound.len()))
        }

        fn vertex_count(&self, mesh: &str) -> Option<usize> {
            self.meshes
                .get(mesh)
                .and_then(|mesh| mesh.vertices.as_ref())
                .map(Vec::len)
        }

        fn vertex_influences(
            &self,
            _binding: &str,
            mesh: &str,
            vertex: usize,
        ) -> Result<Vec<(String, f64)>, HostError> {
            self.meshes
                .get(mesh)
                .and_then(|mesh| mesh.vertices.as_ref())
                .and_then(|vertices| vertices.get(vertex))
                .map(|weights| {
                    weights
                        .iter()
                        .map(|(joint, value)| (joint.clone(), *value))
                        .collect()
                })
                .ok_or_else(|| HostError::new(format!("no vertex {vertex} on {mesh}")))
        }

        fn set_vertex_weight(
            &mut self,
            _binding: &str,
            mesh: &str,
            vertex: usize,
            joint: &str,
            value: f64,
        ) -> Result<(), HostError> {
            let weights = self
                .meshes
                .get_mut(mesh)
                .and_then(|mesh| mesh.vertices.as_mut())
                .and_then(|vertices| vertices.get_mut(vertex))
                .ok_or_else(|| HostError::new(format!("no vertex {vertex} on {mesh}")))?;
            weights.insert(joint.to_string(), value);
            Ok(())
        }
    }

    /// Prompter replaying scripted answers; falls back to declining.
    #[derive(Debug, Default)]
    pub struct ScriptedPrompter {
        pub substitutes: HashMap<String, JointResolution>,
        pub overwrites: VecDeque<OverwriteDecision>,
        pub fallbacks: VecDeque<FallbackDecision>,
        pub asked: Vec<String>,
    }

    impl Prompter for ScriptedPrompter {
        fn resolve_joint(&mut self, missing: &str, _file: &Path) -> JointResolution {
            self.asked.push(format!("joint:{missing}"));
            self.substitutes
                .get(missing)
                .cloned()
                .unwrap_or(JointResolution::SkipFile)
        }

        fn confirm_overwrite(&mut self, path: &Path) -> OverwriteDecision {
            self.asked.push(format!("overwrite:{}", path.display()));
            self.overwrites.pop_front().unwrap_or(OverwriteDecision::No)
        }

        fn confirm_fallback(&mut self, mesh: &str, candidate: &str) -> FallbackDecision {
            self.asked.push(format!("fallback:{mesh}->{candidate}"));
            self.fallbacks.pop_front().unwrap_or(FallbackDecision::No)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_cloned_flag_when_cancelled_then_every_clone_observes_it() {
        let flag = CancelFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_cancelled());

        flag.cancel();

        assert!(observer.is_cancelled());
    }
}
