//! Mapping between host mesh names and weight files on disk.
//!
//! Batch export mirrors the mesh hierarchy as directories, so
//! `|rig|body|torso` becomes `rig/body/torso.xml`. Import looks a mesh up by
//! that mirrored path, then by its last three name segments, which survives
//! the hierarchy gaining or losing top-level groups.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::host::{FallbackDecision, Prompter};

const WEIGHT_EXTENSION: &str = "xml";
const KEY_DEPTH: usize = 3;

fn segments(mesh: &str) -> Vec<String> {
    mesh.split('|')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace(':', "_"))
        .collect()
}

/// Last segment of a long mesh name, namespace separators replaced.
pub fn short_name(mesh: &str) -> String {
    segments(mesh).pop().unwrap_or_default()
}

/// Path of the weight file for `mesh` relative to an export directory.
pub fn mesh_relative_path(mesh: &str) -> PathBuf {
    let mut segments = segments(mesh);
    let mut path = PathBuf::new();
    if let Some(last) = segments.pop() {
        for segment in segments {
            path.push(segment);
        }
        path.push(format!("{last}.{WEIGHT_EXTENSION}"));
    }
    path
}

/// Lookup key for `mesh`: its last three name segments as a relative path.
pub fn mesh_key(mesh: &str) -> String {
    let segments = segments(mesh);
    let start = segments.len().saturating_sub(KEY_DEPTH);
    format!("{}.{WEIGHT_EXTENSION}", segments[start..].join("/"))
}

fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .iter()
        .map(|component| component.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Weight files below a directory, keyed by their `/`-separated path relative
/// to it.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    entries: BTreeMap<String, PathBuf>,
}

impl FileIndex {
    pub fn scan(root: &Path) -> Self {
        let entries = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(WEIGHT_EXTENSION))
            })
            .map(|e| (relative_key(root, e.path()), e.into_path()))
            .collect::<BTreeMap<_, _>>();
        debug!("Indexed {} weight files under {}", entries.len(), root.display());
        Self { entries }
    }

    /// File exported for `mesh`: its full mirrored path, else any file whose
    /// trailing components match [`mesh_key`].
    pub fn find(&self, mesh: &str) -> Option<&Path> {
        let full = segments(mesh).join("/");
        if let Some(path) = self.entries.get(&format!("{full}.{WEIGHT_EXTENSION}")) {
            return Some(path.as_path());
        }
        let key = mesh_key(mesh);
        let suffix = format!("/{key}");
        self.entries
            .iter()
            .find(|(entry, _)| **entry == key || entry.ends_with(&suffix))
            .map(|(_, path)| path.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.entries.get(key).map(PathBuf::as_path)
    }

    /// Keys mentioning `short`, files named exactly `short` first.
    pub fn candidates(&self, short: &str) -> Vec<&str> {
        if short.is_empty() {
            return Vec::new();
        }
        let exact_name = format!("{short}.{WEIGHT_EXTENSION}");
        let (mut exact, partial): (Vec<&str>, Vec<&str>) = self
            .entries
            .keys()
            .map(String::as_str)
            .filter(|key| key.contains(short))
            .partition(|key| key.rsplit('/').next() == Some(exact_name.as_str()));
        exact.extend(partial);
        exact
    }
}

/// Where an import or bind reads its weight files from.
#[derive(Debug, Clone)]
pub enum WeightSource {
    /// One file applied to every mesh.
    File(PathBuf),
    Directory(FileIndex),
}

impl WeightSource {
    pub fn open(path: &Path) -> Self {
        if path.is_file() {
            WeightSource::File(path.to_path_buf())
        } else {
            WeightSource::Directory(FileIndex::scan(path))
        }
    }
}

/// Resolves meshes to weight files, remembering "to all" answers across a
/// batch.
#[derive(Debug)]
pub struct Locator {
    source: WeightSource,
    remembered: Option<FallbackDecision>,
}

impl Locator {
    pub fn new(source: WeightSource) -> Self {
        Self {
            source,
            remembered: None,
        }
    }

    pub fn locate(&mut self, mesh: &str, prompter: &mut dyn Prompter) -> Option<PathBuf> {
        let index = match &self.source {
            WeightSource::File(path) => return Some(path.clone()),
            WeightSource::Directory(index) => index,
        };

        if let Some(path) = index.find(mesh) {
            return Some(path.to_path_buf());
        }

        for candidate in index.candidates(&short_name(mesh)) {
            let decision = match self.remembered {
                Some(remembered) => remembered,
                None => prompter.confirm_fallback(mesh, candidate),
            };
            match decision {
                FallbackDecision::Yes => return index.get(candidate).map(Path::to_path_buf),
                FallbackDecision::YesToAll => {
                    self.remembered = Some(decision);
                    return index.get(candidate).map(Path::to_path_buf);
                }
                FallbackDecision::No => continue,
                FallbackDecision::NoToAll => {
                    self.remembered = Some(decision);
                    break;
                }
            }
        }

        warn!("No weight file found for {mesh}");
        None
    }
}
