//! Batch export, import and bind over a list of meshes.
//!
//! Every operation walks its meshes one at a time, polling a [`CancelFlag`]
//! between items. Per-item problems land in the returned [`BatchReport`];
//! only conditions that make the whole batch pointless are returned as
//! errors.

use std::{
    collections::BTreeSet,
    fs,
    io,
    path::{Path, PathBuf},
    time::Instant,
};

use log::{info, warn};
use serde::Serialize;

use crate::{
    error::{Result, WeightError},
    host::{CancelFlag, JointResolution, OverwriteDecision, Prompter, SkinHost},
    locate::{Locator, WeightSource, mesh_relative_path},
    settings::{ExportOptions, ImportOptions, OverwritePolicy},
    weights::{JointMismatch, RemapRequest, compare_joints, read_weight_file, remap, write_weight_file},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemNote {
    pub item: String,
    pub reason: String,
}

/// Tally of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<ItemNote>,
    pub failed: Vec<ItemNote>,
    /// The caller cancelled before every item was visited.
    pub cancelled: bool,
    pub elapsed_ms: u128,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} skipped, {} failed{} in {:.2}s",
            self.succeeded.len(),
            self.skipped.len(),
            self.failed.len(),
            if self.cancelled { " (cancelled)" } else { "" },
            self.elapsed_ms as f64 / 1000.0
        )
    }

    /// Nothing was skipped or failed.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty() && !self.cancelled
    }

    fn record(&mut self, item: &str, result: Result<Outcome>) {
        match result {
            Ok(Outcome::Done) => self.succeeded.push(item.to_string()),
            Ok(Outcome::Skipped(reason)) => {
                warn!("Skipping {item}: {reason}");
                self.skipped.push(ItemNote {
                    item: item.to_string(),
                    reason,
                });
            }
            Err(err) => {
                warn!("Failed {item}: {err}");
                self.failed.push(ItemNote {
                    item: item.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
}

#[derive(Debug)]
enum Outcome {
    Done,
    Skipped(String),
}

fn run_batch<F>(label: &str, meshes: &[String], cancel: &CancelFlag, mut per_item: F) -> BatchReport
where
    F: FnMut(&str) -> Result<Outcome>,
{
    let started = Instant::now();
    let mut report = BatchReport::default();
    for (position, mesh) in meshes.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(
                "{label} cancelled, {} of {} items not processed",
                meshes.len() - position,
                meshes.len()
            );
            report.cancelled = true;
            break;
        }
        info!("{label} {mesh} ({}/{})", position + 1, meshes.len());
        let result = per_item(mesh);
        report.record(mesh, result);
    }
    report.elapsed_ms = started.elapsed().as_millis();
    info!("{label} finished: {}", report.summary());
    report
}

fn require_source(source: &Path) -> Result<()> {
    if source.exists() {
        return Ok(());
    }
    Err(WeightError::io(
        source,
        io::Error::new(io::ErrorKind::NotFound, "specified path not found"),
    ))
}

// ─── Export ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// Exactly one mesh written to this file.
    File(PathBuf),
    /// Each mesh written below this directory, mirroring its hierarchy.
    Directory(PathBuf),
}

/// Export the weights of every mesh through the host's native writer.
///
/// Returns an error when `target` cannot serve the request at all: a file
/// target with more than one mesh, or a directory that cannot be created.
pub fn export_weights(
    host: &mut dyn SkinHost,
    prompter: &mut dyn Prompter,
    meshes: &[String],
    target: &ExportTarget,
    options: &ExportOptions,
    cancel: &CancelFlag,
) -> Result<BatchReport> {
    let mut policy = options.overwrite;
    let report = match target {
        ExportTarget::File(path) => {
            if meshes.len() != 1 {
                return Err(WeightError::Precondition(format!(
                    "a single export file needs exactly one mesh, got {}",
                    meshes.len()
                )));
            }
            run_batch("Export", meshes, cancel, |mesh| {
                export_one(&mut *host, &mut *prompter, mesh, path, &mut policy)
            })
        }
        ExportTarget::Directory(dir) => {
            fs::create_dir_all(dir).map_err(|source| WeightError::io(dir, source))?;
            run_batch("Export", meshes, cancel, |mesh| {
                let path = dir.join(mesh_relative_path(mesh));
                export_one(&mut *host, &mut *prompter, mesh, &path, &mut policy)
            })
        }
    };
    Ok(report)
}

fn export_one(
    host: &mut dyn SkinHost,
    prompter: &mut dyn Prompter,
    mesh: &str,
    path: &Path,
    policy: &mut OverwritePolicy,
) -> Result<Outcome> {
    let Some(binding) = host.find_binding(mesh) else {
        return Ok(Outcome::Skipped(format!(
            "could not find a skin binding on {mesh}"
        )));
    };

    if path.exists() {
        let metadata = fs::metadata(path).map_err(|source| WeightError::io(path, source))?;
        if metadata.permissions().readonly() {
            return Ok(Outcome::Skipped(format!(
                "{} is not writable, check permissions",
                path.display()
            )));
        }
        match *policy {
            OverwritePolicy::Always => {}
            OverwritePolicy::Never => {
                return Ok(Outcome::Skipped(format!(
                    "{} already exists",
                    path.display()
                )));
            }
            OverwritePolicy::Ask => match prompter.confirm_overwrite(path) {
                OverwriteDecision::Yes => {}
                OverwriteDecision::YesToAll => *policy = OverwritePolicy::Always,
                OverwriteDecision::No => {
                    return Ok(Outcome::Skipped(format!(
                        "declined overwriting {}",
                        path.display()
                    )));
                }
            },
        }
    } else if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| WeightError::io(parent, source))?;
    }

    info!("Writing {}", path.display());
    host.export_weights(path, &binding)?;
    Ok(Outcome::Done)
}

// ─── Import ──────────────────────────────────────────────────────────────────

/// Apply weight files to meshes, remapping joints the live binding lacks.
///
/// `source` is either one weight file used for every mesh or a directory
/// searched per mesh. Remapped copies are staged in
/// [`ImportOptions::staging_dir`] and removed afterwards unless
/// [`ImportOptions::clean_up`] is off.
pub fn import_weights(
    host: &mut dyn SkinHost,
    prompter: &mut dyn Prompter,
    meshes: &[String],
    source: &Path,
    options: &ImportOptions,
    cancel: &CancelFlag,
) -> Result<BatchReport> {
    require_source(source)?;
    let mut locator = Locator::new(WeightSource::open(source));
    let staging = options.staging_dir();
    let mut staged = Vec::new();

    let report = run_batch("Import", meshes, cancel, |mesh| {
        import_one(
            &mut *host,
            &mut *prompter,
            &mut locator,
            mesh,
            options,
            &staging,
            &mut staged,
        )
    });

    if options.clean_up {
        remove_staged(&staged);
    } else if !staged.is_empty() {
        info!(
            "Keeping {} remapped files in {}",
            staged.len(),
            staging.display()
        );
    }
    Ok(report)
}

fn import_one(
    host: &mut dyn SkinHost,
    prompter: &mut dyn Prompter,
    locator: &mut Locator,
    mesh: &str,
    options: &ImportOptions,
    staging: &Path,
    staged: &mut Vec<PathBuf>,
) -> Result<Outcome> {
    let Some(path) = locator.locate(mesh, prompter) else {
        return Ok(Outcome::Skipped(format!("no weight file found for {mesh}")));
    };
    let Some(binding) = host.find_binding(mesh) else {
        return Ok(Outcome::Skipped(format!(
            "could not find a skin binding on {mesh}"
        )));
    };

    let file = read_weight_file(&path)?;
    let live = host.binding_joints(&binding)?;
    let mismatch = compare_joints(&file, &live);
    let Some(request) = resolve_mismatch(&mismatch, &path, prompter)? else {
        return Ok(Outcome::Skipped(format!(
            "skipped {} at user request",
            path.display()
        )));
    };

    let import_path = if request.is_empty() {
        path
    } else {
        info!("Remapping {} joint pairs for {mesh}", request.len());
        fs::create_dir_all(staging).map_err(|source| WeightError::io(staging, source))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "weights.xml".to_string());
        let staged_path = staging.join(format!("{}-{file_name}", staged.len()));
        write_weight_file(&remap(file, &request), &staged_path)?;
        staged.push(staged_path.clone());
        info!("New path is {}", staged_path.display());
        staged_path
    };

    host.import_weights(&import_path, &binding, options.method)?;
    host.normalize_weights(&binding, mesh)?;
    info!("Imported {} to {mesh}", import_path.display());
    Ok(Outcome::Done)
}

/// Turn a joint mismatch into remap pairs.
///
/// Joints the file lacks are paired with themselves so the host finds a block
/// for every live joint. Joints the binding lacks need a substitute from the
/// prompter; `None` means the file should be skipped.
fn resolve_mismatch(
    mismatch: &JointMismatch,
    path: &Path,
    prompter: &mut dyn Prompter,
) -> Result<Option<RemapRequest>> {
    let mut request = RemapRequest::default();
    for joint in &mismatch.missing_from_file {
        request.push(joint.clone(), joint.clone())?;
    }
    for joint in &mismatch.missing_from_live {
        match prompter.resolve_joint(joint, path) {
            JointResolution::Substitute(target) => request.push(joint.clone(), target)?,
            JointResolution::SkipFile => return Ok(None),
        }
    }
    Ok(Some(request))
}

fn remove_staged(staged: &[PathBuf]) {
    let unique: BTreeSet<&PathBuf> = staged.iter().collect();
    for path in unique {
        if let Err(err) = fs::remove_file(path) {
            warn!("Failed to clean up {}: {err}", path.display());
        }
    }
}

// ─── Bind ────────────────────────────────────────────────────────────────────

/// Bind each mesh to the joints its weight file names that exist in the
/// scene.
pub fn bind_from_file(
    host: &mut dyn SkinHost,
    prompter: &mut dyn Prompter,
    meshes: &[String],
    source: &Path,
    cancel: &CancelFlag,
) -> Result<BatchReport> {
    require_source(source)?;
    let mut locator = Locator::new(WeightSource::open(source));

    Ok(run_batch("Bind", meshes, cancel, |mesh| {
        let Some(path) = locator.locate(mesh, &mut *prompter) else {
            return Ok(Outcome::Skipped(format!("no weight file found for {mesh}")));
        };
        let file = read_weight_file(&path)?;
        let joints: Vec<String> = file
            .joints()
            .into_iter()
            .filter(|joint| host.joint_exists(joint))
            .collect();
        if joints.is_empty() {
            return Ok(Outcome::Skipped(format!(
                "none of the joints in {} exist in the scene",
                path.display()
            )));
        }
        let binding = host.bind(&joints, mesh)?;
        info!("Bound {mesh} to {} joints as {binding}", joints.len());
        Ok(Outcome::Done)
    }))
}
