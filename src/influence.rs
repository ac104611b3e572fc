//! Per-vertex influence limits.
//!
//! Game engines usually cap the joints that may move one vertex (often four).
//! These helpers find meshes breaking that cap and zero out the weakest extra
//! influences.

use log::{info, warn};
use serde::Serialize;

use crate::{
    batch::{BatchReport, ItemNote},
    error::{Result, WeightError},
    host::{CancelFlag, SkinHost},
};

/// Parse a user-supplied influence limit.
pub fn parse_limit(text: &str) -> Result<usize> {
    match text.trim().parse::<usize>() {
        Ok(0) => Err(WeightError::Precondition(
            "influence limit must be at least 1".to_string(),
        )),
        Ok(limit) => Ok(limit),
        Err(_) => Err(WeightError::Precondition(format!(
            "influence limit must be an integer, got '{text}'"
        ))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InfluenceReport {
    pub clean: Vec<String>,
    /// At least one vertex exceeds the limit.
    pub unclean: Vec<String>,
}

/// Non-zero influences of one vertex, weakest first.
fn ranked_influences(
    host: &dyn SkinHost,
    binding: &str,
    mesh: &str,
    vertex: usize,
) -> Result<Vec<(String, f64)>> {
    let mut influences: Vec<(String, f64)> = host
        .vertex_influences(binding, mesh, vertex)?
        .into_iter()
        .filter(|(_, value)| *value > 0.0)
        .collect();
    influences.sort_by(|a, b| a.1.total_cmp(&b.1));
    Ok(influences)
}

/// Resolve binding and vertex count, or explain why the mesh is skipped.
fn skinned_mesh(host: &dyn SkinHost, mesh: &str) -> std::result::Result<(String, usize), String> {
    let binding = host
        .find_binding(mesh)
        .ok_or_else(|| format!("could not find a skin binding on {mesh}"))?;
    let vertices = host
        .vertex_count(mesh)
        .ok_or_else(|| format!("{mesh} is not a poly object"))?;
    Ok((binding, vertices))
}

pub fn check_vertex_influences(
    host: &dyn SkinHost,
    limit: usize,
    meshes: &[String],
    cancel: &CancelFlag,
) -> Result<InfluenceReport> {
    let mut report = InfluenceReport::default();
    for mesh in meshes {
        if cancel.is_cancelled() {
            warn!("Influence check cancelled");
            break;
        }
        let (binding, vertices) = match skinned_mesh(host, mesh) {
            Ok(found) => found,
            Err(reason) => {
                warn!("{reason}");
                continue;
            }
        };

        let mut over_limit = false;
        for vertex in 0..vertices {
            if ranked_influences(host, &binding, mesh, vertex)?.len() > limit {
                over_limit = true;
                break;
            }
        }
        if over_limit {
            report.unclean.push(mesh.clone());
        } else {
            report.clean.push(mesh.clone());
        }
    }
    info!(
        "{} meshes within {limit} influences, {} over",
        report.clean.len(),
        report.unclean.len()
    );
    Ok(report)
}

/// Zero the weakest influences of every vertex above `limit`.
///
/// Weights are not renormalized here; that is left to the host's own
/// normalization.
pub fn prune_vertex_influences(
    host: &mut dyn SkinHost,
    limit: usize,
    meshes: &[String],
    cancel: &CancelFlag,
) -> BatchReport {
    let mut report = BatchReport::default();
    for mesh in meshes {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let (binding, vertices) = match skinned_mesh(host, mesh) {
            Ok(found) => found,
            Err(reason) => {
                warn!("Skipping {mesh}: {reason}");
                report.skipped.push(ItemNote {
                    item: mesh.clone(),
                    reason,
                });
                continue;
            }
        };

        info!("Cleaning {mesh}");
        match prune_mesh(host, &binding, mesh, vertices, limit) {
            Ok(pruned) => {
                info!("Pruned {pruned} influences on {mesh}");
                report.succeeded.push(mesh.clone());
            }
            Err(err) => {
                warn!("Failed {mesh}: {err}");
                report.failed.push(ItemNote {
                    item: mesh.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    report
}

fn prune_mesh(
    host: &mut dyn SkinHost,
    binding: &str,
    mesh: &str,
    vertices: usize,
    limit: usize,
) -> Result<usize> {
    let mut pruned = 0;
    for vertex in 0..vertices {
        let influences = ranked_influences(host, binding, mesh, vertex)?;
        let excess = influences.len().saturating_sub(limit);
        for (joint, _) in influences.iter().take(excess) {
            host.set_vertex_weight(binding, mesh, vertex, joint, 0.0)?;
        }
        pruned += excess;
    }
    Ok(pruned)
}
