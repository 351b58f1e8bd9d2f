use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use serde_sarif::sarif::{Artifact, ArtifactLocation, ArtifactRoles};
use tracing::{debug, warn};

use crate::ir::AnalysisUnit;

/// Units read from the input, with one SARIF artifact per unit file.
#[derive(Debug)]
pub(crate) struct LoadedInputs {
    pub(crate) units: Vec<AnalysisUnit>,
    pub(crate) artifacts: Vec<Artifact>,
}

/// Loads a unit file, or every `*.json` unit below a directory in path order.
pub(crate) fn load_inputs(input: &Path) -> Result<LoadedInputs> {
    let mut paths = Vec::new();
    if input.is_dir() {
        collect_unit_files(input, &mut paths)?;
    } else if is_unit_file(input) {
        paths.push(input.to_path_buf());
    } else {
        anyhow::bail!("unsupported input file: {}", input.display());
    }

    let role = serde_json::to_value(ArtifactRoles::AnalysisTarget)
        .context("serialize artifact role")?;
    let mut units = Vec::with_capacity(paths.len());
    let mut artifacts = Vec::with_capacity(paths.len());
    for path in paths {
        let data = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let unit = parse_unit(&data).with_context(|| format!("failed to parse {}", path.display()))?;
        debug!(
            path = %path.display(),
            bodies = unit.bodies.len(),
            format_calls = unit.format_calls.len(),
            "loaded unit"
        );
        artifacts.push(unit_artifact(&path, data.len() as u64, role.clone()));
        units.push(unit);
    }
    Ok(LoadedInputs { units, artifacts })
}

fn parse_unit(data: &[u8]) -> Result<AnalysisUnit> {
    let deserializer = &mut serde_json::Deserializer::from_slice(data);
    serde_path_to_error::deserialize(deserializer).map_err(|error| {
        let path = error.path().to_string();
        anyhow::Error::new(error.into_inner()).context(format!("at {path}"))
    })
}

fn collect_unit_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read entry under {}", dir.display()))?;
        entries.push(entry.path());
    }
    entries.sort_by(|a, b| path_key(a).cmp(&path_key(b)));

    for entry in entries {
        if entry.is_dir() {
            collect_unit_files(&entry, paths)?;
        } else if is_unit_file(&entry) {
            paths.push(entry);
        } else {
            warn!(path = %entry.display(), "skipping non-unit file");
        }
    }
    Ok(())
}

fn is_unit_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("json")
}

fn unit_artifact(path: &Path, len: u64, role: Value) -> Artifact {
    let location = ArtifactLocation::builder().uri(path_to_uri(path)).build();
    Artifact::builder()
        .location(location)
        .length(len as i64)
        .roles(vec![role])
        .build()
}

fn path_to_uri(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("file://{}", absolute.to_string_lossy())
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
