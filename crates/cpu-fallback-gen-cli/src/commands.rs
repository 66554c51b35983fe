use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cpu_fallback_gen::{
    generate_fallbacks, is_denylisted, registers_fallback, requires_backend_wrapper,
    requires_out_wrapper, FallbackOptions, Manifest,
};
use serde_json::json;
use tracing::info;

/// Files written by a `generate` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub header: PathBuf,
    pub source: PathBuf,
}

pub fn load_options(path: Option<&Path>) -> Result<FallbackOptions> {
    match path {
        Some(path) => FallbackOptions::load(path)
            .with_context(|| format!("failed to load options from {}", path.display())),
        None => Ok(FallbackOptions::default()),
    }
}

pub fn generate(manifest: &Path, out_dir: &Path, options: &FallbackOptions) -> Result<WrittenFiles> {
    let manifest = Manifest::load(manifest)
        .with_context(|| format!("failed to load manifest {}", manifest.display()))?;
    let generated = generate_fallbacks(&manifest.entries, options)?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let header = out_dir.join(&options.header_file);
    let source = out_dir.join(options.source_file());
    fs::write(&header, generated.header)
        .with_context(|| format!("failed to write {}", header.display()))?;
    fs::write(&source, generated.source)
        .with_context(|| format!("failed to write {}", source.display()))?;
    info!(header = %header.display(), source = %source.display(), "wrote fallback sources");

    Ok(WrittenFiles { header, source })
}

/// One line per function: name, then whether it gets a fallback, a
/// registration and an out wrapper.
pub fn list(manifest: &Path, as_json: bool) -> Result<String> {
    let manifest = Manifest::load(manifest)
        .with_context(|| format!("failed to load manifest {}", manifest.display()))?;

    let mut rows = Vec::new();
    for (f, group) in manifest.functions() {
        let name = f.schema().name.to_string();
        let fallback = requires_backend_wrapper(f);
        rows.push(json!({
            "name": name,
            "denylisted": is_denylisted(&name),
            "fallback": fallback,
            "registered": fallback && registers_fallback(f, group),
            "out_wrapper": requires_out_wrapper(&f.schema().name),
        }));
    }

    if as_json {
        return Ok(serde_json::to_string_pretty(&rows)?);
    }
    let mut out = String::new();
    for row in &rows {
        out.push_str(&format!(
            "{:<48} fallback={} registered={} out_wrapper={}\n",
            row["name"].as_str().unwrap_or_default(),
            row["fallback"],
            row["registered"],
            row["out_wrapper"],
        ));
    }
    Ok(out)
}
