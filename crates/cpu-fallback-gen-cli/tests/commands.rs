#[path = "../src/commands.rs"]
mod commands;

use std::fs;

use commands::{generate, list, load_options};
use cpu_fallback_gen::FallbackOptions;

const MANIFEST: &str = r#"
{
  "entries": [
    { "kind": "function", "func": "abs(Tensor self) -> Tensor", "dispatch": ["CPU"] },
    { "kind": "function", "func": "cudnn_affine_grid_generator(Tensor theta, int N, int C, int H, int W) -> Tensor", "dispatch": ["CUDA"] },
    {
      "kind": "group",
      "functional": {
        "func": "add.Tensor(Tensor self, Tensor other, *, Scalar alpha=1) -> Tensor",
        "dispatch": ["CPU"],
        "metadata": { "kernel": "add" }
      },
      "out": {
        "func": "add.out(Tensor self, Tensor other, *, Scalar alpha=1, Tensor(a!) out) -> Tensor(a!)",
        "dispatch": ["CPU"]
      }
    }
  ]
}
"#;

fn write_manifest(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("manifest.json");
    fs::write(&path, MANIFEST).expect("write manifest");
    path
}

#[test]
fn generate_writes_header_and_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manifest = write_manifest(&dir);
    let out_dir = dir.path().join("out");

    let written = generate(&manifest, &out_dir, &FallbackOptions::default()).expect("generate");
    assert_eq!(written.header, out_dir.join("aten_xla_type_default.h"));
    assert_eq!(written.source, out_dir.join("aten_xla_type_default.cpp"));

    let header = fs::read_to_string(&written.header).unwrap();
    assert!(header.contains("static at::Tensor abs(const at::Tensor & self);"));
    assert!(header.contains("static at::Tensor & add_out("));

    let source = fs::read_to_string(&written.source).unwrap();
    assert!(source.contains("m.impl(\"abs\""));
    assert!(!source.contains("m.impl(\"add.out\""));
    assert!(source.contains("at::Tensor & AtenXlaTypeDefault::add_out("));
    assert!(!source.contains("cudnn"));
}

#[test]
fn generate_reports_missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let err = generate(
        &dir.path().join("missing.json"),
        dir.path(),
        &FallbackOptions::default(),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("failed to load manifest"));
}

#[test]
fn options_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.json");
    fs::write(&path, r#"{ "header_file": "fallbacks.h" }"#).unwrap();

    let options = load_options(Some(path.as_path())).unwrap();
    assert_eq!(options.header_file, "fallbacks.h");
    assert_eq!(options.class_name, "AtenXlaTypeDefault");
    assert_eq!(load_options(None).unwrap(), FallbackOptions::default());
}

#[test]
fn list_shows_fallback_decisions() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write_manifest(&dir);

    let table = list(&manifest, false).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("abs "));
    assert!(lines[0].ends_with("fallback=true registered=true out_wrapper=true"));
    assert!(lines[1].ends_with("fallback=false registered=false out_wrapper=false"));
    assert!(lines[2].starts_with("add.out "));
    assert!(lines[2].ends_with("fallback=true registered=false out_wrapper=true"));

    let json: serde_json::Value = serde_json::from_str(&list(&manifest, true).unwrap()).unwrap();
    assert_eq!(json[1]["denylisted"], true);
    assert_eq!(json[3]["name"], "add.Tensor");
    assert_eq!(json[3]["registered"], false);
}
