use cpu_fallback_gen::model::{DispatchKey, FallbackInput, Variant};
use cpu_fallback_gen::{LoadError, Manifest, SchemaError};

const MANIFEST: &str = r#"
{
  "entries": [
    { "kind": "function", "func": "abs(Tensor self) -> Tensor", "dispatch": ["CPU", "CUDA"] },
    {
      "kind": "function",
      "func": "set_.source_Storage(Tensor(a!) self, Storage source) -> Tensor(a!)",
      "dispatch": ["CPU"],
      "variants": ["method"]
    },
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

#[test]
fn loads_functions_and_groups() {
    let manifest = Manifest::from_json_str(MANIFEST).expect("valid manifest");
    assert_eq!(manifest.entries.len(), 3);

    let FallbackInput::Function(abs) = &manifest.entries[0] else {
        panic!("expected a function entry");
    };
    assert_eq!(
        abs.native_function.dispatch,
        vec![DispatchKey::Cpu, DispatchKey::Cuda]
    );
    assert!(abs.metadata.is_none());

    let FallbackInput::Function(set) = &manifest.entries[1] else {
        panic!("expected a function entry");
    };
    assert!(set.native_function.variants.contains(&Variant::Method));
    assert!(set.native_function.is_method_only());

    let FallbackInput::Group(group) = &manifest.entries[2] else {
        panic!("expected a group entry");
    };
    assert!(!group.structured);
    assert!(group.inplace.is_none());
    assert_eq!(
        group.functional.metadata.as_ref().map(|m| m.kernel.as_str()),
        Some("add")
    );
}

#[test]
fn functions_flatten_groups_in_member_order() {
    let manifest = Manifest::from_json_str(MANIFEST).unwrap();
    let names: Vec<(String, bool)> = manifest
        .functions()
        .map(|(f, group)| (f.schema().name.to_string(), group.is_some()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("abs".to_string(), false),
            ("set_.source_Storage".to_string(), false),
            ("add.out".to_string(), true),
            ("add.Tensor".to_string(), true),
        ]
    );
}

#[test]
fn missing_dispatch_means_composite() {
    let manifest = Manifest::from_json_str(
        r#"{ "entries": [ { "kind": "function", "func": "relu(Tensor self) -> Tensor" } ] }"#,
    )
    .unwrap();
    let (f, _) = manifest.functions().next().unwrap();
    assert_eq!(
        f.native_function.dispatch,
        vec![DispatchKey::CompositeImplicitAutograd]
    );
}

#[test]
fn unknown_dispatch_keys_are_kept() {
    let manifest = Manifest::from_json_str(
        r#"{ "entries": [ { "kind": "function", "func": "relu(Tensor self) -> Tensor", "dispatch": ["XLA"] } ] }"#,
    )
    .unwrap();
    let (f, _) = manifest.functions().next().unwrap();
    assert_eq!(
        f.native_function.dispatch,
        vec![DispatchKey::Other("XLA".to_string())]
    );
}

#[test]
fn bad_declaration_is_reported() {
    let err = Manifest::from_json_str(
        r#"{ "entries": [ { "kind": "function", "func": "relu(Banana self) -> Tensor" } ] }"#,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        LoadError::Schema(SchemaError::UnknownType(ref ty)) if ty == "Banana"
    ));
}

#[test]
fn unknown_entry_kind_is_a_json_error() {
    let err = Manifest::from_json_str(r#"{ "entries": [ { "kind": "alias", "func": "x" } ] }"#)
        .unwrap_err();
    assert!(matches!(err, LoadError::Json(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = Manifest::load("/nonexistent/manifest.json").unwrap_err();
    assert!(matches!(err, LoadError::Io(_)));
}
