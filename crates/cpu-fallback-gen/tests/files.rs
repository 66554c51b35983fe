use cpu_fallback_gen::model::{
    DispatchKey, ExternalBackendFunction, ExternalBackendFunctionsGroup, FallbackInput,
    NativeFunction,
};
use cpu_fallback_gen::{generate_fallbacks, CodegenError, FallbackOptions};

fn cpu_fn(decl: &str) -> ExternalBackendFunction {
    let native = NativeFunction::parse(decl)
        .unwrap()
        .with_dispatch([DispatchKey::Cpu]);
    ExternalBackendFunction::new(native, None)
}

fn inputs() -> Vec<FallbackInput> {
    vec![
        cpu_fn("abs(Tensor self) -> Tensor").into(),
        cpu_fn("cudnn_grid_sampler(Tensor self, Tensor grid) -> Tensor").into(),
        cpu_fn("bar(Tensor[] tensors) -> Tensor[]").into(),
        cpu_fn("neg(Tensor self) -> Tensor").into(),
    ]
}

#[test]
fn header_declares_every_fallback() {
    let options = FallbackOptions::default();
    let generated = generate_fallbacks(&inputs(), &options).unwrap();
    let header = &generated.header;

    assert!(header.contains("#pragma once\n"));
    assert!(header.contains("namespace torch_xla {\n"));
    assert!(header.contains("class AtenXlaTypeDefault {\n public:\n"));
    assert!(header.contains("  static at::Tensor abs(const at::Tensor & self);\n"));
    assert!(header.contains("  static ::std::vector<at::Tensor> bar(at::TensorList tensors);\n"));
    assert!(!header.contains("cudnn"));
    assert!(header.contains("};\n"));
    assert!(header.ends_with("}  // namespace torch_xla\n"));
}

#[test]
fn source_keeps_input_order() {
    let options = FallbackOptions::default();
    let generated = generate_fallbacks(&inputs(), &options).unwrap();
    let source = &generated.source;

    assert!(source.contains("#include \"aten_xla_type_default.h\"\n"));
    assert!(source.contains("#include <torch/library.h>\n"));
    assert!(source.contains("TORCH_LIBRARY_IMPL(aten, XLA, m) {\n"));

    let abs = source.find("AtenXlaTypeDefault::abs(").unwrap();
    let bar = source.find("AtenXlaTypeDefault::bar(").unwrap();
    let neg = source.find("AtenXlaTypeDefault::neg(").unwrap();
    let registrations = source.find("TORCH_LIBRARY_IMPL").unwrap();
    assert!(abs < bar && bar < neg && neg < registrations);

    let reg_abs = source.find("m.impl(\"abs\"").unwrap();
    let reg_neg = source.find("m.impl(\"neg\"").unwrap();
    assert!(registrations < reg_abs && reg_abs < reg_neg);
    assert!(!source.contains("cudnn"));
}

#[test]
fn first_fatal_error_aborts_the_run() {
    let mut inputs = inputs();
    inputs.push(
        ExternalBackendFunctionsGroup {
            functional: cpu_fn("add.Tensor(Tensor self, Tensor other, *, Scalar alpha=1) -> Tensor"),
            inplace: None,
            out: cpu_fn(
                "add.out(Tensor self, Tensor other, *, Scalar alpha=1, Tensor(a!) out) -> Tensor(a!)",
            ),
            structured: true,
        }
        .into(),
    );
    let err = generate_fallbacks(&inputs, &FallbackOptions::default()).unwrap_err();
    assert!(matches!(err, CodegenError::StructuredGroupUnsupported { .. }));
}

#[test]
fn options_choose_namespace_and_dispatch_key() {
    let options = FallbackOptions::from_json_str(
        r#"{
            "class_name": "AtenFooTypeDefault",
            "cpp_namespace": "torch_foo",
            "header_file": "aten_foo_type_default.h",
            "dispatch_key": "PrivateUse1",
            "includes": ["<ATen/ATen.h>"]
        }"#,
    )
    .unwrap();
    assert_eq!(options.source_file(), "aten_foo_type_default.cpp");

    let generated = generate_fallbacks(&inputs(), &options).unwrap();
    assert!(generated.header.contains("class AtenFooTypeDefault {"));
    assert!(generated.source.contains("#include \"aten_foo_type_default.h\"\n"));
    assert!(generated.source.contains("#include <ATen/ATen.h>\n"));
    assert!(!generated.source.contains("torch/library.h"));
    assert!(generated.source.contains("namespace torch_foo {\n"));
    assert!(generated.source.contains("TORCH_LIBRARY_IMPL(aten, PrivateUse1, m) {\n"));
    assert!(generated.source.contains("&AtenFooTypeDefault::abs"));
}

#[test]
fn empty_manifest_renders_empty_shells() {
    let options = FallbackOptions::default();
    let generated = generate_fallbacks(&[], &options).unwrap();
    assert!(generated.header.contains("class AtenXlaTypeDefault {\n public:\n\n};\n"));
    assert!(generated.source.contains("TORCH_LIBRARY_IMPL(aten, XLA, m) {\n}\n"));
}
