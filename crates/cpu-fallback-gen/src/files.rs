use rayon::prelude::*;
use tracing::info;

use crate::codegen::{CodegenResult, GenExternalFallback, Target};
use crate::config::FallbackOptions;
use crate::model::FallbackInput;

/// Contents of the generated header and source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFallbacks {
    pub header: String,
    pub source: String,
}

#[derive(Debug, Default)]
struct FallbackTexts {
    declarations: Vec<String>,
    registrations: Vec<String>,
    definitions: Vec<String>,
}

/// Runs all three targets over `inputs`.
///
/// Entries are generated in parallel; the output keeps input order and the
/// first fatal error aborts the run.
pub fn generate_fallbacks(
    inputs: &[FallbackInput],
    options: &FallbackOptions,
) -> CodegenResult<GeneratedFallbacks> {
    let declarations = GenExternalFallback::new(Target::Declaration, options);
    let registrations = GenExternalFallback::new(Target::Registration, options);
    let definitions = GenExternalFallback::new(Target::Definition, options);

    let per_input = inputs
        .par_iter()
        .map(|input| -> CodegenResult<FallbackTexts> {
            Ok(FallbackTexts {
                declarations: declarations.generate(input)?,
                registrations: registrations.generate(input)?,
                definitions: definitions.generate(input)?,
            })
        })
        .collect::<CodegenResult<Vec<_>>>()?;

    let mut texts = FallbackTexts::default();
    for entry in per_input {
        texts.declarations.extend(entry.declarations);
        texts.registrations.extend(entry.registrations);
        texts.definitions.extend(entry.definitions);
    }
    info!(
        declarations = texts.declarations.len(),
        registrations = texts.registrations.len(),
        definitions = texts.definitions.len(),
        "generated cpu fallbacks"
    );

    Ok(GeneratedFallbacks {
        header: render_header(&texts.declarations, options),
        source: render_source(&texts.definitions, &texts.registrations, options),
    })
}

pub fn render_header(declarations: &[String], options: &FallbackOptions) -> String {
    let class = &options.class_name;
    let namespace = &options.cpp_namespace;
    let declarations = declarations.join("\n");
    format!(
        r#"// {header}
// @generated by cpu-fallback-gen. Do not edit directly.
#pragma once

#include <ATen/Tensor.h>

namespace {namespace} {{

// CPU fallbacks for operators the {label} backend does not implement.
class {class} {{
 public:
{declarations}
}};

}}  // namespace {namespace}
"#,
        header = options.header_file,
        label = options.backend_label,
    )
}

pub fn render_source(
    definitions: &[String],
    registrations: &[String],
    options: &FallbackOptions,
) -> String {
    let namespace = &options.cpp_namespace;
    let includes = options
        .includes
        .iter()
        .map(|include| format!("#include {include}"))
        .collect::<Vec<_>>()
        .join("\n");
    let definitions = definitions.join("\n");
    let registrations = registrations.concat();
    format!(
        r#"// @generated by cpu-fallback-gen. Do not edit directly.
#include "{header}"

{includes}

namespace {namespace} {{

{definitions}
TORCH_LIBRARY_IMPL(aten, {key}, m) {{
{registrations}}}

}}  // namespace {namespace}
"#,
        header = options.header_file,
        key = options.dispatch_key,
    )
}
