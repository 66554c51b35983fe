//! CPU fallback emission.
//!
//! For every operator the external backend may be asked to run, the generator
//! produces three pieces of text that must agree with each other: a static
//! declaration on the fallback class, a `m.impl(...)` registration, and the
//! definition that moves the arguments to CPU, calls the CPU kernel and moves
//! the results back.

mod call;
mod device;
mod eligibility;
mod marshal;
mod mutation;
mod returns;
mod utils;

use thiserror::Error;
use tracing::{debug, trace};

use crate::config::FallbackOptions;
use crate::model::{ExternalBackendFunction, ExternalBackendFunctionsGroup, FallbackInput};
use crate::signature::DispatcherSignature;

pub use call::{reference_call, ReferenceCall};
pub use device::device_argument;
pub use eligibility::requires_backend_wrapper;
pub use marshal::MarshalPlan;
pub use returns::{requires_device_wrap, return_expression};

use mutation::emit_copy_back;
use utils::push_line;

/// Fatal generator errors. Both indicate a manifest the generator cannot
/// serve and abort the whole run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("{op}: need a tensor-like or device argument in order to determine the output device")]
    NoDeviceArgument { op: String },
    #[error("{op}: CPU fallbacks for structured operator groups are not implemented")]
    StructuredGroupUnsupported { op: String },
}

pub type CodegenResult<T> = Result<T, CodegenError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Declaration,
    Registration,
    Definition,
}

pub struct GenExternalFallback<'a> {
    pub target: Target,
    pub options: &'a FallbackOptions,
}

impl<'a> GenExternalFallback<'a> {
    pub fn new(target: Target, options: &'a FallbackOptions) -> Self {
        Self { target, options }
    }

    /// Text for every member of `input` that produced any, in member order.
    pub fn generate(&self, input: &FallbackInput) -> CodegenResult<Vec<String>> {
        let generated = match input {
            FallbackInput::Function(f) => vec![self.generate_function(f, None)?],
            FallbackInput::Group(g) => {
                if g.structured {
                    return Err(CodegenError::StructuredGroupUnsupported {
                        op: g.functional.schema().name.to_string(),
                    });
                }
                g.functions()
                    .map(|f| self.generate_function(f, Some(g)))
                    .collect::<CodegenResult<Vec<_>>>()?
            }
        };
        Ok(generated
            .into_iter()
            .filter(|text| !text.is_empty())
            .collect())
    }

    /// Text for one function; empty when the function contributes nothing to
    /// this target.
    pub fn generate_function(
        &self,
        f: &ExternalBackendFunction,
        group: Option<&ExternalBackendFunctionsGroup>,
    ) -> CodegenResult<String> {
        if !requires_backend_wrapper(f) {
            return Ok(String::new());
        }
        let sig = DispatcherSignature::from_schema(f.schema());
        trace!(op = %f.schema().name, kind = ?self.target, "generating fallback");
        match self.target {
            Target::Declaration => Ok(format!("  static {};", sig.decl())),
            Target::Registration => Ok(self.registration(f, group, &sig)),
            Target::Definition => self.definition(f, &sig),
        }
    }

    fn registration(
        &self,
        f: &ExternalBackendFunction,
        group: Option<&ExternalBackendFunctionsGroup>,
        sig: &DispatcherSignature<'_>,
    ) -> String {
        if !registers_fallback(f, group) {
            debug!(op = %f.schema().name, "registration skipped: backend kernel exists");
            return String::new();
        }
        format!(
            "  m.impl(\"{}\", static_cast<{}>(&{}::{}));\n",
            f.schema().name,
            sig.ptr_type(),
            self.options.class_name,
            sig.name()
        )
    }

    fn definition(
        &self,
        f: &ExternalBackendFunction,
        sig: &DispatcherSignature<'_>,
    ) -> CodegenResult<String> {
        let options = self.options;
        let schema = f.schema();
        let name = sig.name();
        let args = schema.dispatcher_order_arguments();
        let device_arg = if schema.returns.is_empty() {
            None
        } else {
            Some(device_argument(&schema.name.to_string(), &args)?)
        };
        let plan = MarshalPlan::new(&args, options);
        let call = reference_call(f, &args, &plan, options);

        let mut module = String::new();
        let qualified = format!("{}::{name}", options.class_name);
        push_line(&mut module, 0, &format!("{} {{", sig.defn(&qualified)));
        emit_prologue(&mut module, &name, &plan, options);
        plan.emit_intermediates(&mut module, options);
        push_line(&mut module, 1, &call.statement);
        emit_copy_back(&mut module, &plan, options);
        if call.captures_result {
            push_line(
                &mut module,
                1,
                &format!(
                    "static_cast<void>({}); // Avoid warnings in case not used",
                    options.result_name
                ),
            );
        }
        if let Some(device_arg) = device_arg {
            if let Some(expr) = return_expression(f, sig, &device_arg.name, options) {
                push_line(&mut module, 1, &format!("return {expr};"));
            }
        }
        push_line(&mut module, 0, "}");
        Ok(module)
    }
}

/// Whether the fallback for `f` is registered with the dispatcher.
///
/// Out and inplace wrappers around a functional backend kernel are registered
/// alongside that kernel, not here.
pub fn registers_fallback(
    f: &ExternalBackendFunction,
    group: Option<&ExternalBackendFunctionsGroup>,
) -> bool {
    let functional_has_kernel = group.is_some_and(|g| g.functional.metadata.is_some());
    f.metadata.is_none() && !functional_has_kernel
}

fn emit_prologue(module: &mut String, name: &str, plan: &MarshalPlan<'_>, options: &FallbackOptions) {
    let level = options.log_level;
    let print_args: String = plan
        .tensors
        .iter()
        .map(|(arg, _)| format!(" << \" {0}=\" << {0}.toString()", arg.name))
        .collect();
    push_line(module, 1, &format!("{}({level});", options.track_macro));
    push_line(
        module,
        1,
        &format!("{}(\"aten::{name}\", 1);", options.counter_macro),
    );
    push_line(
        module,
        1,
        &format!(
            "{}({level}) << \"{} {name} :\"{print_args};",
            options.vlog_macro, options.backend_label
        ),
    );
}
