use crate::config::FallbackOptions;
use crate::model::{Argument, ExternalBackendFunction};
use crate::signature::faithful_name;

use super::marshal::MarshalPlan;

/// The CPU kernel invocation for one fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceCall {
    /// Full statement, including the trailing `;`.
    pub statement: String,
    /// Set when the result is bound to the result temporary.
    pub captures_result: bool,
}

/// Builds the call through the faithful C++ API.
///
/// Method-only operators are invoked on their first argument, everything else
/// through the reference namespace.
pub fn reference_call(
    f: &ExternalBackendFunction,
    args: &[&Argument],
    plan: &MarshalPlan<'_>,
    options: &FallbackOptions,
) -> ReferenceCall {
    let schema = f.schema();
    let callee = faithful_name(schema);
    let bindings: Vec<&str> = args.iter().map(|arg| plan.binding(arg)).collect();

    let call = match bindings.split_first() {
        Some((receiver, rest)) if f.native_function.is_method_only() => {
            format!("{receiver}.{callee}({})", rest.join(", "))
        }
        _ => format!(
            "{}::{callee}({})",
            options.reference_namespace,
            bindings.join(", ")
        ),
    };

    let captures_result = !schema.returns.is_empty();
    let statement = if captures_result {
        format!("auto&& {} = {call};", options.result_name)
    } else {
        format!("{call};")
    };
    ReferenceCall {
        statement,
        captures_result,
    }
}
