use crate::config::FallbackOptions;
use crate::model::{ExternalBackendFunction, FunctionSchema, Return};
use crate::signature::{return_names, DispatcherSignature};

/// Only fresh tensors and tensor lists come back from the CPU kernel in CPU
/// form. Reference returns alias an argument that is already a backend tensor.
pub fn requires_device_wrap(ret: &Return) -> bool {
    (ret.ty.is_tensor() && !ret.is_write()) || ret.ty.is_tensor_list()
}

/// The written argument a reference return aliases, matched on alias set.
fn aliased_argument<'a>(schema: &'a FunctionSchema, ret: &Return) -> Option<&'a str> {
    let alias_set = &ret.annotation.as_ref()?.alias_set;
    schema
        .dispatcher_order_arguments()
        .into_iter()
        .find(|arg| {
            arg.is_write()
                && arg
                    .annotation
                    .as_ref()
                    .is_some_and(|ann| &ann.alias_set == alias_set)
        })
        .map(|arg| arg.name.as_str())
}

fn wrap_return(
    ret: &Return,
    ret_name: &str,
    cpu_result: &str,
    device_arg: &str,
    options: &FallbackOptions,
) -> String {
    if requires_device_wrap(ret) {
        format!(
            "{}({cpu_result}, {}({device_arg}))",
            options.device_wrap_fn, options.device_arg_fn
        )
    } else if ret.is_write() {
        ret_name.to_string()
    } else {
        cpu_result.to_string()
    }
}

/// Expression returned from the fallback, or `None` for `void` operators.
pub fn return_expression(
    f: &ExternalBackendFunction,
    sig: &DispatcherSignature<'_>,
    device_arg: &str,
    options: &FallbackOptions,
) -> Option<String> {
    let schema = f.schema();
    let returns = &schema.returns;
    let result = &options.result_name;
    // Reference returns always name the backend argument they alias, never
    // the CPU temporary.
    let names: Vec<String> = return_names(&f.native_function, result)
        .into_iter()
        .zip(returns.iter())
        .map(|(name, ret)| match aliased_argument(schema, ret) {
            Some(arg) if ret.is_write() => arg.to_string(),
            _ => name,
        })
        .collect();
    match returns.as_slice() {
        [] => None,
        [single] => Some(wrap_return(single, &names[0], result, device_arg, options)),
        many => {
            let parts = many
                .iter()
                .zip(names.iter())
                .enumerate()
                .map(|(idx, (ret, name))| {
                    let component = format!("std::get<{idx}>({result})");
                    wrap_return(ret, name, &component, device_arg, options)
                })
                .collect::<Vec<_>>()
                .join(", ");
            Some(format!("{}({parts})", sig.returns_type()))
        }
    }
}
