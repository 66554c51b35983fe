use crate::config::FallbackOptions;

use super::marshal::MarshalPlan;
use super::utils::{join_names, push_block, push_line};

/// Copies CPU results back into the backend tensors the kernel mutated.
///
/// The destination is not resized before the copy; callers are expected to
/// pass correctly sized outputs.
pub fn emit_copy_back(module: &mut String, plan: &MarshalPlan<'_>, options: &FallbackOptions) {
    if plan.update_indices.is_empty() {
        return;
    }
    let indices_name = options.update_indices_name();
    let tensors_name = options.tensors_name();
    let cpu_name = &options.binding_prefix;
    let copy_back = &options.copy_back_fn;
    let indices: Vec<String> = plan.update_indices.iter().map(|idx| idx.to_string()).collect();

    push_line(
        module,
        1,
        &format!(
            "std::vector<size_t> {indices_name} = {{{}}};",
            join_names(indices.iter().map(String::as_str))
        ),
    );
    // TODO: re-enable the destination resize once shape-changing out= kernels
    // are confirmed to need it; it is emitted commented out until then.
    let block = format!(
        r#"
            for (size_t i : {indices_name}) {{
              // if ({tensors_name}[i].sizes() != {cpu_name}[i].sizes()) {tensors_name}[i].resize_({cpu_name}[i].sizes());
              {copy_back}({cpu_name}[i], {tensors_name}[i]);
            }}
        "#
    );
    push_block(module, 1, &block);
}
