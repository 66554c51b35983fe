use crate::config::FallbackOptions;
use crate::model::Argument;

use super::utils::{join_names, push_line};

/// How each tensor-like argument reaches the CPU kernel.
///
/// Tensor lists get one local each (`l_<name>`); optional tensors and plain
/// tensors are packed into one vector per kind and converted in a single call.
/// Anything else is passed through under its own name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalPlan<'a> {
    pub tensor_lists: Vec<(&'a Argument, String)>,
    pub optional_tensors: Vec<(&'a Argument, String)>,
    pub tensors: Vec<(&'a Argument, String)>,
    /// Indices into `tensors` whose arguments the kernel writes through.
    pub update_indices: Vec<usize>,
}

impl<'a> MarshalPlan<'a> {
    pub fn new(args: &[&'a Argument], options: &FallbackOptions) -> Self {
        let prefix = &options.binding_prefix;
        let opt_name = options.opt_name();

        let tensor_lists = args
            .iter()
            .filter(|arg| arg.ty.is_tensor_list())
            .map(|arg| (*arg, format!("l_{}", arg.name)))
            .collect();
        let optional_tensors = args
            .iter()
            .filter(|arg| arg.ty.is_optional_tensor())
            .enumerate()
            .map(|(idx, arg)| (*arg, format!("{opt_name}[{idx}]")))
            .collect();
        let tensors: Vec<(&'a Argument, String)> = args
            .iter()
            .filter(|arg| arg.ty.is_tensor())
            .enumerate()
            .map(|(idx, arg)| (*arg, format!("{prefix}[{idx}]")))
            .collect();
        let update_indices = tensors
            .iter()
            .enumerate()
            .filter(|(_, (arg, _))| arg.is_write())
            .map(|(idx, _)| idx)
            .collect();

        Self {
            tensor_lists,
            optional_tensors,
            tensors,
            update_indices,
        }
    }

    /// Name the CPU call uses for `arg`.
    pub fn binding<'b>(&'b self, arg: &'b Argument) -> &'b str {
        self.tensor_lists
            .iter()
            .chain(self.optional_tensors.iter())
            .chain(self.tensors.iter())
            .find(|(bound, _)| bound.name == arg.name)
            .map(|(_, name)| name.as_str())
            .unwrap_or(arg.name.as_str())
    }

    /// Emits the CPU copies of every bound argument.
    pub fn emit_intermediates(&self, module: &mut String, options: &FallbackOptions) {
        let to_cpu = &options.to_reference_fn;
        for (arg, local) in &self.tensor_lists {
            push_line(module, 1, &format!("auto {local} = {to_cpu}({});", arg.name));
        }
        if !self.tensors.is_empty() {
            let tensors_name = options.tensors_name();
            let names = join_names(self.tensors.iter().map(|(arg, _)| arg.name.as_str()));
            push_line(
                module,
                1,
                &format!("std::vector<at::Tensor> {tensors_name} = {{{names}}};"),
            );
            push_line(
                module,
                1,
                &format!("auto {} = {to_cpu}({tensors_name});", options.binding_prefix),
            );
        }
        if !self.optional_tensors.is_empty() {
            let opt_tensors_name = options.opt_tensors_name();
            let names = join_names(self.optional_tensors.iter().map(|(arg, _)| arg.name.as_str()));
            push_line(
                module,
                1,
                &format!(
                    "std::vector<c10::optional<at::Tensor>> {opt_tensors_name} = {{{names}}};"
                ),
            );
            push_line(
                module,
                1,
                &format!("auto {} = {to_cpu}({opt_tensors_name});", options.opt_name()),
            );
        }
    }
}
