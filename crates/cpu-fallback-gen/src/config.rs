use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::manifest::LoadError;
use crate::model::OperatorName;

/// Operators that never get a CPU fallback, matched against the start of the
/// qualified operator name.
// TODO: drop this table once the CPU fallback is a boxed kernel and these ops
// can register fallthroughs instead.
pub const FN_DENYLIST_REGEX: &[&str] = &[
    r"[^(]*cudnn",
    r"slow_conv_transpose2d_backward.grad_output",
    r"slow_conv_transpose3d_backward.grad_output",
    r"slow_conv3d_backward.grad_input",
    r"thnn_conv2d_backward.grad_input",
    r"thnn_conv_depthwise2d_backward.grad_input",
];

// TODO: derive the out-wrapper set from the operator manifest and remove this list.
pub const FN_OUT: &[&str] = &[
    "abs",
    "add",
    "acos",
    "acosh",
    "asin",
    "asinh",
    "atan",
    "atan2",
    "atanh",
    "baddbmm",
    "bernoulli",
    "binary_cross_entropy",
    "binary_cross_entropy_backward",
    "clamp",
    "div",
    "gather",
    "ger",
    "hardsigmoid",
    "kthvalue",
    "index_select",
    "inverse",
    "log",
    "masked_select",
    "maximum",
    "minimum",
    "pow",
    "prod",
    "nonzero",
    "round",
    "normal",
    "std",
    "take",
    "topk",
    "var",
];

static DENYLIST: Lazy<Vec<Regex>> = Lazy::new(|| {
    FN_DENYLIST_REGEX
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})")).expect("invalid fallback denylist pattern")
        })
        .collect()
});

pub fn is_denylisted(qualified_name: &str) -> bool {
    DENYLIST.iter().any(|re| re.is_match(qualified_name))
}

pub fn requires_out_wrapper(name: &OperatorName) -> bool {
    FN_OUT.contains(&name.base.as_str())
}

/// Names of the backend bridge API and the layout of the generated files.
///
/// Defaults produce the XLA fallback sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackOptions {
    pub class_name: String,
    pub cpp_namespace: String,
    pub header_file: String,
    pub backend_label: String,
    pub dispatch_key: String,
    pub reference_namespace: String,
    pub binding_prefix: String,
    pub result_name: String,
    pub to_reference_fn: String,
    pub device_wrap_fn: String,
    pub device_arg_fn: String,
    pub copy_back_fn: String,
    pub track_macro: String,
    pub counter_macro: String,
    pub vlog_macro: String,
    pub log_level: u32,
    pub includes: Vec<String>,
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self {
            class_name: "AtenXlaTypeDefault".to_string(),
            cpp_namespace: "torch_xla".to_string(),
            header_file: "aten_xla_type_default.h".to_string(),
            backend_label: "XLA".to_string(),
            dispatch_key: "XLA".to_string(),
            reference_namespace: "at".to_string(),
            binding_prefix: "xlatens".to_string(),
            result_name: "x_result".to_string(),
            to_reference_fn: "to_cpu".to_string(),
            device_wrap_fn: "to_device_opt".to_string(),
            device_arg_fn: "get_device_arg".to_string(),
            copy_back_fn: "at::_copy_from_and_resize".to_string(),
            track_macro: "XLA_FN_TRACK".to_string(),
            counter_macro: "XLA_COUNTER".to_string(),
            vlog_macro: "TF_VLOG".to_string(),
            log_level: 3,
            includes: vec![
                "<ATen/Context.h>".to_string(),
                "<ATen/Functions.h>".to_string(),
                "<ATen/core/Tensor.h>".to_string(),
                "<torch/library.h>".to_string(),
                "\"torch_xla/csrc/aten_cpu_fallback.h\"".to_string(),
                "\"torch_xla/csrc/aten_xla_bridge.h\"".to_string(),
                "\"torch_xla/csrc/function_call_tracker.h\"".to_string(),
            ],
        }
    }
}

impl FallbackOptions {
    pub fn from_json_str(src: &str) -> Result<Self, LoadError> {
        serde_json::from_str(src).map_err(LoadError::from)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Source file name, derived from the header name.
    pub fn source_file(&self) -> String {
        match self.header_file.strip_suffix(".h") {
            Some(stem) => format!("{stem}.cpp"),
            None => format!("{}.cpp", self.header_file),
        }
    }

    pub(crate) fn tensors_name(&self) -> String {
        format!("{}_tensors", self.binding_prefix)
    }

    pub(crate) fn opt_name(&self) -> String {
        format!("{}_opt", self.binding_prefix)
    }

    pub(crate) fn opt_tensors_name(&self) -> String {
        format!("{}_opt_tensors", self.binding_prefix)
    }

    pub(crate) fn update_indices_name(&self) -> String {
        format!("{}_update_indices", self.binding_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylist_matches_from_start_of_name() {
        assert!(is_denylisted("cudnn_convolution"));
        assert!(is_denylisted("cudnn_batch_norm_backward"));
        assert!(is_denylisted("slow_conv3d_backward.grad_input"));
        assert!(!is_denylisted("slow_conv3d_backward.output_mask"));
        assert!(!is_denylisted("add.Tensor"));
    }

    #[test]
    fn out_wrapper_list_uses_base_name() {
        assert!(requires_out_wrapper(&OperatorName::parse("add.out")));
        assert!(requires_out_wrapper(&OperatorName::parse("topk.values")));
        assert!(!requires_out_wrapper(&OperatorName::parse("mul.out")));
    }

    #[test]
    fn partial_options_keep_defaults() {
        let options =
            FallbackOptions::from_json_str(r#"{"class_name": "AtenFooTypeDefault"}"#).unwrap();
        assert_eq!(options.class_name, "AtenFooTypeDefault");
        assert_eq!(options.binding_prefix, "xlatens");
        assert_eq!(options.tensors_name(), "xlatens_tensors");
    }
}
