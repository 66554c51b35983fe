//! C++ signature rendering for the dispatcher calling convention.

use crate::model::{Argument, BaseTy, FunctionSchema, NativeFunction, Return, Type};

pub struct DispatcherSignature<'a> {
    func: &'a FunctionSchema,
}

impl<'a> DispatcherSignature<'a> {
    pub fn from_schema(func: &'a FunctionSchema) -> Self {
        Self { func }
    }

    /// Unambiguous C++ symbol, e.g. `add__Tensor` for `add_.Tensor`.
    pub fn name(&self) -> String {
        let name = &self.func.name;
        if name.overload.is_empty() {
            name.unqualified()
        } else {
            format!("{}_{}", name.unqualified(), name.overload)
        }
    }

    pub fn arguments(&self) -> Vec<&'a Argument> {
        self.func.dispatcher_order_arguments()
    }

    pub fn returns_type(&self) -> String {
        returns_type(&self.func.returns)
    }

    pub fn decl(&self) -> String {
        self.defn(&self.name())
    }

    pub fn defn(&self, name: &str) -> String {
        let args = self
            .arguments()
            .iter()
            .map(|arg| format!("{} {}", argument_type(arg), arg.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {name}({args})", self.returns_type())
    }

    pub fn ptr_type(&self) -> String {
        let args = self
            .arguments()
            .iter()
            .map(|arg| argument_type(arg))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} (*)({args})", self.returns_type())
    }
}

/// Name of the faithful C++ API entry point (out arguments last).
pub fn faithful_name(func: &FunctionSchema) -> String {
    let name = func.name.unqualified();
    if func.is_out_fn() {
        format!("{name}_outf")
    } else {
        name
    }
}

/// Names the generated code uses for each return value.
pub fn return_names(f: &NativeFunction, fallback_name: &str) -> Vec<String> {
    let func = &f.func;
    let arg_names: Vec<&str> = func
        .arguments
        .flat()
        .into_iter()
        .map(|arg| arg.name.as_str())
        .collect();
    func.returns
        .iter()
        .enumerate()
        .map(|(idx, ret)| {
            if func.name.inplace {
                "self".to_string()
            } else if let Some(out) = func.arguments.out.get(idx) {
                out.name.clone()
            } else if let Some(name) = ret.name.as_deref() {
                if arg_names.contains(&name) {
                    format!("{name}_return")
                } else {
                    name.to_string()
                }
            } else if func.returns.len() == 1 {
                fallback_name.to_string()
            } else {
                format!("{fallback_name}{idx}")
            }
        })
        .collect()
}

pub fn argument_type(arg: &Argument) -> String {
    match &arg.ty {
        Type::Base(BaseTy::Tensor) if arg.is_write() => "at::Tensor &".to_string(),
        Type::Base(BaseTy::Tensor) => "const at::Tensor &".to_string(),
        Type::Base(BaseTy::Scalar) => "const at::Scalar &".to_string(),
        Type::Optional(inner) => match inner.as_ref() {
            Type::Base(BaseTy::Tensor) => "const c10::optional<at::Tensor> &".to_string(),
            Type::Base(BaseTy::Scalar) => "const c10::optional<at::Scalar> &".to_string(),
            other => format!("c10::optional<{}>", value_type(other)),
        },
        Type::List { elem, .. } if elem.is_optional_tensor() => {
            "const c10::List<c10::optional<at::Tensor>> &".to_string()
        }
        other => value_type(other),
    }
}

fn value_type(ty: &Type) -> String {
    match ty {
        Type::Base(base) => base_type(*base).to_string(),
        Type::Optional(inner) => format!("c10::optional<{}>", value_type(inner)),
        Type::List { elem, size } => match (elem.as_ref(), size) {
            (Type::Base(BaseTy::Tensor), _) => "at::TensorList".to_string(),
            (Type::Base(BaseTy::Int), _) => "at::IntArrayRef".to_string(),
            (Type::Base(BaseTy::Dimname), _) => "at::DimnameList".to_string(),
            (Type::Base(BaseTy::Bool), Some(size)) => format!("::std::array<bool,{size}>"),
            (elem, _) => format!("at::ArrayRef<{}>", value_type(elem)),
        },
    }
}

fn base_type(base: BaseTy) -> &'static str {
    match base {
        BaseTy::Tensor => "at::Tensor",
        BaseTy::Scalar => "at::Scalar",
        BaseTy::Int => "int64_t",
        BaseTy::Float => "double",
        BaseTy::Bool => "bool",
        BaseTy::Str => "c10::string_view",
        BaseTy::ScalarType => "at::ScalarType",
        BaseTy::Layout => "at::Layout",
        BaseTy::Device => "at::Device",
        BaseTy::MemoryFormat => "at::MemoryFormat",
        BaseTy::Generator => "at::Generator",
        BaseTy::Dimname => "at::Dimname",
        BaseTy::Storage => "at::Storage",
        BaseTy::Stream => "at::Stream",
        BaseTy::QScheme => "at::QScheme",
        BaseTy::ConstQuantizerPtr => "at::ConstQuantizerPtr",
    }
}

fn return_type(ret: &Return) -> String {
    match &ret.ty {
        Type::Base(BaseTy::Tensor) if ret.is_write() => "at::Tensor &".to_string(),
        Type::List { elem, .. } => format!("::std::vector<{}>", value_type(elem)),
        other => value_type(other),
    }
}

pub fn returns_type(returns: &[Return]) -> String {
    match returns {
        [] => "void".to_string(),
        [single] => return_type(single),
        many => format!(
            "::std::tuple<{}>",
            many.iter().map(return_type).collect::<Vec<_>>().join(",")
        ),
    }
}
