//! Read-only operator schema model consumed by the fallback generator.
//!
//! Records here are built once (from declaration strings or a manifest) and
//! never mutated by code generation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Scalar and handle types that can appear in an operator declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseTy {
    Tensor,
    Scalar,
    Int,
    Float,
    Bool,
    Str,
    ScalarType,
    Layout,
    Device,
    MemoryFormat,
    Generator,
    Dimname,
    Storage,
    Stream,
    QScheme,
    ConstQuantizerPtr,
}

impl BaseTy {
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "Tensor" => BaseTy::Tensor,
            "Scalar" => BaseTy::Scalar,
            "int" => BaseTy::Int,
            "float" => BaseTy::Float,
            "bool" => BaseTy::Bool,
            "str" => BaseTy::Str,
            "ScalarType" => BaseTy::ScalarType,
            "Layout" => BaseTy::Layout,
            "Device" => BaseTy::Device,
            "MemoryFormat" => BaseTy::MemoryFormat,
            "Generator" => BaseTy::Generator,
            "Dimname" => BaseTy::Dimname,
            "Storage" => BaseTy::Storage,
            "Stream" => BaseTy::Stream,
            "QScheme" => BaseTy::QScheme,
            "ConstQuantizerPtr" => BaseTy::ConstQuantizerPtr,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BaseTy::Tensor => "Tensor",
            BaseTy::Scalar => "Scalar",
            BaseTy::Int => "int",
            BaseTy::Float => "float",
            BaseTy::Bool => "bool",
            BaseTy::Str => "str",
            BaseTy::ScalarType => "ScalarType",
            BaseTy::Layout => "Layout",
            BaseTy::Device => "Device",
            BaseTy::MemoryFormat => "MemoryFormat",
            BaseTy::Generator => "Generator",
            BaseTy::Dimname => "Dimname",
            BaseTy::Storage => "Storage",
            BaseTy::Stream => "Stream",
            BaseTy::QScheme => "QScheme",
            BaseTy::ConstQuantizerPtr => "ConstQuantizerPtr",
        }
    }
}

/// Declared type of an argument or return.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Base(BaseTy),
    Optional(Box<Type>),
    List { elem: Box<Type>, size: Option<usize> },
}

impl Type {
    pub fn base(ty: BaseTy) -> Self {
        Type::Base(ty)
    }

    pub fn optional(inner: Type) -> Self {
        Type::Optional(Box::new(inner))
    }

    pub fn list(elem: Type, size: Option<usize>) -> Self {
        Type::List {
            elem: Box::new(elem),
            size,
        }
    }

    /// A bare `Tensor`.
    pub fn is_tensor(&self) -> bool {
        matches!(self, Type::Base(BaseTy::Tensor))
    }

    /// `Tensor?`
    pub fn is_optional_tensor(&self) -> bool {
        matches!(self, Type::Optional(inner) if inner.is_tensor())
    }

    /// `Tensor[]`, but not `Tensor?[]`.
    pub fn is_tensor_list(&self) -> bool {
        matches!(self, Type::List { elem, .. } if elem.is_tensor())
    }

    /// Any type that carries tensors, including optionals and lists of them.
    pub fn is_tensor_like(&self) -> bool {
        match self {
            Type::Base(ty) => *ty == BaseTy::Tensor,
            Type::Optional(inner) => inner.is_tensor_like(),
            Type::List { elem, .. } => elem.is_tensor_like(),
        }
    }

    /// `Device` or `Device?`.
    pub fn is_device_like(&self) -> bool {
        match self {
            Type::Base(BaseTy::Device) => true,
            Type::Optional(inner) => matches!(inner.as_ref(), Type::Base(BaseTy::Device)),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Base(ty) => f.write_str(ty.as_str()),
            Type::Optional(inner) => write!(f, "{inner}?"),
            Type::List { elem, size } => match size {
                Some(size) => write!(f, "{elem}[{size}]"),
                None => write!(f, "{elem}[]"),
            },
        }
    }
}

/// Alias annotation such as `(a)` or `(a!)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Annotation {
    pub alias_set: String,
    pub is_write: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Argument {
    pub name: String,
    pub ty: Type,
    pub default: Option<String>,
    pub annotation: Option<Annotation>,
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            annotation: None,
        }
    }

    pub fn with_annotation(mut self, alias_set: impl Into<String>, is_write: bool) -> Self {
        self.annotation = Some(Annotation {
            alias_set: alias_set.into(),
            is_write,
        });
        self
    }

    /// Whether the operator writes through this argument.
    pub fn is_write(&self) -> bool {
        self.annotation.as_ref().is_some_and(|ann| ann.is_write)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Return {
    pub name: Option<String>,
    pub ty: Type,
    pub annotation: Option<Annotation>,
}

impl Return {
    /// Reference returns alias a mutated argument and are already in backend form.
    pub fn is_write(&self) -> bool {
        self.annotation.as_ref().is_some_and(|ann| ann.is_write)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Arguments {
    pub positional: Vec<Argument>,
    pub kwarg_only: Vec<Argument>,
    pub out: Vec<Argument>,
}

impl Arguments {
    /// All arguments in declaration order.
    pub fn flat(&self) -> Vec<&Argument> {
        self.positional
            .iter()
            .chain(self.kwarg_only.iter())
            .chain(self.out.iter())
            .collect()
    }
}

/// Python operators with an augmented-assignment form (`__iadd__` and friends).
pub const AUGMENTED_ASSIGNMENT_NAMES: &[&str] = &[
    "add", "sub", "mul", "div", "mod", "pow", "lshift", "rshift", "and", "or", "xor",
];

/// `base[_][.overload]`, e.g. `add_.Tensor`.
///
/// Dunder names keep their underscores out of `base`: `__iand__` is the
/// inplace form of `and` with `dunder_method` set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperatorName {
    pub base: String,
    pub inplace: bool,
    pub dunder_method: bool,
    pub overload: String,
}

impl OperatorName {
    pub fn parse(name: &str) -> Self {
        let (op, overload) = match name.split_once('.') {
            Some((op, overload)) => (op, overload.to_string()),
            None => (name, String::new()),
        };
        let dunder = op
            .strip_prefix("__")
            .and_then(|rest| rest.strip_suffix("__"))
            .filter(|inner| !inner.is_empty());
        let (base, inplace, dunder_method) = match dunder {
            Some(inner) => match inner.strip_prefix('i') {
                Some(aug) if AUGMENTED_ASSIGNMENT_NAMES.contains(&aug) => {
                    (aug.to_string(), true, true)
                }
                _ => (inner.to_string(), false, true),
            },
            None => match op.strip_suffix('_') {
                Some(stripped) => (stripped.to_string(), true, false),
                None => (op.to_string(), false, false),
            },
        };
        Self {
            base,
            inplace,
            dunder_method,
            overload,
        }
    }

    /// Operator name without overload, e.g. `add_` or `__iand__`.
    pub fn unqualified(&self) -> String {
        match (self.dunder_method, self.inplace) {
            (true, true) => format!("__i{}__", self.base),
            (true, false) => format!("__{}__", self.base),
            (false, true) => format!("{}_", self.base),
            (false, false) => self.base.clone(),
        }
    }
}

impl fmt::Display for OperatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unqualified())?;
        if !self.overload.is_empty() {
            write!(f, ".{}", self.overload)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSchema {
    pub name: OperatorName,
    pub arguments: Arguments,
    pub returns: Vec<Return>,
}

impl FunctionSchema {
    pub fn is_out_fn(&self) -> bool {
        !self.arguments.out.is_empty()
    }

    /// Arguments in the order the dispatcher passes them.
    pub fn dispatcher_order_arguments(&self) -> Vec<&Argument> {
        self.arguments.flat()
    }
}

/// Dispatch table key a native function registers a kernel under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DispatchKey {
    Cpu,
    Cuda,
    QuantizedCpu,
    QuantizedCuda,
    SparseCpu,
    SparseCuda,
    MkldnnCpu,
    Meta,
    Math,
    DefaultBackend,
    CompositeImplicitAutograd,
    CompositeExplicitAutograd,
    Other(String),
}

impl DispatchKey {
    pub fn from_name(name: &str) -> Self {
        match name {
            "CPU" => DispatchKey::Cpu,
            "CUDA" => DispatchKey::Cuda,
            "QuantizedCPU" => DispatchKey::QuantizedCpu,
            "QuantizedCUDA" => DispatchKey::QuantizedCuda,
            "SparseCPU" => DispatchKey::SparseCpu,
            "SparseCUDA" => DispatchKey::SparseCuda,
            "MkldnnCPU" => DispatchKey::MkldnnCpu,
            "Meta" => DispatchKey::Meta,
            "Math" => DispatchKey::Math,
            "DefaultBackend" => DispatchKey::DefaultBackend,
            "CompositeImplicitAutograd" => DispatchKey::CompositeImplicitAutograd,
            "CompositeExplicitAutograd" => DispatchKey::CompositeExplicitAutograd,
            other => DispatchKey::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DispatchKey::Cpu => "CPU",
            DispatchKey::Cuda => "CUDA",
            DispatchKey::QuantizedCpu => "QuantizedCPU",
            DispatchKey::QuantizedCuda => "QuantizedCUDA",
            DispatchKey::SparseCpu => "SparseCPU",
            DispatchKey::SparseCuda => "SparseCUDA",
            DispatchKey::MkldnnCpu => "MkldnnCPU",
            DispatchKey::Meta => "Meta",
            DispatchKey::Math => "Math",
            DispatchKey::DefaultBackend => "DefaultBackend",
            DispatchKey::CompositeImplicitAutograd => "CompositeImplicitAutograd",
            DispatchKey::CompositeExplicitAutograd => "CompositeExplicitAutograd",
            DispatchKey::Other(name) => name,
        }
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DispatchKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(DispatchKey::from_name(&name))
    }
}

/// Generic keys name backend-agnostic (composite) kernels that never need a fallback.
pub fn is_generic_dispatch_key(key: &DispatchKey) -> bool {
    matches!(
        key,
        DispatchKey::Math
            | DispatchKey::DefaultBackend
            | DispatchKey::CompositeImplicitAutograd
            | DispatchKey::CompositeExplicitAutograd
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Function,
    Method,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeFunction {
    pub func: FunctionSchema,
    pub dispatch: Vec<DispatchKey>,
    pub variants: BTreeSet<Variant>,
}

impl NativeFunction {
    /// A function with no explicit dispatch table is a composite kernel.
    pub fn new(func: FunctionSchema) -> Self {
        Self {
            func,
            dispatch: vec![DispatchKey::CompositeImplicitAutograd],
            variants: BTreeSet::from([Variant::Function]),
        }
    }

    pub fn with_dispatch(mut self, keys: impl IntoIterator<Item = DispatchKey>) -> Self {
        let keys: Vec<DispatchKey> = keys.into_iter().collect();
        if !keys.is_empty() {
            self.dispatch = keys;
        }
        self
    }

    pub fn with_variants(mut self, variants: impl IntoIterator<Item = Variant>) -> Self {
        let variants: BTreeSet<Variant> = variants.into_iter().collect();
        if !variants.is_empty() {
            self.variants = variants;
        }
        self
    }

    /// Method-only operators are called on their first argument.
    pub fn is_method_only(&self) -> bool {
        !self.variants.contains(&Variant::Function)
    }
}

/// Present when the external backend ships its own kernel for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendMetadata {
    pub kernel: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalBackendFunction {
    pub native_function: NativeFunction,
    pub metadata: Option<BackendMetadata>,
}

impl ExternalBackendFunction {
    pub fn new(native_function: NativeFunction, metadata: Option<BackendMetadata>) -> Self {
        Self {
            native_function,
            metadata,
        }
    }

    pub fn schema(&self) -> &FunctionSchema {
        &self.native_function.func
    }
}

/// Functional / inplace / out variants of one operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalBackendFunctionsGroup {
    pub functional: ExternalBackendFunction,
    pub inplace: Option<ExternalBackendFunction>,
    pub out: ExternalBackendFunction,
    pub structured: bool,
}

impl ExternalBackendFunctionsGroup {
    pub fn functions(&self) -> impl Iterator<Item = &ExternalBackendFunction> {
        [Some(&self.out), Some(&self.functional), self.inplace.as_ref()]
            .into_iter()
            .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackInput {
    Function(ExternalBackendFunction),
    Group(ExternalBackendFunctionsGroup),
}

impl From<ExternalBackendFunction> for FallbackInput {
    fn from(f: ExternalBackendFunction) -> Self {
        FallbackInput::Function(f)
    }
}

impl From<ExternalBackendFunctionsGroup> for FallbackInput {
    fn from(g: ExternalBackendFunctionsGroup) -> Self {
        FallbackInput::Group(g)
    }
}
