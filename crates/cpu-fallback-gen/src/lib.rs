//! Generator for CPU fallback kernels of an external tensor backend.
//!
//! Given the operator declarations of a backend manifest, the generator emits
//! C++ that copies the inputs of an unimplemented operator to CPU, runs the
//! CPU kernel and hands the results back as backend tensors.

pub mod codegen;
pub mod config;
pub mod files;
pub mod manifest;
pub mod model;
mod parse;
pub mod signature;

pub use codegen::{
    registers_fallback, requires_backend_wrapper, CodegenError, CodegenResult, GenExternalFallback,
    Target,
};
pub use config::{is_denylisted, requires_out_wrapper, FallbackOptions};
pub use files::{generate_fallbacks, GeneratedFallbacks};
pub use manifest::{LoadError, Manifest};
pub use model::{
    BackendMetadata, ExternalBackendFunction, ExternalBackendFunctionsGroup, FallbackInput,
    FunctionSchema, NativeFunction,
};
pub use parse::SchemaError;
