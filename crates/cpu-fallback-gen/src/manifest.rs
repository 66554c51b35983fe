//! JSON operator manifest consumed by the command line driver.
//!
//! ```json
//! {
//!   "entries": [
//!     { "kind": "function", "func": "abs(Tensor self) -> Tensor", "dispatch": ["CPU", "CUDA"] },
//!     {
//!       "kind": "group",
//!       "structured": false,
//!       "functional": { "func": "add.Tensor(Tensor self, Tensor other, *, Scalar alpha=1) -> Tensor",
//!                       "dispatch": ["CPU"], "metadata": { "kernel": "add" } },
//!       "out": { "func": "add.out(Tensor self, Tensor other, *, Scalar alpha=1, Tensor(a!) out) -> Tensor(a!)",
//!                "dispatch": ["CPU"] }
//!     }
//!   ]
//! }
//! ```

use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::model::{
    BackendMetadata, DispatchKey, ExternalBackendFunction, ExternalBackendFunctionsGroup,
    FallbackInput, NativeFunction, Variant,
};
use crate::parse::SchemaError;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid declaration: {0}")]
    Schema(#[from] SchemaError),
}

/// A function paired with the group it belongs to, if any.
pub type FunctionEntry<'a> = (
    &'a ExternalBackendFunction,
    Option<&'a ExternalBackendFunctionsGroup>,
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<FallbackInput>,
}

impl Manifest {
    pub fn from_json_str(src: &str) -> Result<Self, LoadError> {
        let raw: RawManifest = serde_json::from_str(src)?;
        let entries = raw
            .entries
            .into_iter()
            .map(RawEntry::into_input)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Every function in the manifest, group members included.
    pub fn functions(&self) -> impl Iterator<Item = FunctionEntry<'_>> {
        self.entries
            .iter()
            .flat_map(|entry| -> Vec<FunctionEntry<'_>> {
                match entry {
                    FallbackInput::Function(f) => vec![(f, None)],
                    FallbackInput::Group(g) => g.functions().map(|f| (f, Some(g))).collect(),
                }
            })
    }
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RawEntry {
    Function(RawFunction),
    Group(RawGroup),
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    func: String,
    #[serde(default)]
    dispatch: Vec<DispatchKey>,
    #[serde(default)]
    variants: Vec<Variant>,
    #[serde(default)]
    metadata: Option<BackendMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    #[serde(default)]
    structured: bool,
    functional: RawFunction,
    #[serde(default)]
    inplace: Option<RawFunction>,
    out: RawFunction,
}

impl RawEntry {
    fn into_input(self) -> Result<FallbackInput, SchemaError> {
        match self {
            RawEntry::Function(raw) => Ok(FallbackInput::Function(raw.into_function()?)),
            RawEntry::Group(raw) => Ok(FallbackInput::Group(ExternalBackendFunctionsGroup {
                functional: raw.functional.into_function()?,
                inplace: raw.inplace.map(RawFunction::into_function).transpose()?,
                out: raw.out.into_function()?,
                structured: raw.structured,
            })),
        }
    }
}

impl RawFunction {
    fn into_function(self) -> Result<ExternalBackendFunction, SchemaError> {
        let native = NativeFunction::parse(&self.func)?
            .with_dispatch(self.dispatch)
            .with_variants(self.variants);
        Ok(ExternalBackendFunction::new(native, self.metadata))
    }
}
