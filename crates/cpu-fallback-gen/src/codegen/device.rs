use crate::model::Argument;

use super::{CodegenError, CodegenResult};

/// Picks the argument whose device the wrapped results are placed on.
///
/// Precedence: first non-mutated `Tensor`/`Tensor?`, then the first
/// tensor-like argument of any kind, then the first `Device`/`Device?`.
pub fn device_argument<'a>(op: &str, args: &[&'a Argument]) -> CodegenResult<&'a Argument> {
    let const_tensor = args
        .iter()
        .find(|arg| (arg.ty.is_tensor() || arg.ty.is_optional_tensor()) && !arg.is_write());
    let tensor_like = || args.iter().find(|arg| arg.ty.is_tensor_like());
    let device_like = || args.iter().find(|arg| arg.ty.is_device_like());
    const_tensor
        .or_else(tensor_like)
        .or_else(device_like)
        .copied()
        .ok_or_else(|| CodegenError::NoDeviceArgument { op: op.to_string() })
}
