use tracing::debug;

use crate::config::is_denylisted;
use crate::model::{is_generic_dispatch_key, ExternalBackendFunction};

/// Whether `f` gets a generated CPU fallback wrapper at all.
///
/// Kernels the backend already implements still get one: those kernels call
/// into the fallback for inputs they cannot handle.
pub fn requires_backend_wrapper(f: &ExternalBackendFunction) -> bool {
    let name = f.schema().name.to_string();
    if is_denylisted(&name) {
        debug!(op = %name, "fallback skipped: operator is denylisted");
        return false;
    }
    let requires_lowering = !f
        .native_function
        .dispatch
        .iter()
        .any(is_generic_dispatch_key);
    let has_backend_lowering = f.metadata.is_some();
    if !(requires_lowering || has_backend_lowering) {
        debug!(op = %name, "fallback skipped: composite kernel without backend lowering");
        return false;
    }
    true
}
