use crate::{config::Namespaces, sys::Syscall};
use anyhow::{Context, Result};
use log::debug;

/// Enter every namespace that is configured with a path
pub fn join<S: Syscall>(sys: &S, namespaces: &Namespaces) -> Result<()> {
    for (ty, path) in namespaces.joinable() {
        debug!("Joining {} namespace {}", ty, path.display());
        sys.setns(path, ty)
            .with_context(|| format!("failed to join {} namespace {}", ty, path.display()))?;
    }
    Ok(())
}
