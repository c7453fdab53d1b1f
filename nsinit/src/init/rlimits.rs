use crate::{
    config::{RLimitResource, RLimitValue},
    sys::Syscall,
};
use anyhow::{Context, Result};
use log::debug;
use std::collections::HashMap;

/// Apply the configured resource limits
pub fn apply<S: Syscall>(sys: &S, rlimits: &HashMap<RLimitResource, RLimitValue>) -> Result<()> {
    for (resource, limit) in rlimits {
        let (soft, hard) = limit.limits();
        debug!("Setting {} to {}/{}", resource, soft, hard);
        sys.set_rlimit(resource, soft, hard)
            .with_context(|| format!("failed to set {resource}"))?;
    }
    Ok(())
}
