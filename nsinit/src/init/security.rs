use crate::sys::Syscall;
use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

const APPARMOR_EXEC: &str = "/proc/self/attr/exec";
const LABEL_EXEC: &str = "/proc/thread-self/attr/exec";

/// Request the AppArmor `profile` to be applied on the next exec. An empty
/// profile leaves the confinement unchanged.
pub fn apply_profile<S: Syscall>(sys: &S, profile: &str) -> Result<()> {
    if profile.is_empty() {
        return Ok(());
    }
    debug!("Applying apparmor profile {}", profile);
    sys.write_attr(Path::new(APPARMOR_EXEC), format!("exec {profile}").as_bytes())
        .with_context(|| format!("failed to apply apparmor profile {profile}"))
}

/// Set the SELinux label of the next exec. An empty label is a no-op.
pub fn set_process_label<S: Syscall>(sys: &S, label: &str) -> Result<()> {
    if label.is_empty() {
        return Ok(());
    }
    debug!("Setting process label {}", label);
    sys.write_attr(Path::new(LABEL_EXEC), label.as_bytes())
        .with_context(|| format!("failed to set process label {label}"))
}
