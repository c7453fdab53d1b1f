use crate::sys::Syscall;
use anyhow::{Context, Result};
use log::debug;
use nix::libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use std::path::Path;

/// Rebind stdin, stdout and stderr to the terminal device at `path`
pub fn attach<S: Syscall>(sys: &S, path: &Path) -> Result<()> {
    debug!("Attaching console {}", path.display());
    let fd = sys
        .open(path)
        .with_context(|| format!("failed to open console {}", path.display()))?;
    for target in [STDIN_FILENO, STDOUT_FILENO, STDERR_FILENO] {
        sys.dup2(fd, target)
            .with_context(|| format!("failed to dup console onto {target}"))?;
    }
    if fd > STDERR_FILENO {
        sys.close(fd).context("failed to close console")?;
    }
    Ok(())
}
