use crate::config::{NamespaceType, RLimitResource};
use caps::Capability;
use nix::{mount::MsFlags, sys::signal::Signal, unistd::Pid};
use std::{
    collections::HashSet,
    ffi::{CStr, CString},
    io,
    os::unix::prelude::RawFd,
    path::Path,
};

#[cfg(test)]
pub(crate) mod fake;
mod linux;

pub use linux::LinuxSyscall;

/// Kernel primitives used while setting up the container process. The init
/// pipeline only talks to the kernel through this trait.
pub trait Syscall {
    /// Enter the namespace referenced by `path`
    fn setns(&self, path: &Path, ty: NamespaceType) -> io::Result<()>;

    /// Open `path` read write and close-on-exec
    fn open(&self, path: &Path) -> io::Result<RawFd>;

    /// Duplicate `fd` onto `target`
    fn dup2(&self, fd: RawFd, target: RawFd) -> io::Result<()>;

    /// Close `fd`
    fn close(&self, fd: RawFd) -> io::Result<()>;

    /// Create a new session and become its leader
    fn setsid(&self) -> io::Result<()>;

    /// Make the terminal on stdin the controlling terminal of the session
    fn setctty(&self) -> io::Result<()>;

    /// Set soft and hard limit of `resource`
    fn set_rlimit(&self, resource: &RLimitResource, soft: u64, hard: u64) -> io::Result<()>;

    /// mount(2)
    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> io::Result<()>;

    /// Make `root` the new root and detach the old one
    fn pivot_root(&self, root: &Path) -> io::Result<()>;

    /// Change the working directory
    fn chdir(&self, path: &Path) -> io::Result<()>;

    /// Set the hostname of the UTS namespace
    fn sethostname(&self, hostname: &str) -> io::Result<()>;

    /// Write `value` to a procfs attribute file
    fn write_attr(&self, path: &Path, value: &[u8]) -> io::Result<()>;

    /// Current parent death signal
    fn get_parent_death_signal(&self) -> io::Result<Option<Signal>>;

    /// Set or clear the parent death signal
    fn set_parent_death_signal(&self, signal: Option<Signal>) -> io::Result<()>;

    /// Mark all descriptors starting from `fd` close-on-exec
    fn close_exec_from(&self, fd: RawFd) -> io::Result<()>;

    /// Keep the permitted capabilities across uid changes
    fn set_keep_caps(&self, keep: bool) -> io::Result<()>;

    /// Set the supplementary groups
    fn setgroups(&self, groups: &[u32]) -> io::Result<()>;

    /// Set real, effective and saved gid
    fn setresgid(&self, gid: u32) -> io::Result<()>;

    /// Set real, effective and saved uid
    fn setresuid(&self, uid: u32) -> io::Result<()>;

    /// Drop all capabilities not in `keep` from the bounding set
    fn drop_bounding(&self, keep: &HashSet<Capability>) -> io::Result<()>;

    /// Set the effective, permitted, inheritable and ambient set to `set`
    fn set_capabilities(&self, set: &HashSet<Capability>) -> io::Result<()>;

    /// Pid of the parent process
    fn getppid(&self) -> Pid;

    /// Pid of the calling process
    fn getpid(&self) -> Pid;

    /// Send `signal` to `pid`
    fn kill(&self, pid: Pid, signal: Signal) -> io::Result<()>;

    /// Replace the process image. Returns only on failure unless implemented
    /// by a test double.
    fn execve(&self, path: &CStr, args: &[CString], env: &[CString]) -> io::Result<()>;
}
