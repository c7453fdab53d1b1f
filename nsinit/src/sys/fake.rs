//! Recording [`Syscall`] implementation for tests.

use super::Syscall;
use crate::config::{NamespaceType, RLimitResource};
use caps::Capability;
use itertools::Itertools;
use nix::{errno::Errno, mount::MsFlags, sys::signal::Signal, unistd::Pid};
use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
    ffi::{CStr, CString},
    io,
    os::unix::prelude::RawFd,
    path::Path,
    rc::Rc,
};

/// Descriptor returned by `open`
pub(crate) const CONSOLE_FD: RawFd = 10;

/// Records every call as a line of text. A call whose line starts with the
/// configured prefix fails with the configured errno. Clones share the log
/// and the parent death signal.
#[derive(Clone)]
pub(crate) struct FakeSyscall {
    events: Rc<RefCell<Vec<String>>>,
    failure: Option<(&'static str, Errno)>,
    pdeath: Rc<Cell<Option<Signal>>>,
    ppid: Pid,
}

impl FakeSyscall {
    pub fn new() -> FakeSyscall {
        FakeSyscall {
            events: Rc::default(),
            failure: None,
            pdeath: Rc::new(Cell::new(Some(Signal::SIGKILL))),
            ppid: Pid::from_raw(42),
        }
    }

    pub fn failing(prefix: &'static str) -> FakeSyscall {
        FakeSyscall::failing_with(prefix, Errno::EPERM)
    }

    pub fn failing_with(prefix: &'static str, errno: Errno) -> FakeSyscall {
        FakeSyscall {
            failure: Some((prefix, errno)),
            ..FakeSyscall::new()
        }
    }

    pub fn with_ppid(mut self, ppid: i32) -> FakeSyscall {
        self.ppid = Pid::from_raw(ppid);
        self
    }

    pub fn with_pdeath(self, signal: Option<Signal>) -> FakeSyscall {
        self.pdeath.set(signal);
        self
    }

    pub fn pdeath(&self) -> Option<Signal> {
        self.pdeath.get()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    /// Index of the first event starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.events.borrow().iter().position(|e| e.starts_with(prefix))
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }

    fn record(&self, event: String) -> io::Result<()> {
        let result = match self.failure {
            Some((prefix, errno)) if event.starts_with(prefix) => Err(errno.into()),
            _ => Ok(()),
        };
        self.events.borrow_mut().push(event);
        result
    }
}

fn names(set: &HashSet<Capability>) -> String {
    set.iter().map(ToString::to_string).sorted().join(",")
}

fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

impl Syscall for FakeSyscall {
    fn setns(&self, path: &Path, ty: NamespaceType) -> io::Result<()> {
        self.record(format!("setns {} {}", ty, path.display()))
    }

    fn open(&self, path: &Path) -> io::Result<RawFd> {
        self.record(format!("open {}", path.display()))
            .map(|()| CONSOLE_FD)
    }

    fn dup2(&self, fd: RawFd, target: RawFd) -> io::Result<()> {
        self.record(format!("dup2 {fd} {target}"))
    }

    fn close(&self, fd: RawFd) -> io::Result<()> {
        self.record(format!("close {fd}"))
    }

    fn setsid(&self) -> io::Result<()> {
        self.record("setsid".into())
    }

    fn setctty(&self) -> io::Result<()> {
        self.record("setctty".into())
    }

    fn set_rlimit(&self, resource: &RLimitResource, soft: u64, hard: u64) -> io::Result<()> {
        self.record(format!("setrlimit {resource} {soft} {hard}"))
    }

    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> io::Result<()> {
        self.record(format!(
            "mount {} {} {} {:?} {}",
            opt(source.map(Path::display)),
            target.display(),
            opt(fstype),
            flags,
            opt(data)
        ))
    }

    fn pivot_root(&self, root: &Path) -> io::Result<()> {
        self.record(format!("pivot_root {}", root.display()))
    }

    fn chdir(&self, path: &Path) -> io::Result<()> {
        self.record(format!("chdir {}", path.display()))
    }

    fn sethostname(&self, hostname: &str) -> io::Result<()> {
        self.record(format!("sethostname {hostname}"))
    }

    fn write_attr(&self, path: &Path, value: &[u8]) -> io::Result<()> {
        self.record(format!(
            "write_attr {} {}",
            path.display(),
            String::from_utf8_lossy(value)
        ))
    }

    fn get_parent_death_signal(&self) -> io::Result<Option<Signal>> {
        self.record("get_pdeathsig".into())
            .map(|()| self.pdeath.get())
    }

    fn set_parent_death_signal(&self, signal: Option<Signal>) -> io::Result<()> {
        self.record(format!("set_pdeathsig {}", opt(signal)))?;
        self.pdeath.set(signal);
        Ok(())
    }

    fn close_exec_from(&self, fd: RawFd) -> io::Result<()> {
        self.record(format!("close_exec_from {fd}"))
    }

    fn set_keep_caps(&self, keep: bool) -> io::Result<()> {
        self.record(format!("set_keep_caps {keep}"))
    }

    fn setgroups(&self, groups: &[u32]) -> io::Result<()> {
        self.record(format!("setgroups {}", groups.iter().join(",")))
    }

    fn setresgid(&self, gid: u32) -> io::Result<()> {
        self.record(format!("setresgid {gid}"))?;
        // The kernel resets the parent death signal on credential changes
        self.pdeath.set(None);
        Ok(())
    }

    fn setresuid(&self, uid: u32) -> io::Result<()> {
        self.record(format!("setresuid {uid}"))?;
        self.pdeath.set(None);
        Ok(())
    }

    fn drop_bounding(&self, keep: &HashSet<Capability>) -> io::Result<()> {
        self.record(format!("drop_bounding {}", names(keep)))
    }

    fn set_capabilities(&self, set: &HashSet<Capability>) -> io::Result<()> {
        self.record(format!("set_capabilities {}", names(set)))
    }

    fn getppid(&self) -> Pid {
        self.ppid
    }

    fn getpid(&self) -> Pid {
        Pid::from_raw(4711)
    }

    fn kill(&self, pid: Pid, signal: Signal) -> io::Result<()> {
        self.record(format!("kill {pid} {signal}"))
    }

    fn execve(&self, path: &CStr, args: &[CString], env: &[CString]) -> io::Result<()> {
        self.record(format!(
            "execve {} [{}] [{}]",
            path.to_string_lossy(),
            args.iter().map(|a| a.to_string_lossy()).join(" "),
            env.iter().map(|e| e.to_string_lossy()).join(" ")
        ))
    }
}
