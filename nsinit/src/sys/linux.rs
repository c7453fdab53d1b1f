use super::Syscall;
use crate::config::{NamespaceType, RLimitResource};
use caps::{CapSet, Capability};
use log::debug;
use nix::{
    errno::Errno,
    fcntl::{self, FcntlArg, FdFlag, OFlag},
    libc,
    mount::{self, MntFlags, MsFlags},
    sched,
    sys::{prctl, signal, signal::Signal, stat::Mode},
    unistd::{self, Gid, Pid, Uid},
};
use std::{
    collections::HashSet,
    ffi::{CStr, CString},
    fs,
    io::{self, Write},
    os::unix::prelude::RawFd,
    path::Path,
};

/// Linux implementation of [`Syscall`]
#[derive(Clone, Copy, Debug, Default)]
pub struct LinuxSyscall;

fn caps_error(e: caps::errors::CapsError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

impl Syscall for LinuxSyscall {
    fn setns(&self, path: &Path, ty: NamespaceType) -> io::Result<()> {
        let file = fs::File::open(path)?;
        sched::setns(&file, ty.clone_flag())?;
        Ok(())
    }

    fn open(&self, path: &Path) -> io::Result<RawFd> {
        let fd = fcntl::open(path, OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty())?;
        Ok(fd)
    }

    fn dup2(&self, fd: RawFd, target: RawFd) -> io::Result<()> {
        unistd::dup2(fd, target)?;
        Ok(())
    }

    fn close(&self, fd: RawFd) -> io::Result<()> {
        unistd::close(fd)?;
        Ok(())
    }

    fn setsid(&self) -> io::Result<()> {
        unistd::setsid()?;
        Ok(())
    }

    fn setctty(&self) -> io::Result<()> {
        let result = unsafe { libc::ioctl(libc::STDIN_FILENO, libc::TIOCSCTTY, 0) };
        Errno::result(result).map(drop)?;
        Ok(())
    }

    fn set_rlimit(&self, resource: &RLimitResource, soft: u64, hard: u64) -> io::Result<()> {
        resource.resource().set(soft, hard)
    }

    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> io::Result<()> {
        mount::mount(source, target, fstype, flags, data)?;
        Ok(())
    }

    fn pivot_root(&self, root: &Path) -> io::Result<()> {
        let newroot = fcntl::open(root, OFlag::O_DIRECTORY | OFlag::O_RDONLY, Mode::empty())?;

        // Passing the same path twice stacks the old root on top of the new
        // one. The old root is then unmounted from that very path which saves
        // a temporary put_old directory.
        unistd::pivot_root(root, root)?;

        // Slave the old root so that the unmount does not propagate to the host
        mount::mount(
            None::<&str>,
            "/",
            None::<&str>,
            MsFlags::MS_SLAVE | MsFlags::MS_REC,
            None::<&str>,
        )?;
        mount::umount2("/", MntFlags::MNT_DETACH)?;

        unistd::fchdir(newroot)?;
        unistd::close(newroot)?;
        Ok(())
    }

    fn chdir(&self, path: &Path) -> io::Result<()> {
        unistd::chdir(path)?;
        Ok(())
    }

    fn sethostname(&self, hostname: &str) -> io::Result<()> {
        unistd::sethostname(hostname)?;
        Ok(())
    }

    fn write_attr(&self, path: &Path, value: &[u8]) -> io::Result<()> {
        fs::OpenOptions::new().write(true).open(path)?.write_all(value)
    }

    fn get_parent_death_signal(&self) -> io::Result<Option<Signal>> {
        Ok(prctl::get_pdeathsig()?)
    }

    fn set_parent_death_signal(&self, signal: Option<Signal>) -> io::Result<()> {
        prctl::set_pdeathsig(signal)?;
        Ok(())
    }

    fn close_exec_from(&self, fd: RawFd) -> io::Result<()> {
        let fds = fs::read_dir("/proc/self/fd")?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<RawFd>().ok())
            .filter(|candidate| *candidate >= fd)
            .collect::<Vec<_>>();

        for fd in fds {
            match fcntl::fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)) {
                // The descriptor of the read_dir iterator is gone
                Ok(_) | Err(Errno::EBADF) => (),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn set_keep_caps(&self, keep: bool) -> io::Result<()> {
        caps::securebits::set_keepcaps(keep).map_err(caps_error)
    }

    fn setgroups(&self, groups: &[u32]) -> io::Result<()> {
        debug!("Setting groups {:?}", groups);
        let result = unsafe { libc::setgroups(groups.len(), groups.as_ptr()) };
        Errno::result(result).map(drop)?;
        Ok(())
    }

    fn setresgid(&self, gid: u32) -> io::Result<()> {
        let gid = Gid::from_raw(gid);
        unistd::setresgid(gid, gid, gid)?;
        Ok(())
    }

    fn setresuid(&self, uid: u32) -> io::Result<()> {
        let uid = Uid::from_raw(uid);
        unistd::setresuid(uid, uid, uid)?;
        Ok(())
    }

    fn drop_bounding(&self, keep: &HashSet<Capability>) -> io::Result<()> {
        let mut bounded = caps::read(None, CapSet::Bounding).map_err(caps_error)?;
        bounded.retain(|c| !keep.contains(c));
        for cap in &bounded {
            // caps::set cannot be called for bounded
            caps::drop(None, CapSet::Bounding, *cap).map_err(caps_error)?;
        }
        Ok(())
    }

    fn set_capabilities(&self, set: &HashSet<Capability>) -> io::Result<()> {
        for capset in [
            CapSet::Effective,
            CapSet::Permitted,
            CapSet::Inheritable,
            CapSet::Ambient,
        ] {
            caps::set(None, capset, set).map_err(caps_error)?;
        }
        Ok(())
    }

    fn getppid(&self) -> Pid {
        unistd::getppid()
    }

    fn getpid(&self) -> Pid {
        unistd::getpid()
    }

    fn kill(&self, pid: Pid, signal: Signal) -> io::Result<()> {
        signal::kill(pid, signal)?;
        Ok(())
    }

    fn execve(&self, path: &CStr, args: &[CString], env: &[CString]) -> io::Result<()> {
        match unistd::execve(path, args, env) {
            Ok(infallible) => match infallible {},
            Err(e) => Err(e.into()),
        }
    }
}
