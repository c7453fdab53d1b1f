use crate::sys::Syscall;
use log::debug;
use nix::{sys::signal::Signal, unistd::Pid};
use std::io;

/// Parent death signal captured before the credentials of the process change.
/// Changing uid or gid clears the registration in the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParentDeathSignal(Option<Signal>);

impl ParentDeathSignal {
    /// Read the current parent death signal
    pub fn capture<S: Syscall>(sys: &S) -> io::Result<ParentDeathSignal> {
        let signal = sys.get_parent_death_signal()?;
        debug!("Captured parent death signal {:?}", signal);
        Ok(ParentDeathSignal(signal))
    }

    /// The captured signal
    pub fn signal(&self) -> Option<Signal> {
        self.0
    }

    /// Set the captured signal again if it changed in the meantime
    pub fn restore<S: Syscall>(&self, sys: &S) -> io::Result<()> {
        let Some(signal) = self.0 else {
            return Ok(());
        };
        if sys.get_parent_death_signal()? == Some(signal) {
            return Ok(());
        }
        debug!("Restoring parent death signal {}", signal);
        sys.set_parent_death_signal(Some(signal))
    }
}

/// True if the parent is gone and this process got reparented to init.
///
/// Inside a new pid namespace `getppid` returns 0 because the parent lives
/// outside of the namespace. The check never triggers there.
pub fn orphaned<S: Syscall>(sys: &S) -> bool {
    sys.getppid() == Pid::from_raw(1)
}
