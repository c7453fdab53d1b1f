use std::fmt;
use thiserror::Error;

/// Step of the init pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    /// Configuration validation before anything touches the process
    Validate,
    /// Enter namespaces referenced by path
    JoinNamespaces,
    /// Initialize the container side of the networks
    InitializeNetwork,
    /// Rebind stdio to the console
    AttachConsole,
    /// Become session leader
    Setsid,
    /// Claim the console as controlling terminal
    Setctty,
    /// Apply resource limits
    Rlimits,
    /// Construct and pivot into the root filesystem
    Rootfs,
    /// Set the hostname
    Hostname,
    /// Apply the AppArmor profile
    AppArmor,
    /// Apply the process label
    ProcessLabel,
    /// Remount a path read only
    ReadonlyPath,
    /// Mask a path
    MaskPath,
    /// Capture the parent death signal
    GetParentDeathSignal,
    /// Set identity, capabilities and working directory
    FinalizeNamespace,
    /// Restore the parent death signal
    RestoreParentDeathSignal,
    /// Kill the orphaned process
    Orphan,
    /// Replace the process image
    Exec,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Validate => "validate configuration",
            Step::JoinNamespaces => "join namespaces",
            Step::InitializeNetwork => "initialize network",
            Step::AttachConsole => "attach console",
            Step::Setsid => "create session",
            Step::Setctty => "set controlling terminal",
            Step::Rlimits => "set rlimits",
            Step::Rootfs => "setup rootfs",
            Step::Hostname => "set hostname",
            Step::AppArmor => "apply apparmor profile",
            Step::ProcessLabel => "set process label",
            Step::ReadonlyPath => "remount path read only",
            Step::MaskPath => "mask path",
            Step::GetParentDeathSignal => "get parent death signal",
            Step::FinalizeNamespace => "finalize namespace",
            Step::RestoreParentDeathSignal => "restore parent death signal",
            Step::Orphan => "kill orphaned process",
            Step::Exec => "exec",
        };
        f.write_str(s)
    }
}

/// Failure of an init step. Always fatal for the container start.
#[derive(Error, Debug)]
#[error("failed to {step}")]
pub struct SystemError {
    step: Step,
    #[source]
    source: anyhow::Error,
}

impl SystemError {
    /// Wrap `source` as failure of `step`
    pub fn new<E: Into<anyhow::Error>>(step: Step, source: E) -> SystemError {
        SystemError {
            step,
            source: source.into(),
        }
    }

    /// The step that failed
    pub fn step(&self) -> Step {
        self.step
    }

    /// The underlying cause
    pub fn cause(&self) -> &anyhow::Error {
        &self.source
    }
}

/// Tag the error of a result with the step it originates from
pub(crate) trait StepContext<T> {
    fn step(self, step: Step) -> Result<T, SystemError>;
}

impl<T, E: Into<anyhow::Error>> StepContext<T> for Result<T, E> {
    fn step(self, step: Step) -> Result<T, SystemError> {
        self.map_err(|e| SystemError::new(step, e))
    }
}
