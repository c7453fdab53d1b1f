use crate::{
    config::{InitConfig, NamespaceType},
    network::{self, Registry},
    sys::{LinuxSyscall, Syscall},
};
use anyhow::anyhow;
use error::StepContext;
use log::{debug, info, warn};
use nix::sys::signal::Signal;
use std::{ffi::CString, path::Path};

/// Console attachment.
pub mod console;
mod error;
/// Root filesystem, read only and masked paths.
pub mod fs;
/// Credentials, capabilities and working directory.
pub mod identity;
/// Namespace joining.
pub mod namespaces;
/// Parent death signal and orphan detection.
pub mod pdeath;
/// Resource limits.
pub mod rlimits;
/// AppArmor and process labels.
pub mod security;

pub use error::{Step, SystemError};
use pdeath::ParentDeathSignal;

/// How a successful init run ends
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    /// The process image was replaced by the container command. Only
    /// observable with a [`Syscall`] implementation whose `execve` returns.
    Exec,
    /// The parent died before the command was started and the process
    /// killed itself
    Killed,
}

/// Turns the current process into the container command
pub struct Init<'a, S: Syscall = LinuxSyscall> {
    config: InitConfig,
    sys: S,
    registry: &'a Registry,
}

impl Init<'static, LinuxSyscall> {
    /// Init operating on the running process with the builtin network strategies
    pub fn new(config: InitConfig) -> Init<'static, LinuxSyscall> {
        Init::with(config, LinuxSyscall, network::registry())
    }
}

impl<'a, S: Syscall> Init<'a, S> {
    /// Init with explicit kernel access and network registry
    pub fn with(config: InitConfig, sys: S, registry: &'a Registry) -> Init<'a, S> {
        Init {
            config,
            sys,
            registry,
        }
    }

    /// Run the init sequence. The first failing step aborts the sequence.
    pub fn run(self) -> Result<Terminal, SystemError> {
        let Init {
            config: init,
            sys,
            registry,
        } = self;
        let config = &init.config;

        init.validate().step(Step::Validate)?;
        let networks = config
            .networks
            .iter()
            .map(|network| {
                registry
                    .resolve(&network.r#type)
                    .map(|strategy| (network, strategy))
            })
            .collect::<Result<Vec<_>, _>>()
            .step(Step::Validate)?;

        debug!("Joining namespaces");
        namespaces::join(&sys, &config.namespaces).step(Step::JoinNamespaces)?;

        for (network, strategy) in networks {
            debug!("Initializing {} network {}", network.r#type, network.name);
            strategy
                .initialize(network, &init.network_state)
                .step(Step::InitializeNetwork)?;
        }

        let console = config
            .console
            .as_deref()
            .filter(|console| !console.as_os_str().is_empty());
        if let Some(console) = console {
            console::attach(&sys, console).step(Step::AttachConsole)?;
        }

        debug!("Creating session");
        sys.setsid().step(Step::Setsid)?;

        if console.is_some() {
            debug!("Setting controlling terminal");
            sys.setctty().step(Step::Setctty)?;
        }

        let cwd = if init.cwd.as_os_str().is_empty() {
            Path::new("/")
        } else {
            init.cwd.as_path()
        };

        debug!("Setting rlimits");
        rlimits::apply(&sys, &config.rlimits).step(Step::Rlimits)?;

        if config.namespaces.contains(NamespaceType::Mount) {
            debug!("Setting up rootfs");
            fs::setup_rootfs(&sys, config.rootfs.as_ref()).step(Step::Rootfs)?;
        }

        if let Some(hostname) = config.hostname.as_deref().filter(|h| !h.is_empty()) {
            debug!("Setting hostname to {}", hostname);
            sys.sethostname(hostname).step(Step::Hostname)?;
        }

        security::apply_profile(&sys, &config.apparmor_profile).step(Step::AppArmor)?;
        security::set_process_label(&sys, &config.process_label).step(Step::ProcessLabel)?;

        for path in &config.readonly_paths {
            fs::remount_readonly(&sys, path).step(Step::ReadonlyPath)?;
        }
        for path in &config.mask_paths {
            fs::mask(&sys, path).step(Step::MaskPath)?;
        }

        let pdeath = ParentDeathSignal::capture(&sys).step(Step::GetParentDeathSignal)?;

        identity::finalize(&sys, config, cwd).step(Step::FinalizeNamespace)?;

        pdeath
            .restore(&sys)
            .step(Step::RestoreParentDeathSignal)?;

        if pdeath::orphaned(&sys) {
            warn!("Parent died. Killing myself");
            sys.kill(sys.getpid(), Signal::SIGKILL)
                .step(Step::Orphan)?;
            return Ok(Terminal::Killed);
        }

        let path = init
            .args
            .first()
            .map(|path| CString::from(path.clone()))
            .ok_or_else(|| anyhow!("missing command"))
            .step(Step::Exec)?;
        let args = init
            .args
            .iter()
            .cloned()
            .map(CString::from)
            .collect::<Vec<_>>();
        let env = init
            .env
            .iter()
            .map(|(key, value)| CString::new(format!("{key}={value}")))
            .collect::<Result<Vec<_>, _>>()
            .step(Step::Exec)?;

        info!("Executing {}", path.to_string_lossy());
        sys.execve(&path, &args, &env).step(Step::Exec)?;
        Ok(Terminal::Exec)
    }
}
