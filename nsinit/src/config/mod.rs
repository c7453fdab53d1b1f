use crate::{
    common::non_nul_string::NonNulString,
    network::{Network, NetworkState},
};
use nix::{mount::MsFlags, sched::CloneFlags};
use serde::{de::DeserializeOwned, Deserialize};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

mod rlimit;

pub use self::rlimit::{RLimitResource, RLimitValue};

/// Configuration errors
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration file cannot be read
    #[error("failed to read {0}")]
    Io(PathBuf, #[source] std::io::Error),
    /// The configuration file is malformed
    #[error("failed to parse {0}")]
    Toml(PathBuf, #[source] toml::de::Error),
    /// The configuration is semantically invalid
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Read and deserialize a toml file
pub fn read<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let content = fs::read_to_string(path).map_err(|e| Error::Io(path.to_owned(), e))?;
    toml::from_str(&content).map_err(|e| Error::Toml(path.to_owned(), e))
}

/// Per process bootstrap parameters handed in by the supervisor
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitConfig {
    /// Arguments of the container command. The first element is the binary.
    pub args: Vec<NonNulString>,
    /// Environment of the container command
    #[serde(default)]
    pub env: BTreeMap<NonNulString, NonNulString>,
    /// Working directory. Empty means `/`.
    #[serde(default)]
    pub cwd: PathBuf,
    /// Container wide configuration
    pub config: ContainerConfig,
    /// Network state produced by the network create phase
    #[serde(default)]
    pub network_state: NetworkState,
}

impl InitConfig {
    /// Load an init configuration from a toml file
    pub fn from_path(path: &Path) -> Result<InitConfig, Error> {
        read(path)
    }

    /// Check the parts of the configuration that would otherwise only fail late
    pub fn validate(&self) -> Result<(), Error> {
        if self.args.is_empty() {
            return Err(Error::Invalid("missing command".into()));
        }
        if let Some(key) = self
            .env
            .keys()
            .find(|key| key.is_empty() || key.contains('='))
        {
            return Err(Error::Invalid(format!("invalid environment variable {key}")));
        }
        for (resource, limit) in &self.config.rlimits {
            let (soft, hard) = limit.limits();
            if soft > hard {
                return Err(Error::Invalid(format!(
                    "soft limit of {resource} exceeds hard limit: {soft} > {hard}"
                )));
            }
        }
        if let Some(console) = &self.config.console {
            if !console.as_os_str().is_empty() && !console.is_absolute() {
                return Err(Error::Invalid(format!(
                    "console path {} is not absolute",
                    console.display()
                )));
            }
        }
        Ok(())
    }
}

/// Container wide configuration read by the init pipeline
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
    /// Namespaces of the container. Entries with a path are joined.
    #[serde(default)]
    pub namespaces: Namespaces,
    /// Terminal device prepared by the supervisor
    pub console: Option<PathBuf>,
    /// UTS hostname
    pub hostname: Option<String>,
    /// AppArmor profile. Empty skips.
    #[serde(default)]
    pub apparmor_profile: String,
    /// SELinux process label. Empty skips.
    #[serde(default)]
    pub process_label: String,
    /// Paths remounted read only
    #[serde(default)]
    pub readonly_paths: Vec<PathBuf>,
    /// Paths hidden from the container
    #[serde(default)]
    pub mask_paths: Vec<PathBuf>,
    /// Resource limits
    #[serde(default)]
    pub rlimits: HashMap<RLimitResource, RLimitValue>,
    /// Root filesystem. Only used in a new mount namespace.
    pub rootfs: Option<Rootfs>,
    /// Identity of the container command
    #[serde(default)]
    pub user: User,
    /// Capabilities the command keeps. `None` leaves the capability sets untouched.
    pub capabilities: Option<HashSet<String>>,
    /// Networks initialized from inside the network namespace
    #[serde(default)]
    pub networks: Vec<Network>,
}

/// Namespace type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceType {
    /// Mount namespace
    Mount,
    /// Hostname and domain name
    Uts,
    /// System V IPC and POSIX message queues
    Ipc,
    /// User and group ids
    User,
    /// Process ids
    Pid,
    /// Network devices, stacks, ports
    Network,
    /// Cgroup root directory
    Cgroup,
}

impl NamespaceType {
    /// Flag used for `setns` and `clone`
    pub fn clone_flag(&self) -> CloneFlags {
        match self {
            NamespaceType::Mount => CloneFlags::CLONE_NEWNS,
            NamespaceType::Uts => CloneFlags::CLONE_NEWUTS,
            NamespaceType::Ipc => CloneFlags::CLONE_NEWIPC,
            NamespaceType::User => CloneFlags::CLONE_NEWUSER,
            NamespaceType::Pid => CloneFlags::CLONE_NEWPID,
            NamespaceType::Network => CloneFlags::CLONE_NEWNET,
            NamespaceType::Cgroup => CloneFlags::CLONE_NEWCGROUP,
        }
    }
}

impl fmt::Display for NamespaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NamespaceType::Mount => "mount",
            NamespaceType::Uts => "uts",
            NamespaceType::Ipc => "ipc",
            NamespaceType::User => "user",
            NamespaceType::Pid => "pid",
            NamespaceType::Network => "network",
            NamespaceType::Cgroup => "cgroup",
        };
        f.write_str(name)
    }
}

/// A namespace the container lives in
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Namespace {
    /// Type
    pub r#type: NamespaceType,
    /// Path to an existing namespace to join, e.g. `/proc/1234/ns/net`.
    /// `None` if the namespace was created for this container.
    pub path: Option<PathBuf>,
}

/// Set of namespaces
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Namespaces(Vec<Namespace>);

impl Namespaces {
    /// True if a namespace of type `ty` is configured, either new or joined
    pub fn contains(&self, ty: NamespaceType) -> bool {
        self.0.iter().any(|ns| ns.r#type == ty)
    }

    /// Namespaces that are entered by path in configuration order
    pub fn joinable(&self) -> impl Iterator<Item = (NamespaceType, &Path)> {
        self.0
            .iter()
            .filter_map(|ns| ns.path.as_deref().map(|path| (ns.r#type, path)))
    }
}

impl From<Vec<Namespace>> for Namespaces {
    fn from(namespaces: Vec<Namespace>) -> Self {
        Namespaces(namespaces)
    }
}

/// Root filesystem of the container
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rootfs {
    /// Host path of the new root
    pub path: PathBuf,
    /// Mounts performed below `path` before pivoting
    #[serde(default)]
    pub mounts: Vec<Mount>,
    /// Propagation of `/` in the new mount namespace
    #[serde(default)]
    pub propagation: Propagation,
}

/// Mount propagation of the container root
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Recursive private
    Private,
    /// Recursive slave. Unmounts in the container do not reach the host.
    #[default]
    Slave,
    /// Recursive shared
    Shared,
}

impl Propagation {
    /// Mount flags to apply this propagation recursively
    pub fn flags(&self) -> MsFlags {
        MsFlags::MS_REC
            | match self {
                Propagation::Private => MsFlags::MS_PRIVATE,
                Propagation::Slave => MsFlags::MS_SLAVE,
                Propagation::Shared => MsFlags::MS_SHARED,
            }
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Propagation::Private => "rprivate",
            Propagation::Slave => "rslave",
            Propagation::Shared => "rshared",
        };
        f.write_str(name)
    }
}

/// A mount below the rootfs
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Mount {
    /// Source. Device, directory or a name for pseudo filesystems.
    pub source: Option<PathBuf>,
    /// Target relative to the rootfs
    pub destination: PathBuf,
    /// Filesystem type
    pub fstype: Option<String>,
    /// Options in fstab notation, e.g. `["bind", "ro", "nosuid"]`
    #[serde(default)]
    pub options: Vec<String>,
}

/// Identity of the container command
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct User {
    /// User id
    #[serde(default)]
    pub uid: u32,
    /// Group id
    #[serde(default)]
    pub gid: u32,
    /// Supplementary groups
    #[serde(default)]
    pub additional_groups: Vec<u32>,
}
