use lazy_static::lazy_static;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, io, path::PathBuf};
use thiserror::Error;

#[cfg(test)]
pub(crate) mod fake;
mod link;
mod loopback;
mod veth;

pub use link::{IpLink, Link};
pub use loopback::Loopback;
pub use veth::Veth;

/// Network errors
#[derive(Error, Debug)]
pub enum Error {
    /// No strategy is registered under this name
    #[error("not a valid network strategy type: {0}")]
    NotValidStrategyType(String),
    /// A strategy with this name is already registered
    #[error("duplicate network strategy: {0}")]
    DuplicateStrategy(String),
    /// The network configuration lacks something the strategy needs
    #[error("invalid network configuration: {0}")]
    Configuration(String),
    /// The state from the create phase lacks a field
    #[error("missing network state: {0}")]
    MissingState(&'static str),
    /// A link command failed
    #[error("failed to run {0}: {1}")]
    Command(String, String),
    /// Io error
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Static network configuration of a container
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Network {
    /// Strategy name, e.g. `veth` or `loopback`
    pub r#type: String,
    /// Interface name inside the container
    #[serde(default = "default_name")]
    pub name: String,
    /// Host bridge the host side interface is attached to
    pub bridge: Option<String>,
    /// Prefix of generated interface names
    #[serde(default = "default_veth_prefix")]
    pub veth_prefix: String,
    /// MAC address of the container interface
    pub mac_address: Option<String>,
    /// IPv4 address in CIDR notation
    pub address: Option<String>,
    /// IPv4 default gateway
    pub gateway: Option<String>,
    /// IPv6 address in CIDR notation
    pub ipv6_address: Option<String>,
    /// IPv6 default gateway
    pub ipv6_gateway: Option<String>,
    /// MTU of both interfaces
    pub mtu: Option<u32>,
    /// Transmit queue length of the pair
    pub txqueuelen: Option<u32>,
}

fn default_name() -> String {
    "eth0".into()
}

fn default_veth_prefix() -> String {
    "veth".into()
}

impl Network {
    /// Network of type `ty` with default values
    pub fn new(ty: &str) -> Network {
        Network {
            r#type: ty.into(),
            name: default_name(),
            bridge: None,
            veth_prefix: default_veth_prefix(),
            mac_address: None,
            address: None,
            gateway: None,
            ipv6_address: None,
            ipv6_gateway: None,
            mtu: None,
            txqueuelen: None,
        }
    }
}

/// Live network state produced by [`Strategy::create`] and consumed by
/// [`Strategy::initialize`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkState {
    /// Host side interface of a veth pair
    pub veth_host: Option<String>,
    /// Container side interface of a veth pair before it is renamed
    pub veth_child: Option<String>,
    /// Network namespace the container side lives in
    pub ns_path: Option<PathBuf>,
}

/// A way of attaching a container to a network. Implementations keep no per
/// container state: everything lives in [`NetworkState`].
pub trait Strategy: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Build the host side of the attachment for the container process `pid`.
    /// Runs outside the container.
    fn create(&self, network: &Network, pid: Pid, state: &mut NetworkState)
        -> Result<(), Error>;

    /// Configure the container side. Runs inside the network namespace.
    fn initialize(&self, network: &Network, state: &NetworkState) -> Result<(), Error>;
}

/// Name to strategy table
pub struct Registry {
    strategies: HashMap<String, Box<dyn Strategy>>,
}

impl Registry {
    /// Registry without any strategy
    pub fn empty() -> Registry {
        Registry {
            strategies: HashMap::new(),
        }
    }

    /// Registry with `veth` and `loopback` backed by `ip(8)`
    pub fn builtin() -> Registry {
        let mut strategies: HashMap<String, Box<dyn Strategy>> = HashMap::new();
        strategies.insert("veth".into(), Box::new(Veth::new(IpLink)));
        strategies.insert("loopback".into(), Box::new(Loopback::new(IpLink)));
        Registry { strategies }
    }

    /// Add `strategy` under `name`. Registration needs exclusive access, so
    /// a registry is completed before it is shared.
    pub fn register<S>(&mut self, name: &str, strategy: S) -> Result<(), Error>
    where
        S: Strategy + 'static,
    {
        if self.strategies.contains_key(name) {
            return Err(Error::DuplicateStrategy(name.into()));
        }
        self.strategies.insert(name.into(), Box::new(strategy));
        Ok(())
    }

    /// Look up the strategy registered under `name`
    pub fn resolve(&self, name: &str) -> Result<&dyn Strategy, Error> {
        self.strategies
            .get(name)
            .map(|strategy| strategy.as_ref())
            .ok_or_else(|| Error::NotValidStrategyType(name.into()))
    }

    /// Registered names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }
}

lazy_static! {
    static ref REGISTRY: Registry = Registry::builtin();
}

/// Process wide registry with the builtin strategies. Initialized on first
/// use and read only afterwards.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Resolve `name` in the process wide registry
pub fn get_strategy(name: &str) -> Result<&'static dyn Strategy, Error> {
    registry().resolve(name)
}
