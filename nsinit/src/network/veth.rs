use super::{Error, IpLink, Link, Network, NetworkState, Strategy};
use log::{debug, warn};
use nix::unistd::Pid;

/// Maximum length of an interface name without the terminating nul
const IFNAMSIZ: usize = 15;
/// Number of random characters appended to the prefix
const SUFFIX_LEN: usize = 7;
const ALPHABET: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// A veth pair with the host end attached to a bridge and the other end
/// moved into the container network namespace
pub struct Veth<L = IpLink> {
    link: L,
}

impl<L: Link> Veth<L> {
    /// New veth strategy operating on `link`
    pub fn new(link: L) -> Veth<L> {
        Veth { link }
    }

    fn attach(
        &self,
        network: &Network,
        bridge: &str,
        host: &str,
        child: &str,
        pid: Pid,
    ) -> Result<(), Error> {
        if let Some(mtu) = network.mtu {
            self.link.set_mtu(host, mtu)?;
        }
        self.link.set_master(host, bridge)?;
        self.link.set_up(host)?;
        debug!("Moving {} into the network namespace of {}", child, pid);
        self.link.set_netns(child, pid)
    }
}

fn random_name(prefix: &str) -> Result<String, Error> {
    if prefix.len() + SUFFIX_LEN > IFNAMSIZ {
        return Err(Error::Configuration(format!(
            "veth prefix {prefix} exceeds {} characters",
            IFNAMSIZ - SUFFIX_LEN
        )));
    }
    Ok(format!("{}{}", prefix, nanoid::nanoid!(SUFFIX_LEN, &ALPHABET)))
}

impl<L: Link> Strategy for Veth<L> {
    fn name(&self) -> &'static str {
        "veth"
    }

    fn create(&self, network: &Network, pid: Pid, state: &mut NetworkState) -> Result<(), Error> {
        let bridge = network
            .bridge
            .as_deref()
            .filter(|bridge| !bridge.is_empty())
            .ok_or_else(|| Error::Configuration("veth requires a bridge".into()))?;
        let host = random_name(&network.veth_prefix)?;
        let child = random_name(&network.veth_prefix)?;

        debug!("Creating veth pair {} and {}", host, child);
        self.link.add_veth(&host, &child, network.txqueuelen)?;

        if let Err(e) = self.attach(network, bridge, &host, &child, pid) {
            if let Err(e) = self.link.delete(&host) {
                warn!("Failed to remove veth {}: {}", host, e);
            }
            return Err(e);
        }

        state.veth_host = Some(host);
        state.veth_child = Some(child);
        state.ns_path = Some(format!("/proc/{pid}/ns/net").into());
        Ok(())
    }

    fn initialize(&self, network: &Network, state: &NetworkState) -> Result<(), Error> {
        let child = state
            .veth_child
            .as_deref()
            .ok_or(Error::MissingState("veth_child"))?;
        let name = network.name.as_str();

        debug!("Configuring {} as {}", child, name);
        self.link.set_down(child)?;
        self.link.rename(child, name)?;
        if let Some(mac) = &network.mac_address {
            self.link.set_mac(name, mac)?;
        }
        for address in [&network.address, &network.ipv6_address].into_iter().flatten() {
            self.link.add_address(name, address)?;
        }
        if let Some(mtu) = network.mtu {
            self.link.set_mtu(name, mtu)?;
        }
        self.link.set_up(name)?;
        for gateway in [&network.gateway, &network.ipv6_gateway].into_iter().flatten() {
            self.link.add_default_route(name, gateway)?;
        }
        Ok(())
    }
}
