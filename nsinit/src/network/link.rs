use super::Error;
use log::debug;
use nix::unistd::Pid;
use std::process::Command;

/// Link level operations needed by the network strategies
pub trait Link: Send + Sync {
    /// Create a veth pair
    fn add_veth(&self, host: &str, child: &str, txqueuelen: Option<u32>) -> Result<(), Error>;
    /// Delete a link. Deleting one end of a veth pair removes the peer too.
    fn delete(&self, name: &str) -> Result<(), Error>;
    /// Attach `name` to `bridge`
    fn set_master(&self, name: &str, bridge: &str) -> Result<(), Error>;
    /// Set the MTU
    fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), Error>;
    /// Bring the link up
    fn set_up(&self, name: &str) -> Result<(), Error>;
    /// Bring the link down
    fn set_down(&self, name: &str) -> Result<(), Error>;
    /// Move the link into the network namespace of `pid`
    fn set_netns(&self, name: &str, pid: Pid) -> Result<(), Error>;
    /// Rename a link
    fn rename(&self, name: &str, new_name: &str) -> Result<(), Error>;
    /// Set the hardware address
    fn set_mac(&self, name: &str, mac: &str) -> Result<(), Error>;
    /// Add an address in CIDR notation
    fn add_address(&self, name: &str, address: &str) -> Result<(), Error>;
    /// Add a default route via `gateway`
    fn add_default_route(&self, name: &str, gateway: &str) -> Result<(), Error>;
}

/// [`Link`] implementation that drives `ip(8)`
#[derive(Clone, Copy, Debug, Default)]
pub struct IpLink;

impl IpLink {
    fn ip(&self, args: &[&str]) -> Result<(), Error> {
        let command = format!("ip {}", args.join(" "));
        debug!("Running {}", command);
        let output = Command::new("ip").args(args).output()?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(Error::Command(command, stderr))
        }
    }
}

fn family(address: &str) -> &'static str {
    if address.contains(':') {
        "-6"
    } else {
        "-4"
    }
}

impl Link for IpLink {
    fn add_veth(&self, host: &str, child: &str, txqueuelen: Option<u32>) -> Result<(), Error> {
        let txqueuelen = txqueuelen.map(|len| len.to_string());
        let mut args = vec!["link", "add", host];
        if let Some(len) = txqueuelen.as_deref() {
            args.extend(["txqueuelen", len]);
        }
        args.extend(["type", "veth", "peer", "name", child]);
        self.ip(&args)
    }

    fn delete(&self, name: &str) -> Result<(), Error> {
        self.ip(&["link", "delete", name])
    }

    fn set_master(&self, name: &str, bridge: &str) -> Result<(), Error> {
        self.ip(&["link", "set", name, "master", bridge])
    }

    fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), Error> {
        self.ip(&["link", "set", name, "mtu", &mtu.to_string()])
    }

    fn set_up(&self, name: &str) -> Result<(), Error> {
        self.ip(&["link", "set", name, "up"])
    }

    fn set_down(&self, name: &str) -> Result<(), Error> {
        self.ip(&["link", "set", name, "down"])
    }

    fn set_netns(&self, name: &str, pid: Pid) -> Result<(), Error> {
        self.ip(&["link", "set", name, "netns", &pid.to_string()])
    }

    fn rename(&self, name: &str, new_name: &str) -> Result<(), Error> {
        self.ip(&["link", "set", name, "name", new_name])
    }

    fn set_mac(&self, name: &str, mac: &str) -> Result<(), Error> {
        self.ip(&["link", "set", name, "address", mac])
    }

    fn add_address(&self, name: &str, address: &str) -> Result<(), Error> {
        self.ip(&[family(address), "addr", "add", address, "dev", name])
    }

    fn add_default_route(&self, name: &str, gateway: &str) -> Result<(), Error> {
        self.ip(&[
            family(gateway),
            "route",
            "add",
            "default",
            "via",
            gateway,
            "dev",
            name,
        ])
    }
}
